use regex::Regex;
use std::sync::LazyLock;

static MARK_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+(?:\.\d+)?)\)[ \t]*").expect("mark point pattern"));

/// Greedy word wrap. Text whose length (ignoring existing newlines) fits in
/// `width` is returned untouched; existing line breaks are kept.
pub fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 || text.chars().filter(|c| *c != '\n').count() <= width {
        return text.to_string();
    }

    text.split('\n')
        .map(|line| wrap_line(line, width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_line(line: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Candidate responses are shown as one paragraph.
pub fn flatten_whitespace(text: &str) -> String {
    text.replace(['\n', '\t', '\r'], " ")
}

/// Puts each mark-point marker such as `(2)` at the end of its own line.
pub fn break_mark_points(answer: &str) -> String {
    MARK_POINT
        .replace_all(answer, "($1)\n")
        .trim_end()
        .to_string()
}
