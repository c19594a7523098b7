use crate::core::loader::format_numbers;
use crate::core::progress::ProgressReport;
use crate::core::session::GradingSession;
use crate::domain::model::{CandidateId, Mark, QuestionId};
use crate::domain::ports::MarkStore;
use crate::domain::table::MarkTable;
use crate::utils::error::{MarkingError, Result};
use crate::utils::text::{break_mark_points, flatten_whitespace, wrap_text};
use std::fmt::Write as _;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &str = "\
Commands:
  questions                 list the questions assigned to you
  select <question>         switch question (re-reads the mark store, unsaved marks are lost)
  show                      show the question, model answer and responses
  options                   list the marks allowed for the current question
  mark <candidate> <mark>   set a mark, e.g. 'mark 3 1.5' or 'mark 3 -'
  save                      write the current question's marks to the store
  progress                  list questions that still have unmarked responses
  table                     print the whole mark store
  help                      show this message
  quit                      leave (unsaved marks are lost)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Questions,
    Select(String),
    Show,
    Options,
    Mark { candidate: String, value: String },
    Save,
    Progress,
    Table,
    Quit,
    Empty,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((head, args)) = parts.split_first() else {
            return Ok(Command::Empty);
        };

        match (head.to_ascii_lowercase().as_str(), args) {
            ("help" | "?", []) => Ok(Command::Help),
            ("questions" | "list", []) => Ok(Command::Questions),
            ("select" | "q", [question]) => Ok(Command::Select(question.to_string())),
            ("show", []) => Ok(Command::Show),
            ("options", []) => Ok(Command::Options),
            ("mark" | "m", [candidate, value]) => Ok(Command::Mark {
                candidate: candidate.to_string(),
                value: value.to_string(),
            }),
            ("save", []) => Ok(Command::Save),
            ("progress", []) => Ok(Command::Progress),
            ("table", []) => Ok(Command::Table),
            ("quit" | "exit", []) => Ok(Command::Quit),
            ("select" | "q", _) => Err("usage: select <question>".to_string()),
            ("mark" | "m", _) => Err("usage: mark <candidate> <mark>".to_string()),
            (other, _) => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub text: String,
    pub quit: bool,
}

impl Outcome {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

pub struct Console<S: MarkStore> {
    session: GradingSession<S>,
    wrap_width: usize,
    /// Command that was refused once because it would discard unsaved marks.
    warned: Option<Command>,
}

impl<S: MarkStore> Console<S> {
    pub fn new(session: GradingSession<S>, wrap_width: usize) -> Self {
        Self {
            session,
            wrap_width,
            warned: None,
        }
    }

    pub fn session(&self) -> &GradingSession<S> {
        &self.session
    }

    pub fn banner(&self) -> String {
        format!(
            "Marking Interface\nMarker: {}\nYou are marking the following questions: {}\nType 'help' for commands.",
            self.session.grader(),
            format_numbers(&self.session.reference().assignment.question_numbers)
        )
    }

    pub async fn execute(&mut self, command: Command) -> Result<Outcome> {
        // Repeating the command right after the warning confirms it.
        let confirmed = self.warned.take().as_ref() == Some(&command);

        match command {
            Command::Empty => Ok(Outcome::text("")),
            Command::Help => Ok(Outcome::text(HELP)),
            Command::Questions => Ok(Outcome::text(self.render_questions())),
            Command::Select(raw) => {
                let normalized = if raw.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("Q{}", raw)
                } else {
                    raw.replacen('q', "Q", 1)
                };
                let question: QuestionId =
                    normalized
                        .parse()
                        .map_err(|_| MarkingError::QuestionNotInScope {
                            question: raw.clone(),
                            grader: self.session.grader().to_string(),
                        })?;
                if self.session.has_unsaved_changes()
                    && !confirmed
                    && self.session.reference().question(&question).is_some()
                {
                    let current = self
                        .session
                        .selected_question()
                        .map(|q| q.id.to_string())
                        .unwrap_or_default();
                    self.warned = Some(Command::Select(raw.clone()));
                    return Ok(Outcome::text(format!(
                        "⚠️ You have unsaved marks for {}. Run 'save', or 'select {}' again to discard them.",
                        current, raw
                    )));
                }
                self.session.select_question(&question).await?;
                Ok(Outcome::text(self.render_question()?))
            }
            Command::Show => Ok(Outcome::text(self.render_question()?)),
            Command::Options => Ok(Outcome::text(self.render_options()?)),
            Command::Mark { candidate, value } => {
                let question = self
                    .session
                    .selected_question()
                    .map(|q| q.id.clone())
                    .ok_or(MarkingError::NoQuestionSelected)?;
                let candidate = CandidateId::parse(&candidate)
                    .ok_or(MarkingError::UnknownCandidate { candidate })?;
                let mark: Mark = value.parse().map_err(|reason| MarkingError::InvalidMark {
                    question: question.to_string(),
                    value: value.clone(),
                    reason,
                })?;
                self.session.edit_mark(&candidate, mark)?;
                Ok(Outcome::text(format!(
                    "Candidate {}: {} = {} (unsaved)",
                    candidate, question, mark
                )))
            }
            Command::Save => {
                self.session.save().await?;
                let question = self
                    .session
                    .selected_question()
                    .map(|q| q.id.to_string())
                    .unwrap_or_default();
                Ok(Outcome::text(format!(
                    "✅ Marks for {} have been saved! ({})",
                    question,
                    chrono::Local::now().format("%H:%M:%S")
                )))
            }
            Command::Progress => {
                let report = self.session.progress().await?;
                Ok(Outcome::text(render_progress(&report)))
            }
            Command::Table => {
                let table = self.session.snapshot().await?;
                Ok(Outcome::text(render_table(&table)))
            }
            Command::Quit => {
                if self.session.has_unsaved_changes() && !confirmed {
                    self.warned = Some(Command::Quit);
                    return Ok(Outcome::text(
                        "⚠️ You have unsaved marks. Run 'save', or 'quit' again to discard them.",
                    ));
                }
                Ok(Outcome {
                    text: "Bye.".to_string(),
                    quit: true,
                })
            }
        }
    }

    /// Reads commands line by line until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: std::io::Write,
    {
        writeln!(out, "{}", self.banner())?;
        if let Ok(text) = self.render_question() {
            writeln!(out, "{}", text)?;
        }

        let mut lines = input.lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(usage) => {
                    writeln!(out, "{}", usage)?;
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(outcome) => {
                    if !outcome.text.is_empty() {
                        writeln!(out, "{}", outcome.text)?;
                    }
                    if outcome.quit {
                        break;
                    }
                }
                Err(e) => {
                    if e.is_fatal() {
                        tracing::error!("❌ {} (Category: {:?})", e, e.category());
                    } else {
                        tracing::warn!("{} (Category: {:?})", e, e.category());
                    }
                    writeln!(out, "❌ {}", e.user_friendly_message())?;
                    writeln!(out, "💡 {}", e.recovery_suggestion())?;
                }
            }
        }

        if self.session.has_unsaved_changes() {
            tracing::warn!("Session ended with unsaved marks");
        }
        Ok(())
    }

    fn render_questions(&self) -> String {
        let selected = self.session.selected_question().map(|q| q.id.clone());
        self.session
            .reference()
            .questions
            .iter()
            .map(|q| {
                let marker = if Some(&q.id) == selected.as_ref() { "*" } else { " " };
                format!("{} {} (max {:.1})", marker, q.id, q.scale.max_score())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_options(&self) -> Result<String> {
        let question = self
            .session
            .selected_question()
            .ok_or(MarkingError::NoQuestionSelected)?;
        Ok(format!("Marks for {}: {}", question.id, render_scale(question.scale.options())))
    }

    fn render_question(&self) -> Result<String> {
        let question = self
            .session
            .selected_question()
            .ok_or(MarkingError::NoQuestionSelected)?;
        let reference = self.session.reference();

        let mut text = String::new();
        let _ = writeln!(text, "### Question: {}", question.id);
        if !question.prompt.is_empty() {
            let _ = writeln!(text, "{}", wrap_text(&question.prompt, self.wrap_width));
        }
        let _ = writeln!(text, "### Answer:");
        let _ = writeln!(text, "{}", break_mark_points(&question.model_answer));
        let _ = writeln!(text, "Marks: {}", render_scale(question.scale.options()));

        for (candidate, mark) in self.session.displayed_marks() {
            let response = flatten_whitespace(reference.response(candidate, &question.id));
            let _ = writeln!(text);
            let _ = writeln!(text, "Candidate {}:", candidate);
            let _ = writeln!(text, "{}", wrap_text(&response, self.wrap_width));
            let _ = writeln!(text, "Mark for {}: {}", candidate, mark);
        }

        if self.session.has_unsaved_changes() {
            let _ = writeln!(text, "\n(unsaved changes)");
        }
        Ok(text.trim_end().to_string())
    }
}

fn render_scale(options: Vec<Mark>) -> String {
    options
        .iter()
        .map(Mark::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_progress(report: &ProgressReport) -> String {
    let remaining: Vec<String> = report
        .remaining_questions()
        .iter()
        .map(|q| q.to_string())
        .collect();
    format!(
        "Remaining Unmarked Questions: {}/{}\n{}",
        report.remaining_count(),
        report.total_count(),
        remaining.join(", ")
    )
    .trim_end()
    .to_string()
}

pub fn render_table(table: &MarkTable) -> String {
    let rows = table.to_rows();
    let columns = rows.first().map(Vec::len).unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            rows.iter()
                .map(|r| r.get(i).map(|c| c.chars().count()).unwrap_or(0))
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
