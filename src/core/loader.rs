use crate::domain::model::{
    Assignment, CandidateId, MarkScale, Question, QuestionId, ReferenceData,
};
use crate::utils::error::{MarkingError, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

const ROSTER_COLUMNS: [&str; 4] = ["Question", "maxScore", "grader1", "grader2"];
const SCORE_ROW: &str = "score";
const ANSWER_ROW: &str = "answer";
const PROMPT_ROW: &str = "question";

#[derive(Debug, Clone)]
pub struct Roster {
    pub assignment: Assignment,
    /// maxScore column by question number, where it parsed.
    pub max_scores: HashMap<u32, f64>,
}

/// Reads the roster and response files once at startup.
#[derive(Debug, Clone)]
pub struct ReferenceLoader {
    roster_path: PathBuf,
    responses_path: PathBuf,
    roster_skip_rows: usize,
}

impl ReferenceLoader {
    pub fn new(
        roster_path: impl Into<PathBuf>,
        responses_path: impl Into<PathBuf>,
        roster_skip_rows: usize,
    ) -> Self {
        Self {
            roster_path: roster_path.into(),
            responses_path: responses_path.into(),
            roster_skip_rows,
        }
    }

    pub fn load(&self, grader: &str) -> Result<ReferenceData> {
        let roster_content = read_source(&self.roster_path)?;
        let roster = parse_roster(
            &roster_content,
            &self.roster_path.display().to_string(),
            self.roster_skip_rows,
            grader,
        )?;
        tracing::info!(
            "📋 Grader {} is assigned questions: {}",
            grader,
            format_numbers(&roster.assignment.question_numbers)
        );

        let responses_content = read_source(&self.responses_path)?;
        let reference = parse_responses(
            &responses_content,
            &self.responses_path.display().to_string(),
            &roster,
        )?;
        tracing::info!(
            "✅ Loaded {} questions and {} candidates",
            reference.questions.len(),
            reference.candidates.len()
        );
        Ok(reference)
    }
}

pub fn format_numbers(numbers: &BTreeSet<u32>) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| MarkingError::data_integrity(path.display().to_string(), e.to_string()))
}

fn csv_rows(content: &str, source_name: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let header = reader
        .headers()
        .map_err(|e| MarkingError::data_integrity(source_name, e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = reader
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect::<Vec<_>>()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MarkingError::data_integrity(source_name, e.to_string()))?;

    Ok((header, rows))
}

/// `12`, `12.0` and `Q12` all name question 12.
fn parse_question_number(cell: &str) -> Option<u32> {
    let trimmed = cell.trim();
    let digits = trimmed
        .strip_prefix('Q')
        .or_else(|| trimmed.strip_prefix('q'))
        .unwrap_or(trimmed);
    match digits.parse::<f64>() {
        Ok(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Some(n as u32),
        _ => None,
    }
}

/// Roster layout: header, `skip_rows` metadata rows, then one row per question
/// with columns `[Question, maxScore, grader1, grader2]` by position.
pub fn parse_roster(content: &str, source_name: &str, skip_rows: usize, grader: &str) -> Result<Roster> {
    let (header, rows) = csv_rows(content, source_name)?;
    if header.len() < ROSTER_COLUMNS.len() {
        return Err(MarkingError::data_integrity(
            source_name,
            format!(
                "expected columns {:?}, found {} column(s)",
                ROSTER_COLUMNS,
                header.len()
            ),
        ));
    }

    let mut roster = Roster {
        assignment: Assignment {
            grader: grader.to_string(),
            question_numbers: BTreeSet::new(),
        },
        max_scores: HashMap::new(),
    };

    for (line, row) in rows.iter().enumerate().skip(skip_rows) {
        let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("");
        let Some(number) = parse_question_number(cell(0)) else {
            tracing::debug!("Skipping roster row {}: '{}' is not a question number", line + 2, cell(0));
            continue;
        };

        if let Ok(max) = cell(1).parse::<f64>() {
            roster.max_scores.insert(number, max);
        }
        if cell(2) == grader || cell(3) == grader {
            roster.assignment.question_numbers.insert(number);
        }
    }

    if roster.assignment.question_numbers.is_empty() {
        return Err(MarkingError::data_integrity(
            source_name,
            format!("no questions are assigned to grader '{}'", grader),
        ));
    }
    Ok(roster)
}

struct ResponseColumn {
    index: usize,
    id: QuestionId,
    number: u32,
    header_prompt: String,
}

/// Response layout: first column is the row key; rows `score` and `answer`
/// (and optionally `question`) are reserved, every other row is a candidate.
pub fn parse_responses(content: &str, source_name: &str, roster: &Roster) -> Result<ReferenceData> {
    let (header, rows) = csv_rows(content, source_name)?;
    let assignment = &roster.assignment;

    let mut columns: Vec<ResponseColumn> = Vec::new();
    for (index, name) in header.iter().enumerate().skip(1) {
        let Some((id, number, header_prompt)) = QuestionId::parse_header(name) else {
            tracing::debug!("Skipping response column '{}': not a question", name);
            continue;
        };
        if !assignment.covers(number) {
            continue;
        }
        if columns.iter().any(|c| c.id == id) {
            return Err(MarkingError::data_integrity(
                source_name,
                format!("duplicate question column {}", id),
            ));
        }
        columns.push(ResponseColumn {
            index,
            id,
            number,
            header_prompt,
        });
    }

    if columns.is_empty() {
        return Err(MarkingError::data_integrity(
            source_name,
            format!(
                "no response columns match questions {} assigned to '{}'",
                format_numbers(&assignment.question_numbers),
                assignment.grader
            ),
        ));
    }

    let mut scores: Option<&Vec<String>> = None;
    let mut answers: Option<&Vec<String>> = None;
    let mut prompts: Option<&Vec<String>> = None;
    let mut candidate_rows: Vec<(CandidateId, &Vec<String>)> = Vec::new();

    for row in &rows {
        let key = row.first().map(|k| k.trim()).unwrap_or("");
        match key.to_ascii_lowercase().as_str() {
            SCORE_ROW => scores = Some(row),
            ANSWER_ROW => answers = Some(row),
            PROMPT_ROW => prompts = Some(row),
            _ => {
                let candidate = CandidateId::parse(key).ok_or_else(|| {
                    MarkingError::data_integrity(
                        source_name,
                        format!("row key '{}' is not an integer candidate id", key),
                    )
                })?;
                if candidate_rows.iter().any(|(c, _)| c == &candidate) {
                    return Err(MarkingError::data_integrity(
                        source_name,
                        format!("duplicate candidate {}", candidate),
                    ));
                }
                candidate_rows.push((candidate, row));
            }
        }
    }

    let scores = scores.ok_or_else(|| {
        MarkingError::data_integrity(source_name, format!("missing '{}' row", SCORE_ROW))
    })?;
    let answers = answers.ok_or_else(|| {
        MarkingError::data_integrity(source_name, format!("missing '{}' row", ANSWER_ROW))
    })?;

    let cell = |row: &Vec<String>, index: usize| row.get(index).cloned().unwrap_or_default();

    let mut questions = Vec::with_capacity(columns.len());
    for column in &columns {
        let raw_score = cell(scores, column.index);
        let scale = raw_score
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(MarkScale::from_max_score)
            .ok_or_else(|| {
                MarkingError::data_integrity(
                    source_name,
                    format!(
                        "maximum score '{}' for {} is not a non-negative multiple of 0.5",
                        raw_score.trim(),
                        column.id
                    ),
                )
            })?;

        if column.id.as_str() == format!("Q{}", column.number) {
            if let Some(roster_max) = roster.max_scores.get(&column.number) {
                if (roster_max - scale.max_score()).abs() > f64::EPSILON {
                    tracing::warn!(
                        "⚠️ Roster lists {} as worth {} but the score row says {}; using {}",
                        column.id,
                        roster_max,
                        scale.max_score(),
                        scale.max_score()
                    );
                }
            }
        }

        let prompt = prompts
            .map(|row| cell(row, column.index))
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| column.header_prompt.clone());

        questions.push(Question {
            id: column.id.clone(),
            number: column.number,
            scale,
            prompt,
            model_answer: cell(answers, column.index),
        });
    }

    let mut responses = HashMap::new();
    for (candidate, row) in &candidate_rows {
        for column in &columns {
            responses.insert(
                (candidate.clone(), column.id.clone()),
                cell(row, column.index),
            );
        }
    }

    Ok(ReferenceData {
        assignment: assignment.clone(),
        questions,
        candidates: candidate_rows.into_iter().map(|(c, _)| c).collect(),
        responses,
    })
}
