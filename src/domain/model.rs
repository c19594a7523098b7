use crate::utils::error::{MarkingError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static QUESTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Q(\d+)(?:\.([A-Za-z0-9]+))?(?:\s+(.*))?$").expect("question header pattern")
});

pub const SENTINEL: &str = "-";

/// `Q<n>` or `Q<n>.<sub>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(String);

impl QuestionId {
    /// Splits a response-file column header into identifier and trailing prompt text.
    pub fn parse_header(header: &str) -> Option<(QuestionId, u32, String)> {
        let caps = QUESTION_HEADER.captures(header.trim())?;
        let number: u32 = caps.get(1)?.as_str().parse().ok()?;
        let id = match caps.get(2) {
            Some(sub) => format!("Q{}.{}", number, sub.as_str()),
            None => format!("Q{}", number),
        };
        let prompt = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        Some((QuestionId(id), number, prompt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QuestionId {
    type Err = MarkingError;

    fn from_str(s: &str) -> Result<Self> {
        QuestionId::parse_header(s)
            .filter(|(_, _, prompt)| prompt.is_empty())
            .map(|(id, _, _)| id)
            .ok_or_else(|| MarkingError::data_integrity("question id", format!("'{}' is not of the form Q<n>[.<sub>]", s)))
    }
}

/// Integer-valued candidate key; `3`, ` 3 ` and `3.0` all normalize to `3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn parse(raw: &str) -> Option<CandidateId> {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Some(CandidateId(n.to_string()));
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(CandidateId(format!("{}", f as i64))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A mark cell. Points are counted in half steps so 0.5 arithmetic stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mark {
    #[default]
    Unmarked,
    Points(u32),
}

impl Mark {
    pub fn from_points(points: f64) -> Option<Mark> {
        let doubled = points * 2.0;
        if !doubled.is_finite() || doubled < 0.0 || doubled.fract() != 0.0 || doubled > u32::MAX as f64 {
            return None;
        }
        Some(Mark::Points(doubled as u32))
    }

    pub fn points(&self) -> Option<f64> {
        match self {
            Mark::Unmarked => None,
            Mark::Points(half) => Some(*half as f64 / 2.0),
        }
    }

    pub fn is_unmarked(&self) -> bool {
        matches!(self, Mark::Unmarked)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.points() {
            None => f.write_str(SENTINEL),
            Some(points) => write!(f, "{:.1}", points),
        }
    }
}

impl FromStr for Mark {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == SENTINEL {
            return Ok(Mark::Unmarked);
        }
        let points: f64 = trimmed
            .parse()
            .map_err(|_| format!("'{}' is neither '-' nor a number", trimmed))?;
        Mark::from_points(points).ok_or_else(|| format!("'{}' is not a non-negative multiple of 0.5", trimmed))
    }
}

/// Allowed marks for one question: `-` then 0 to the maximum in 0.5 steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkScale {
    max_half_steps: u32,
}

impl MarkScale {
    pub fn from_max_score(max_score: f64) -> Option<MarkScale> {
        match Mark::from_points(max_score)? {
            Mark::Points(half) => Some(MarkScale { max_half_steps: half }),
            Mark::Unmarked => None,
        }
    }

    pub fn max_score(&self) -> f64 {
        self.max_half_steps as f64 / 2.0
    }

    pub fn options(&self) -> Vec<Mark> {
        std::iter::once(Mark::Unmarked)
            .chain((0..=self.max_half_steps).map(Mark::Points))
            .collect()
    }

    pub fn allows(&self, mark: Mark) -> bool {
        match mark {
            Mark::Unmarked => true,
            Mark::Points(half) => half <= self.max_half_steps,
        }
    }

    /// Checks a mark against this scale, naming the question in the error.
    pub fn check(&self, question: &QuestionId, mark: Mark) -> Result<Mark> {
        if self.allows(mark) {
            Ok(mark)
        } else {
            Err(MarkingError::InvalidMark {
                question: question.to_string(),
                value: mark.to_string(),
                reason: format!("maximum score is {:.1}", self.max_score()),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: QuestionId,
    /// Roster key this question belongs to (`12` for `Q12.b`).
    pub number: u32,
    pub scale: MarkScale,
    pub prompt: String,
    pub model_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub grader: String,
    pub question_numbers: BTreeSet<u32>,
}

impl Assignment {
    pub fn covers(&self, number: u32) -> bool {
        self.question_numbers.contains(&number)
    }
}

/// Everything loaded once at startup. Immutable for the rest of the session.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub assignment: Assignment,
    pub questions: Vec<Question>,
    pub candidates: Vec<CandidateId>,
    pub responses: HashMap<(CandidateId, QuestionId), String>,
}

impl ReferenceData {
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    pub fn question_ids(&self) -> Vec<QuestionId> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }

    pub fn response(&self, candidate: &CandidateId, question: &QuestionId) -> &str {
        self.responses
            .get(&(candidate.clone(), question.clone()))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_header() {
        let (id, number, prompt) = QuestionId::parse_header("Q12 Explain osmosis").unwrap();
        assert_eq!(id.as_str(), "Q12");
        assert_eq!(number, 12);
        assert_eq!(prompt, "Explain osmosis");

        let (id, number, prompt) = QuestionId::parse_header("Q3.b").unwrap();
        assert_eq!(id.as_str(), "Q3.b");
        assert_eq!(number, 3);
        assert!(prompt.is_empty());

        assert!(QuestionId::parse_header("Notes").is_none());
        assert!("Q12 extra".parse::<QuestionId>().is_err());
    }

    #[test]
    fn test_candidate_id_normalization() {
        assert_eq!(CandidateId::parse(" 7 ").unwrap().as_str(), "7");
        assert_eq!(CandidateId::parse("7.0").unwrap().as_str(), "7");
        assert!(CandidateId::parse("7.5").is_none());
        assert!(CandidateId::parse("score").is_none());
    }

    #[test]
    fn test_mark_parse_and_display() {
        assert_eq!("-".parse::<Mark>().unwrap(), Mark::Unmarked);
        assert_eq!("".parse::<Mark>().unwrap(), Mark::Unmarked);
        assert_eq!("1.5".parse::<Mark>().unwrap(), Mark::Points(3));
        assert_eq!("2".parse::<Mark>().unwrap(), Mark::Points(4));
        assert!("0.3".parse::<Mark>().is_err());
        assert!("-1".parse::<Mark>().is_err());
        assert!("abc".parse::<Mark>().is_err());

        assert_eq!(Mark::Points(3).to_string(), "1.5");
        assert_eq!(Mark::Points(2).to_string(), "1.0");
        assert_eq!(Mark::Unmarked.to_string(), "-");
    }

    #[test]
    fn test_scale_options_are_sentinel_then_ascending() {
        let scale = MarkScale::from_max_score(2.0).unwrap();
        let rendered: Vec<String> = scale.options().iter().map(Mark::to_string).collect();
        assert_eq!(rendered, vec!["-", "0.0", "0.5", "1.0", "1.5", "2.0"]);

        let numeric: Vec<f64> = scale.options().iter().filter_map(Mark::points).collect();
        assert!(numeric.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_scale_for_zero_and_half_max() {
        let zero = MarkScale::from_max_score(0.0).unwrap();
        assert_eq!(zero.options(), vec![Mark::Unmarked, Mark::Points(0)]);

        let half = MarkScale::from_max_score(2.5).unwrap();
        assert_eq!(half.options().len(), 7);
        assert!(MarkScale::from_max_score(2.25).is_none());
        assert!(MarkScale::from_max_score(-1.0).is_none());
    }

    #[test]
    fn test_scale_check() {
        let q: QuestionId = "Q12".parse().unwrap();
        let scale = MarkScale::from_max_score(2.0).unwrap();
        assert!(scale.check(&q, Mark::Points(4)).is_ok());
        assert!(scale.check(&q, Mark::Unmarked).is_ok());
        assert!(matches!(
            scale.check(&q, Mark::Points(5)),
            Err(MarkingError::InvalidMark { .. })
        ));
    }
}
