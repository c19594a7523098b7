use crate::domain::model::{CandidateId, Mark, QuestionId};
use crate::domain::table::MarkTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionProgress {
    pub question: QuestionId,
    pub unmarked: usize,
    pub total: usize,
}

impl QuestionProgress {
    pub fn is_remaining(&self) -> bool {
        self.unmarked > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressReport {
    pub questions: Vec<QuestionProgress>,
}

impl ProgressReport {
    pub fn remaining_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_remaining()).count()
    }

    pub fn total_count(&self) -> usize {
        self.questions.len()
    }

    pub fn remaining_questions(&self) -> Vec<&QuestionId> {
        self.questions
            .iter()
            .filter(|q| q.is_remaining())
            .map(|q| &q.question)
            .collect()
    }

    pub fn unmarked_for(&self, question: &QuestionId) -> Option<usize> {
        self.questions
            .iter()
            .find(|q| &q.question == question)
            .map(|q| q.unmarked)
    }
}

/// Counts `-` cells per in-scope question over the given candidates. A cell
/// missing from the table counts as unmarked.
pub fn report(table: &MarkTable, questions: &[QuestionId], candidates: &[CandidateId]) -> ProgressReport {
    ProgressReport {
        questions: questions
            .iter()
            .map(|question| QuestionProgress {
                question: question.clone(),
                unmarked: candidates
                    .iter()
                    .filter(|c| !matches!(table.get(c, question), Some(Mark::Points(_))))
                    .count(),
                total: candidates.len(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_unmarked_cell_keeps_question_remaining() {
        let table = MarkTable::from_csv("ID,Q12,Q13\n1,1.0,1\n2,-,2\n3,0.5,0\n").unwrap();
        let candidates: Vec<CandidateId> = table.candidates().to_vec();
        let questions: Vec<QuestionId> = table.questions();

        let progress = report(&table, &questions, &candidates);
        assert_eq!(progress.unmarked_for(&questions[0]), Some(1));
        assert_eq!(progress.unmarked_for(&questions[1]), Some(0));
        assert_eq!(progress.remaining_count(), 1);
        assert_eq!(progress.total_count(), 2);
        assert_eq!(progress.remaining_questions(), vec![&questions[0]]);
    }

    #[test]
    fn test_missing_cells_count_as_unmarked() {
        let mut table = MarkTable::default();
        let one = CandidateId::parse("1").unwrap();
        let two = CandidateId::parse("2").unwrap();
        let q12: QuestionId = "Q12".parse().unwrap();
        let q14: QuestionId = "Q14".parse().unwrap();
        table.set(&one, &q12, Mark::Points(1));

        let progress = report(&table, &[q12.clone(), q14.clone()], &[one, two]);
        assert_eq!(progress.unmarked_for(&q12), Some(1));
        assert_eq!(progress.unmarked_for(&q14), Some(2));
        assert_eq!(progress.remaining_count(), 2);
    }
}
