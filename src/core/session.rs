use crate::core::progress::{self, ProgressReport};
use crate::domain::model::{CandidateId, Mark, Question, QuestionId, ReferenceData};
use crate::domain::ports::MarkStore;
use crate::domain::table::MarkTable;
use crate::utils::error::{MarkingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    QuestionSelected,
    Editing,
    Saved,
}

/// One grader's marking session. Identity and in-scope questions are fixed at
/// construction; only the displayed marks of the selected question change.
pub struct GradingSession<S: MarkStore> {
    reference: ReferenceData,
    store: S,
    phase: SessionPhase,
    selected: Option<QuestionId>,
    /// Aligned with `reference.candidates`.
    marks: Vec<Mark>,
}

impl<S: MarkStore> GradingSession<S> {
    pub fn new(reference: ReferenceData, store: S) -> Self {
        let marks = vec![Mark::Unmarked; reference.candidates.len()];
        Self {
            reference,
            store,
            phase: SessionPhase::Uninitialized,
            selected: None,
            marks,
        }
    }

    pub fn grader(&self) -> &str {
        &self.reference.assignment.grader
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.phase == SessionPhase::Editing
    }

    pub fn selected_question(&self) -> Option<&Question> {
        self.selected
            .as_ref()
            .and_then(|id| self.reference.question(id))
    }

    pub fn displayed_marks(&self) -> impl Iterator<Item = (&CandidateId, Mark)> + '_ {
        self.reference
            .candidates
            .iter()
            .zip(self.marks.iter().copied())
    }

    pub fn displayed_mark(&self, candidate: &CandidateId) -> Option<Mark> {
        self.candidate_index(candidate).map(|i| self.marks[i])
    }

    fn candidate_index(&self, candidate: &CandidateId) -> Option<usize> {
        self.reference.candidates.iter().position(|c| c == candidate)
    }

    fn in_scope(&self, question: &QuestionId) -> Result<&Question> {
        self.reference
            .question(question)
            .ok_or_else(|| MarkingError::QuestionNotInScope {
                question: question.to_string(),
                grader: self.grader().to_string(),
            })
    }

    /// Creates the store if it is missing, then selects the first in-scope question.
    pub async fn start(&mut self) -> Result<()> {
        let questions = self.reference.question_ids();
        let first = questions.first().cloned().ok_or_else(|| {
            MarkingError::data_integrity("reference data", "no in-scope questions")
        })?;

        if self
            .store
            .initialize_if_absent(&self.reference.candidates, &questions)
            .await?
        {
            tracing::info!("Initialized empty mark store at {}", self.store.location());
        }

        self.select_question(&first).await
    }

    /// Re-reads the store and shows its marks for `question`.
    ///
    /// Always reads fresh: another grader may have saved since the last read.
    /// Unsaved edits to the previously selected question are discarded. On
    /// failure the current selection and marks are left as they were.
    pub async fn select_question(&mut self, question: &QuestionId) -> Result<()> {
        let scale = self.in_scope(question)?.scale;
        let table = self.store.read_all().await?;

        let mut marks = Vec::with_capacity(self.reference.candidates.len());
        for candidate in &self.reference.candidates {
            let mark = match table.cell(candidate, question) {
                None => Mark::Unmarked,
                Some(raw) => raw.parse().map_err(|reason| MarkingError::InvalidMark {
                    question: question.to_string(),
                    value: raw.to_string(),
                    reason,
                })?,
            };
            marks.push(scale.check(question, mark)?);
        }

        if self.has_unsaved_changes() {
            if let Some(previous) = &self.selected {
                tracing::warn!("Discarding unsaved marks for {}", previous);
            }
        }

        tracing::debug!("Selected {} for grader {}", question, self.grader());
        self.selected = Some(question.clone());
        self.marks = marks;
        self.phase = SessionPhase::QuestionSelected;
        Ok(())
    }

    /// Changes one displayed mark. No store I/O.
    pub fn edit_mark(&mut self, candidate: &CandidateId, mark: Mark) -> Result<()> {
        let question = self.selected.clone().ok_or(MarkingError::NoQuestionSelected)?;
        let scale = self.in_scope(&question)?.scale;
        scale.check(&question, mark)?;

        let index = self
            .candidate_index(candidate)
            .ok_or_else(|| MarkingError::UnknownCandidate {
                candidate: candidate.to_string(),
            })?;

        self.marks[index] = mark;
        self.phase = SessionPhase::Editing;
        Ok(())
    }

    /// Overlays the selected question's marks onto a fresh read of the store
    /// and writes the whole table back. Every other cell is written back as the
    /// fresh read returned it; the selected column is last-writer-wins.
    pub async fn save(&mut self) -> Result<MarkTable> {
        let question = self.selected.clone().ok_or(MarkingError::NoQuestionSelected)?;
        let mut table = self.store.read_all().await?;

        for (candidate, mark) in self.reference.candidates.iter().zip(&self.marks) {
            table.set(candidate, &question, *mark);
        }
        for other in &self.reference.questions {
            for candidate in &self.reference.candidates {
                if table.cell(candidate, &other.id).is_none() {
                    table.set(candidate, &other.id, Mark::Unmarked);
                }
            }
        }

        self.store.write_all(&table).await?;
        self.phase = SessionPhase::Saved;
        tracing::info!(
            "💾 Saved marks for {} ({} candidates) to {}",
            question,
            self.marks.len(),
            self.store.location()
        );
        Ok(table)
    }

    /// Fresh snapshot of the whole store.
    pub async fn snapshot(&self) -> Result<MarkTable> {
        self.store.read_all().await
    }

    pub async fn progress(&self) -> Result<ProgressReport> {
        let table = self.store.read_all().await?;
        Ok(progress::report(
            &table,
            &self.reference.question_ids(),
            &self.reference.candidates,
        ))
    }
}
