use crate::domain::model::{CandidateId, Mark, QuestionId};
use std::collections::HashSet;
use std::fmt;

pub const ID_COLUMN: &str = "ID";

/// Why a row/column grid could not be read as a mark table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormatError(pub String);

impl fmt::Display for TableFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full contents of a mark store: one row per candidate, one column per header.
///
/// Cells are kept as the store holds them. Only the `ID` column is interpreted
/// on read; a cell becomes a [`Mark`] when a caller asks for it, so columns that
/// belong to other graders (or are not questions at all) are written back
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkTable {
    columns: Vec<String>,
    candidates: Vec<CandidateId>,
    /// `rows[i]` belongs to `candidates[i]` and has one cell per column.
    rows: Vec<Vec<String>>,
}

impl MarkTable {
    /// All cells unmarked.
    pub fn blank(candidates: &[CandidateId], questions: &[QuestionId]) -> Self {
        let mut table = MarkTable::default();
        for question in questions {
            table.ensure_question(question);
        }
        for candidate in candidates {
            table.ensure_candidate(candidate);
        }
        table
    }

    /// Header names after `ID`, verbatim.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Columns whose header is a question identifier, in store order.
    pub fn questions(&self) -> Vec<QuestionId> {
        self.columns
            .iter()
            .filter_map(|name| name.trim().parse().ok())
            .collect()
    }

    pub fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    pub fn has_question(&self, question: &QuestionId) -> bool {
        self.column_index(question).is_some()
    }

    fn column_index(&self, question: &QuestionId) -> Option<usize> {
        self.columns
            .iter()
            .position(|name| name.trim() == question.as_str())
    }

    fn row_index(&self, candidate: &CandidateId) -> Option<usize> {
        self.candidates.iter().position(|c| c == candidate)
    }

    /// Raw cell text. `None` when the row or the column does not exist.
    pub fn cell(&self, candidate: &CandidateId, question: &QuestionId) -> Option<&str> {
        let column = self.column_index(question)?;
        let row = self.row_index(candidate)?;
        self.rows[row].get(column).map(String::as_str)
    }

    /// Parses one cell. `Ok(None)` when the row or the column does not exist.
    pub fn mark(
        &self,
        candidate: &CandidateId,
        question: &QuestionId,
    ) -> Result<Option<Mark>, TableFormatError> {
        match self.cell(candidate, question) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e| {
                TableFormatError(format!("candidate {}, column {}: {}", candidate, question, e))
            }),
        }
    }

    /// `None` when the cell is missing or does not hold a mark.
    pub fn get(&self, candidate: &CandidateId, question: &QuestionId) -> Option<Mark> {
        self.mark(candidate, question).ok().flatten()
    }

    /// Sets a cell, adding the row or column (filled with `-`) if missing.
    pub fn set(&mut self, candidate: &CandidateId, question: &QuestionId, mark: Mark) {
        let column = self.ensure_question(question);
        let row = self.ensure_candidate(candidate);
        self.rows[row][column] = mark.to_string();
    }

    fn ensure_question(&mut self, question: &QuestionId) -> usize {
        if let Some(index) = self.column_index(question) {
            return index;
        }
        self.columns.push(question.to_string());
        for row in &mut self.rows {
            row.push(Mark::Unmarked.to_string());
        }
        self.columns.len() - 1
    }

    fn ensure_candidate(&mut self, candidate: &CandidateId) -> usize {
        if let Some(index) = self.row_index(candidate) {
            return index;
        }
        // Question columns start unmarked; anything else starts empty.
        let row = self
            .columns
            .iter()
            .map(|name| match name.trim().parse::<QuestionId>() {
                Ok(_) => Mark::Unmarked.to_string(),
                Err(_) => String::new(),
            })
            .collect();
        self.candidates.push(candidate.clone());
        self.rows.push(row);
        self.candidates.len() - 1
    }

    /// Header row first, `ID` leading, cells as the store keeps them.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.candidates.len() + 1);
        rows.push(
            std::iter::once(ID_COLUMN.to_string())
                .chain(self.columns.iter().cloned())
                .collect(),
        );
        for (candidate, cells) in self.candidates.iter().zip(&self.rows) {
            rows.push(
                std::iter::once(candidate.to_string())
                    .chain(cells.iter().cloned())
                    .collect(),
            );
        }
        rows
    }

    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self, TableFormatError> {
        let (header, body) = rows
            .split_first()
            .ok_or_else(|| TableFormatError("table has no header row".to_string()))?;

        match header.first() {
            Some(first) if first.trim() == ID_COLUMN => {}
            _ => {
                return Err(TableFormatError(format!(
                    "first column must be '{}'",
                    ID_COLUMN
                )))
            }
        }

        let columns = header[1..].to_vec();
        let mut seen = HashSet::new();
        for name in &columns {
            if let Ok(question) = name.trim().parse::<QuestionId>() {
                if !seen.insert(question) {
                    return Err(TableFormatError(format!(
                        "duplicate question column '{}'",
                        name
                    )));
                }
            }
        }

        let mut table = MarkTable {
            columns,
            ..MarkTable::default()
        };
        for (line, row) in body.iter().enumerate() {
            // Remote sheets drop trailing empty rows inconsistently.
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let raw_id = row.first().map(String::as_str).unwrap_or_default();
            let candidate = CandidateId::parse(raw_id).ok_or_else(|| {
                TableFormatError(format!("row {}: invalid candidate id '{}'", line + 2, raw_id))
            })?;
            if table.row_index(&candidate).is_some() {
                return Err(TableFormatError(format!(
                    "row {}: duplicate candidate {}",
                    line + 2,
                    candidate
                )));
            }
            if row.len() > table.columns.len() + 1 {
                return Err(TableFormatError(format!(
                    "row {}: {} cells but the header has {}",
                    line + 2,
                    row.len(),
                    table.columns.len() + 1
                )));
            }

            let mut cells: Vec<String> = row[1..].to_vec();
            cells.resize(table.columns.len(), String::new());
            table.candidates.push(candidate);
            table.rows.push(cells);
        }

        Ok(table)
    }

    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in self.to_rows() {
            writer.write_record(&row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn from_csv(content: &str) -> Result<Self, TableFormatError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TableFormatError(format!("CSV parse error: {}", e)))?;

        MarkTable::from_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<CandidateId> {
        raw.iter().map(|r| CandidateId::parse(r).unwrap()).collect()
    }

    fn qs(raw: &[&str]) -> Vec<QuestionId> {
        raw.iter().map(|r| r.parse().unwrap()).collect()
    }

    #[test]
    fn test_blank_table_is_all_sentinel() {
        let table = MarkTable::blank(&ids(&["1", "2", "3"]), &qs(&["Q12", "Q13"]));
        let rows = table.to_rows();
        assert_eq!(rows[0], vec!["ID", "Q12", "Q13"]);
        assert_eq!(rows.len(), 4);
        assert!(rows[1..].iter().all(|r| r[1] == "-" && r[2] == "-"));
    }

    #[test]
    fn test_csv_layout() {
        let mut table = MarkTable::blank(&ids(&["1", "2"]), &qs(&["Q12"]));
        table.set(&ids(&["1"])[0], &qs(&["Q12"])[0], Mark::Points(3));
        assert_eq!(table.to_csv().unwrap(), "ID,Q12\n1,1.5\n2,-\n");

        let parsed = MarkTable::from_csv("ID,Q12\n1,1.5\n2,-\n").unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_set_adds_missing_row_and_column() {
        let mut table = MarkTable::blank(&ids(&["1"]), &qs(&["Q12"]));
        table.set(&ids(&["2"])[0], &qs(&["Q13"])[0], Mark::Points(2));

        assert_eq!(table.questions(), qs(&["Q12", "Q13"]));
        assert_eq!(table.get(&ids(&["1"])[0], &qs(&["Q13"])[0]), Some(Mark::Unmarked));
        assert_eq!(table.get(&ids(&["2"])[0], &qs(&["Q12"])[0]), Some(Mark::Unmarked));
        assert_eq!(table.get(&ids(&["2"])[0], &qs(&["Q13"])[0]), Some(Mark::Points(2)));
    }

    #[test]
    fn test_short_rows_read_as_unmarked() {
        let table = MarkTable::from_csv("ID,Q12,Q13\n1,2.0\n").unwrap();
        let candidate = &ids(&["1"])[0];
        assert_eq!(table.get(candidate, &qs(&["Q12"])[0]), Some(Mark::Points(4)));
        assert_eq!(table.get(candidate, &qs(&["Q13"])[0]), Some(Mark::Unmarked));
    }

    #[test]
    fn test_integer_ids_written_as_floats_are_accepted() {
        let table = MarkTable::from_csv("ID,Q1\n4.0,1\n").unwrap();
        assert_eq!(table.candidates(), ids(&["4"]).as_slice());
        assert_eq!(table.get(&ids(&["4"])[0], &qs(&["Q1"])[0]), Some(Mark::Points(2)));
    }

    #[test]
    fn test_unrelated_columns_are_kept_verbatim() {
        let content = "ID,Q12,Q14,Notes\n1,-,absent,late\n2,1,2,\n";
        let mut table = MarkTable::from_csv(content).unwrap();
        assert_eq!(table.questions(), qs(&["Q12", "Q14"]));
        assert_eq!(table.columns(), ["Q12", "Q14", "Notes"]);

        table.set(&ids(&["1"])[0], &qs(&["Q12"])[0], Mark::Points(1));
        assert_eq!(
            table.to_csv().unwrap(),
            "ID,Q12,Q14,Notes\n1,0.5,absent,late\n2,1,2,\n"
        );

        table.set(&ids(&["3"])[0], &qs(&["Q12"])[0], Mark::Points(2));
        assert_eq!(table.to_rows()[3], vec!["3", "1.0", "-", ""]);
    }

    #[test]
    fn test_cells_are_parsed_on_demand() {
        let table = MarkTable::from_csv("ID,Q12,Q14\n1,0.3,absent\n").unwrap();
        let candidate = &ids(&["1"])[0];

        assert_eq!(table.cell(candidate, &qs(&["Q14"])[0]), Some("absent"));
        assert!(table.mark(candidate, &qs(&["Q12"])[0]).is_err());
        assert_eq!(table.get(candidate, &qs(&["Q14"])[0]), None);
        assert_eq!(table.mark(candidate, &qs(&["Q99"])[0]), Ok(None));
    }

    #[test]
    fn test_malformed_tables_are_rejected() {
        assert!(MarkTable::from_csv("").is_err());
        assert!(MarkTable::from_csv("Name,Q12\n1,-\n").is_err());
        assert!(MarkTable::from_csv("ID,Q12,Q12\n").is_err());
        assert!(MarkTable::from_csv("ID,Q12\nabc,-\n").is_err());
        assert!(MarkTable::from_csv("ID,Q12\n1,-\n1,-\n").is_err());
        assert!(MarkTable::from_csv("ID,Q12\n1,-,-\n").is_err());
    }
}
