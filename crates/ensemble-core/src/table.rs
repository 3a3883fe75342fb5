//! Materialized ensemble: one row per member, one column per parameter.
//!
//! On disk the table is plain text: a header line of space-separated names
//! (an optional leading `#` is accepted when reading), then one line per member
//! with space-separated values. Values are written in shortest round-trip form
//! so that `write` followed by `read` reproduces them exactly.

use crate::errors::{EnsembleError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Ordered `(name, value)` pairs for one member.
pub type Assignment = Vec<(String, f64)>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnsembleTable {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl EnsembleTable {
    pub fn new(names: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &names {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(EnsembleError::Parse(format!(
                    "invalid column name: {name:?}"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(EnsembleError::DuplicateParameter(name.clone()));
            }
        }
        // rows without columns have no text form
        if names.is_empty() && !values.is_empty() {
            return Err(EnsembleError::Parse(format!(
                "{} rows but no columns",
                values.len()
            )));
        }
        if let Some((i, row)) = values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != names.len())
        {
            return Err(EnsembleError::Parse(format!(
                "row {i} has {} values, expected {}",
                row.len(),
                names.len()
            )));
        }
        Ok(Self { names, values })
    }

    /// Table with no sampled parameters: only the default run makes sense.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Number of members.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.values.get(index).map(Vec::as_slice)
    }

    pub fn assignment(&self, index: usize) -> Option<Assignment> {
        self.row(index)
            .map(|row| self.names.iter().cloned().zip(row.iter().copied()).collect())
    }

    pub fn to_text(&self) -> String {
        let mut out = self.names.join(" ");
        out.push('\n');
        for row in &self.values {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text()).map_err(|e| EnsembleError::io(path, e))?;
        tracing::debug!(path = %path.display(), members = self.size(), "wrote ensemble table");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EnsembleError::io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parse table text; `origin` only labels error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let table_error = |line: usize, reason: String| EnsembleError::Table {
            path: origin.to_path_buf(),
            line,
            reason,
        };

        let mut lines = text.lines().enumerate();
        let names: Vec<String> = match lines.next() {
            Some((_, header)) => header
                .trim_start()
                .trim_start_matches('#')
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            None => return Ok(Self::empty()),
        };

        let mut values = Vec::new();
        for (i, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>()
                        .map_err(|_| table_error(i + 1, format!("not a number: {tok:?}")))
                })
                .collect::<Result<Vec<f64>>>()?;
            if row.len() != names.len() {
                return Err(table_error(
                    i + 1,
                    format!("expected {} values, got {}", names.len(), row.len()),
                ));
            }
            values.push(row);
        }

        Self::new(names, values).map_err(|e| table_error(1, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table() -> EnsembleTable {
        EnsembleTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![2.0, 0.1], vec![3.0, -1e-7], vec![4.0, 1.0 / 3.0]],
        )
        .unwrap()
    }

    #[test]
    fn write_read_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.txt");
        let t = table();
        t.write(&path).unwrap();
        assert_eq!(EnsembleTable::read(&path).unwrap(), t);
    }

    #[test]
    fn header_may_be_commented() {
        let t = EnsembleTable::parse("# a b\n1 2\n\n3 4\n", Path::new("x")).unwrap();
        assert_eq!(t.names(), ["a", "b"]);
        assert_eq!(t.size(), 2);
        assert_eq!(t.assignment(1).unwrap(), vec![("a".to_string(), 3.0), ("b".to_string(), 4.0)]);
    }

    #[test]
    fn zero_column_table_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.txt");
        EnsembleTable::empty().write(&path).unwrap();
        let t = EnsembleTable::read(&path).unwrap();
        assert_eq!(t.size(), 0);
        assert_eq!(t.width(), 0);
        assert_eq!(EnsembleTable::parse("", Path::new("x")).unwrap(), t);
    }

    #[test]
    fn bad_rows_report_line_numbers() {
        let err = EnsembleTable::parse("a b\n1 2\n3\n", Path::new("p.txt")).unwrap_err();
        match err {
            EnsembleError::Table { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
        let err = EnsembleTable::parse("a\nx\n", Path::new("p.txt")).unwrap_err();
        assert!(err.to_string().contains("p.txt:2"));
    }

    #[test]
    fn ragged_rows_rejected_at_construction() {
        assert!(EnsembleTable::new(vec!["a".into()], vec![vec![1.0, 2.0]]).is_err());
        assert!(EnsembleTable::new(vec!["a".into(), "a".into()], vec![]).is_err());
    }

    #[test]
    fn rows_need_columns() {
        let err = EnsembleTable::new(vec![], vec![vec![], vec![]]).unwrap_err();
        assert!(matches!(err, EnsembleError::Parse(_)));
    }
}
