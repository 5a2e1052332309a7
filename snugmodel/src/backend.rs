//! Backend cell contract.
//!
//! Fields serialize base values into named scalar cells and read them back. The storage
//! engine behind the contract is out of scope; [`Record`] is an ordered in-memory
//! realisation used by tests and the CLI.

use serde::{Deserialize, Serialize};

use crate::errors::ModelResult;

/// Scalar value of one backend cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// Semantic tag attached to a written cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Meaning {
    /// Integer microseconds since the epoch.
    Timestamp,
    /// Placeholder written for an empty repeated field.
    EmptyList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<Meaning>,
}

pub trait CellSink {
    fn write(&mut self, name: &str, value: CellValue, meaning: Option<Meaning>) -> ModelResult<()>;
}

pub trait CellSource {
    /// Cells in write order. A name may occur once per element of a repeated field.
    fn cells(&self) -> &[Cell];
}

/// Ordered list of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    cells: Vec<Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// First cell stored under `name`.
    pub fn read(&self, name: &str) -> Option<&CellValue> {
        self.cells.iter().find(|cell| cell.name == name).map(|cell| &cell.value)
    }

    /// Every cell stored under `name`, in order.
    pub fn read_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells.iter().filter(move |cell| cell.name == name)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CellSink for Record {
    fn write(&mut self, name: &str, value: CellValue, meaning: Option<Meaning>) -> ModelResult<()> {
        self.cells.push(Cell {
            name: name.to_string(),
            value,
            meaning,
        });
        Ok(())
    }
}

impl CellSource for Record {
    fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_write_order() {
        let mut record = Record::new();
        record.write("tags", CellValue::Text("a".into()), None).unwrap();
        record.write("born", CellValue::Int(0), Some(Meaning::Timestamp)).unwrap();
        record.write("tags", CellValue::Text("b".into()), None).unwrap();

        assert_eq!(record.len(), 3);
        assert_eq!(record.read("tags"), Some(&CellValue::Text("a".into())));
        assert_eq!(record.read_all("tags").count(), 2);
        assert_eq!(record.cells()[1].meaning, Some(Meaning::Timestamp));
        assert_eq!(record.read("missing"), None);
    }
}
