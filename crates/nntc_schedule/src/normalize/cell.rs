//! Cell grid produced by the document conversion step.

use serde::{Deserialize, Serialize};

static EMPTY_CELL: Cell = Cell::Empty;

/// 2^63. Integral values at or beyond this do not fit in an `i64`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// A single spreadsheet cell. Conversion output mixes text, numbers and
/// holes (merged or blank cells), so every variant can show up anywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    /// The raw string, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True if the cell carries a value. Whitespace-only text counts as blank.
    pub fn is_present(&self) -> bool {
        match self {
            Cell::Empty => false,
            Cell::Text(s) => !s.trim().is_empty(),
            Cell::Bool(_) | Cell::Number(_) => true,
        }
    }

    /// Renders the cell as trimmed text; blank cells become `""`.
    ///
    /// Integral numbers are printed without a fractional part, so a lesson
    /// number stored as `1.0` comes out as `"1"`.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < I64_LIMIT => {
                format!("{}", *n as i64)
            }
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// The full converted document: every table row of every page, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sheet {
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Parses the JSON grid written by the conversion collaborator.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

}

/// Cell at `index`, or an empty cell when the row is too short.
pub fn cell_at(row: &[Cell], index: usize) -> &Cell {
    row.get(index).unwrap_or(&EMPTY_CELL)
}
