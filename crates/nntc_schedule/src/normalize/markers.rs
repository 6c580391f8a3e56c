//! Recognisers for the structural rows of the schedule sheet.

use regex::Regex;
use std::sync::LazyLock;

use super::cell::{cell_at, Cell};

/// Column holding date markers, group codes and teacher names.
pub const MARKER_COLUMN: usize = 1;
/// Conversion sometimes leaves the marker column empty and puts the value
/// one column to the left.
pub const FALLBACK_MARKER_COLUMN: usize = 0;

/// Column header above the teacher column.
pub const TEACHER_HEADER: &str = "Преподаватель";
/// Title row of the student arrival timetable.
pub const ARRIVAL_HEADER: &str = "График прихода обучающихся";

const WEEKDAYS: [&str; 7] = [
    "понедельник",
    "вторник",
    "среда",
    "четверг",
    "пятница",
    "суббота",
    "воскресенье",
];

// e.g. "1Б-24-1", "2ИСП-23-2к", "3ТО-22-1уп"
static GROUP_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d[А-Яа-яЁё]+-\d{2}-\d{1,2}(?:[кс]|уп)?").unwrap());

/// Picks the marker cell, falling back to the leading column when the
/// marker column is blank.
pub fn marker_cell(row: &[Cell]) -> &Cell {
    let primary = cell_at(row, MARKER_COLUMN);
    if primary.is_present() {
        primary
    } else {
        cell_at(row, FALLBACK_MARKER_COLUMN)
    }
}

/// Splits `"понедельник 2 июня"` into `("понедельник", "2 июня")`.
///
/// The first whitespace token must be a weekday name (any case, trailing
/// punctuation ignored); the rest of the text is the date as published.
pub fn parse_day_marker(text: &str) -> Option<(String, String)> {
    let mut tokens = text.split_whitespace();
    let day = tokens.next()?.trim_end_matches([',', '.']);
    let lowered = day.to_lowercase();

    if !WEEKDAYS.contains(&lowered.as_str()) {
        return None;
    }

    let date = tokens.collect::<Vec<_>>().join(" ");
    Some((day.to_string(), date))
}

pub fn is_group_code(text: &str) -> bool {
    GROUP_CODE_REGEX.is_match(text.trim())
}

/// Column headers and the arrival timetable title carry no schedule data.
pub fn is_header_row(row: &[Cell]) -> bool {
    [FALLBACK_MARKER_COLUMN, MARKER_COLUMN].iter().any(|&i| {
        cell_at(row, i)
            .as_str()
            .map(str::trim)
            .is_some_and(|s| s == TEACHER_HEADER || s == ARRIVAL_HEADER)
    })
}

/// Teacher cells are written as surname plus initials, so they contain a
/// period. Group codes and the column header are excluded explicitly.
pub fn looks_like_teacher(cell: &Cell) -> bool {
    match cell.as_str().map(str::trim) {
        Some(text) => text.contains('.') && !is_group_code(text) && text != TEACHER_HEADER,
        None => false,
    }
}
