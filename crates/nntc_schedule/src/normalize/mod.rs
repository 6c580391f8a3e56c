//! Turns the converted schedule sheet into [`ScheduleRecord`]s.
//!
//! The sheet is a flat list of rows where structure is implied by position:
//! a weekday row opens a day, a group-code row opens a group block, and the
//! lesson rows below it list teacher, subject, lesson number, classroom and
//! arrival time in fixed columns. Merged cells arrive as blanks, so subject
//! and classroom are carried over from the previous lesson of the same
//! teacher inside the same group block.
//!
//! Parsing is a left fold: [`step`] takes the current [`ParseContext`] and
//! one row and returns the next context plus at most one record.

mod cell;
mod markers;

pub use cell::{cell_at, Cell, Sheet};
pub use markers::{is_group_code, parse_day_marker};

use std::iter::FusedIterator;
use tracing::debug;

use crate::record::ScheduleRecord;
use markers::{is_header_row, looks_like_teacher, marker_cell, MARKER_COLUMN};

const SUBJECT_COLUMN: usize = 2;
const LESSON_NUMBER_COLUMN: usize = 3;
const CLASSROOM_COLUMN: usize = 4;
const ARRIVAL_TIME_COLUMN: usize = 5;

/// Everything the parser remembers between rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseContext {
    pub group: String,
    pub date: String,
    pub day: String,
    pub last_subject: String,
    pub last_teacher: String,
    pub last_classroom: String,
}

impl ParseContext {
    /// Opens a new group block, forgetting anything carried over from the
    /// previous one.
    fn enter_group(self, group: String) -> Self {
        Self {
            group,
            last_subject: String::new(),
            last_teacher: String::new(),
            last_classroom: String::new(),
            ..self
        }
    }
}

/// Advances the parse by one row.
pub fn step(ctx: ParseContext, row: &[Cell]) -> (ParseContext, Option<ScheduleRecord>) {
    if row.iter().all(|c| !c.is_present()) {
        return (ctx, None);
    }

    let marker = marker_cell(row);
    if let Some((day, date)) = marker.as_str().and_then(parse_day_marker) {
        debug!(%day, %date, "Day marker");
        return (ParseContext { day, date, ..ctx }, None);
    }

    if let Some(group) = marker.as_str().map(str::trim).filter(|s| is_group_code(s)) {
        debug!(%group, "Group marker");
        return (ctx.enter_group(group.to_string()), None);
    }

    if is_header_row(row) || !looks_like_teacher(cell_at(row, MARKER_COLUMN)) {
        return (ctx, None);
    }

    lesson_row(ctx, row)
}

fn lesson_row(ctx: ParseContext, row: &[Cell]) -> (ParseContext, Option<ScheduleRecord>) {
    let teacher = cell_at(row, MARKER_COLUMN).to_text();
    let mut subject = cell_at(row, SUBJECT_COLUMN).to_text();
    let mut lesson_number = cell_at(row, LESSON_NUMBER_COLUMN).to_text();
    let mut classroom = cell_at(row, CLASSROOM_COLUMN).to_text();
    let arrival_time = cell_at(row, ARRIVAL_TIME_COLUMN).to_text();

    let same_teacher = teacher == ctx.last_teacher;
    if subject.is_empty() && same_teacher && !ctx.last_subject.is_empty() {
        subject = ctx.last_subject.clone();
    }
    if classroom.is_empty() && same_teacher && subject == ctx.last_subject {
        classroom = ctx.last_classroom.clone();
    }

    // A parenthesised value in the lesson column is a room note for an
    // unnumbered slot, e.g. "(акт. зал)".
    if lesson_number.contains(['(', ')']) {
        classroom = std::mem::take(&mut lesson_number);
    }

    if teacher.is_empty() || ctx.group.is_empty() {
        return (ctx, None);
    }

    let record = ScheduleRecord {
        date: ctx.date.clone(),
        day: ctx.day.clone(),
        group: ctx.group.clone(),
        teacher,
        subject,
        lesson_number,
        classroom,
        arrival_time,
    };

    // Rows without a subject (announcements) keep the previous lesson as the
    // inheritance source.
    let ctx = if record.subject.is_empty() {
        ctx
    } else {
        ParseContext {
            last_subject: record.subject.clone(),
            last_teacher: record.teacher.clone(),
            last_classroom: record.classroom.clone(),
            ..ctx
        }
    };

    (ctx, Some(record))
}

/// Lazy record stream over a sheet. Cloning it, or calling [`records`]
/// again, restarts from the top.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    rows: std::slice::Iter<'a, Vec<Cell>>,
    ctx: ParseContext,
}

impl Iterator for Records<'_> {
    type Item = ScheduleRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for row in self.rows.by_ref() {
            let (ctx, record) = step(std::mem::take(&mut self.ctx), row);
            self.ctx = ctx;
            if record.is_some() {
                return record;
            }
        }
        None
    }
}

impl FusedIterator for Records<'_> {}

pub fn records(sheet: &Sheet) -> Records<'_> {
    Records {
        rows: sheet.rows.iter(),
        ctx: ParseContext::default(),
    }
}

/// Collects every record of the sheet.
pub fn normalize(sheet: &Sheet) -> Vec<ScheduleRecord> {
    let records: Vec<_> = records(sheet).collect();
    debug!(
        rows = sheet.rows.len(),
        records = records.len(),
        "Normalized schedule sheet"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells
            .iter()
            .map(|c| if c.is_empty() { Cell::Empty } else { Cell::from(*c) })
            .collect()
    }

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet::new(rows.iter().map(|r| row(r)).collect())
    }

    #[test]
    fn test_single_lesson() {
        let sheet = sheet(&[
            &["понедельник 2 июня"],
            &["1Б-24-1"],
            &["", "Иванов И.И.", "Математика", "1", "204"],
        ]);

        let records = normalize(&sheet);
        assert_eq!(
            records,
            vec![ScheduleRecord {
                date: "2 июня".to_string(),
                day: "понедельник".to_string(),
                group: "1Б-24-1".to_string(),
                teacher: "Иванов И.И.".to_string(),
                subject: "Математика".to_string(),
                lesson_number: "1".to_string(),
                classroom: "204".to_string(),
                arrival_time: String::new(),
            }]
        );
    }

    #[test]
    fn test_numeric_cells_and_shifted_markers() {
        let sheet = Sheet::new(vec![
            vec![Cell::Empty, Cell::from("вторник 3 июня")],
            vec![Cell::Empty, Cell::from("2ИСП-23-2к")],
            vec![
                Cell::Empty,
                Cell::from("Петров П.П."),
                Cell::from("Физика"),
                Cell::Number(2.0),
                Cell::Number(310.0),
            ],
        ]);

        let records = normalize(&sheet);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].day, "вторник");
        assert_eq!(records[0].group, "2ИСП-23-2к");
        assert_eq!(records[0].lesson_number, "2");
        assert_eq!(records[0].classroom, "310");
    }

    #[test]
    fn test_blank_cells_inherit_from_same_teacher() {
        let sheet = sheet(&[
            &["понедельник 2 июня"],
            &["1Б-24-1"],
            &["", "Иванов И.И.", "Математика", "1", "204"],
            &["", "Иванов И.И.", "", "2", ""],
        ]);

        let records = normalize(&sheet);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].subject, "Математика");
        assert_eq!(records[1].classroom, "204");
        assert_eq!(records[1].lesson_number, "2");
    }

    #[test]
    fn test_no_inheritance_across_teachers() {
        let sheet = sheet(&[
            &["понедельник 2 июня"],
            &["1Б-24-1"],
            &["", "Иванов И.И.", "Математика", "1", "204"],
            &["", "Петров П.П.", "", "2", ""],
        ]);

        let records = normalize(&sheet);
        assert_eq!(records[1].subject, "");
        assert_eq!(records[1].classroom, "");
    }

    #[test]
    fn test_group_marker_resets_inheritance() {
        let sheet = sheet(&[
            &["понедельник 2 июня"],
            &["1Б-24-1"],
            &["", "Иванов И.И.", "Математика", "1", "204"],
            &["1Б-24-2"],
            &["", "Иванов И.И.", "", "1", ""],
        ]);

        let records = normalize(&sheet);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].group, "1Б-24-2");
        assert_eq!(records[1].subject, "");
        assert_eq!(records[1].classroom, "");
    }

    #[test]
    fn test_parenthesised_lesson_number_becomes_classroom() {
        let sheet = sheet(&[
            &["пятница 6 июня"],
            &["1Б-24-1"],
            &["", "Иванов И.И.", "Разговоры о важном", "(акт. зал)", "", "8:20"],
        ]);

        let records = normalize(&sheet);
        assert_eq!(records[0].lesson_number, "");
        assert_eq!(records[0].classroom, "(акт. зал)");
        assert_eq!(records[0].arrival_time, "8:20");
        assert!(records[0].is_announcement());
    }

    #[test]
    fn test_rows_before_any_group_are_dropped() {
        let sheet = sheet(&[
            &["понедельник 2 июня"],
            &["", "Иванов И.И.", "Математика", "1", "204"],
        ]);

        assert!(normalize(&sheet).is_empty());
    }

    #[test]
    fn test_headers_and_noise_are_skipped() {
        let sheet = sheet(&[
            &["График прихода обучающихся"],
            &["", "Преподаватель", "Дисциплина", "Пара", "Ауд."],
            &[],
            &["", "", "", ""],
            &["среда 4 июня"],
            &["3ТО-22-1уп"],
            &["", "Математика", "1"],
            &["", "Сидоров С.С.", "Химия", "3", "101"],
        ]);

        let records = normalize(&sheet);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].teacher, "Сидоров С.С.");
        assert_eq!(records[0].group, "3ТО-22-1уп");
        assert_eq!(records[0].date, "4 июня");
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let sheet = sheet(&[
            &["понедельник 2 июня"],
            &["1Б-24-1"],
            &["", "Иванов И.И./Петров П.П.", "Информатика", "1", "204"],
            &["", "Иванов И.И./Петров П.П.", "", "2", ""],
            &["вторник 3 июня"],
            &["", "Сидоров С.С.", "Химия", "1", "101"],
        ]);

        let first = normalize(&sheet);
        let second = normalize(&sheet);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);

        let stream = records(&sheet);
        assert_eq!(stream.clone().collect::<Vec<_>>(), first);
        assert_eq!(stream.collect::<Vec<_>>(), first);
    }

    #[test]
    fn test_step_threads_context() {
        let (ctx, record) = step(ParseContext::default(), &row(&["четверг 5 июня"]));
        assert!(record.is_none());
        assert_eq!(ctx.day, "четверг");

        let (ctx, _) = step(ctx, &row(&["1Б-24-1"]));
        let (ctx, record) = step(ctx, &row(&["", "Иванов И.И.", "Математика", "1", "204"]));
        assert_eq!(record.unwrap().date, "5 июня");
        assert_eq!(ctx.last_teacher, "Иванов И.И.");
        assert_eq!(ctx.last_classroom, "204");
    }
}
