//! Schedule record type and teacher-name matching helpers.

use serde::{Deserialize, Serialize};

/// One scheduled occurrence as published in the college spreadsheet.
///
/// All fields are kept as free text, exactly as the source document spells
/// them. An empty `lesson_number` marks a whole-day announcement slot rather
/// than a numbered lesson; `arrival_time` is only meaningful for those.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub date: String,
    pub day: String,
    pub group: String,
    /// One or more instructor names joined by `/`.
    pub teacher: String,
    pub subject: String,
    pub lesson_number: String,
    pub classroom: String,
    pub arrival_time: String,
}

impl ScheduleRecord {
    /// True for announcement slots that carry no lesson number.
    pub fn is_announcement(&self) -> bool {
        self.lesson_number.trim().is_empty()
    }

    /// True if `name` is the whole teacher field or one of its `/` components,
    /// ignoring whitespace.
    pub fn taught_by(&self, name: &str) -> bool {
        teacher_field_matches(&self.teacher, name)
    }
}

/// Splits a teacher field on `/`, trimming each part and dropping empty ones.
pub fn split_teachers(field: &str) -> impl Iterator<Item = &str> {
    field.split('/').map(str::trim).filter(|t| !t.is_empty())
}

/// Strips all whitespace, so `"Иванов И. И."` and `"Иванов И.И."` compare equal.
pub fn compact_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Matches a stored teacher field against a single teacher name.
///
/// Either the whole field equals the name, or one of its `/`-separated
/// components does, in any position. Bare substrings do not match, so
/// `"Иванов И.И."` never matches a field naming `"Иванова И.И."`.
pub fn teacher_field_matches(field: &str, name: &str) -> bool {
    let wanted = compact_name(name);
    if wanted.is_empty() {
        return false;
    }

    compact_name(field) == wanted || split_teachers(field).any(|t| compact_name(t) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lesson_number_is_announcement() {
        let mut record = ScheduleRecord {
            lesson_number: "  ".to_string(),
            ..Default::default()
        };
        assert!(record.is_announcement());

        record.lesson_number = "1".to_string();
        assert!(!record.is_announcement());
    }

    #[test]
    fn test_split_teachers_trims_components() {
        let names: Vec<_> = split_teachers(" Иванов И.И. / Петров П.П./").collect();
        assert_eq!(names, vec!["Иванов И.И.", "Петров П.П."]);
    }

    #[test]
    fn test_teacher_matching_ignores_whitespace() {
        assert!(teacher_field_matches("Иванов И.И.", "Иванов  И. И."));
        assert!(teacher_field_matches("Иванов И.И./Петров П.П.", "Петров П.П."));
        assert!(teacher_field_matches("Иванов И.И./Петров П.П.", "Иванов И.И."));
        assert!(teacher_field_matches(
            "Сидоров С.С./Иванов И.И./Петров П.П.",
            "ИвановИ.И."
        ));
    }

    #[test]
    fn test_teacher_matching_rejects_substrings() {
        assert!(!teacher_field_matches("Иванова И.И.", "Иванов И.И."));
        assert!(!teacher_field_matches("Иванов И.И./Петров П.П.", "Петров"));
        assert!(!teacher_field_matches("Иванов И.И.", "   "));
    }
}
