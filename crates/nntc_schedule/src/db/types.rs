/// Database and query types for schedule data
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whose schedule a query is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Group(String),
    /// Matched against every `/` component of the stored teacher field.
    Teacher(String),
}

/// A calendar day present in the current schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleDate {
    pub date: String,
    pub day: String,
}

/// A chat that has talked to the bot at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub chat_id: i64,
    pub last_interaction: DateTime<Utc>,
}
