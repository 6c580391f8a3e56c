pub mod contacts;
pub mod schedule;
pub mod status;
