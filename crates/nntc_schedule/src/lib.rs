//! Schedule ingestion and query service for the NNTC schedule bot.
//!
//! The college publishes its timetable as a spreadsheet wrapped in a PDF
//! behind a fixed download link. [`ingest`] polls that link, converts and
//! [`normalize`]s the sheet, and swaps the result into the [`db`] store;
//! [`server`] exposes the store to the chat bot.

pub mod config;
pub mod db;
pub mod ingest;
pub mod normalize;
pub mod record;
pub mod server;
pub mod types;

pub use record::ScheduleRecord;
