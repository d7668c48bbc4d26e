// src/patterns/mod.rs — Recurring device behaviour detection

pub mod co_occurrence;
pub mod event_log;
pub mod miner;
pub mod time_of_day;

pub use co_occurrence::CoOccurrenceDetector;
pub use event_log::{EventLog, StateChange};
pub use miner::PatternMiner;
pub use time_of_day::TimeOfDayDetector;
