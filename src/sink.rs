pub mod csv_sink;
pub mod sqlite;

use chrono::{DateTime, Local};

use crate::analytics::SinkRecord;
use crate::difficulty::TraversalMode;
use crate::error::SinkError;

pub use csv_sink::CsvSink;
pub use sqlite::SqliteSink;

/// Append-only persistence boundary. Implementations must not reorder or
/// drop records they accept.
pub trait EventSink {
    fn append(&mut self, record: &SinkRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn append(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Identifies whose session a sink is recording.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTag {
    pub player: String,
    pub mode: TraversalMode,
    pub started: DateTime<Local>,
}

impl SessionTag {
    pub fn new(player: impl Into<String>, mode: TraversalMode) -> Self {
        Self {
            player: player.into(),
            mode,
            started: Local::now(),
        }
    }

    pub fn stamp(&self) -> String {
        self.started.format("%Y%m%d_%H%M%S").to_string()
    }

    /// Player name reduced to characters safe in a file name.
    pub fn file_safe_player(&self) -> String {
        let cleaned: String = self
            .player
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        if cleaned.is_empty() {
            "Player".to_string()
        } else {
            cleaned
        }
    }
}

/// Keeps records in memory. Used by headless runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<SinkRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SinkRecord] {
        &self.records
    }
}

impl EventSink for MemorySink {
    fn append(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_safe_player_replaces_separators() {
        let tag = SessionTag::new("Ada L/../x", TraversalMode::Sequential);
        assert_eq!(tag.file_safe_player(), "Ada_L____x");
        assert_eq!(
            SessionTag::new("", TraversalMode::Shuffled).file_safe_player(),
            "Player"
        );
    }

    #[test]
    fn stamp_is_sortable() {
        let tag = SessionTag::new("p", TraversalMode::Sequential);
        let stamp = tag.stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }

    #[test]
    fn boxed_sinks_forward() {
        let mut sink: Box<dyn EventSink> = Box::new(MemorySink::new());
        assert!(sink.flush().is_ok());
    }
}
