use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use super::{EventSink, SessionTag};
use crate::analytics::{FeedbackRecord, JudgmentEvent, SinkRecord, SummaryRecord};
use crate::error::SinkError;

const EVENT_HEADER: [&str; 7] = [
    "timestamp",
    "level",
    "lane",
    "hit_status",
    "reaction_time",
    "reaction_distance",
    "speed",
];

const FEEDBACK_HEADER: [&str; 7] = [
    "timestamp",
    "level",
    "satisfaction",
    "accomplishment",
    "frustration",
    "game_duration",
    "exited",
];

const ANALYSIS_HEADER: [&str; 14] = [
    "timestamp",
    "level",
    "hit_rate",
    "lane_hit_rates",
    "avg_reaction_time",
    "avg_lane_reaction_times",
    "incorrect_hit_rate",
    "lane_incorrect_hit_rates",
    "game_duration",
    "exit_rate",
    "hits",
    "misses",
    "incorrect",
    "duplicates",
];

/// Three CSV files per session: raw events, per-level feedback and
/// per-level analysis. Every record is appended and flushed as it arrives.
#[derive(Debug, Clone)]
pub struct CsvSink {
    events: PathBuf,
    feedback: PathBuf,
    analysis: PathBuf,
}

impl CsvSink {
    /// Creates `dir` if needed and writes the event file header up front.
    pub fn create<P: AsRef<Path>>(dir: P, tag: &SessionTag) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let prefix = format!("{}_{}", tag.file_safe_player(), tag.mode);
        let stamp = tag.stamp();
        let sink = Self {
            events: dir.join(format!("{prefix}_{stamp}.csv")),
            feedback: dir.join(format!("{prefix}_feedback_{stamp}.csv")),
            analysis: dir.join(format!("{prefix}_analysis_{stamp}.csv")),
        };

        if !sink.events.exists() {
            append_row(&sink.events, Some(&EVENT_HEADER[..]), &[])?;
        }
        log::info!("recording events to {}", sink.events.display());
        Ok(sink)
    }

    pub fn events_path(&self) -> &Path {
        &self.events
    }

    pub fn feedback_path(&self) -> &Path {
        &self.feedback
    }

    pub fn analysis_path(&self) -> &Path {
        &self.analysis
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn event_row(e: &JudgmentEvent) -> Vec<String> {
    vec![
        e.occurred_at_millis.to_string(),
        e.level.to_string(),
        e.lane.to_string(),
        e.outcome.to_string(),
        opt(e.reaction_time_millis),
        opt(e.reaction_distance),
        format!("{:.2}", e.speed),
    ]
}

fn feedback_row(f: &FeedbackRecord) -> Vec<String> {
    vec![
        f.timestamp.to_rfc3339(),
        f.level.to_string(),
        f.ratings.satisfaction.to_string(),
        f.ratings.accomplishment.to_string(),
        f.ratings.frustration.to_string(),
        format!("{:.3}", f.level_duration_secs),
        f.exited.to_string(),
    ]
}

fn analysis_row(r: &SummaryRecord) -> Result<Vec<String>, SinkError> {
    let s = &r.summary;
    Ok(vec![
        r.timestamp.to_rfc3339(),
        s.level.to_string(),
        s.hit_rate.to_string(),
        serde_json::to_string(&s.lane_hit_rates)?,
        opt(s.mean_reaction_millis),
        serde_json::to_string(&s.lane_mean_reaction_millis)?,
        s.incorrect_rate.to_string(),
        serde_json::to_string(&s.lane_incorrect_rates)?,
        format!("{:.3}", s.level_duration_secs),
        u8::from(s.exited).to_string(),
        s.hits.to_string(),
        s.misses.to_string(),
        s.incorrect.to_string(),
        s.duplicates.to_string(),
    ])
}

/// Appends one row, writing `header` first when the file is new.
fn append_row(path: &Path, header: Option<&[&str]>, row: &[String]) -> Result<(), SinkError> {
    let needs_header = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    if let (true, Some(header)) = (needs_header, header) {
        writer.write_record(header)?;
    }
    if !row.is_empty() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl EventSink for CsvSink {
    fn append(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        match record {
            SinkRecord::Event(e) => append_row(&self.events, Some(&EVENT_HEADER[..]), &event_row(e)),
            SinkRecord::Feedback(f) => {
                append_row(&self.feedback, Some(&FEEDBACK_HEADER[..]), &feedback_row(f))
            }
            SinkRecord::Summary(s) => {
                append_row(&self.analysis, Some(&ANALYSIS_HEADER[..]), &analysis_row(s)?)
            }
        }
    }
}
