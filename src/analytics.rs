use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, SinkError};
use crate::judge::{Judgment, Outcome};
use crate::sink::EventSink;
use crate::util::{as_millis, mean, ratio, std_dev};

/// One judgment outcome, stamped for persistence. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentEvent {
    pub occurred_at_millis: u64,
    pub level: usize,
    pub lane: usize,
    pub outcome: Outcome,
    pub reaction_time_millis: Option<u64>,
    pub reaction_distance: Option<f64>,
    pub speed: f64,
}

impl JudgmentEvent {
    pub fn stamp(judgment: &Judgment, level: usize, occurred_at: Duration) -> Self {
        Self {
            occurred_at_millis: as_millis(occurred_at),
            level,
            lane: judgment.lane,
            outcome: judgment.outcome,
            reaction_time_millis: judgment.reaction_time.map(as_millis),
            reaction_distance: judgment.reaction_distance,
            // two decimals is all the display and the files ever carry
            speed: (judgment.speed * 100.0).round() / 100.0,
        }
    }
}

/// Subjective ratings collected after each level, each in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRatings {
    pub satisfaction: u8,
    pub accomplishment: u8,
    pub frustration: u8,
}

impl FeedbackRatings {
    pub const QUESTIONS: [&'static str; 3] = [
        "Sense of satisfaction (1-5):",
        "Sense of accomplishment (1-5):",
        "Sense of frustration (1-5):",
    ];

    pub fn new(satisfaction: u8, accomplishment: u8, frustration: u8) -> Result<Self, EngineError> {
        for (field, value) in [
            ("satisfaction", satisfaction),
            ("accomplishment", accomplishment),
            ("frustration", frustration),
        ] {
            if !(1..=5).contains(&value) {
                return Err(EngineError::RatingOutOfRange { field, value });
            }
        }
        Ok(Self {
            satisfaction,
            accomplishment,
            frustration,
        })
    }

    pub fn from_answers(answers: &[u8]) -> Result<Self, EngineError> {
        match answers {
            [a, b, c] => Self::new(*a, *b, *c),
            _ => Err(EngineError::RatingOutOfRange {
                field: "answers",
                value: answers.len().min(u8::MAX as usize) as u8,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Local>,
    pub level: usize,
    pub ratings: FeedbackRatings,
    pub level_duration_secs: f64,
    pub exited: bool,
}

/// Aggregates over one level's events.
///
/// Rates with nothing to divide by are `0.0`; reaction means without a
/// single timed event are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub level: usize,
    pub hit_rate: f64,
    pub lane_hit_rates: Vec<f64>,
    pub mean_reaction_millis: Option<f64>,
    pub reaction_std_dev_millis: Option<f64>,
    pub lane_mean_reaction_millis: Vec<Option<f64>>,
    pub incorrect_rate: f64,
    pub lane_incorrect_rates: Vec<f64>,
    pub level_duration_secs: f64,
    pub exited: bool,
    pub hits: usize,
    pub misses: usize,
    pub incorrect: usize,
    pub duplicates: usize,
}

#[derive(Default, Clone, Copy)]
struct Tally {
    hits: usize,
    misses: usize,
    incorrect: usize,
    duplicates: usize,
}

impl Tally {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Hit => self.hits += 1,
            Outcome::Miss => self.misses += 1,
            Outcome::Incorrect => self.incorrect += 1,
            Outcome::Duplicate => self.duplicates += 1,
        }
    }

    fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    fn incorrect_rate(&self) -> f64 {
        ratio(self.incorrect, self.hits + self.incorrect)
    }
}

impl SessionSummary {
    pub fn from_events(
        events: &[JudgmentEvent],
        lanes: usize,
        level: usize,
        level_duration: Duration,
        exited: bool,
    ) -> Self {
        let mut overall = Tally::default();
        let mut per_lane = vec![Tally::default(); lanes];
        let mut reaction: Vec<f64> = Vec::new();
        let mut lane_reaction: Vec<Vec<f64>> = vec![Vec::new(); lanes];

        for event in events {
            overall.add(event.outcome);
            if let Some(tally) = per_lane.get_mut(event.lane) {
                tally.add(event.outcome);
            }
            // only hits carry a reaction time; untimed hits stay out of the means
            if let Some(rt) = event.reaction_time_millis {
                reaction.push(rt as f64);
                if let Some(samples) = lane_reaction.get_mut(event.lane) {
                    samples.push(rt as f64);
                }
            }
        }

        Self {
            level,
            hit_rate: overall.hit_rate(),
            lane_hit_rates: per_lane.iter().map(Tally::hit_rate).collect(),
            mean_reaction_millis: mean(&reaction),
            reaction_std_dev_millis: std_dev(&reaction),
            lane_mean_reaction_millis: lane_reaction.iter().map(|s| mean(s)).collect(),
            incorrect_rate: overall.incorrect_rate(),
            lane_incorrect_rates: per_lane.iter().map(Tally::incorrect_rate).collect(),
            level_duration_secs: level_duration.as_secs_f64(),
            exited,
            hits: overall.hits,
            misses: overall.misses,
            incorrect: overall.incorrect,
            duplicates: overall.duplicates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub timestamp: DateTime<Local>,
    pub summary: SessionSummary,
}

/// Everything that crosses the persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkRecord {
    Event(JudgmentEvent),
    Feedback(FeedbackRecord),
    Summary(SummaryRecord),
}

/// Buffers a level's events and forwards every record to the sink in
/// order. Records the sink refuses stay queued and go out ahead of the next
/// write.
#[derive(Debug)]
pub struct AnalyticsCollector<S: EventSink> {
    sink: S,
    lanes: usize,
    buffer: Vec<JudgmentEvent>,
    pending: VecDeque<SinkRecord>,
}

impl<S: EventSink> AnalyticsCollector<S> {
    pub fn new(sink: S, lanes: usize) -> Self {
        Self {
            sink,
            lanes,
            buffer: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// The event is buffered for the summary even when the sink fails.
    pub fn record(&mut self, event: JudgmentEvent) -> Result<(), SinkError> {
        self.buffer.push(event.clone());
        self.write(SinkRecord::Event(event))
    }

    /// Computes the summary for the buffered events and starts a new
    /// window.
    pub fn summarize(
        &mut self,
        level: usize,
        level_duration: Duration,
        exited: bool,
    ) -> SessionSummary {
        let summary =
            SessionSummary::from_events(&self.buffer, self.lanes, level, level_duration, exited);
        self.buffer.clear();
        summary
    }

    /// Appends the feedback record and the level summary, in that order.
    pub fn close_level(
        &mut self,
        level: usize,
        level_duration: Duration,
        exited: bool,
        ratings: FeedbackRatings,
    ) -> (SessionSummary, Vec<SinkError>) {
        let now = Local::now();
        let mut faults = Vec::new();

        let feedback = FeedbackRecord {
            timestamp: now,
            level,
            ratings,
            level_duration_secs: level_duration.as_secs_f64(),
            exited,
        };
        if let Err(e) = self.write(SinkRecord::Feedback(feedback)) {
            faults.push(e);
        }

        let (summary, summary_faults) = self.close_level_unrated(level, level_duration, exited);
        faults.extend(summary_faults);
        (summary, faults)
    }

    /// Appends the level summary alone, for a level whose questionnaire was
    /// never answered.
    pub fn close_level_unrated(
        &mut self,
        level: usize,
        level_duration: Duration,
        exited: bool,
    ) -> (SessionSummary, Vec<SinkError>) {
        let summary = self.summarize(level, level_duration, exited);
        let faults = self
            .write(SinkRecord::Summary(SummaryRecord {
                timestamp: Local::now(),
                summary: summary.clone(),
            }))
            .err()
            .into_iter()
            .collect();
        (summary, faults)
    }

    /// Retries queued records, then flushes the sink.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.drain()?;
        self.sink.flush()
    }

    pub fn buffered(&self) -> &[JudgmentEvent] {
        &self.buffer
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn write(&mut self, record: SinkRecord) -> Result<(), SinkError> {
        self.pending.push_back(record);
        self.drain()
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        while let Some(record) = self.pending.front() {
            if let Err(e) = self.sink.append(record) {
                log::warn!(
                    "sink write failed, {} record(s) queued for retry: {}",
                    self.pending.len(),
                    e
                );
                return Err(e);
            }
            self.pending.pop_front();
        }
        Ok(())
    }
}
