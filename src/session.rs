use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::analytics::{AnalyticsCollector, FeedbackRatings, JudgmentEvent, SessionSummary};
use crate::clock::SessionClock;
use crate::config::{EngineConfig, ReactionTimebase};
use crate::difficulty::{DifficultyProgram, Level, TraversalMode};
use crate::error::{EngineError, SinkError};
use crate::judge::{Counters, Judgment, JudgmentEngine, Outcome};
use crate::marker::{Marker, MarkerField, Window};
use crate::sink::EventSink;
use crate::spawner::SpawnScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStatus {
    Running,
    Paused,
    Completed,
    Abandoned,
}

/// One fixed-duration run at a constant speed.
///
/// Owns every marker of the level; other components only ever see lane
/// numbers and times.
#[derive(Debug, Clone)]
pub struct LevelSession {
    number: usize,
    level: Level,
    config: EngineConfig,
    window: Window,
    clock: SessionClock,
    scheduler: SpawnScheduler,
    field: MarkerField,
    judge: JudgmentEngine,
    status: LevelStatus,
    flash_remaining: Duration,
    last_effective: Duration,
}

impl LevelSession {
    /// `number` is the 1-based position of the level in the session.
    pub fn new(number: usize, level: Level, config: &EngineConfig, now: Duration) -> Self {
        let window = Window::from_config(config);
        let seed = config.seed.map(|s| s.wrapping_add(number as u64));
        log::info!("level {} started at speed {:.2}", number, level.speed);
        Self {
            number,
            level,
            config: config.clone(),
            window,
            clock: SessionClock::start(now),
            scheduler: SpawnScheduler::seeded(config.spawn_interval(), config.lanes, seed),
            field: MarkerField::new(),
            judge: JudgmentEngine::new(window, config.duplicate_window()),
            status: LevelStatus::Running,
            flash_remaining: Duration::ZERO,
            last_effective: Duration::ZERO,
        }
    }

    /// Time stamped onto markers, per the configured timebase.
    fn marker_time(&self, now: Duration) -> Duration {
        match self.config.reaction_timebase {
            ReactionTimebase::Effective => self.clock.effective_at(now),
            ReactionTimebase::Wall => self.clock.raw_at(now),
        }
    }

    /// One engine step. Does nothing unless running. Returns the misses
    /// that happened during the step.
    pub fn tick(&mut self, now: Duration) -> Vec<Judgment> {
        if self.status != LevelStatus::Running {
            return Vec::new();
        }
        self.clock.update(now);
        let elapsed = self.clock.effective();
        let stamp = self.marker_time(now);

        if let Some(marker) = self.scheduler.advance(elapsed, self.level.speed) {
            self.field.push(marker);
        }

        let missed = self.field.advance(&self.window, stamp);
        let judgments = missed
            .iter()
            .map(|m| self.judge.register_miss(m))
            .collect();

        self.field
            .prune(stamp, self.config.miss_grace(), self.config.duplicate_window());

        self.flash_remaining = self
            .flash_remaining
            .saturating_sub(elapsed.saturating_sub(self.last_effective));
        self.last_effective = elapsed;

        if elapsed >= self.config.level_duration() {
            self.status = LevelStatus::Completed;
            log::info!(
                "level {} completed after {:.1}s ({} hits, {} misses, {} incorrect)",
                self.number,
                elapsed.as_secs_f64(),
                self.judge.counters().hits,
                self.judge.counters().misses,
                self.judge.counters().incorrect
            );
        }
        judgments
    }

    /// Resolves a lane press. Presses are only judged while running, and
    /// lanes outside the configured range are dropped.
    pub fn press(&mut self, lane: usize, now: Duration) -> Option<Judgment> {
        if self.status != LevelStatus::Running {
            log::debug!("press on lane {} ignored while {:?}", lane, self.status);
            return None;
        }
        if lane >= self.config.lanes {
            log::warn!("press on unknown lane {} ignored", lane);
            return None;
        }
        let stamp = self.marker_time(now);
        let judgment = self
            .judge
            .resolve_press(lane, self.level.speed, &mut self.field, stamp);
        if judgment.outcome == Outcome::Incorrect {
            self.flash_remaining = self.config.flash();
        }
        log::debug!("lane {} press judged {}", lane, judgment.outcome);
        Some(judgment)
    }

    pub fn toggle_pause(&mut self, now: Duration) -> LevelStatus {
        match self.status {
            LevelStatus::Running => {
                self.clock.pause(now);
                self.status = LevelStatus::Paused;
            }
            LevelStatus::Paused => {
                self.clock.resume(now);
                self.status = LevelStatus::Running;
            }
            LevelStatus::Completed | LevelStatus::Abandoned => {}
        }
        self.status
    }

    /// User left the level early. Only a live level can be abandoned.
    pub fn abandon(&mut self, now: Duration) -> bool {
        match self.status {
            LevelStatus::Running | LevelStatus::Paused => {
                self.clock.update(now);
                self.status = LevelStatus::Abandoned;
                log::info!(
                    "level {} abandoned after {:.1}s",
                    self.number,
                    self.clock.effective().as_secs_f64()
                );
                true
            }
            LevelStatus::Completed | LevelStatus::Abandoned => false,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn status(&self) -> LevelStatus {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.effective()
    }

    pub fn remaining(&self) -> Duration {
        self.clock.remaining(self.config.level_duration())
    }

    pub fn counters(&self) -> &Counters {
        self.judge.counters()
    }

    pub fn markers(&self) -> &[Marker] {
        self.field.live()
    }

    pub fn field_mut(&mut self) -> &mut MarkerField {
        &mut self.field
    }

    pub fn flash_active(&self) -> bool {
        !self.flash_remaining.is_zero()
    }

    pub fn spawned(&self) -> usize {
        self.scheduler.spawned()
    }
}

/// Session-control events decoded by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    PauseToggle,
    SkipLevel,
    ReturnToMenu,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterFeedback {
    NextLevel,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Playing,
    /// A level closed; ticking is suspended until ratings arrive.
    AwaitingFeedback {
        exited: bool,
        then: AfterFeedback,
    },
    Finished,
}

/// Who is playing and how the levels are ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub player: String,
    pub mode: TraversalMode,
}

impl SessionParams {
    pub fn new(player: impl Into<String>, mode: TraversalMode) -> Self {
        let player = player.into();
        let player = if player.trim().is_empty() {
            "Player".to_string()
        } else {
            player
        };
        Self { player, mode }
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<JudgmentEvent>,
    pub level_closed: bool,
    pub faults: Vec<SinkError>,
}

/// Read-only view handed to the renderer once per frame.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub level_number: usize,
    pub level_count: usize,
    pub speed: f64,
    pub markers: &'a [Marker],
    pub counters: Counters,
    pub remaining: Duration,
    pub flash: bool,
    pub level_status: LevelStatus,
    pub status: SessionStatus,
    pub mode: TraversalMode,
}

/// Plays the declared levels in order, routing every outcome to the
/// analytics collector.
#[derive(Debug)]
pub struct Session<S: EventSink> {
    config: EngineConfig,
    params: SessionParams,
    program: DifficultyProgram,
    collector: AnalyticsCollector<S>,
    level: LevelSession,
    level_index: usize,
    status: SessionStatus,
    origin: Duration,
    summaries: Vec<SessionSummary>,
    faults: Vec<SinkError>,
}

impl<S: EventSink> Session<S> {
    /// Refuses to start on an invalid configuration.
    pub fn new(
        config: EngineConfig,
        params: SessionParams,
        sink: S,
        now: Duration,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let program = DifficultyProgram::from_config(&config, params.mode, &mut rng);
        let first = *program.level(0)?;
        log::info!(
            "session for {} in {} mode with {} levels",
            params.player,
            params.mode,
            program.len()
        );

        Ok(Self {
            level: LevelSession::new(1, first, &config, now),
            collector: AnalyticsCollector::new(sink, config.lanes),
            config,
            params,
            program,
            level_index: 0,
            status: SessionStatus::Playing,
            origin: now,
            summaries: Vec::new(),
            faults: Vec::new(),
        })
    }

    fn record(&mut self, judgment: &Judgment, now: Duration) -> JudgmentEvent {
        let event = JudgmentEvent::stamp(
            judgment,
            self.level.number(),
            now.saturating_sub(self.origin),
        );
        if let Err(e) = self.collector.record(event.clone()) {
            self.faults.push(e);
        }
        event
    }

    fn has_next_level(&self) -> bool {
        self.level_index + 1 < self.program.len()
    }

    pub fn tick(&mut self, now: Duration) -> TickReport {
        let mut report = TickReport::default();
        if self.status != SessionStatus::Playing {
            return report;
        }

        for judgment in self.level.tick(now) {
            report.events.push(self.record(&judgment, now));
        }

        if self.level.status() == LevelStatus::Completed {
            let then = if self.has_next_level() {
                AfterFeedback::NextLevel
            } else {
                AfterFeedback::End
            };
            self.status = SessionStatus::AwaitingFeedback {
                exited: false,
                then,
            };
            report.level_closed = true;
        }

        report.faults = self.take_faults();
        report
    }

    pub fn press(&mut self, lane: usize, now: Duration) -> Option<JudgmentEvent> {
        if self.status != SessionStatus::Playing {
            return None;
        }
        let judgment = self.level.press(lane, now)?;
        Some(self.record(&judgment, now))
    }

    /// Pause toggles in place; skip, menu and quit all go through the same
    /// abandonment path and wait for feedback.
    pub fn control(&mut self, event: ControlEvent, now: Duration) -> SessionStatus {
        if self.status != SessionStatus::Playing {
            return self.status;
        }
        let then = match event {
            ControlEvent::PauseToggle => {
                self.level.toggle_pause(now);
                return self.status;
            }
            ControlEvent::SkipLevel if self.has_next_level() => AfterFeedback::NextLevel,
            ControlEvent::SkipLevel | ControlEvent::ReturnToMenu | ControlEvent::Quit => {
                AfterFeedback::End
            }
        };
        if self.level.abandon(now) {
            self.status = SessionStatus::AwaitingFeedback { exited: true, then };
        }
        self.status
    }

    /// Closes the waiting level: feedback and summary go to the sink, then
    /// the next level starts or the session ends.
    pub fn submit_feedback(
        &mut self,
        ratings: FeedbackRatings,
        now: Duration,
    ) -> Result<SessionSummary, EngineError> {
        let SessionStatus::AwaitingFeedback { exited, then } = self.status else {
            return Err(EngineError::NotAwaitingFeedback);
        };

        let (summary, faults) =
            self.collector
                .close_level(self.level.number(), self.level.elapsed(), exited, ratings);
        self.faults.extend(faults);
        self.summaries.push(summary.clone());

        match then {
            AfterFeedback::NextLevel => {
                let index = self.level_index + 1;
                let next = *self.program.level(index)?;
                self.level_index = index;
                self.level = LevelSession::new(index + 1, next, &self.config, now);
                self.status = SessionStatus::Playing;
            }
            AfterFeedback::End => {
                self.status = SessionStatus::Finished;
                log::info!(
                    "session for {} finished after {} level(s)",
                    self.params.player,
                    self.summaries.len()
                );
            }
        }
        Ok(summary)
    }

    /// Closes a level still waiting for feedback without ratings and ends
    /// the session. The summary is written; no feedback record is.
    pub fn close_unanswered(&mut self) -> Result<SessionSummary, EngineError> {
        let SessionStatus::AwaitingFeedback { exited, .. } = self.status else {
            return Err(EngineError::NotAwaitingFeedback);
        };

        let (summary, faults) =
            self.collector
                .close_level_unrated(self.level.number(), self.level.elapsed(), exited);
        self.faults.extend(faults);
        self.summaries.push(summary.clone());
        self.status = SessionStatus::Finished;
        log::info!(
            "level {} closed for {} without feedback",
            self.level.number(),
            self.params.player
        );
        Ok(summary)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            level_number: self.level.number(),
            level_count: self.program.len(),
            speed: self.level.level().speed,
            markers: self.level.markers(),
            counters: *self.level.counters(),
            remaining: self.level.remaining(),
            flash: self.level.flash_active(),
            level_status: self.level.status(),
            status: self.status,
            mode: self.params.mode,
        }
    }

    pub fn take_faults(&mut self) -> Vec<SinkError> {
        std::mem::take(&mut self.faults)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    pub fn level(&self) -> &LevelSession {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut LevelSession {
        &mut self.level
    }

    pub fn program(&self) -> &DifficultyProgram {
        &self.program
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn summaries(&self) -> &[SessionSummary] {
        &self.summaries
    }

    pub fn collector(&self) -> &AnalyticsCollector<S> {
        &self.collector
    }

    /// Flushes the sink and hands it back. Pending records that still
    /// cannot be written are reported, not dropped silently.
    pub fn finish(mut self) -> Result<S, SinkError> {
        if self.status != SessionStatus::Finished {
            log::warn!("closing session while {:?}", self.status);
        }
        self.collector.flush()?;
        Ok(self.collector.into_sink())
    }
}
