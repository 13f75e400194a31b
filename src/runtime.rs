use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::ConfigError;
use crate::session::ControlEvent;

/// What the front end reacts to between frames. `Tick` means no input
/// arrived within one frame interval.
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Where key and resize events come from.
pub trait EventSource: Send + 'static {
    /// Waits at most one frame for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Terminal input read on its own thread. Lane presses and resizes are
/// forwarded; key releases are dropped.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                // key release events would double every press on some terminals
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    tx.send(AppEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    log::error!("terminal input closed: {}", e);
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Frame pacing for the engine loop.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Ticker for a target frame rate.
    pub fn per_second(rate: u32) -> Self {
        Self::new(Duration::from_secs(1) / rate.max(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Scripted input for headless sessions.
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls one event per call and turns a quiet frame into a `Tick`, which
/// drives `Session::tick`.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

/// What a key means to a running level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineInput {
    Press(usize),
    Control(ControlEvent),
}

/// Physical keys to lanes and session controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    lanes: Vec<char>,
    pause: KeyCode,
    skip: KeyCode,
    menu: KeyCode,
    quit: KeyCode,
}

impl KeyMap {
    /// One character of `lane_keys` per lane, left to right.
    pub fn new(lane_keys: &str, lanes: usize) -> Result<Self, ConfigError> {
        let keys: Vec<char> = lane_keys.chars().map(|c| c.to_ascii_lowercase()).collect();
        if keys.len() != lanes {
            return Err(ConfigError::KeyCountMismatch {
                keys: keys.len(),
                lanes,
            });
        }
        Ok(Self {
            lanes: keys,
            pause: KeyCode::Char(' '),
            skip: KeyCode::Char('s'),
            menu: KeyCode::Char('m'),
            quit: KeyCode::Char('q'),
        })
    }

    pub fn lane_keys(&self) -> &[char] {
        &self.lanes
    }

    /// Lane keys win over control keys, so a layout may use `s` for a lane.
    pub fn decode(&self, key: &KeyEvent) -> Option<EngineInput> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(EngineInput::Control(ControlEvent::Quit));
        }
        if let KeyCode::Char(c) = key.code {
            let c = c.to_ascii_lowercase();
            if let Some(lane) = self.lanes.iter().position(|k| *k == c) {
                return Some(EngineInput::Press(lane));
            }
        }
        match key.code {
            code if code == self.pause => Some(EngineInput::Control(ControlEvent::PauseToggle)),
            code if code == self.skip => Some(EngineInput::Control(ControlEvent::SkipLevel)),
            code if code == self.menu => Some(EngineInput::Control(ControlEvent::ReturnToMenu)),
            code if code == self.quit || code == KeyCode::Esc => {
                Some(EngineInput::Control(ControlEvent::Quit))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn quiet_frame_becomes_tick() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        match runner.step() {
            AppEvent::Tick => {}
            _ => panic!("a quiet frame should tick the engine"),
        }
    }

    #[test]
    fn resize_is_forwarded() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(10)));

        match runner.step() {
            AppEvent::Resize => {}
            _ => panic!("expected Resize event"),
        }
    }

    #[test]
    fn per_second_ticker() {
        assert_eq!(
            FixedTicker::per_second(50).interval(),
            Duration::from_millis(20)
        );
        assert_eq!(FixedTicker::per_second(0).interval(), Duration::from_secs(1));
    }

    #[test]
    fn lane_keys_map_left_to_right() {
        let map = KeyMap::new("dfjk", 4).unwrap();
        assert_eq!(map.decode(&key('d')), Some(EngineInput::Press(0)));
        assert_eq!(map.decode(&key('K')), Some(EngineInput::Press(3)));
        assert_eq!(map.decode(&key('x')), None);
    }

    #[test]
    fn control_keys() {
        let map = KeyMap::new("dfjk", 4).unwrap();
        assert_eq!(
            map.decode(&key(' ')),
            Some(EngineInput::Control(ControlEvent::PauseToggle))
        );
        assert_eq!(
            map.decode(&key('s')),
            Some(EngineInput::Control(ControlEvent::SkipLevel))
        );
        assert_eq!(
            map.decode(&key('m')),
            Some(EngineInput::Control(ControlEvent::ReturnToMenu))
        );
        assert_eq!(
            map.decode(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
            Some(EngineInput::Control(ControlEvent::Quit))
        );
        assert_eq!(
            map.decode(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(EngineInput::Control(ControlEvent::Quit))
        );
    }

    #[test]
    fn lane_keys_shadow_controls() {
        let map = KeyMap::new("asdf", 4).unwrap();
        assert_eq!(map.decode(&key('s')), Some(EngineInput::Press(1)));
    }

    #[test]
    fn key_count_must_match_lanes() {
        assert_eq!(
            KeyMap::new("dfj", 4),
            Err(ConfigError::KeyCountMismatch { keys: 3, lanes: 4 })
        );
    }
}
