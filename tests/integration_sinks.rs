use std::time::Duration;

use lanetap::analytics::FeedbackRatings;
use lanetap::config::EngineConfig;
use lanetap::difficulty::TraversalMode;
use lanetap::session::{ControlEvent, Session, SessionParams};
use lanetap::sink::sqlite::Table;
use lanetap::sink::{CsvSink, EventSink, SessionTag, SqliteSink};

fn config() -> EngineConfig {
    EngineConfig {
        level_duration_secs: 3.0,
        level_count: 2,
        base_speed: 40.0,
        seed: Some(8),
        ..EngineConfig::default()
    }
}

/// Plays level one to the end without pressing, then leaves level two
/// early. Returns the finished sink.
fn play<S: EventSink>(sink: S, player: &str) -> S {
    let mut session = Session::new(
        config(),
        SessionParams::new(player, TraversalMode::Sequential),
        sink,
        Duration::ZERO,
    )
    .unwrap();

    let mut now = Duration::ZERO;
    while !session.tick(now).level_closed {
        now += Duration::from_millis(20);
    }
    session
        .submit_feedback(FeedbackRatings::new(3, 4, 2).unwrap(), now)
        .unwrap();

    now += Duration::from_millis(700);
    session.tick(now);
    session.press(0, now);
    session.control(ControlEvent::Quit, now);
    session
        .submit_feedback(FeedbackRatings::new(1, 1, 5).unwrap(), now)
        .unwrap();
    assert!(session.is_finished());
    session.finish().unwrap()
}

#[test]
fn csv_session_writes_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let tag = SessionTag::new("csv player", TraversalMode::Sequential);
    let sink = play(CsvSink::create(dir.path(), &tag).unwrap(), "csv player");

    let mut events = csv::Reader::from_path(sink.events_path()).unwrap();
    let headers = events.headers().unwrap().clone();
    assert_eq!(&headers[3], "hit_status");
    let rows: Vec<csv::StringRecord> = events.records().map(|r| r.unwrap()).collect();
    assert!(rows.iter().any(|r| &r[3] == "miss"));
    assert!(rows.iter().all(|r| &r[1] == "1" || &r[1] == "2"));

    let mut feedback = csv::Reader::from_path(sink.feedback_path()).unwrap();
    let rows: Vec<csv::StringRecord> = feedback.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][6], "false");
    assert_eq!(&rows[1][6], "true");

    let mut analysis = csv::Reader::from_path(sink.analysis_path()).unwrap();
    let rows: Vec<csv::StringRecord> = analysis.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][9], "0");
    assert_eq!(&rows[1][9], "1");

    let name = sink.events_path().file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("csv_player_sequential_"));
}

#[test]
fn sqlite_session_fills_three_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");
    let tag = SessionTag::new("sql", TraversalMode::Sequential);
    let sink = play(SqliteSink::open(&path, &tag).unwrap(), "sql");

    assert!(sink.count(Table::Events).unwrap() > 0);
    assert_eq!(sink.count(Table::Feedback).unwrap(), 2);
    assert_eq!(sink.count(Table::Summaries).unwrap(), 2);

    let summaries = sink.summaries_for("sql").unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(!summaries[0].exited);
    assert!(summaries[1].exited);
    assert!(summaries[0].misses > 0);
}

#[test]
fn sqlite_database_accumulates_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    for _ in 0..2 {
        let tag = SessionTag::new("repeat", TraversalMode::Sequential);
        play(SqliteSink::open(&path, &tag).unwrap(), "repeat");
    }

    let tag = SessionTag::new("repeat", TraversalMode::Sequential);
    let sink = SqliteSink::open(&path, &tag).unwrap();
    assert_eq!(sink.summaries_for("repeat").unwrap().len(), 4);
}
