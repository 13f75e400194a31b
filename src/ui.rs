pub mod charting;
pub mod summary_table;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use lanetap::{
    analytics::FeedbackRatings,
    config::EngineConfig,
    difficulty::TraversalMode,
    marker::MarkerState,
    session::{ControlEvent, LevelStatus, Snapshot},
    util::level_label,
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const INFO_WIDTH: u16 = 24;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);

        match self.state {
            AppState::NameEntry => render_name_entry(self, chunks[0], buf),
            AppState::Playing | AppState::Confirm(_) => {
                if let Some(session) = &self.session {
                    render_level(
                        &session.snapshot(),
                        &self.config.engine,
                        self.keymap.lane_keys(),
                        chunks[0],
                        buf,
                    );
                }
                if let AppState::Confirm(event) = self.state {
                    render_prompt(confirm_text(event), "(y)es / (n)o", chunks[0], buf);
                }
            }
            AppState::Feedback => {
                let question = FeedbackRatings::QUESTIONS
                    .get(self.answers.len())
                    .copied()
                    .unwrap_or_default();
                let progress = format!(
                    "question {} of {}  (1-5, backspace to change)",
                    (self.answers.len() + 1).min(FeedbackRatings::QUESTIONS.len()),
                    FeedbackRatings::QUESTIONS.len()
                );
                render_prompt(question, &progress, chunks[0], buf);
            }
            AppState::Results => render_results(self, chunks[0], buf),
        }

        if let Some(notice) = &self.notice {
            Paragraph::new(Span::styled(
                notice.as_str(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ))
            .render(chunks[1], buf);
        }
    }
}

fn confirm_text(event: ControlEvent) -> &'static str {
    match event {
        ControlEvent::SkipLevel => "Skip to the next level?",
        ControlEvent::ReturnToMenu => "Leave this session and return to the menu?",
        ControlEvent::Quit | ControlEvent::PauseToggle => "Quit lanetap?",
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// A bordered box in the middle of `area` with a question and a hint.
fn render_prompt(question: &str, hint: &str, area: Rect, buf: &mut Buffer) {
    let width = (question.width().max(hint.width()) as u16).saturating_add(6);
    let popup = centered(area, width, 5);
    Clear.render(popup, buf);

    Paragraph::new(vec![
        Line::from(Span::styled(
            question,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            hint,
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL))
    .render(popup, buf);
}

fn render_name_entry(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let lines = vec![
        Line::from(Span::styled("lanetap", bold.fg(Color::Cyan))),
        Line::from(""),
        Line::from(vec![
            Span::styled("name: ", dim),
            Span::styled(app.name.as_str(), bold),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{} mode, {} levels of {}s, keys {}",
                app.mode,
                app.config.engine.level_count,
                app.config.engine.level_duration_secs,
                app.keymap.lane_keys().iter().join(" ")
            ),
            dim,
        )),
        Line::from(Span::styled(
            "(enter) start / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];

    let popup = centered(area, 50, lines.len() as u16 + 2);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(popup, buf);
}

/// Lanes, markers and the judgment line, with the info panel on the right.
pub fn render_level(
    snapshot: &Snapshot<'_>,
    engine: &EngineConfig,
    lane_keys: &[char],
    area: Rect,
    buf: &mut Buffer,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(4), Constraint::Length(INFO_WIDTH)])
        .split(area);

    render_field(snapshot, engine, lane_keys, chunks[0], buf);
    render_info(snapshot, chunks[1], buf);

    if snapshot.level_status == LevelStatus::Paused {
        render_prompt("PAUSED", "(space) resume", chunks[0], buf);
    }
}

fn render_field(
    snapshot: &Snapshot<'_>,
    engine: &EngineConfig,
    lane_keys: &[char],
    area: Rect,
    buf: &mut Buffer,
) {
    let lanes = engine.lanes.max(1) as u16;
    if area.height < 3 || area.width < lanes {
        return;
    }
    let lane_width = area.width / lanes;
    // the bottom row carries the key labels
    let rows = area.height - 1;
    let scale = f64::from(rows) / engine.field_height;
    let to_row = |y: f64| ((y * scale).max(0.0) as u16).min(rows - 1);

    let separator = Style::default().add_modifier(Modifier::DIM);
    for lane in 1..lanes {
        let x = area.x + lane * lane_width;
        for row in 0..rows {
            if let Some(cell) = buf.cell_mut((x, area.y + row)) {
                cell.set_symbol("│").set_style(separator);
            }
        }
    }

    let line_row = to_row(engine.judgment_line_y);
    let line_style = if snapshot.flash {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    for x in area.x..area.x + lane_width * lanes {
        if let Some(cell) = buf.cell_mut((x, area.y + line_row)) {
            cell.set_symbol("━").set_style(line_style);
        }
    }

    for marker in snapshot.markers {
        let style = match marker.state() {
            MarkerState::Active => Style::default().fg(Color::Cyan),
            MarkerState::Missed => Style::default().fg(Color::DarkGray),
            MarkerState::Hit => continue,
        };
        let top = to_row(marker.y);
        let bottom = to_row(marker.y + engine.marker_height).max(top);
        let left = area.x + marker.lane as u16 * lane_width + 1;
        let right = area.x + (marker.lane as u16 + 1) * lane_width;
        for row in top..=bottom {
            for x in left..right {
                if let Some(cell) = buf.cell_mut((x, area.y + row)) {
                    cell.set_symbol("█").set_style(style);
                }
            }
        }
    }

    let label_style = Style::default().add_modifier(Modifier::BOLD | Modifier::DIM);
    for (lane, key) in lane_keys.iter().enumerate().take(lanes as usize) {
        let x = area.x + lane as u16 * lane_width + lane_width / 2;
        if let Some(cell) = buf.cell_mut((x, area.y + rows)) {
            cell.set_symbol(&key.to_string()).set_style(label_style);
        }
    }
}

/// Sequential runs show progress; shuffled runs only show the clock so the
/// participant cannot tell which level is playing.
fn render_info(snapshot: &Snapshot<'_>, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let time = Line::from(vec![
        Span::raw("time  "),
        Span::styled(format!("{:.1}", snapshot.remaining.as_secs_f64()), bold),
    ]);

    let mut lines = vec![time];
    if snapshot.mode == TraversalMode::Sequential {
        lines.extend([
            Line::from(vec![
                Span::raw("level "),
                Span::styled(
                    level_label(snapshot.level_number, snapshot.level_count),
                    bold,
                ),
            ]),
            Line::from(vec![
                Span::raw("hits  "),
                Span::styled(snapshot.counters.hits.to_string(), bold),
            ]),
            Line::from(vec![
                Span::raw("combo "),
                Span::styled(
                    snapshot.counters.combo.to_string(),
                    bold.fg(Color::Magenta),
                ),
            ]),
        ]);
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(space) pause (s)kip (m)enu (q)uit",
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    )));

    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::LEFT))
        .render(area, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let magenta_style = Style::default().fg(Color::Magenta);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(app.summaries.len() as u16 + 3),
            Constraint::Length(1),
        ])
        .split(area);

    let points = charting::reaction_points(&app.summaries);
    let (levels, highest) =
        charting::compute_chart_params(&points, app.config.engine.level_count);

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(magenta_style)
        .graph_type(GraphType::Line)
        .data(&points)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("level")
                .bounds([1.0, levels])
                .labels(vec![
                    Span::styled("1", bold_style),
                    Span::styled(charting::format_label(levels), bold_style),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("reaction ms")
                .bounds([0.0, highest])
                .labels(vec![
                    Span::styled("0", bold_style),
                    Span::styled(charting::format_label(highest), bold_style),
                ]),
        )
        .render(chunks[0], buf);

    summary_table::render_summary_table(&app.summaries, chunks[1], buf);

    Paragraph::new(Span::styled(
        "(r)etry / (m)enu / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanetap::{judge::Counters, marker::Marker};
    use std::time::Duration;

    fn rendered(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn snapshot<'a>(markers: &'a [Marker], mode: TraversalMode, flash: bool) -> Snapshot<'a> {
        Snapshot {
            level_number: 2,
            level_count: 5,
            speed: 5.5,
            markers,
            counters: Counters {
                hits: 7,
                combo: 3,
                ..Counters::default()
            },
            remaining: Duration::from_millis(42_300),
            flash,
            level_status: LevelStatus::Running,
            status: lanetap::session::SessionStatus::Playing,
            mode,
        }
    }

    fn render(snap: &Snapshot<'_>, area: Rect) -> Buffer {
        let mut buf = Buffer::empty(area);
        render_level(snap, &EngineConfig::default(), &['d', 'f', 'j', 'k'], area, &mut buf);
        buf
    }

    #[test]
    fn sequential_panel_shows_progress() {
        let buf = render(
            &snapshot(&[], TraversalMode::Sequential, false),
            Rect::new(0, 0, 80, 24),
        );
        let text = rendered(&buf);
        assert!(text.contains("42.3"));
        assert!(text.contains("2/5"));
        assert!(text.contains("hits  7"));
    }

    #[test]
    fn shuffled_panel_hides_progress() {
        let buf = render(
            &snapshot(&[], TraversalMode::Shuffled, false),
            Rect::new(0, 0, 80, 24),
        );
        let text = rendered(&buf);
        assert!(text.contains("42.3"));
        assert!(!text.contains("level"));
        assert!(!text.contains("combo"));
    }

    #[test]
    fn markers_and_line_are_drawn() {
        let markers = [Marker::at(0, 2.0, 300.0)];
        let area = Rect::new(0, 0, 80, 24);
        let buf = render(&snapshot(&markers, TraversalMode::Sequential, false), area);
        let text = rendered(&buf);
        assert!(text.contains('█'));
        assert!(text.contains('━'));
    }

    #[test]
    fn flash_turns_the_line_red() {
        let area = Rect::new(0, 0, 80, 24);
        let red = |buf: &Buffer| {
            buf.content()
                .iter()
                .any(|c| c.symbol() == "━" && c.fg == Color::Red)
        };
        assert!(red(&render(&snapshot(&[], TraversalMode::Sequential, true), area)));
        assert!(!red(&render(&snapshot(&[], TraversalMode::Sequential, false), area)));
    }

    #[test]
    fn tiny_areas_do_not_panic() {
        for (w, h) in [(1, 1), (5, 2), (10, 3), (30, 4)] {
            let area = Rect::new(0, 0, w, h);
            let buf = render(&snapshot(&[], TraversalMode::Sequential, true), area);
            assert_eq!(*buf.area(), area);
        }
    }

    #[test]
    fn prompt_is_centered_and_cleared() {
        let area = Rect::new(0, 0, 60, 10);
        let mut buf = Buffer::empty(area);
        render_prompt(confirm_text(ControlEvent::SkipLevel), "(y)es / (n)o", area, &mut buf);
        let text = rendered(&buf);
        assert!(text.contains("Skip to the next level?"));
        assert!(text.contains("(y)es"));
    }
}
