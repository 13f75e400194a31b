use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

use lanetap::analytics::SessionSummary;

fn hit_rate_color(rate: f64) -> Color {
    if rate >= 0.8 {
        Color::Green
    } else if rate >= 0.5 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn reaction_color(ms: f64) -> Color {
    if ms < 250.0 {
        Color::Green
    } else if ms < 400.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Pure presenter for a single level summary row
pub fn present_row(summary: &SessionSummary) -> Row<'static> {
    let reaction = match summary.mean_reaction_millis {
        Some(ms) => Cell::from(format!("{ms:.0}")).style(Style::default().fg(reaction_color(ms))),
        None => Cell::from("—"),
    };

    let level = if summary.exited {
        format!("{} (left)", summary.level)
    } else {
        summary.level.to_string()
    };

    Row::new(vec![
        Cell::from(level).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format!("{:.0}%", summary.hit_rate * 100.0))
            .style(Style::default().fg(hit_rate_color(summary.hit_rate))),
        reaction,
        Cell::from(format!("{:.0}%", summary.incorrect_rate * 100.0)),
        Cell::from(format!(
            "{}/{}/{}",
            summary.hits, summary.misses, summary.incorrect
        )),
        Cell::from(format!("{:.1}s", summary.level_duration_secs)),
    ])
}

/// One row per closed level, oldest first.
pub fn render_summary_table(summaries: &[SessionSummary], area: Rect, buf: &mut Buffer) {
    if summaries.is_empty() {
        Paragraph::new("No level was played to the end.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray))
            .render(area, buf);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Level"),
        Cell::from("Hit rate"),
        Cell::from("Reaction (ms)"),
        Cell::from("Incorrect"),
        Cell::from("Hit/Miss/Inc"),
        Cell::from("Time"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let widths = [
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(14),
        Constraint::Length(10),
        Constraint::Length(13),
        Constraint::Min(6),
    ];

    Table::new(summaries.iter().map(present_row), widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Levels"))
        .column_spacing(1)
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rendered(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn colors_follow_thresholds() {
        assert_eq!(hit_rate_color(0.9), Color::Green);
        assert_eq!(hit_rate_color(0.5), Color::Yellow);
        assert_eq!(hit_rate_color(0.1), Color::Red);
        assert_eq!(reaction_color(120.0), Color::Green);
        assert_eq!(reaction_color(500.0), Color::Red);
    }

    #[test]
    fn empty_table_shows_placeholder() {
        let area = Rect::new(0, 0, 60, 5);
        let mut buf = Buffer::empty(area);
        render_summary_table(&[], area, &mut buf);
        assert!(rendered(&buf).contains("No level"));
    }

    #[test]
    fn table_lists_levels() {
        let mut summary = SessionSummary::from_events(&[], 4, 2, Duration::from_secs(70), true);
        summary.hit_rate = 0.75;
        let area = Rect::new(0, 0, 80, 6);
        let mut buf = Buffer::empty(area);
        render_summary_table(&[summary], area, &mut buf);

        let text = rendered(&buf);
        assert!(text.contains("2 (left)"));
        assert!(text.contains("75%"));
    }
}
