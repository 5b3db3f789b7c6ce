//! Building blocks shared by the pages.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

use modeldeck_core::json_input::JsonInput;
use modeldeck_core::metrics::{display_name, MetricComparison};
use modeldeck_core::report::ReportFile;
use modeldeck_core::{MetricsSnapshot, Trend};

use super::state::{Load, Picker};

pub fn selected_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

pub fn hint_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn bordered(title: &str) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title.to_string())
}

/// Bordered block highlighted when it has keyboard focus.
pub fn focus_block(title: &str, focused: bool) -> Block<'static> {
    let block = bordered(title);
    if focused {
        block.border_style(Style::default().fg(Color::Yellow))
    } else {
        block
    }
}

/// Rect of `percent_x` × `percent_y` centered in `area`.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Clear the area under a dialog and return its inner block area.
pub fn dialog(f: &mut Frame, title: &str, percent_x: u16, percent_y: u16) -> Rect {
    let area = centered_rect(percent_x, percent_y, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);
    inner
}

/// Error and success banner lines, error first.
pub fn banner_lines(error: Option<&str>, message: Option<&str>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(error) = error {
        lines.push(Line::from(Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(message) = message {
        lines.push(Line::from(Span::styled(
            format!("✓ {}", message),
            Style::default().fg(Color::Green),
        )));
    }
    lines
}

/// Split off a banner at the top of `area` when there is something to show.
pub fn with_banner(
    f: &mut Frame,
    area: Rect,
    error: Option<&str>,
    message: Option<&str>,
) -> Rect {
    let lines = banner_lines(error, message);
    if lines.is_empty() {
        return area;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(lines.len() as u16 + 2), Constraint::Min(0)])
        .split(area);
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );
    chunks[1]
}

/// A list with a `>` marker on the cursor row.
pub fn picker_list<T>(
    title: &str,
    picker: &Picker<T>,
    label: impl Fn(&T) -> String,
    focused: bool,
) -> List<'static> {
    let items: Vec<ListItem> = picker
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let is_cursor = i == picker.cursor();
            let style = if is_cursor && focused {
                selected_style()
            } else if is_cursor {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(if is_cursor { "> " } else { "  " }, style),
                Span::styled(label(item), style),
            ]))
        })
        .collect();

    List::new(items).block(focus_block(title, focused))
}

/// Render a picker that may still be loading.
pub fn draw_load_picker<T>(
    f: &mut Frame,
    area: Rect,
    title: &str,
    load: &Load<Picker<T>>,
    label: impl Fn(&T) -> String,
    focused: bool,
    empty: &str,
) {
    match load {
        Load::Ready(picker) if !picker.is_empty() => {
            f.render_widget(picker_list(title, picker, label, focused), area);
        }
        other => {
            let text = match other {
                Load::Idle => "",
                Load::Loading => "Loading...",
                Load::Failed(_) => "Unavailable",
                Load::Ready(_) => empty,
            };
            f.render_widget(
                Paragraph::new(text)
                    .style(hint_style())
                    .block(focus_block(title, focused)),
                area,
            );
        }
    }
}

/// Multi-line JSON editor; the validation message sits in the bottom border.
pub fn json_field<'a>(title: &'a str, input: &'a JsonInput, focused: bool) -> Paragraph<'a> {
    let mut text = input.text().to_string();
    if focused {
        text.push('▋');
    }

    let mut block = focus_block(title, focused);
    if let Some(error) = input.error() {
        block = block
            .title_bottom(Line::from(Span::styled(
                format!(" {} ", error),
                Style::default().fg(Color::Red),
            )))
            .border_style(Style::default().fg(Color::Red));
    }

    Paragraph::new(text).wrap(Wrap { trim: false }).block(block)
}

/// Single-line text input.
pub fn text_field<'a>(title: &'a str, value: &str, placeholder: &str, focused: bool) -> Paragraph<'a> {
    let line = if value.is_empty() && !focused {
        Line::from(Span::styled(placeholder.to_string(), hint_style()))
    } else if focused {
        Line::from(format!("{}▋", value))
    } else {
        Line::from(value.to_string())
    };
    Paragraph::new(line).block(focus_block(title, focused))
}

pub fn metrics_table(metrics: &MetricsSnapshot, title: &str) -> Table<'static> {
    let rows: Vec<Row> = metrics
        .iter()
        .map(|(name, value)| {
            Row::new(vec![
                Cell::from(display_name(name)),
                Cell::from(value.to_string()).style(Style::default().fg(Color::Cyan)),
            ])
        })
        .collect();

    Table::new(rows, [Constraint::Percentage(60), Constraint::Percentage(40)])
        .header(
            Row::new(vec!["Metric Name", "Value"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(bordered(title))
}

fn trend_style(trend: Trend) -> Style {
    match trend {
        Trend::Up => Style::default().fg(Color::Green),
        Trend::Down => Style::default().fg(Color::Red),
        Trend::Neutral => hint_style(),
    }
}

/// Current vs historical, one row per current metric.
pub fn comparison_table(rows: &[MetricComparison], title: String) -> Table<'static> {
    let rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            let style = trend_style(row.trend);
            Row::new(vec![
                Cell::from(display_name(&row.name)),
                Cell::from(row.current.to_string()),
                Cell::from(row.historical_text()),
                Cell::from(row.diff_text()).style(style),
                Cell::from(match row.percentage_text().as_str() {
                    "N/A" => "N/A".to_string(),
                    pct => format!("{}%", pct),
                })
                .style(style),
                Cell::from(row.trend.arrow()).style(style),
            ])
        })
        .collect();

    Table::new(
        rows,
        [
            Constraint::Percentage(28),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(12),
        ],
    )
    .header(
        Row::new(vec!["Metric", "Current", "Historical", "Diff", "Change", "Trend"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title))
}

/// Report files as text: a heading per file, then its rendered content.
pub fn report_lines(files: &[ReportFile]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for file in files {
        if matches!(file, ReportFile::Unsupported { .. }) {
            continue;
        }
        lines.push(Line::from(Span::styled(
            file.filename().to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.extend(file.render().into_iter().map(Line::from));
        lines.push(Line::from(""));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("No report files available", hint_style())));
    }
    lines
}
