use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs},
    Frame,
};

use super::app::{App, ROUTES};
use super::widgets;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    app.page.draw(f, chunks[1]);
    draw_status_bar(f, app, chunks[2]);

    if app.drawer_open {
        draw_drawer(f, app, chunks[1]);
    }
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = ROUTES
        .iter()
        .enumerate()
        .map(|(i, route)| format!("{} {}", i + 1, route.title()))
        .collect();

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" modeldeck "),
        )
        .select(app.page.route().index())
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_drawer(f: &mut Frame, app: &App, area: Rect) {
    let width = area.width.min(34);
    let area = Rect::new(area.x, area.y, width, area.height);
    f.render_widget(Clear, area);

    let items: Vec<ListItem> = ROUTES
        .iter()
        .enumerate()
        .map(|(i, route)| {
            let style = if i == app.drawer_index {
                widgets::selected_style()
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(if i == app.drawer_index { "> " } else { "  " }, style),
                Span::styled(route.title(), style),
                Span::raw("  "),
                Span::styled(route.path(), widgets::hint_style()),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Navigate "),
    );
    f.render_widget(list, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let help = if app.drawer_open {
        "j/k: move | Enter: open | Esc/n: close"
    } else {
        app.page.help()
    };

    let mut spans = Vec::new();
    if app.page.is_busy() {
        spans.push(Span::styled("⟳ ", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::raw(help));
    if !app.page.captures_input() {
        spans.push(Span::styled(
            "  |  n: menu | 1-7: pages | q: quit",
            widgets::hint_style(),
        ));
    } else {
        spans.push(Span::styled("  |  Ctrl+C: quit", widgets::hint_style()));
    }

    let status = Paragraph::new(Line::from(spans))
        .style(Style::default().fg(Color::White))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}
