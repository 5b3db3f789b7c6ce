use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use modeldeck_core::{load_dashboard, DashboardStats};

use super::Action;
use crate::tui::app::Route;
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

#[derive(Debug)]
pub enum Msg {
    Loaded(Result<DashboardStats, String>),
}

pub struct DashboardPage {
    pub stats: DashboardStats,
    pub loading: bool,
    pub error: Option<String>,
}

impl DashboardPage {
    pub fn mount(ctx: &Ctx) -> Self {
        let mut page = Self {
            stats: DashboardStats::default(),
            loading: false,
            error: None,
        };
        page.refresh(ctx);
        page
    }

    pub fn refresh(&mut self, ctx: &Ctx) {
        self.loading = true;
        ctx.spawn(|api| async move { Msg::Loaded(text(load_dashboard(api.as_ref()).await)) });
    }

    pub fn update(&mut self, msg: Msg) {
        match msg {
            Msg::Loaded(Ok(stats)) => {
                self.stats = stats;
                self.error = None;
            }
            Msg::Loaded(Err(e)) => {
                self.stats = DashboardStats::default();
                self.error = Some(format!("Error loading dashboard: {}", e));
            }
        }
        self.loading = false;
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        match key.code {
            KeyCode::Char('r') => self.refresh(ctx),
            KeyCode::Char('t') => return Some(Action::Navigate(Route::Testing, None)),
            _ => {}
        }
        None
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = widgets::with_banner(f, area, self.error.as_deref(), None);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)])
            .split(area);

        let cards = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 4); 4])
            .split(rows[0]);

        let value = |n: String| if self.loading { "…".to_string() } else { n };
        let stats = [
            ("Total Models", value(self.stats.models.to_string()), Color::Cyan),
            ("Deployed Models", value(self.stats.deployed.to_string()), Color::Green),
            ("Available Ports", value(self.stats.free_ports.to_string()), Color::Yellow),
            ("System Status", "Online".to_string(), Color::Green),
        ];

        for ((title, value, color), area) in stats.into_iter().zip(cards.iter()) {
            let card = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    value,
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ))
                .centered(),
            ])
            .block(widgets::bordered(&format!(" {} ", title)));
            f.render_widget(card, *area);
        }

        let actions = Paragraph::new(vec![
            Line::from(""),
            Line::from("  Manage the model lifecycle from the navigation drawer (n)."),
            Line::from(""),
            Line::from(vec![
                Span::raw("  Press "),
                Span::styled("t", widgets::selected_style()),
                Span::raw(" to send a test request to a deployed model."),
            ]),
        ])
        .block(widgets::bordered(" Quick Actions "));
        f.render_widget(actions, rows[1]);
    }
}

#[cfg(test)]
mod tests {
    use crate::mock::MockApi;
    use crate::tui::app::tests::{app_with, press};
    use crate::tui::app::Route;
    use crate::tui::pages::Page;
    use crossterm::event::KeyCode;

    #[tokio::test]
    async fn loads_totals_on_mount() {
        let mut app = app_with(MockApi::with_fraud_detector());
        app.settle().await;

        let Page::Dashboard(page) = &app.page else { panic!("expected dashboard") };
        assert_eq!(page.stats.models, 2);
        assert_eq!(page.stats.deployed, 1);
        assert_eq!(page.stats.free_ports, 99);
        assert!(!page.loading);
        assert!(page.error.is_none());
    }

    #[tokio::test]
    async fn any_failure_zeroes_the_summary() {
        let api = MockApi::with_fraud_detector();
        api.fail("free_ports");
        let mut app = app_with(api);
        app.settle().await;

        let Page::Dashboard(page) = &app.page else { panic!("expected dashboard") };
        assert_eq!(page.stats.models, 0);
        assert_eq!(page.stats.deployed, 0);
        assert_eq!(
            page.error.as_deref(),
            Some("Error loading dashboard: free_ports unavailable")
        );
    }

    #[tokio::test]
    async fn quick_action_opens_testing() {
        let mut app = app_with(MockApi::with_fraud_detector());
        app.settle().await;
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.page.route(), Route::Testing);
    }
}
