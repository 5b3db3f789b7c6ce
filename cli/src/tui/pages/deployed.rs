use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Row, Table, Wrap},
    Frame,
};
use std::path::PathBuf;

use modeldeck_core::download::initial_report_filename;
use modeldeck_core::generation::{FetchGeneration, Ticket};
use modeldeck_core::models::Confirmation;
use modeldeck_core::report::ReportFile;
use modeldeck_core::{DeployedModel, DeployedModels};

use super::{Action, Preselect};
use crate::tui::app::Route;
use crate::tui::state::{Load, Picker};
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

#[derive(Debug)]
pub enum Msg {
    Listed(Result<DeployedModels, String>),
    Undeployed(Result<Confirmation, String>),
    Report(Ticket, Result<Vec<ReportFile>, String>),
    Downloaded(Result<PathBuf, String>),
}

/// Initial report shown inline.
pub struct ReportView {
    pub title: String,
    pub files: Load<Vec<ReportFile>>,
    pub scroll: u16,
}

pub struct DeployedPage {
    pub deployed: Load<Picker<(String, DeployedModel)>>,
    /// Key awaiting undeploy confirmation.
    pub confirm: Option<String>,
    pub report: Option<ReportView>,
    pub undeploying: bool,
    pub downloading: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    report_generation: FetchGeneration,
}

impl DeployedPage {
    pub fn mount(ctx: &Ctx) -> Self {
        let mut page = Self {
            deployed: Load::Idle,
            confirm: None,
            report: None,
            undeploying: false,
            downloading: false,
            message: None,
            error: None,
            report_generation: FetchGeneration::new(),
        };
        page.refresh(ctx);
        page
    }

    pub fn is_busy(&self) -> bool {
        self.deployed.is_loading()
            || self.undeploying
            || self.downloading
            || self.report.as_ref().is_some_and(|r| r.files.is_loading())
    }

    pub fn refresh(&mut self, ctx: &Ctx) {
        self.deployed = Load::Loading;
        ctx.spawn(|api| async move { Msg::Listed(text(api.deployed_models().await)) });
    }

    fn current(&self) -> Option<&(String, DeployedModel)> {
        self.deployed.ready().and_then(|p| p.current())
    }

    fn preselect(&self) -> Option<Preselect> {
        self.current().map(|(_, model)| Preselect {
            model: model.model_name.clone(),
            version: model.version.clone(),
        })
    }

    fn undeploy(&mut self, ctx: &Ctx) {
        let Some(key) = self.confirm.take() else {
            return;
        };
        self.undeploying = true;
        self.message = None;
        self.error = None;
        ctx.spawn(move |api| async move { Msg::Undeployed(text(api.undeploy(&key).await)) });
    }

    fn view_report(&mut self, ctx: &Ctx) {
        let Some((_, model)) = self.current().cloned() else {
            return;
        };

        let ticket = self.report_generation.advance();
        self.report = Some(ReportView {
            title: format!(" Initial Report: {} ", model.label()),
            files: Load::Loading,
            scroll: 0,
        });
        ctx.spawn(move |api| async move {
            let bundle = api.initial_report(&model.model_name, &model.version).await;
            Msg::Report(ticket, text(bundle.map(|b| b.decode())))
        });
    }

    fn close_report(&mut self) {
        self.report_generation.advance();
        self.report = None;
    }

    fn download_report(&mut self, ctx: &Ctx) {
        let Some((_, model)) = self.current().cloned() else {
            return;
        };

        self.downloading = true;
        self.message = None;
        let sink = ctx.sink().clone();
        ctx.spawn(move |api| async move {
            let saved = match api
                .download_initial_report(&model.model_name, &model.version)
                .await
            {
                Ok(bytes) => sink.save(&initial_report_filename(&model.model_name, &model.version), &bytes),
                Err(e) => Err(e),
            };
            Msg::Downloaded(text(saved))
        });
    }

    pub fn update(&mut self, msg: Msg, ctx: &Ctx) {
        match msg {
            Msg::Listed(result) => {
                if let Err(e) = &result {
                    self.error = Some(e.clone());
                }
                self.deployed = Load::from_result(result.map(|d| Picker::new(d.into_iter().collect())));
            }
            Msg::Undeployed(Ok(confirmation)) => {
                self.undeploying = false;
                self.message = Some(confirmation.message).filter(|m| !m.is_empty());
                self.refresh(ctx);
            }
            Msg::Undeployed(Err(e)) => {
                self.undeploying = false;
                self.error = Some(e);
            }
            Msg::Report(ticket, result) => {
                if !self.report_generation.is_current(ticket) {
                    return;
                }
                match result {
                    Ok(files) => {
                        if let Some(report) = self.report.as_mut() {
                            report.files = Load::Ready(files);
                        }
                    }
                    Err(e) => {
                        self.report = None;
                        self.error = Some(e);
                    }
                }
            }
            Msg::Downloaded(Ok(path)) => {
                self.downloading = false;
                self.message = Some(format!("Report saved to {}", path.display()));
            }
            Msg::Downloaded(Err(e)) => {
                self.downloading = false;
                self.error = Some(format!("Failed to download report: {}", e));
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        if self.confirm.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.undeploy(ctx),
                KeyCode::Char('n') | KeyCode::Esc => self.confirm = None,
                _ => {}
            }
            return None;
        }

        if let Some(report) = self.report.as_mut() {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.close_report(),
                KeyCode::Char('j') | KeyCode::Down => report.scroll = report.scroll.saturating_add(1),
                KeyCode::Char('k') | KeyCode::Up => report.scroll = report.scroll.saturating_sub(1),
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(p) = self.deployed.ready_mut() {
                    p.next();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(p) = self.deployed.ready_mut() {
                    p.previous();
                }
            }
            KeyCode::Char('r') => {
                self.message = None;
                self.error = None;
                self.refresh(ctx);
            }
            KeyCode::Char('u') if !self.undeploying => {
                self.confirm = self.current().map(|(key, _)| key.clone());
            }
            KeyCode::Char('v') => self.view_report(ctx),
            KeyCode::Char('d') if !self.downloading => self.download_report(ctx),
            KeyCode::Char('t') => {
                return self
                    .preselect()
                    .map(|p| Action::Navigate(Route::Testing, Some(p)));
            }
            KeyCode::Char('m') => {
                return self
                    .preselect()
                    .map(|p| Action::Navigate(Route::Metrics, Some(p)));
            }
            _ => {}
        }
        None
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = widgets::with_banner(f, area, self.error.as_deref(), self.message.as_deref());
        let block = widgets::bordered(" Deployed Models ");

        match &self.deployed {
            Load::Ready(picker) if !picker.is_empty() => {
                let rows: Vec<Row> = picker
                    .items()
                    .iter()
                    .enumerate()
                    .map(|(i, (key, model))| {
                        let style = if i == picker.cursor() {
                            widgets::selected_style()
                        } else {
                            Style::default()
                        };
                        Row::new(vec![
                            key.clone(),
                            model.model_name.clone(),
                            model.version.to_string(),
                            model.port.to_string(),
                            model.status().to_string(),
                        ])
                        .style(style)
                    })
                    .collect();

                let table = Table::new(
                    rows,
                    [
                        Constraint::Percentage(30),
                        Constraint::Percentage(30),
                        Constraint::Percentage(12),
                        Constraint::Percentage(12),
                        Constraint::Percentage(16),
                    ],
                )
                .header(
                    Row::new(vec!["Key", "Model", "Version", "Port", "Status"])
                        .style(Style::default().add_modifier(Modifier::BOLD)),
                )
                .block(block);
                f.render_widget(table, area);
            }
            Load::Ready(_) => {
                f.render_widget(
                    Paragraph::new("No models are deployed.")
                        .style(widgets::hint_style())
                        .block(block),
                    area,
                );
            }
            _ => {
                let hint = if self.deployed.is_loading() {
                    "Loading deployed models..."
                } else {
                    "Press r to retry."
                };
                f.render_widget(Paragraph::new(hint).style(widgets::hint_style()).block(block), area);
            }
        }

        if let Some(key) = &self.confirm {
            let inner = widgets::dialog(f, " Confirm Undeploy ", 50, 25);
            let text = vec![
                Line::from(""),
                Line::from(format!("Are you sure you want to undeploy {}?", key)).centered(),
                Line::from(""),
                Line::from(vec![
                    Span::styled("y", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                    Span::raw(": undeploy   "),
                    Span::styled("n", widgets::selected_style()),
                    Span::raw(": cancel"),
                ])
                .centered(),
            ];
            f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
        }

        if let Some(report) = &self.report {
            let inner = widgets::dialog(f, &report.title, 80, 80);
            let lines = match &report.files {
                Load::Ready(files) => widgets::report_lines(files),
                _ => vec![Line::from(Span::styled("Loading report...", widgets::hint_style()))],
            };
            f.render_widget(Paragraph::new(lines).scroll((report.scroll, 0)), inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;
    use crate::tui::app::tests::{app_with, press, TestApp};
    use crate::tui::app::App;
    use crate::tui::pages::Page;

    fn page(app: &App) -> &DeployedPage {
        match &app.page {
            Page::Deployed(page) => page,
            _ => panic!("expected deployed models"),
        }
    }

    async fn deployed_app(api: MockApi) -> TestApp {
        let mut app = app_with(api);
        app.navigate(Route::Deployed, None);
        app.settle().await;
        app
    }

    #[tokio::test]
    async fn undeploy_requires_confirmation_then_relists() {
        let mut app = deployed_app(MockApi::with_fraud_detector()).await;
        assert_eq!(page(&app).deployed.ready().unwrap().items().len(), 1);

        press(&mut app, KeyCode::Char('u'));
        assert_eq!(page(&app).confirm.as_deref(), Some("fraud-detector-3"));
        press(&mut app, KeyCode::Char('n'));
        assert!(page(&app).confirm.is_none());

        press(&mut app, KeyCode::Char('u'));
        press(&mut app, KeyCode::Char('y'));
        app.settle().await;

        let page = page(&app);
        assert!(page.deployed.ready().unwrap().is_empty());
        assert_eq!(page.message.as_deref(), Some("Model fraud-detector-3 undeployed"));
    }

    #[tokio::test]
    async fn report_failure_closes_the_view() {
        let api = MockApi::with_fraud_detector();
        api.fail("initial_report");
        let mut app = deployed_app(api).await;

        press(&mut app, KeyCode::Char('v'));
        assert!(app.page.captures_input());
        app.settle().await;

        assert!(page(&app).report.is_none());
        assert_eq!(page(&app).error.as_deref(), Some("initial_report unavailable"));
    }

    #[tokio::test]
    async fn report_view_decodes_files() {
        let mut app = deployed_app(MockApi::with_fraud_detector()).await;
        press(&mut app, KeyCode::Char('v'));
        app.settle().await;

        let report = page(&app).report.as_ref().unwrap();
        let files = report.files.ready().unwrap();
        assert_eq!(files[0].filename(), "summary.json");
    }

    #[tokio::test]
    async fn download_failure_keeps_the_listing() {
        let api = MockApi::with_fraud_detector();
        api.fail("download_initial_report");
        let mut app = deployed_app(api).await;

        press(&mut app, KeyCode::Char('d'));
        app.settle().await;

        let page = page(&app);
        assert_eq!(
            page.error.as_deref(),
            Some("Failed to download report: download_initial_report unavailable")
        );
        assert_eq!(page.deployed.ready().unwrap().items().len(), 1);
    }

    #[tokio::test]
    async fn test_shortcut_preselects_the_row() {
        let mut app = deployed_app(MockApi::with_fraud_detector()).await;
        press(&mut app, KeyCode::Char('t'));
        app.settle().await;

        let Page::Testing(testing) = &app.page else { panic!("expected testing") };
        assert_eq!(testing.selected_model(), Some("fraud-detector"));
        assert_eq!(testing.selected_version().map(|v| v.as_str()), Some("3"));
    }
}
