use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Paragraph,
    Frame,
};
use std::path::PathBuf;

use modeldeck_core::download::degradation_report_filename;
use modeldeck_core::{DeployedModel, DeployedModels};

use super::Action;
use crate::tui::state::{Load, Picker};
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

#[derive(Debug)]
pub enum Msg {
    Deployed(Result<DeployedModels, String>),
    Saved(Result<PathBuf, String>),
}

pub struct DegradationPage {
    pub deployed: Load<Picker<(String, DeployedModel)>>,
    pub downloading: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl DegradationPage {
    pub fn mount(ctx: &Ctx) -> Self {
        ctx.spawn(|api| async move { Msg::Deployed(text(api.deployed_models().await)) });
        Self {
            deployed: Load::Loading,
            downloading: false,
            message: None,
            error: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.downloading || self.deployed.is_loading()
    }

    fn download(&mut self, ctx: &Ctx) {
        if self.downloading {
            return;
        }
        let Some((key, model)) = self.deployed.ready().and_then(|p| p.current()).cloned() else {
            self.error = Some("Please select a model first.".to_string());
            return;
        };

        self.downloading = true;
        self.message = None;
        self.error = None;
        let sink = ctx.sink().clone();
        ctx.spawn(move |api| async move {
            let saved = match api
                .download_degradation_report(&model.model_name, &model.version)
                .await
            {
                Ok(bytes) => sink.save(&degradation_report_filename(&key), &bytes),
                Err(e) => Err(e),
            };
            Msg::Saved(text(saved))
        });
    }

    pub fn update(&mut self, msg: Msg) {
        match msg {
            Msg::Deployed(result) => {
                if let Err(e) = &result {
                    tracing::warn!("Failed to fetch deployed models: {}", e);
                    self.error = Some("Failed to fetch deployed models. Please try again.".to_string());
                }
                self.deployed = Load::from_result(result.map(|d| Picker::new(d.into_iter().collect())));
            }
            Msg::Saved(Ok(path)) => {
                self.downloading = false;
                tracing::info!("Degradation report saved to {}", path.display());
                self.message = Some("Degradation report downloaded successfully!".to_string());
            }
            Msg::Saved(Err(e)) => {
                self.downloading = false;
                tracing::warn!("Degradation report download failed: {}", e);
                self.error = Some("Failed to download degradation report. Please try again.".to_string());
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
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
            KeyCode::Enter | KeyCode::Char('d') => self.download(ctx),
            _ => {}
        }
        None
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = widgets::with_banner(f, area, self.error.as_deref(), self.message.as_deref());
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(3)])
            .split(area);

        widgets::draw_load_picker(
            f,
            rows[0],
            " Deployed Models ",
            &self.deployed,
            |(key, m)| format!("{}  (port {})", key, m.port),
            true,
            "No models are deployed.",
        );

        let hint = if self.downloading {
            "Downloading...".to_string()
        } else {
            match self.deployed.ready().and_then(|p| p.current()) {
                Some((key, _)) => format!("Enter: download {}", degradation_report_filename(key)),
                None => "Select a deployed model.".to_string(),
            }
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(widgets::hint_style())
                .block(widgets::bordered(" Degradation Report ")),
            rows[1],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;
    use crate::tui::app::tests::{app_with, press};
    use crate::tui::app::{App, Route};
    use crate::tui::pages::Page;

    fn page(app: &App) -> &DegradationPage {
        match &app.page {
            Page::Degradation(page) => page,
            _ => panic!("expected degradation report"),
        }
    }

    #[tokio::test]
    async fn saves_zip_named_after_the_key() {
        let mut app = app_with(MockApi::with_fraud_detector());
        app.navigate(Route::Degradation, None);
        app.settle().await;

        press(&mut app, KeyCode::Enter);
        app.settle().await;

        assert_eq!(
            page(&app).message.as_deref(),
            Some("Degradation report downloaded successfully!")
        );
        let saved = app.ctx.sink().dir().join("fraud-detector-3-degradation-report.zip");
        assert_eq!(std::fs::read(saved).unwrap(), b"PK-degradation");
    }

    #[tokio::test]
    async fn nothing_deployed_asks_for_a_selection() {
        let mut app = app_with(MockApi::default());
        app.navigate(Route::Degradation, None);
        app.settle().await;

        press(&mut app, KeyCode::Enter);
        assert_eq!(page(&app).error.as_deref(), Some("Please select a model first."));
    }

    #[tokio::test]
    async fn failures_use_fixed_messages() {
        let api = MockApi::with_fraud_detector();
        api.fail("download_degradation_report");
        let mut app = app_with(api);
        app.navigate(Route::Degradation, None);
        app.settle().await;

        press(&mut app, KeyCode::Enter);
        app.settle().await;
        assert_eq!(
            page(&app).error.as_deref(),
            Some("Failed to download degradation report. Please try again.")
        );
    }
}
