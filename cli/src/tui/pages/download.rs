use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::Paragraph,
    Frame,
};
use std::path::PathBuf;

use modeldeck_core::download::dataset_filename;
use modeldeck_core::generation::{FetchGeneration, Ticket};
use modeldeck_core::{DateRange, ModelVersion};

use super::Action;
use crate::tui::state::{Load, Picker};
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

#[derive(Debug)]
pub enum Msg {
    Models(Result<Vec<String>, String>),
    Versions(Ticket, Result<Vec<ModelVersion>, String>),
    Saved(Result<PathBuf, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Models,
    Versions,
}

pub struct DownloadPage {
    pub models: Load<Picker<String>>,
    pub versions: Load<Picker<ModelVersion>>,
    pub focus: Focus,
    pub downloading: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    selected_model: Option<String>,
    generation: FetchGeneration,
}

impl DownloadPage {
    pub fn mount(ctx: &Ctx) -> Self {
        ctx.spawn(|api| async move { Msg::Models(text(api.list_models().await)) });
        Self {
            models: Load::Loading,
            versions: Load::Idle,
            focus: Focus::Models,
            downloading: false,
            message: None,
            error: None,
            selected_model: None,
            generation: FetchGeneration::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.downloading || self.models.is_loading() || self.versions.is_loading()
    }

    fn select_model(&mut self, model: String, ctx: &Ctx) {
        let ticket = self.generation.advance();
        self.versions = Load::Loading;
        self.message = None;
        self.error = None;
        self.selected_model = Some(model.clone());
        ctx.spawn(move |api| async move { Msg::Versions(ticket, text(api.list_versions(&model).await)) });
    }

    fn download(&mut self, ctx: &Ctx) {
        let (Some(model), Some(version)) = (
            self.selected_model.clone(),
            self.versions.ready().and_then(|p| p.current()).cloned(),
        ) else {
            return;
        };
        if self.downloading {
            return;
        }

        self.downloading = true;
        self.message = None;
        self.error = None;
        let sink = ctx.sink().clone();
        ctx.spawn(move |api| async move {
            let saved = match api.download_dataset(&model, &version, &DateRange::default()).await {
                Ok(bytes) => sink.save(&dataset_filename(&model, &version), &bytes),
                Err(e) => Err(e),
            };
            Msg::Saved(text(saved))
        });
    }

    pub fn update(&mut self, msg: Msg) {
        match msg {
            Msg::Models(result) => {
                if result.is_err() {
                    self.error = Some("Failed to fetch models".to_string());
                }
                self.models = Load::from_result(result.map(Picker::new));
            }
            Msg::Versions(ticket, result) => {
                if !self.generation.is_current(ticket) {
                    return;
                }
                if result.is_err() {
                    self.error = Some("Failed to fetch versions".to_string());
                }
                self.versions = Load::from_result(result.map(Picker::new));
            }
            Msg::Saved(result) => {
                self.downloading = false;
                match result {
                    Ok(path) => self.message = Some(format!("Dataset saved to {}", path.display())),
                    Err(e) => self.error = Some(e),
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        match (self.focus, key.code) {
            (_, KeyCode::Tab) | (_, KeyCode::BackTab) => {
                self.focus = match self.focus {
                    Focus::Models => Focus::Versions,
                    Focus::Versions => Focus::Models,
                };
            }
            (Focus::Models, KeyCode::Char('j') | KeyCode::Down) => {
                if let Some(p) = self.models.ready_mut() {
                    p.next();
                }
            }
            (Focus::Models, KeyCode::Char('k') | KeyCode::Up) => {
                if let Some(p) = self.models.ready_mut() {
                    p.previous();
                }
            }
            (Focus::Models, KeyCode::Enter) => {
                if let Some(model) = self.models.ready().and_then(|p| p.current()).cloned() {
                    self.select_model(model, ctx);
                    self.focus = Focus::Versions;
                }
            }
            (Focus::Versions, KeyCode::Char('j') | KeyCode::Down) => {
                if let Some(p) = self.versions.ready_mut() {
                    p.next();
                }
            }
            (Focus::Versions, KeyCode::Char('k') | KeyCode::Up) => {
                if let Some(p) = self.versions.ready_mut() {
                    p.previous();
                }
            }
            (Focus::Versions, KeyCode::Enter | KeyCode::Char('d')) => self.download(ctx),
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
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        widgets::draw_load_picker(
            f,
            columns[0],
            " Model ",
            &self.models,
            String::clone,
            self.focus == Focus::Models,
            "No models found in registry",
        );
        widgets::draw_load_picker(
            f,
            columns[1],
            " Version ",
            &self.versions,
            |v| format!("Version {}", v),
            self.focus == Focus::Versions,
            "No versions available",
        );

        let hint = match (&self.selected_model, self.versions.ready().and_then(|p| p.current())) {
            _ if self.downloading => "Downloading...".to_string(),
            (Some(model), Some(version)) => {
                format!("Enter: download {}", dataset_filename(model, version))
            }
            _ => "Select a model and version to download its dataset.".to_string(),
        };
        f.render_widget(
            Paragraph::new(Line::from(hint))
                .style(widgets::hint_style())
                .block(widgets::bordered(" Dataset Download ")),
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

    fn page(app: &App) -> &DownloadPage {
        match &app.page {
            Page::Download(page) => page,
            _ => panic!("expected dataset download"),
        }
    }

    #[tokio::test]
    async fn downloads_csv_for_selected_version() {
        let mut app = app_with(MockApi::with_fraud_detector());
        app.navigate(Route::Download, None);
        app.settle().await;

        press(&mut app, KeyCode::Enter);
        app.settle().await;
        press(&mut app, KeyCode::Enter);
        app.settle().await;

        let page = page(&app);
        let message = page.message.as_deref().unwrap();
        assert!(message.ends_with("fraud-detector-1-dataset.csv"), "{}", message);
        let saved = app.ctx.sink().dir().join("fraud-detector-1-dataset.csv");
        assert_eq!(std::fs::read(saved).unwrap(), b"amount,score\n10.0,0.1\n");
    }

    #[tokio::test]
    async fn version_failure_uses_fixed_message() {
        let api = MockApi::with_fraud_detector();
        api.fail("list_versions");
        let mut app = app_with(api);
        app.navigate(Route::Download, None);
        app.settle().await;

        press(&mut app, KeyCode::Enter);
        app.settle().await;
        assert_eq!(page(&app).error.as_deref(), Some("Failed to fetch versions"));
    }
}
