use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

use modeldeck_core::generation::{FetchGeneration, Ticket};
use modeldeck_core::models::Confirmation;
use modeldeck_core::{DeployedModels, ModelVersion};

use super::Action;
use crate::tui::state::{Load, Picker};
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

#[derive(Debug)]
pub enum Msg {
    Listed(Result<(Vec<String>, DeployedModels), String>),
    Versions(Ticket, Result<Vec<ModelVersion>, String>),
    Deployed(Result<Confirmation, String>),
}

/// Version picker shown after choosing a model to deploy.
pub struct DeployDialog {
    pub model: String,
    pub versions: Load<Picker<ModelVersion>>,
    pub num_classes: String,
    pub submitting: bool,
    pub error: Option<String>,
}

pub struct ModelsPage {
    pub models: Load<Picker<String>>,
    pub deployed: DeployedModels,
    pub dialog: Option<DeployDialog>,
    pub message: Option<String>,
    pub error: Option<String>,
    versions_generation: FetchGeneration,
}

impl ModelsPage {
    pub fn mount(ctx: &Ctx) -> Self {
        let mut page = Self {
            models: Load::Idle,
            deployed: DeployedModels::new(),
            dialog: None,
            message: None,
            error: None,
            versions_generation: FetchGeneration::new(),
        };
        page.refresh(ctx);
        page
    }

    pub fn is_busy(&self) -> bool {
        self.models.is_loading()
            || self
                .dialog
                .as_ref()
                .is_some_and(|d| d.submitting || d.versions.is_loading())
    }

    /// Re-fetch the registry listing and what is deployed from it.
    pub fn refresh(&mut self, ctx: &Ctx) {
        self.models = Load::Loading;
        ctx.spawn(|api| async move {
            let listing = tokio::try_join!(api.list_models(), api.deployed_models());
            Msg::Listed(text(listing))
        });
    }

    fn open_dialog(&mut self, ctx: &Ctx) {
        let Some(model) = self.models.ready().and_then(|p| p.current()).cloned() else {
            return;
        };

        let ticket = self.versions_generation.advance();
        let name = model.clone();
        ctx.spawn(move |api| async move { Msg::Versions(ticket, text(api.list_versions(&name).await)) });

        self.message = None;
        self.dialog = Some(DeployDialog {
            model,
            versions: Load::Loading,
            num_classes: String::new(),
            submitting: false,
            error: None,
        });
    }

    fn close_dialog(&mut self) {
        self.versions_generation.advance();
        self.dialog = None;
    }

    fn deploy(&mut self, ctx: &Ctx) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        if dialog.submitting {
            return;
        }
        let Some(version) = dialog.versions.ready().and_then(|p| p.current()).cloned() else {
            return;
        };

        let num_classes = match dialog.num_classes.trim() {
            "" => None,
            n => match n.parse::<u32>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    dialog.error = Some("Number of classes must be a positive integer".to_string());
                    return;
                }
            },
        };

        dialog.submitting = true;
        dialog.error = None;
        let model = dialog.model.clone();
        ctx.spawn(move |api| async move {
            Msg::Deployed(text(api.deploy(&model, &version, num_classes).await))
        });
    }

    pub fn update(&mut self, msg: Msg, ctx: &Ctx) {
        match msg {
            Msg::Listed(Ok((models, deployed))) => {
                let mut picker = Picker::new(models);
                if let Some(current) = self.models.ready().and_then(|p| p.current()) {
                    let current = current.clone();
                    picker.select_where(|m| *m == current);
                }
                self.models = Load::Ready(picker);
                self.deployed = deployed;
                self.error = None;
            }
            Msg::Listed(Err(e)) => {
                self.models = Load::Failed(e.clone());
                self.error = Some(e);
            }
            Msg::Versions(ticket, result) => {
                if !self.versions_generation.is_current(ticket) {
                    tracing::debug!("Ignoring versions for a closed dialog");
                    return;
                }
                match result {
                    Ok(versions) => {
                        if let Some(dialog) = self.dialog.as_mut() {
                            dialog.versions = Load::Ready(Picker::new(versions));
                        }
                    }
                    Err(e) => {
                        self.dialog = None;
                        self.error = Some(e);
                    }
                }
            }
            Msg::Deployed(Ok(confirmation)) => {
                let label = self
                    .dialog
                    .take()
                    .map(|d| d.model)
                    .unwrap_or_default();
                self.message = Some(if confirmation.message.is_empty() {
                    format!("Deployed {}", label)
                } else {
                    confirmation.message
                });
                self.error = None;
                self.refresh(ctx);
            }
            Msg::Deployed(Err(e)) => match self.dialog.as_mut() {
                Some(dialog) => {
                    dialog.submitting = false;
                    dialog.error = Some(e);
                }
                None => self.error = Some(e),
            },
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        if let Some(dialog) = self.dialog.as_mut() {
            match key.code {
                KeyCode::Esc if !dialog.submitting => self.close_dialog(),
                KeyCode::Char('j') | KeyCode::Down => {
                    if let Some(p) = dialog.versions.ready_mut() {
                        p.next();
                    }
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    if let Some(p) = dialog.versions.ready_mut() {
                        p.previous();
                    }
                }
                KeyCode::Char(c) if c.is_ascii_digit() => dialog.num_classes.push(c),
                KeyCode::Backspace => {
                    dialog.num_classes.pop();
                }
                KeyCode::Enter => self.deploy(ctx),
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(p) = self.models.ready_mut() {
                    p.next();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(p) = self.models.ready_mut() {
                    p.previous();
                }
            }
            KeyCode::Char('r') => {
                self.message = None;
                self.refresh(ctx);
            }
            KeyCode::Enter | KeyCode::Char('d') => self.open_dialog(ctx),
            _ => {}
        }
        None
    }

    fn deployed_versions(&self, model: &str) -> Vec<String> {
        self.deployed
            .values()
            .filter(|d| d.model_name == model)
            .map(|d| format!("v{}", d.version))
            .collect()
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = widgets::with_banner(f, area, self.error.as_deref(), self.message.as_deref());

        match &self.models {
            Load::Ready(picker) if picker.is_empty() => {
                let empty = Paragraph::new(vec![
                    Line::from(""),
                    Line::from("No models found in registry").centered(),
                ])
                .block(widgets::bordered(" Model Management "));
                f.render_widget(empty, area);
            }
            Load::Ready(picker) => {
                let items: Vec<ListItem> = picker
                    .items()
                    .iter()
                    .enumerate()
                    .map(|(i, model)| {
                        let style = if i == picker.cursor() {
                            widgets::selected_style()
                        } else {
                            Style::default()
                        };
                        let running = self.deployed_versions(model);
                        let mut spans = vec![
                            Span::styled(if i == picker.cursor() { "> " } else { "  " }, style),
                            Span::styled(model.clone(), style),
                        ];
                        if !running.is_empty() {
                            spans.push(Span::raw("  "));
                            spans.push(Span::styled(
                                format!("deployed: {}", running.join(", ")),
                                Style::default().fg(Color::Green),
                            ));
                        }
                        ListItem::new(Line::from(spans))
                    })
                    .collect();
                f.render_widget(
                    List::new(items).block(widgets::bordered(" Model Management (Enter: deploy) ")),
                    area,
                );
            }
            Load::Loading | Load::Idle => {
                f.render_widget(
                    Paragraph::new("Loading models...")
                        .style(widgets::hint_style())
                        .block(widgets::bordered(" Model Management ")),
                    area,
                );
            }
            Load::Failed(_) => {
                f.render_widget(
                    Paragraph::new("Press r to retry.")
                        .style(widgets::hint_style())
                        .block(widgets::bordered(" Model Management ")),
                    area,
                );
            }
        }

        if let Some(dialog) = &self.dialog {
            self.draw_dialog(f, dialog);
        }
    }

    fn draw_dialog(&self, f: &mut Frame, dialog: &DeployDialog) {
        let inner = widgets::dialog(f, &format!(" Deploy {} ", dialog.model), 50, 60);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(2),
            ])
            .split(inner);

        widgets::draw_load_picker(
            f,
            chunks[0],
            " Version ",
            &dialog.versions,
            |v| format!("Version {}", v),
            true,
            "No versions available",
        );
        f.render_widget(
            widgets::text_field(" Number of classes (optional) ", &dialog.num_classes, "backend default", false),
            chunks[1],
        );

        let status = if dialog.submitting {
            vec![Line::from(Span::styled("Deploying...", Style::default().fg(Color::Yellow)))]
        } else {
            widgets::banner_lines(dialog.error.as_deref(), None)
        };
        f.render_widget(Paragraph::new(status), chunks[2]);
    }
}
