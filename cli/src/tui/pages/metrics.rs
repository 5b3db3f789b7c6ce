use crossterm::event::{KeyCode, KeyEvent};
use futures_util::future::join_all;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};
use std::path::PathBuf;
use std::sync::Arc;

use modeldeck_core::download::dataset_filename;
use modeldeck_core::generation::{FetchGeneration, Ticket};
use modeldeck_core::json_input::JsonInput;
use modeldeck_core::metrics::{compare_snapshots, sort_snapshot_names};
use modeldeck_core::{
    parse_date, DateRange, DeployedModel, DeployedModels, MetricsSnapshot, ModelApi, ModelVersion,
    NewMetrics, SnapshotName,
};

use super::{Action, Preselect};
use crate::tui::state::{Load, Picker};
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

/// Historical snapshots listed before the "+N more" line.
const HISTORY_PREVIEW: usize = 5;

#[derive(Debug)]
pub enum Msg {
    Deployed(Result<DeployedModels, String>),
    Current(Ticket, Result<MetricsSnapshot, String>),
    History(Ticket, Vec<HistoryEntry>),
    Submitted(Result<MetricsSnapshot, String>),
    DatasetSaved(Result<PathBuf, String>),
}

/// A historical snapshot name and its content, if it loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub name: SnapshotName,
    pub metrics: Option<MetricsSnapshot>,
}

pub struct UpdateForm {
    pub instances: JsonInput,
    pub results: JsonInput,
    pub timestamp: String,
    pub field: usize,
    pub submitting: bool,
    pub error: Option<String>,
}

impl UpdateForm {
    fn new() -> Self {
        Self {
            instances: JsonInput::new(true),
            results: JsonInput::new(true),
            timestamp: String::new(),
            field: 0,
            submitting: false,
            error: None,
        }
    }

    /// Validate everything locally; nothing is sent unless this succeeds.
    fn body(&self) -> Result<NewMetrics, String> {
        let (Some(instances), Some(results)) = (self.instances.value(), self.results.value()) else {
            return Err(
                if self.instances.text().trim().is_empty() || self.results.text().trim().is_empty() {
                    "Please fill in all required fields".to_string()
                } else {
                    let (field, input) = if self.instances.is_valid() {
                        ("results", &self.results)
                    } else {
                        ("instances", &self.instances)
                    };
                    format!("{}: {}", field, input.error().unwrap_or("Invalid JSON"))
                },
            );
        };

        let timestamp = match self.timestamp.trim() {
            "" => None,
            text => match text.parse::<f64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    let date = parse_date(text).map_err(|e| e.to_string())?;
                    Some(date.timestamp_millis() as f64 / 1000.0)
                }
            },
        };

        NewMetrics::new(instances, results, timestamp).map_err(|e| e.to_string())
    }
}

pub struct DatasetForm {
    pub start: String,
    pub end: String,
    pub field: usize,
    pub downloading: bool,
    pub error: Option<String>,
}

pub enum Dialog {
    Update(UpdateForm),
    Dataset(DatasetForm),
    /// Comparison against the loaded snapshot at this index of the history.
    Compare(usize),
    Snapshot(usize),
}

pub struct MetricsPage {
    pub deployed: Load<Picker<(String, DeployedModel)>>,
    pub current: Load<MetricsSnapshot>,
    pub history: Load<Vec<HistoryEntry>>,
    pub history_cursor: usize,
    pub dialog: Option<Dialog>,
    pub message: Option<String>,
    pub error: Option<String>,
    preselect: Option<Preselect>,
    generation: FetchGeneration,
}

async fn load_history(api: Arc<dyn ModelApi>, model: String, version: ModelVersion) -> Vec<HistoryEntry> {
    let names = match api.snapshot_names(&model, &version).await {
        Ok(files) => sort_snapshot_names(&files),
        Err(e) => {
            tracing::warn!("No historical metrics found or error fetching: {}", e);
            return Vec::new();
        }
    };

    let loaded = join_all(
        names
            .iter()
            .map(|name| api.snapshot(&model, &version, &name.filename)),
    )
    .await;

    names
        .into_iter()
        .zip(loaded)
        .map(|(name, result)| {
            let metrics = match result {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::warn!("Failed to fetch metrics for {}: {}", name.filename, e);
                    None
                }
            };
            HistoryEntry { name, metrics }
        })
        .collect()
}

impl MetricsPage {
    pub fn mount(ctx: &Ctx, preselect: Option<Preselect>) -> Self {
        let page = Self {
            deployed: Load::Loading,
            current: Load::Idle,
            history: Load::Idle,
            history_cursor: 0,
            dialog: None,
            message: None,
            error: None,
            preselect,
            generation: FetchGeneration::new(),
        };
        ctx.spawn(|api| async move { Msg::Deployed(text(api.deployed_models().await)) });
        page
    }

    pub fn is_busy(&self) -> bool {
        let dialog_busy = match &self.dialog {
            Some(Dialog::Update(form)) => form.submitting,
            Some(Dialog::Dataset(form)) => form.downloading,
            _ => false,
        };
        dialog_busy || self.deployed.is_loading() || self.current.is_loading() || self.history.is_loading()
    }

    pub fn selected(&self) -> Option<&DeployedModel> {
        self.deployed.ready().and_then(|p| p.current()).map(|(_, m)| m)
    }

    /// Loaded snapshots, newest first, with their index in the history.
    fn loaded(&self) -> Vec<(usize, &SnapshotName, &MetricsSnapshot)> {
        self.history
            .ready()
            .map(|entries| {
                entries
                    .iter()
                    .enumerate()
                    .filter_map(|(i, e)| e.metrics.as_ref().map(|m| (i, &e.name, m)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn can_compare(&self) -> bool {
        self.current.ready().is_some() && !self.loaded().is_empty()
    }

    /// Fetch current metrics and history for the selected model.
    fn load_selected(&mut self, ctx: &Ctx) {
        let Some(model) = self.selected().cloned() else {
            return;
        };
        let ticket = self.generation.advance();
        self.current = Load::Loading;
        self.history = Load::Loading;
        self.history_cursor = 0;

        let DeployedModel {
            model_name, version, ..
        } = model;
        let (name, v) = (model_name.clone(), version.clone());
        ctx.spawn(move |api| async move {
            Msg::Current(ticket, text(api.current_metrics(&name, &v).await))
        });
        ctx.spawn(move |api| async move {
            Msg::History(ticket, load_history(api, model_name, version).await)
        });
    }

    fn submit(&mut self, ctx: &Ctx) {
        let Some(model) = self.selected().cloned() else {
            return;
        };
        let Some(Dialog::Update(form)) = self.dialog.as_mut() else {
            return;
        };
        if form.submitting {
            return;
        }

        let body = match form.body() {
            Ok(body) => body,
            Err(e) => {
                form.error = Some(e);
                return;
            }
        };
        form.submitting = true;
        form.error = None;
        ctx.spawn(move |api| async move {
            Msg::Submitted(text(
                api.submit_metrics(&model.model_name, &model.version, &body).await,
            ))
        });
    }

    fn download_dataset(&mut self, ctx: &Ctx) {
        let Some(model) = self.selected().cloned() else {
            return;
        };
        let Some(Dialog::Dataset(form)) = self.dialog.as_mut() else {
            return;
        };
        if form.downloading {
            return;
        }

        let range = match DateRange::parse(Some(&form.start), Some(&form.end)) {
            Ok(range) => range,
            Err(e) => {
                form.error = Some(e.to_string());
                return;
            }
        };
        form.downloading = true;
        form.error = None;

        let sink = ctx.sink().clone();
        ctx.spawn(move |api| async move {
            let saved = match api
                .download_dataset(&model.model_name, &model.version, &range)
                .await
            {
                Ok(bytes) => sink.save(&dataset_filename(&model.model_name, &model.version), &bytes),
                Err(e) => Err(e),
            };
            Msg::DatasetSaved(text(saved))
        });
    }

    pub fn update(&mut self, msg: Msg, ctx: &Ctx) {
        match msg {
            Msg::Deployed(Ok(deployed)) => {
                let mut picker = Picker::new(deployed.into_iter().collect::<Vec<_>>());
                if let Some(preselect) = self.preselect.take() {
                    picker.select_where(|(_, m)| {
                        m.model_name == preselect.model && m.version == preselect.version
                    });
                }
                self.deployed = Load::Ready(picker);
                self.load_selected(ctx);
            }
            Msg::Deployed(Err(e)) => {
                self.error = Some(format!("Failed to fetch deployed models: {}", e));
                self.deployed = Load::Failed(e);
            }
            Msg::Current(ticket, result) => {
                if !self.generation.is_current(ticket) {
                    return;
                }
                if let Err(e) = &result {
                    self.error = Some(format!("Failed to fetch metrics: {}", e));
                }
                self.current = Load::from_result(result);
            }
            Msg::History(ticket, entries) => {
                if !self.generation.is_current(ticket) {
                    return;
                }
                self.history = Load::Ready(entries);
            }
            Msg::Submitted(Ok(_)) => {
                self.dialog = None;
                self.error = None;
                self.message = Some("Metrics updated successfully!".to_string());
                self.load_selected(ctx);
            }
            Msg::Submitted(Err(e)) => match self.dialog.as_mut() {
                Some(Dialog::Update(form)) => {
                    form.submitting = false;
                    form.error = Some(format!("Failed to update metrics: {}", e));
                }
                _ => self.error = Some(format!("Failed to update metrics: {}", e)),
            },
            Msg::DatasetSaved(Ok(path)) => {
                if matches!(self.dialog, Some(Dialog::Dataset(_))) {
                    self.dialog = None;
                }
                self.message = Some(format!(
                    "Dataset downloaded successfully! Saved to {}",
                    path.display()
                ));
            }
            Msg::DatasetSaved(Err(e)) => match self.dialog.as_mut() {
                Some(Dialog::Dataset(form)) => {
                    form.downloading = false;
                    form.error = Some(format!("Failed to download dataset: {}", e));
                }
                _ => self.error = Some(format!("Failed to download dataset: {}", e)),
            },
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        if self.dialog.is_some() {
            self.dialog_key(key, ctx);
            return None;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(p) = self.deployed.ready_mut() {
                    p.next();
                    self.message = None;
                    self.error = None;
                    self.load_selected(ctx);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(p) = self.deployed.ready_mut() {
                    p.previous();
                    self.message = None;
                    self.error = None;
                    self.load_selected(ctx);
                }
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.history_cursor = self.history_cursor.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                let shown = self.history.ready().map_or(0, |h| h.len().min(HISTORY_PREVIEW));
                if self.history_cursor + 1 < shown {
                    self.history_cursor += 1;
                }
            }
            KeyCode::Char('r') => {
                self.message = None;
                self.error = None;
                self.load_selected(ctx);
            }
            KeyCode::Char('v') | KeyCode::Enter => {
                let loaded = self
                    .history
                    .ready()
                    .and_then(|h| h.get(self.history_cursor))
                    .is_some_and(|e| e.metrics.is_some());
                if loaded {
                    self.dialog = Some(Dialog::Snapshot(self.history_cursor));
                }
            }
            KeyCode::Char('c') if self.can_compare() => {
                let loaded = self.loaded();
                let index = loaded
                    .iter()
                    .find(|(i, _, _)| *i == self.history_cursor)
                    .or_else(|| loaded.first())
                    .map(|(i, _, _)| *i);
                self.dialog = index.map(Dialog::Compare);
            }
            KeyCode::Char('u') if self.selected().is_some() => {
                self.dialog = Some(Dialog::Update(UpdateForm::new()));
            }
            KeyCode::Char('s') if self.selected().is_some() => {
                self.dialog = Some(Dialog::Dataset(DatasetForm {
                    start: String::new(),
                    end: String::new(),
                    field: 0,
                    downloading: false,
                    error: None,
                }));
            }
            _ => {}
        }
        None
    }

    fn dialog_key(&mut self, key: KeyEvent, ctx: &Ctx) {
        let loaded: Vec<usize> = self.loaded().iter().map(|(i, _, _)| *i).collect();
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };

        match dialog {
            Dialog::Update(form) => match key.code {
                KeyCode::Esc if !form.submitting => self.dialog = None,
                KeyCode::Tab => form.field = (form.field + 1) % 3,
                KeyCode::BackTab => form.field = (form.field + 2) % 3,
                KeyCode::Enter => self.submit(ctx),
                KeyCode::Backspace => match form.field {
                    0 => form.instances.pop(),
                    1 => form.results.pop(),
                    _ => {
                        form.timestamp.pop();
                    }
                },
                KeyCode::Char(c) => match form.field {
                    0 => form.instances.push(c),
                    1 => form.results.push(c),
                    _ => form.timestamp.push(c),
                },
                _ => {}
            },
            Dialog::Dataset(form) => match key.code {
                KeyCode::Esc if !form.downloading => self.dialog = None,
                KeyCode::Tab | KeyCode::BackTab => form.field = (form.field + 1) % 2,
                KeyCode::Enter => self.download_dataset(ctx),
                KeyCode::Backspace => {
                    if form.field == 0 {
                        form.start.pop();
                    } else {
                        form.end.pop();
                    }
                }
                KeyCode::Char(c) => {
                    if form.field == 0 {
                        form.start.push(c);
                    } else {
                        form.end.push(c);
                    }
                }
                _ => {}
            },
            Dialog::Compare(index) => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.dialog = None,
                KeyCode::Right | KeyCode::Char('l') => {
                    if let Some(pos) = loaded.iter().position(|i| *i == *index) {
                        *index = loaded[(pos + 1) % loaded.len()];
                    }
                }
                KeyCode::Left | KeyCode::Char('h') => {
                    if let Some(pos) = loaded.iter().position(|i| *i == *index) {
                        *index = loaded[(pos + loaded.len() - 1) % loaded.len()];
                    }
                }
                _ => {}
            },
            Dialog::Snapshot(_) => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
                    self.dialog = None;
                }
            }
        }
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = widgets::with_banner(f, area, self.error.as_deref(), self.message.as_deref());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(area);

        widgets::draw_load_picker(
            f,
            columns[0],
            " Deployed Models ",
            &self.deployed,
            |(_, m)| m.label(),
            true,
            "No models are deployed.",
        );

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(HISTORY_PREVIEW as u16 + 3)])
            .split(columns[1]);

        match &self.current {
            Load::Ready(metrics) if !metrics.is_empty() => {
                f.render_widget(widgets::metrics_table(metrics, " Current Metrics "), right[0]);
            }
            other => {
                let hint = match other {
                    Load::Loading => "Loading metrics...",
                    Load::Failed(_) => "Metrics unavailable",
                    Load::Ready(_) => "No metrics recorded.",
                    Load::Idle => "Select a deployed model.",
                };
                f.render_widget(
                    Paragraph::new(hint)
                        .style(widgets::hint_style())
                        .block(widgets::bordered(" Current Metrics ")),
                    right[0],
                );
            }
        }

        self.draw_history(f, right[1]);

        match &self.dialog {
            Some(Dialog::Update(form)) => draw_update(f, form),
            Some(Dialog::Dataset(form)) => draw_dataset(f, form),
            Some(Dialog::Compare(index)) => self.draw_compare(f, *index),
            Some(Dialog::Snapshot(index)) => self.draw_snapshot(f, *index),
            None => {}
        }
    }

    fn draw_history(&self, f: &mut Frame, area: Rect) {
        let title = if self.can_compare() {
            " Historical Metrics (←/→ select, v view, c compare) "
        } else {
            " Historical Metrics "
        };

        let entries = match &self.history {
            Load::Ready(entries) if !entries.is_empty() => entries,
            other => {
                let hint = if other.is_loading() {
                    "Loading history..."
                } else {
                    "No historical metrics available."
                };
                f.render_widget(
                    Paragraph::new(hint)
                        .style(widgets::hint_style())
                        .block(widgets::bordered(title)),
                    area,
                );
                return;
            }
        };

        let mut items: Vec<ListItem> = entries
            .iter()
            .take(HISTORY_PREVIEW)
            .enumerate()
            .map(|(i, entry)| {
                let style = if i == self.history_cursor {
                    widgets::selected_style()
                } else {
                    Style::default()
                };
                let mut spans = vec![
                    Span::styled(if i == self.history_cursor { "> " } else { "  " }, style),
                    Span::styled(entry.name.label(), style),
                ];
                if entry.metrics.is_none() {
                    spans.push(Span::styled("  (unavailable)", widgets::hint_style()));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        if entries.len() > HISTORY_PREVIEW {
            items.push(ListItem::new(Span::styled(
                format!("  +{} more available", entries.len() - HISTORY_PREVIEW),
                widgets::hint_style(),
            )));
        }

        f.render_widget(List::new(items).block(widgets::bordered(title)), area);
    }

    fn draw_compare(&self, f: &mut Frame, index: usize) {
        let inner = widgets::dialog(f, " Compare Metrics ", 80, 60);
        let (Some(current), Some(entry)) = (
            self.current.ready(),
            self.history.ready().and_then(|h| h.get(index)),
        ) else {
            return;
        };
        let Some(historical) = &entry.metrics else {
            return;
        };

        let rows = compare_snapshots(current, historical);
        let title = format!(" Current vs {} (←/→ to change) ", entry.name.label());
        f.render_widget(widgets::comparison_table(&rows, title), inner);
    }

    fn draw_snapshot(&self, f: &mut Frame, index: usize) {
        let Some(entry) = self.history.ready().and_then(|h| h.get(index)) else {
            return;
        };
        let inner = widgets::dialog(f, &format!(" Metrics at {} ", entry.name.label()), 60, 50);
        if let Some(metrics) = &entry.metrics {
            f.render_widget(widgets::metrics_table(metrics, ""), inner);
        }
    }
}

fn draw_update(f: &mut Frame, form: &UpdateForm) {
    let inner = widgets::dialog(f, " Update Metrics ", 70, 70);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(inner);

    f.render_widget(
        widgets::json_field(" Instances (JSON array) ", &form.instances, form.field == 0),
        chunks[0],
    );
    f.render_widget(
        widgets::json_field(" Results (JSON array) ", &form.results, form.field == 1),
        chunks[1],
    );
    f.render_widget(
        widgets::text_field(" Timestamp (optional) ", &form.timestamp, "now", form.field == 2),
        chunks[2],
    );

    let status = if form.submitting {
        vec![Line::from(Span::styled("Updating...", Style::default().fg(Color::Yellow)))]
    } else {
        widgets::banner_lines(form.error.as_deref(), None)
    };
    f.render_widget(Paragraph::new(status), chunks[3]);
}

fn draw_dataset(f: &mut Frame, form: &DatasetForm) {
    let inner = widgets::dialog(f, " Download Dataset ", 60, 40);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(inner);

    f.render_widget(
        widgets::text_field(" Start date (optional) ", &form.start, "YYYY-MM-DD", form.field == 0),
        chunks[0],
    );
    f.render_widget(
        widgets::text_field(" End date (optional) ", &form.end, "YYYY-MM-DD", form.field == 1),
        chunks[1],
    );

    let status = if form.downloading {
        vec![Line::from(Span::styled("Downloading...", Style::default().fg(Color::Yellow)))]
    } else {
        widgets::banner_lines(form.error.as_deref(), None)
    };
    f.render_widget(Paragraph::new(status), chunks[2]);
}
