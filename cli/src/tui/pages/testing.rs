//! Send a test request to a model version.
//!
//! Two fetch generations guard this page: the model generation advances when
//! a different model is chosen and the version generation when a different
//! version is chosen. Versions, signatures and test results tagged with an
//! older ticket are dropped.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};
use serde_json::Value;
use std::fs;

use modeldeck_core::download::result_filename;
use modeldeck_core::form::{FieldGroup, SignatureForm};
use modeldeck_core::generation::{FetchGeneration, Ticket};
use modeldeck_core::json_input::JsonInput;
use modeldeck_core::signature::{ModelSignature, TypeMapping};
use modeldeck_core::ModelVersion;

use super::{Action, Preselect};
use crate::tui::state::{Load, Picker};
use crate::tui::task::{text, Ctx};
use crate::tui::widgets;

#[derive(Debug)]
pub enum Msg {
    Models(Result<Vec<String>, String>),
    Versions(Ticket, Result<Vec<ModelVersion>, String>),
    Signature(Ticket, Result<ModelSignature, String>),
    Mapping(Result<TypeMapping, String>),
    Tested(Ticket, Result<Value, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Models,
    Versions,
    Input,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Models => Focus::Versions,
            Focus::Versions => Focus::Input,
            Focus::Input => Focus::Models,
        }
    }
}

pub struct TestingPage {
    pub models: Load<Picker<String>>,
    pub versions: Load<Picker<ModelVersion>>,
    pub signature: Load<ModelSignature>,
    pub form: SignatureForm,
    pub json: JsonInput,
    pub mode: Mode,
    pub focus: Focus,
    /// Path being typed after Ctrl+O.
    pub file_prompt: Option<String>,
    pub result: Option<Value>,
    pub running: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    selected_model: Option<String>,
    selected_version: Option<ModelVersion>,
    pending_version: Option<ModelVersion>,
    mapping: TypeMapping,
    form_cursor: usize,
    model_generation: FetchGeneration,
    version_generation: FetchGeneration,
}

impl TestingPage {
    pub fn mount(ctx: &Ctx, preselect: Option<Preselect>) -> Self {
        let mut page = Self {
            models: Load::Loading,
            versions: Load::Idle,
            signature: Load::Idle,
            form: SignatureForm::default(),
            json: JsonInput::new(false),
            mode: Mode::Manual,
            focus: Focus::Models,
            file_prompt: None,
            result: None,
            running: false,
            message: None,
            error: None,
            selected_model: None,
            selected_version: None,
            pending_version: None,
            mapping: TypeMapping::default(),
            form_cursor: 0,
            model_generation: FetchGeneration::new(),
            version_generation: FetchGeneration::new(),
        };

        ctx.spawn(|api| async move { Msg::Models(text(api.list_models().await)) });
        ctx.spawn(|api| async move { Msg::Mapping(text(api.type_mapping().await)) });

        if let Some(preselect) = preselect {
            page.select_model(preselect.model, ctx);
            page.pending_version = Some(preselect.version);
        }
        page
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    pub fn selected_version(&self) -> Option<&ModelVersion> {
        self.selected_version.as_ref()
    }

    pub fn captures_input(&self) -> bool {
        self.focus == Focus::Input || self.file_prompt.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.running
            || self.models.is_loading()
            || self.versions.is_loading()
            || self.signature.is_loading()
    }

    fn select_model(&mut self, model: String, ctx: &Ctx) {
        let ticket = self.model_generation.advance();
        self.version_generation.advance();

        self.selected_version = None;
        self.pending_version = None;
        self.versions = Load::Loading;
        self.reset_inputs();
        self.signature = Load::Idle;
        self.form = SignatureForm::default();

        let name = model.clone();
        self.selected_model = Some(model);
        ctx.spawn(move |api| async move { Msg::Versions(ticket, text(api.list_versions(&name).await)) });
    }

    fn select_version(&mut self, version: ModelVersion, ctx: &Ctx) {
        let Some(model) = self.selected_model.clone() else {
            return;
        };
        let ticket = self.version_generation.advance();

        self.reset_inputs();
        self.signature = Load::Loading;
        self.selected_version = Some(version.clone());
        ctx.spawn(move |api| async move {
            Msg::Signature(ticket, text(api.signature(&model, &version).await))
        });
    }

    fn reset_inputs(&mut self) {
        self.form.clear();
        self.form_cursor = 0;
        self.json.clear();
        self.result = None;
        self.running = false;
        self.message = None;
        self.error = None;
    }

    /// Request body for the current mode. JSON mode with no text falls back to the form.
    fn payload(&self) -> Result<Value, String> {
        if self.mode == Mode::Json && !self.json.text().trim().is_empty() {
            if let Some(error) = self.json.error() {
                return Err(error.to_string());
            }
            return self.json.value().ok_or_else(|| "This field is required".to_string());
        }
        self.form.payload().map_err(|e| e.to_string())
    }

    fn run(&mut self, ctx: &Ctx) {
        if self.running {
            return;
        }
        let (Some(model), Some(version)) = (self.selected_model.clone(), self.selected_version.clone())
        else {
            self.error = Some("Please select a model and version".to_string());
            return;
        };

        let payload = match self.payload() {
            Ok(payload) => payload,
            Err(e) => {
                self.error = Some(e);
                return;
            }
        };

        tracing::debug!("Request body: {}", payload);
        self.running = true;
        self.error = None;
        self.message = None;
        self.result = None;
        let ticket = self.version_generation.ticket();
        ctx.spawn(move |api| async move {
            Msg::Tested(ticket, text(api.invoke(&model, &version, &payload).await))
        });
    }

    fn load_file(&mut self, path: &str) {
        let path = path.trim();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                self.error = Some(format!("Failed to read {}: {}", path, e));
                return;
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => {
                let pretty = serde_json::to_string_pretty(&value).unwrap_or(content);
                self.json.set_text(pretty);
                self.mode = Mode::Json;
                self.error = None;
                self.message = Some(format!("Loaded {}", path));
            }
            Err(e) => self.error = Some(format!("Invalid JSON file: {}", e)),
        }
    }

    fn save_result(&mut self, ctx: &Ctx) {
        let (Some(result), Some(model), Some(version)) =
            (&self.result, &self.selected_model, &self.selected_version)
        else {
            return;
        };

        let pretty = match serde_json::to_string_pretty(result) {
            Ok(pretty) => pretty,
            Err(e) => {
                self.error = Some(e.to_string());
                return;
            }
        };
        match ctx.sink().save(&result_filename(model, version), pretty.as_bytes()) {
            Ok(path) => self.message = Some(format!("Result saved to {}", path.display())),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub fn update(&mut self, msg: Msg, ctx: &Ctx) {
        match msg {
            Msg::Models(Ok(models)) => {
                let mut picker = Picker::new(models);
                if let Some(selected) = &self.selected_model {
                    picker.select_where(|m| m == selected);
                }
                self.models = Load::Ready(picker);
            }
            Msg::Models(Err(e)) => {
                self.error = Some(format!("Failed to load models: {}", e));
                self.models = Load::Failed(e);
            }
            Msg::Versions(ticket, result) => {
                if !self.model_generation.is_current(ticket) {
                    tracing::debug!("Ignoring versions of a previously selected model");
                    return;
                }
                match result {
                    Ok(versions) => {
                        let mut picker = Picker::new(versions);
                        let pending = self.pending_version.take();
                        let preselected = pending
                            .filter(|v| picker.select_where(|item| item == v))
                            .and_then(|_| picker.current().cloned());
                        self.versions = Load::Ready(picker);
                        if let Some(version) = preselected {
                            self.select_version(version, ctx);
                            self.focus = Focus::Input;
                        }
                    }
                    Err(e) => {
                        self.error = Some(format!("Failed to load model versions: {}", e));
                        self.versions = Load::Failed(e);
                    }
                }
            }
            Msg::Signature(ticket, result) => {
                if !self.version_generation.is_current(ticket) {
                    return;
                }
                match result {
                    Ok(signature) => {
                        self.form = SignatureForm::new(&signature, &self.mapping);
                        self.signature = Load::Ready(signature);
                    }
                    Err(e) => {
                        self.error = Some(format!("Failed to load model signature: {}", e));
                        self.signature = Load::Failed(e);
                    }
                }
            }
            Msg::Mapping(Ok(mapping)) => {
                self.mapping = mapping;
                if let Some(signature) = self.signature.ready() {
                    let mut form = SignatureForm::new(signature, &self.mapping);
                    for field in &mut form.fields {
                        if let Some(old) = self.form.fields.iter().find(|f| f.spec.name == field.spec.name) {
                            field.value = old.value.clone();
                        }
                    }
                    self.form = form;
                }
            }
            Msg::Mapping(Err(e)) => tracing::warn!("Failed to load type mapping: {}", e),
            Msg::Tested(ticket, result) => {
                if !self.version_generation.is_current(ticket) {
                    return;
                }
                self.running = false;
                match result {
                    Ok(value) => self.result = Some(value),
                    Err(e) => self.error = Some(format!("Model test failed: {}", e)),
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        if let Some(path) = self.file_prompt.as_mut() {
            match key.code {
                KeyCode::Esc => self.file_prompt = None,
                KeyCode::Enter => {
                    let path = path.clone();
                    self.file_prompt = None;
                    self.load_file(&path);
                }
                KeyCode::Backspace => {
                    path.pop();
                }
                KeyCode::Char(c) => path.push(c),
                _ => {}
            }
            return None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => self.run(ctx),
                KeyCode::Char('t') => {
                    self.mode = match self.mode {
                        Mode::Manual => Mode::Json,
                        Mode::Json => Mode::Manual,
                    };
                }
                KeyCode::Char('o') => self.file_prompt = Some(String::new()),
                KeyCode::Char('s') => self.save_result(ctx),
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::F(5) => {
                self.run(ctx);
                return None;
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Models => self.models_key(key, ctx),
            Focus::Versions => self.versions_key(key, ctx),
            Focus::Input => self.input_key(key),
        }
        None
    }

    fn models_key(&mut self, key: KeyEvent, ctx: &Ctx) {
        let Some(picker) = self.models.ready_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => picker.next(),
            KeyCode::Char('k') | KeyCode::Up => picker.previous(),
            KeyCode::Enter => {
                if let Some(model) = picker.current().cloned() {
                    if self.selected_model.as_ref() != Some(&model) {
                        self.select_model(model, ctx);
                    }
                    self.focus = Focus::Versions;
                }
            }
            _ => {}
        }
    }

    fn versions_key(&mut self, key: KeyEvent, ctx: &Ctx) {
        let Some(picker) = self.versions.ready_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => picker.next(),
            KeyCode::Char('k') | KeyCode::Up => picker.previous(),
            KeyCode::Enter => {
                if let Some(version) = picker.current().cloned() {
                    if self.selected_version.as_ref() != Some(&version) {
                        self.select_version(version, ctx);
                    }
                    self.focus = Focus::Input;
                }
            }
            _ => {}
        }
    }

    fn input_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.focus = Focus::Models;
            return;
        }

        match self.mode {
            Mode::Json => match key.code {
                KeyCode::Char(c) => self.json.push(c),
                KeyCode::Enter => self.json.push('\n'),
                KeyCode::Backspace => self.json.pop(),
                _ => {}
            },
            Mode::Manual => {
                let count = self.form.fields.len();
                if count == 0 {
                    return;
                }
                match key.code {
                    KeyCode::Down | KeyCode::Enter => self.form_cursor = (self.form_cursor + 1) % count,
                    KeyCode::Up => self.form_cursor = (self.form_cursor + count - 1) % count,
                    KeyCode::Char(c) => self.form.fields[self.form_cursor].value.push(c),
                    KeyCode::Backspace => {
                        self.form.fields[self.form_cursor].value.pop();
                    }
                    _ => {}
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
        let pickers = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[0]);

        widgets::draw_load_picker(
            f,
            pickers[0],
            " Model ",
            &self.models,
            |m| {
                if self.selected_model.as_ref() == Some(m) {
                    format!("{} ✓", m)
                } else {
                    m.clone()
                }
            },
            self.focus == Focus::Models,
            "No models found in registry",
        );
        let versions_hint = if self.selected_model.is_some() {
            "No versions available"
        } else {
            "Select a model first"
        };
        widgets::draw_load_picker(
            f,
            pickers[1],
            " Version ",
            &self.versions,
            |v| {
                if self.selected_version.as_ref() == Some(v) {
                    format!("Version {} ✓", v)
                } else {
                    format!("Version {}", v)
                }
            },
            self.focus == Focus::Versions,
            versions_hint,
        );

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Percentage(55),
                Constraint::Min(5),
            ])
            .split(columns[1]);

        let mode_span = |mode: Mode, label: &'static str| {
            if self.mode == mode {
                Span::styled(label, widgets::selected_style().add_modifier(Modifier::REVERSED))
            } else {
                Span::styled(label, widgets::hint_style())
            }
        };
        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::raw(" Test mode: "),
                mode_span(Mode::Manual, " Manual "),
                Span::raw(" "),
                mode_span(Mode::Json, " JSON "),
            ])),
            right[0],
        );

        let focused = self.focus == Focus::Input;
        match self.mode {
            Mode::Json => {
                f.render_widget(widgets::json_field(" Request JSON ", &self.json, focused), right[1]);
            }
            Mode::Manual => self.draw_form(f, right[1], focused),
        }

        let result_block = widgets::bordered(" Result ");
        let result = match (&self.result, self.running) {
            (_, true) => Paragraph::new("Testing model...").style(Style::default().fg(Color::Yellow)),
            (Some(value), false) => Paragraph::new(
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            ),
            (None, false) => Paragraph::new("Run a test to see the model output.").style(widgets::hint_style()),
        };
        f.render_widget(result.block(result_block).wrap(Wrap { trim: false }), right[2]);

        if let Some(path) = &self.file_prompt {
            let inner = widgets::dialog(f, " Load JSON file ", 60, 20);
            f.render_widget(widgets::text_field(" Path ", path, "", true), inner);
        }
    }

    fn draw_form(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widgets::focus_block(" Inputs ", focused);

        let lines = match &self.signature {
            Load::Idle => vec![Line::from(Span::styled(
                "Select a model and version to load its signature.",
                widgets::hint_style(),
            ))],
            Load::Loading => vec![Line::from(Span::styled("Loading signature...", widgets::hint_style()))],
            Load::Failed(_) => vec![Line::from(Span::styled("Signature unavailable", widgets::hint_style()))],
            Load::Ready(_) if self.form.fields.is_empty() => {
                vec![Line::from(Span::styled("This model takes no inputs.", widgets::hint_style()))]
            }
            Load::Ready(_) => {
                let mut lines = Vec::new();
                for (i, field) in self.form.fields.iter().enumerate() {
                    let current = i == self.form_cursor;
                    let marker = if current && focused { "> " } else { "  " };
                    let label = match field.group {
                        FieldGroup::Input => format!("{} ({})", field.spec.name, field.spec.field_type),
                        FieldGroup::Param => format!("{} ({}, param)", field.spec.name, field.spec.field_type),
                    };
                    let value = if field.value.is_empty() {
                        Span::styled(field.placeholder.clone(), widgets::hint_style())
                    } else {
                        Span::raw(field.value.clone())
                    };
                    let label_style = if current && focused {
                        widgets::selected_style()
                    } else {
                        Style::default().add_modifier(Modifier::BOLD)
                    };
                    lines.push(Line::from(vec![
                        Span::styled(marker, label_style),
                        Span::styled(label, label_style),
                        Span::raw(": "),
                        value,
                    ]));
                    if let Some(error) = field.error() {
                        lines.push(Line::from(Span::styled(
                            format!("    {}", error),
                            Style::default().fg(Color::Red),
                        )));
                    } else if current {
                        lines.push(Line::from(Span::styled(format!("    {}", field.help), widgets::hint_style())));
                    }
                }
                lines
            }
        };

        f.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockApi;
    use crate::tui::app::tests::{app_sharing, app_with, press, TestApp};
    use crate::tui::app::{App, Route};
    use crate::tui::pages::Page;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn page(app: &App) -> &TestingPage {
        match &app.page {
            Page::Testing(page) => page,
            _ => panic!("expected model testing"),
        }
    }

    fn ctrl(app: &mut App, c: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    async fn testing_app(api: Arc<MockApi>) -> TestApp {
        let mut app = app_sharing(api);
        app.navigate(Route::Testing, None);
        app.settle().await;
        app
    }

    /// Pick fraud-detector, then version 3.
    async fn select_fraud_detector_v3(app: &mut App) {
        press(app, KeyCode::Enter);
        app.settle().await;
        press(app, KeyCode::Char('k'));
        press(app, KeyCode::Enter);
        app.settle().await;
    }

    #[tokio::test]
    async fn late_versions_of_previous_model_are_ignored() {
        let api = MockApi::with_fraud_detector();
        api.slow("list_versions fraud-detector", Duration::from_millis(50));
        let mut app = app_with(api);
        app.navigate(Route::Testing, None);
        app.settle().await;

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        app.settle().await;

        let page = page(&app);
        assert_eq!(page.selected_model(), Some("churn"));
        assert_eq!(page.versions.ready().unwrap().items(), &[ModelVersion::from("1")]);
    }

    #[tokio::test]
    async fn test_requires_model_and_version() {
        let api = Arc::new(MockApi::with_fraud_detector());
        let mut app = testing_app(api.clone()).await;

        press(&mut app, KeyCode::F(5));
        assert_eq!(page(&app).error.as_deref(), Some("Please select a model and version"));
        assert!(!api.calls().iter().any(|c| c.starts_with("invoke")));
    }

    #[tokio::test]
    async fn manual_form_sends_typed_values() {
        let api = Arc::new(MockApi::with_fraud_detector());
        let mut app = testing_app(api.clone()).await;
        select_fraud_detector_v3(&mut app).await;

        assert_eq!(page(&app).selected_version(), Some(&ModelVersion::from(3)));
        assert_eq!(page(&app).focus, Focus::Input);
        assert_eq!(page(&app).form.fields[0].placeholder, "1.5");

        type_text(&mut app, "12.5");
        press(&mut app, KeyCode::Down);
        type_text(&mut app, "US");
        press(&mut app, KeyCode::F(5));
        app.settle().await;

        assert_eq!(
            page(&app).result,
            Some(json!({ "predictions": [0.12], "echo": { "amount": 12.5, "country": "US" } }))
        );
        assert!(api.calls().contains(&"invoke fraud-detector-3".to_string()));
    }

    #[tokio::test]
    async fn invalid_json_is_rejected_locally() {
        let api = Arc::new(MockApi::with_fraud_detector());
        let mut app = testing_app(api.clone()).await;
        select_fraud_detector_v3(&mut app).await;

        ctrl(&mut app, 't');
        type_text(&mut app, "{\"amount\": ");
        press(&mut app, KeyCode::F(5));

        let page = page(&app);
        assert_eq!(page.mode, Mode::Json);
        assert!(page.error.as_deref().unwrap().starts_with("Invalid JSON: "));
        assert!(!api.calls().iter().any(|c| c.starts_with("invoke")));
    }

    #[tokio::test]
    async fn changing_version_clears_the_result() {
        let api = Arc::new(MockApi::with_fraud_detector());
        let mut app = testing_app(api).await;
        select_fraud_detector_v3(&mut app).await;

        press(&mut app, KeyCode::F(5));
        app.settle().await;
        assert!(page(&app).result.is_some());

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Enter);
        app.settle().await;

        let page = page(&app);
        assert_eq!(page.selected_version(), Some(&ModelVersion::from(2)));
        assert!(page.result.is_none());
    }

    #[tokio::test]
    async fn json_file_loads_into_json_mode() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, r#"{{"amount": 3}}"#).unwrap();
        let path = file.path().to_path_buf();

        let mut app = testing_app(Arc::new(MockApi::with_fraud_detector())).await;
        ctrl(&mut app, 'o');
        assert!(app.page.captures_input());
        type_text(&mut app, &path.display().to_string());
        press(&mut app, KeyCode::Enter);

        let page = page(&app);
        assert_eq!(page.mode, Mode::Json);
        assert_eq!(page.json.value(), Some(json!({ "amount": 3 })));
    }
}
