pub mod dashboard;
pub mod degradation;
pub mod deployed;
pub mod download;
pub mod metrics;
pub mod models;
pub mod testing;

use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};

use modeldeck_core::ModelVersion;

use super::app::Route;
use super::task::{Ctx, Message};

/// Model and version a page should open with.
#[derive(Debug, Clone, PartialEq)]
pub struct Preselect {
    pub model: String,
    pub version: ModelVersion,
}

/// Requests a page makes of the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(Route, Option<Preselect>),
}

/// The mounted screen. Each variant owns its state; nothing survives navigation.
pub enum Page {
    Dashboard(dashboard::DashboardPage),
    Models(models::ModelsPage),
    Deployed(deployed::DeployedPage),
    Testing(testing::TestingPage),
    Metrics(metrics::MetricsPage),
    Download(download::DownloadPage),
    Degradation(degradation::DegradationPage),
}

impl Page {
    /// Build the page for `route` and start its initial fetches.
    pub fn mount(route: Route, ctx: &Ctx, preselect: Option<Preselect>) -> Self {
        match route {
            Route::Dashboard => Page::Dashboard(dashboard::DashboardPage::mount(ctx)),
            Route::Models => Page::Models(models::ModelsPage::mount(ctx)),
            Route::Deployed => Page::Deployed(deployed::DeployedPage::mount(ctx)),
            Route::Testing => Page::Testing(testing::TestingPage::mount(ctx, preselect)),
            Route::Metrics => Page::Metrics(metrics::MetricsPage::mount(ctx, preselect)),
            Route::Download => Page::Download(download::DownloadPage::mount(ctx)),
            Route::Degradation => Page::Degradation(degradation::DegradationPage::mount(ctx)),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Page::Dashboard(_) => Route::Dashboard,
            Page::Models(_) => Route::Models,
            Page::Deployed(_) => Route::Deployed,
            Page::Testing(_) => Route::Testing,
            Page::Metrics(_) => Route::Metrics,
            Page::Download(_) => Route::Download,
            Page::Degradation(_) => Route::Degradation,
        }
    }

    pub fn update(&mut self, message: Message, ctx: &Ctx) {
        match (self, message) {
            (Page::Dashboard(page), Message::Dashboard(msg)) => page.update(msg),
            (Page::Models(page), Message::Models(msg)) => page.update(msg, ctx),
            (Page::Deployed(page), Message::Deployed(msg)) => page.update(msg, ctx),
            (Page::Testing(page), Message::Testing(msg)) => page.update(msg, ctx),
            (Page::Metrics(page), Message::Metrics(msg)) => page.update(msg, ctx),
            (Page::Download(page), Message::Download(msg)) => page.update(msg),
            (Page::Degradation(page), Message::Degradation(msg)) => page.update(msg),
            (page, message) => {
                tracing::debug!("Dropping {:?} for {:?}", message, page.route());
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &Ctx) -> Option<Action> {
        match self {
            Page::Dashboard(page) => page.handle_key(key, ctx),
            Page::Models(page) => page.handle_key(key, ctx),
            Page::Deployed(page) => page.handle_key(key, ctx),
            Page::Testing(page) => page.handle_key(key, ctx),
            Page::Metrics(page) => page.handle_key(key, ctx),
            Page::Download(page) => page.handle_key(key, ctx),
            Page::Degradation(page) => page.handle_key(key, ctx),
        }
    }

    /// Whether keys go to a text input or dialog instead of the shell.
    pub fn captures_input(&self) -> bool {
        match self {
            Page::Models(page) => page.dialog.is_some(),
            Page::Deployed(page) => page.confirm.is_some() || page.report.is_some(),
            Page::Testing(page) => page.captures_input(),
            Page::Metrics(page) => page.dialog.is_some(),
            Page::Dashboard(_) | Page::Download(_) | Page::Degradation(_) => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        match self {
            Page::Dashboard(page) => page.loading,
            Page::Models(page) => page.is_busy(),
            Page::Deployed(page) => page.is_busy(),
            Page::Testing(page) => page.is_busy(),
            Page::Metrics(page) => page.is_busy(),
            Page::Download(page) => page.is_busy(),
            Page::Degradation(page) => page.is_busy(),
        }
    }

    /// Key hints for the status bar.
    pub fn help(&self) -> &'static str {
        match self {
            Page::Dashboard(_) => "r: refresh | t: test a model",
            Page::Models(page) if page.dialog.is_some() => {
                "j/k: version | 0-9: classes | Enter: deploy | Esc: cancel"
            }
            Page::Models(_) => "j/k: navigate | Enter: deploy | r: refresh",
            Page::Deployed(page) if page.confirm.is_some() => "y: undeploy | n/Esc: cancel",
            Page::Deployed(page) if page.report.is_some() => "j/k: scroll | Esc: close",
            Page::Deployed(_) => {
                "u: undeploy | v: view report | d: download report | t: test | m: metrics | r: refresh"
            }
            Page::Testing(_) => {
                "Tab: focus | Enter: select | F5: run | Ctrl+T: mode | Ctrl+O: load file | Ctrl+S: save"
            }
            Page::Metrics(page) if page.dialog.is_some() => "Tab: field | Enter: confirm | Esc: close",
            Page::Metrics(_) => {
                "j/k: model | ←/→: snapshot | v: view | c: compare | u: update | s: dataset | r: refresh"
            }
            Page::Download(_) => "Tab: focus | j/k: navigate | Enter: select/download",
            Page::Degradation(_) => "j/k: navigate | Enter: download",
        }
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        match self {
            Page::Dashboard(page) => page.draw(f, area),
            Page::Models(page) => page.draw(f, area),
            Page::Deployed(page) => page.draw(f, area),
            Page::Testing(page) => page.draw(f, area),
            Page::Metrics(page) => page.draw(f, area),
            Page::Download(page) => page.draw(f, area),
            Page::Degradation(page) => page.draw(f, area),
        }
    }
}
