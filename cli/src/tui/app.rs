use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use modeldeck_core::download::DownloadSink;
use modeldeck_core::generation::FetchGeneration;
use modeldeck_core::ModelApi;

use super::pages::{Action, Page, Preselect};
use super::task::{Ctx, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Models,
    Deployed,
    Testing,
    Metrics,
    Download,
    Degradation,
}

/// Drawer order; digit keys 1-7 index into it.
pub const ROUTES: [Route; 7] = [
    Route::Dashboard,
    Route::Models,
    Route::Deployed,
    Route::Testing,
    Route::Metrics,
    Route::Download,
    Route::Degradation,
];

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/",
            Route::Models => "/models",
            Route::Deployed => "/deployed",
            Route::Testing => "/testing",
            Route::Metrics => "/metrics",
            Route::Download => "/download",
            Route::Degradation => "/degradation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Dashboard => "Dashboard",
            Route::Models => "Model Management",
            Route::Deployed => "Deployed Models",
            Route::Testing => "Model Testing",
            Route::Metrics => "Model Metrics",
            Route::Download => "Dataset Download",
            Route::Degradation => "Degradation Report",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        ROUTES.into_iter().find(|r| r.path() == path)
    }

    pub fn index(&self) -> usize {
        ROUTES.iter().position(|r| r == self).unwrap_or(0)
    }
}

pub struct App {
    pub page: Page,
    pub drawer_open: bool,
    pub drawer_index: usize,
    pub should_quit: bool,
    /// Results dropped because the page that asked for them is gone.
    pub discarded: usize,
    pub(crate) ctx: Ctx,
    rx: UnboundedReceiver<Envelope>,
    navigation: FetchGeneration,
}

impl App {
    /// Shell opened on `route`; only that page's requests are sent.
    pub fn new(api: Arc<dyn ModelApi>, sink: DownloadSink, route: Route) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let navigation = FetchGeneration::new();
        let ctx = Ctx::new(api, sink, tx, navigation.clone());
        let page = Page::mount(route, &ctx, None);

        Self {
            page,
            drawer_open: false,
            drawer_index: 0,
            should_quit: false,
            discarded: 0,
            ctx,
            rx,
            navigation,
        }
    }

    /// Mount a fresh page. Results still in flight for the old one become stale.
    pub fn navigate(&mut self, route: Route, preselect: Option<Preselect>) {
        tracing::debug!("Navigating to {}", route.path());
        self.navigation.advance();
        self.drawer_open = false;
        self.page = Page::mount(route, &self.ctx, preselect);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.page.captures_input() {
            let action = self.page.handle_key(key, &self.ctx);
            self.perform(action);
            return;
        }

        if self.drawer_open {
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    self.drawer_index = (self.drawer_index + 1) % ROUTES.len();
                    return;
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.drawer_index = (self.drawer_index + ROUTES.len() - 1) % ROUTES.len();
                    return;
                }
                KeyCode::Enter => {
                    self.navigate(ROUTES[self.drawer_index], None);
                    return;
                }
                KeyCode::Esc => {
                    self.drawer_open = false;
                    return;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('n') => {
                self.drawer_open = !self.drawer_open;
                self.drawer_index = self.page.route().index();
            }
            KeyCode::Char(c @ '1'..='7') => {
                let index = c as usize - '1' as usize;
                self.navigate(ROUTES[index], None);
            }
            _ if self.drawer_open => {}
            _ => {
                let action = self.page.handle_key(key, &self.ctx);
                self.perform(action);
            }
        }
    }

    fn perform(&mut self, action: Option<Action>) {
        match action {
            Some(Action::Navigate(route, preselect)) => self.navigate(route, preselect),
            None => {}
        }
    }

    /// Apply every result that arrived since the last frame.
    pub fn tick(&mut self) {
        while let Ok(envelope) = self.rx.try_recv() {
            self.apply(envelope);
        }
    }

    fn apply(&mut self, envelope: Envelope) {
        if !self.navigation.is_current(envelope.ticket) {
            self.discarded += 1;
            tracing::debug!("Discarding stale {:?}", envelope.message);
            return;
        }
        self.page.update(envelope.message, &self.ctx);
    }

    /// Apply results until none arrive for a short while.
    #[cfg(test)]
    pub async fn settle(&mut self) {
        use std::time::Duration;

        while let Ok(Some(envelope)) =
            tokio::time::timeout(Duration::from_millis(200), self.rx.recv()).await
        {
            self.apply(envelope);
        }
    }
}
