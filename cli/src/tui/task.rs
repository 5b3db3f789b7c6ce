//! Background requests for the dashboard.
//!
//! Pages never await the API on the draw loop. They spawn a task through
//! [`Ctx::spawn`]; the task's result comes back over a channel tagged with
//! the navigation ticket that was current when it started.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use modeldeck_core::download::DownloadSink;
use modeldeck_core::generation::{FetchGeneration, Ticket};
use modeldeck_core::ModelApi;

use super::pages::{dashboard, degradation, deployed, download, metrics, models, testing};

/// A finished request, addressed to one page.
#[derive(Debug)]
pub enum Message {
    Dashboard(dashboard::Msg),
    Models(models::Msg),
    Deployed(deployed::Msg),
    Testing(testing::Msg),
    Metrics(metrics::Msg),
    Download(download::Msg),
    Degradation(degradation::Msg),
}

macro_rules! page_message {
    ($($variant:ident => $module:ident),* $(,)?) => {
        $(
            impl From<$module::Msg> for Message {
                fn from(msg: $module::Msg) -> Self {
                    Message::$variant(msg)
                }
            }
        )*
    };
}

page_message! {
    Dashboard => dashboard,
    Models => models,
    Deployed => deployed,
    Testing => testing,
    Metrics => metrics,
    Download => download,
    Degradation => degradation,
}

#[derive(Debug)]
pub struct Envelope {
    pub ticket: Ticket,
    pub message: Message,
}

/// Handles a page needs to start requests.
#[derive(Clone)]
pub struct Ctx {
    api: Arc<dyn ModelApi>,
    sink: DownloadSink,
    tx: UnboundedSender<Envelope>,
    navigation: FetchGeneration,
}

impl Ctx {
    pub fn new(
        api: Arc<dyn ModelApi>,
        sink: DownloadSink,
        tx: UnboundedSender<Envelope>,
        navigation: FetchGeneration,
    ) -> Self {
        Self {
            api,
            sink,
            tx,
            navigation,
        }
    }

    pub fn sink(&self) -> &DownloadSink {
        &self.sink
    }

    /// Run `request` in the background and deliver its message on the next tick.
    pub fn spawn<F, Fut, M>(&self, request: F)
    where
        F: FnOnce(Arc<dyn ModelApi>) -> Fut,
        Fut: Future<Output = M> + Send + 'static,
        M: Into<Message>,
    {
        let ticket = self.navigation.ticket();
        let tx = self.tx.clone();
        let future = request(self.api.clone());
        tokio::spawn(async move {
            let message = future.await.into();
            if tx.send(Envelope { ticket, message }).is_err() {
                tracing::debug!("Dashboard closed before a request finished");
            }
        });
    }
}

/// Error text shown in a page banner.
pub fn text<T>(result: modeldeck_core::Result<T>) -> Result<T, String> {
    result.map_err(|e| e.to_string())
}
