use crate::assets::{AssetCompletion, AssetLoader, AssetRequest, LoadError, ModelStyle};
use crate::scene::SceneObject;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Fetches the object behind one asset path.
pub type FetchFn =
    Arc<dyn Fn(AssetRequest) -> BoxFuture<'static, Result<SceneObject, LoadError>> + Send + Sync>;

/// Drives each load as its own task on a tokio runtime and bounds it with a
/// timeout. Results are handed back to the frame loop through a channel.
pub struct TokioAssetLoader {
    handle: Handle,
    fetch: FetchFn,
    style: ModelStyle,
    timeout: Duration,
    sender: UnboundedSender<AssetCompletion>,
    receiver: UnboundedReceiver<AssetCompletion>,
    in_flight: usize,
}

impl TokioAssetLoader {
    pub fn new(handle: Handle, fetch: FetchFn, style: ModelStyle, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            handle,
            fetch,
            style,
            timeout,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl AssetLoader for TokioAssetLoader {
    fn label(&self) -> &'static str {
        "Tokio"
    }

    fn request(&mut self, request: AssetRequest) {
        let fetch = Arc::clone(&self.fetch);
        let sender = self.sender.clone();
        let style = self.style;
        let timeout = self.timeout;
        self.in_flight += 1;

        self.handle.spawn(async move {
            let session = request.session;
            let key = request.key.clone();
            let path = request.path.clone();
            let result = match tokio::time::timeout(timeout, fetch(request)).await {
                Ok(result) => result.map(|object| style.apply(object)),
                Err(_) => Err(LoadError::TimedOut {
                    path,
                    after_ms: timeout.as_millis() as u64,
                }),
            };
            let completion = AssetCompletion {
                session,
                key,
                result,
            };
            if sender.send(completion).is_err() {
                log::debug!("[assets] loader dropped before completion arrived");
            }
        });
    }

    fn drain_completions(&mut self) -> Vec<AssetCompletion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            completions.push(completion);
        }
        self.in_flight = self.in_flight.saturating_sub(completions.len());
        completions
    }
}
