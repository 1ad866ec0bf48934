#[cfg(feature = "async-assets")]
pub mod tokio_loader;

#[cfg(feature = "async-assets")]
pub use tokio_loader::TokioAssetLoader;

use crate::assembly::catalog::CatalogId;
use crate::scene::{ObjectKey, SceneObject};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("asset {0} not found")]
    NotFound(String),
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("loading {path} timed out after {after_ms} ms")]
    TimedOut { path: String, after_ms: u64 },
    #[error("load of {0} was cancelled")]
    Cancelled(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    /// Session that issued the request; echoed back on the completion.
    pub session: u32,
    pub key: ObjectKey,
    pub model: ModelId,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetCompletion {
    pub session: u32,
    pub key: ObjectKey,
    pub result: Result<SceneObject, LoadError>,
}

/// Fire-and-forget model loading. Completions may surface in any order on
/// any later frame, including after the requesting session has ended.
pub trait AssetLoader {
    fn label(&self) -> &'static str;
    fn request(&mut self, request: AssetRequest);
    fn drain_completions(&mut self) -> Vec<AssetCompletion>;
}

/// Presentation settings applied to every loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelStyle {
    pub scale: f32,
    pub shadows: bool,
}

impl Default for ModelStyle {
    fn default() -> Self {
        Self {
            scale: 0.5,
            shadows: true,
        }
    }
}

impl ModelStyle {
    pub fn apply(&self, object: SceneObject) -> SceneObject {
        object.with_scale(self.scale).with_shadows(self.shadows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Pending { requested_at: Duration, path: String },
    Ready(SceneObject),
    Failed(LoadError),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Readiness::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessSummary {
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
}

/// Per-stage load state for every requested model. Failures are final: a
/// stage that failed stays unavailable even if a late completion arrives.
#[derive(Debug, Default)]
pub struct ReadinessMap {
    entries: HashMap<ObjectKey, Readiness>,
}

impl ReadinessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outstanding request. Returns `false` when the key is
    /// already tracked.
    pub fn mark_requested(
        &mut self,
        key: ObjectKey,
        path: impl Into<String>,
        now: Duration,
    ) -> bool {
        use std::collections::hash_map::Entry;

        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Readiness::Pending {
                    requested_at: now,
                    path: path.into(),
                });
                true
            }
        }
    }

    /// Applies a loader completion. Returns whether the map changed.
    pub fn complete(&mut self, completion: AssetCompletion) -> bool {
        let AssetCompletion { key, result, .. } = completion;
        match self.entries.get(&key) {
            Some(Readiness::Failed(previous)) => {
                log::warn!("[assets] late completion for {key} ignored (already failed: {previous})");
                return false;
            }
            Some(Readiness::Ready(_)) => {
                log::debug!("[assets] duplicate completion for {key} ignored");
                return false;
            }
            _ => {}
        }

        let state = match result {
            Ok(object) => {
                log::debug!("[assets] {key} ready ({})", object.source);
                Readiness::Ready(object)
            }
            Err(err) => {
                log::warn!("[assets] {key} unavailable: {err}");
                Readiness::Failed(err)
            }
        };
        self.entries.insert(key, state);
        true
    }

    /// Fails every load that has been pending for longer than `timeout`.
    pub fn expire_overdue(&mut self, now: Duration, timeout: Duration) -> Vec<ObjectKey> {
        let mut expired = Vec::new();
        for (key, state) in self.entries.iter_mut() {
            if let Readiness::Pending { requested_at, path } = state {
                let waited = now.saturating_sub(*requested_at);
                if waited > timeout {
                    log::warn!(
                        "[assets] {key} timed out after {} ms",
                        waited.as_millis()
                    );
                    let path = path.clone();
                    *state = Readiness::Failed(LoadError::TimedOut {
                        path,
                        after_ms: timeout.as_millis() as u64,
                    });
                    expired.push(key.clone());
                }
            }
        }
        expired
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Readiness> {
        self.entries.get(key)
    }

    pub fn object(&self, key: &ObjectKey) -> Option<&SceneObject> {
        match self.entries.get(key) {
            Some(Readiness::Ready(object)) => Some(object),
            _ => None,
        }
    }

    pub fn is_ready(&self, key: &ObjectKey) -> bool {
        self.object(key).is_some()
    }

    pub fn summary(&self, catalog: &CatalogId) -> ReadinessSummary {
        let mut summary = ReadinessSummary::default();
        for (key, state) in &self.entries {
            if &key.catalog != catalog {
                continue;
            }
            match state {
                Readiness::Pending { .. } => summary.pending += 1,
                Readiness::Ready(_) => summary.ready += 1,
                Readiness::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Loader that resolves every request on the spot, producing an object for
/// the requested path unless the path was registered as missing.
#[derive(Debug, Default)]
pub struct ImmediateAssetLoader {
    style: ModelStyle,
    missing: HashSet<String>,
    completions: Vec<AssetCompletion>,
    requested: usize,
}

impl ImmediateAssetLoader {
    pub fn new(style: ModelStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn with_missing(mut self, path: impl Into<String>) -> Self {
        self.missing.insert(path.into());
        self
    }

    pub fn requested(&self) -> usize {
        self.requested
    }
}

impl AssetLoader for ImmediateAssetLoader {
    fn label(&self) -> &'static str {
        "Immediate"
    }

    fn request(&mut self, request: AssetRequest) {
        self.requested += 1;
        let result = if self.missing.contains(&request.path) {
            Err(LoadError::NotFound(request.path))
        } else {
            Ok(self
                .style
                .apply(SceneObject::new(request.model, request.path)))
        };
        self.completions.push(AssetCompletion {
            session: request.session,
            key: request.key,
            result,
        });
    }

    fn drain_completions(&mut self) -> Vec<AssetCompletion> {
        self.completions.drain(..).collect()
    }
}

#[derive(Debug, Default)]
struct DeferredState {
    outstanding: Vec<AssetRequest>,
    completions: Vec<AssetCompletion>,
}

/// Loader whose requests stay outstanding until resolved by hand. Clones
/// share state, so a caller can keep one handle while the runtime owns the
/// other.
#[derive(Debug, Clone, Default)]
pub struct DeferredAssetLoader {
    style: ModelStyle,
    state: Rc<RefCell<DeferredState>>,
}

impl DeferredAssetLoader {
    pub fn new(style: ModelStyle) -> Self {
        Self {
            style,
            state: Rc::default(),
        }
    }

    pub fn outstanding(&self) -> Vec<AssetRequest> {
        self.state.borrow().outstanding.clone()
    }

    /// Completes the outstanding request for `path` successfully.
    pub fn resolve(&self, path: &str) -> bool {
        let style = self.style;
        self.settle(path, |request| {
            Ok(style.apply(SceneObject::new(request.model.clone(), request.path.clone())))
        })
    }

    pub fn fail(&self, path: &str, error: LoadError) -> bool {
        self.settle(path, move |_| Err(error.clone()))
    }

    pub fn resolve_all(&self) -> usize {
        let paths = self
            .state
            .borrow()
            .outstanding
            .iter()
            .map(|request| request.path.clone())
            .collect::<Vec<_>>();
        paths.iter().filter(|path| self.resolve(path)).count()
    }

    fn settle<F>(&self, path: &str, outcome: F) -> bool
    where
        F: Fn(&AssetRequest) -> Result<SceneObject, LoadError>,
    {
        let mut state = self.state.borrow_mut();
        let Some(position) = state
            .outstanding
            .iter()
            .position(|request| request.path == path)
        else {
            return false;
        };
        let request = state.outstanding.remove(position);
        let result = outcome(&request);
        state.completions.push(AssetCompletion {
            session: request.session,
            key: request.key,
            result,
        });
        true
    }
}

impl AssetLoader for DeferredAssetLoader {
    fn label(&self) -> &'static str {
        "Deferred"
    }

    fn request(&mut self, request: AssetRequest) {
        self.state.borrow_mut().outstanding.push(request);
    }

    fn drain_completions(&mut self) -> Vec<AssetCompletion> {
        self.state.borrow_mut().completions.drain(..).collect()
    }
}
