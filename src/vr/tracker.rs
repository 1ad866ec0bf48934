use crate::vr::{HitTestSource, Pose, XrFrame};

/// Caches the best surface intersection reported by the host hit-test feed.
///
/// A tracker without a source is valid: it reports no surface for as long
/// as it lives, which callers treat as "still searching".
pub struct SurfaceTracker {
    source: Option<Box<dyn HitTestSource>>,
    latest: Option<Pose>,
    polls: u64,
    hits: u64,
}

impl SurfaceTracker {
    pub fn new(source: Option<Box<dyn HitTestSource>>) -> Self {
        Self {
            source,
            latest: None,
            polls: 0,
            hits: 0,
        }
    }

    pub fn detached() -> Self {
        Self::new(None)
    }

    pub fn poll(&mut self, frame: &XrFrame) -> Option<Pose> {
        self.polls += 1;
        let sample = self.source.as_mut().and_then(|source| source.poll(frame));

        match (self.latest.is_some(), sample.is_some()) {
            (false, true) => log::debug!("[tracker] surface acquired on frame {}", frame.index),
            (true, false) => log::debug!("[tracker] surface lost on frame {}", frame.index),
            _ => {}
        }

        if sample.is_some() {
            self.hits += 1;
        }
        self.latest = sample;
        self.latest
    }

    pub fn latest(&self) -> Option<Pose> {
        self.latest
    }

    /// Forgets the cached pose so a fresh surface must be acquired.
    pub fn reset(&mut self) {
        self.latest = None;
    }

    pub fn cancel(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.cancel();
            log::debug!(
                "[tracker] hit-test source cancelled after {} polls ({} hits)",
                self.polls,
                self.hits
            );
        }
        self.latest = None;
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

impl Default for SurfaceTracker {
    fn default() -> Self {
        Self::detached()
    }
}
