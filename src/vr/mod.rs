#[cfg(feature = "vr-openxr")]
pub mod openxr;
pub mod tracker;

pub use tracker::SurfaceTracker;

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Rigid 6-DoF transform: translation in metres plus a unit quaternion `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f32; 3],
    pub orientation: [f32; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            orientation: IDENTITY_ROTATION,
        }
    }
}

const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

impl Pose {
    pub fn new(position: [f32; 3], orientation: [f32; 4]) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            orientation: IDENTITY_ROTATION,
        }
    }

    /// Builds a pose from a column-major 4x4 transform, the layout hit-test
    /// results arrive in. Scale in the rotation block is ignored.
    pub fn from_column_major(matrix: &[f32; 16]) -> Self {
        let position = [matrix[12], matrix[13], matrix[14]];

        let m00 = matrix[0];
        let m10 = matrix[1];
        let m20 = matrix[2];
        let m01 = matrix[4];
        let m11 = matrix[5];
        let m21 = matrix[6];
        let m02 = matrix[8];
        let m12 = matrix[9];
        let m22 = matrix[10];

        let trace = m00 + m11 + m22;
        let orientation = if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            [(m21 - m12) * s, (m02 - m20) * s, (m10 - m01) * s, 0.25 / s]
        } else if m00 > m11 && m00 > m22 {
            let s = 2.0 * (1.0 + m00 - m11 - m22).sqrt();
            [0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s]
        } else if m11 > m22 {
            let s = 2.0 * (1.0 + m11 - m00 - m22).sqrt();
            [(m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s]
        } else {
            let s = 2.0 * (1.0 + m22 - m00 - m11).sqrt();
            [(m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s]
        };

        Self {
            position,
            orientation,
        }
    }

    /// The translation-only part of this pose. Placement propagates position,
    /// never orientation.
    pub fn translation(&self) -> Pose {
        Pose::from_position(self.position)
    }
}

/// One host animation-frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrFrame {
    pub index: u64,
    /// Host timestamp; the runtime measures load ages from the first frame it sees.
    pub time: Duration,
}

impl XrFrame {
    pub fn new(index: u64, time: Duration) -> Self {
        Self { index, time }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub mode: String,
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
    pub dom_overlay_root: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: "immersive-ar".to_string(),
            required_features: vec!["local".to_string(), "hit-test".to_string()],
            optional_features: vec!["dom-overlay".to_string(), "anchors".to_string()],
            dom_overlay_root: Some("xr-overlay".to_string()),
        }
    }
}

impl SessionOptions {
    pub fn requires(&self, feature: &str) -> bool {
        self.required_features.iter().any(|f| f == feature)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArError {
    #[error("immersive AR is not supported on this device")]
    Unsupported,
    #[error("failed to start AR session: {0}")]
    SessionStart(String),
    #[error("hit-test source unavailable: {0}")]
    HitTestUnavailable(String),
}

pub type ArResult<T> = Result<T, ArError>;

/// Per-frame surface intersection feed for a ray cast from the view centre.
pub trait HitTestSource {
    fn poll(&mut self, frame: &XrFrame) -> Option<Pose>;
    fn cancel(&mut self);
}

/// A live immersive session handed out by an [`ArSessionProvider`].
pub trait ArSession {
    fn label(&self) -> &'static str;
    fn request_hit_test_source(&mut self) -> ArResult<Box<dyn HitTestSource>>;
    /// Asks the host to end the session. The host confirms with an end event.
    fn end(&mut self);
    fn dom_overlay_type(&self) -> Option<String> {
        None
    }
}

pub trait ArSessionProvider {
    fn label(&self) -> &'static str;
    fn is_supported(&self) -> bool;
    fn start(&mut self, options: &SessionOptions) -> ArResult<Box<dyn ArSession>>;
}

/// Shared counters for the hit-test sources a simulated provider hands out.
#[derive(Debug, Clone, Default)]
pub struct HitTestTally {
    issued: Rc<Cell<u32>>,
    cancelled: Rc<Cell<u32>>,
}

impl HitTestTally {
    pub fn issued(&self) -> u32 {
        self.issued.get()
    }

    pub fn cancelled(&self) -> u32 {
        self.cancelled.get()
    }

    /// Sources handed out and not yet cancelled.
    pub fn live(&self) -> u32 {
        self.issued().saturating_sub(self.cancelled())
    }
}

/// Hit-test source that replays a scripted sequence of per-frame results and
/// then repeats the last entry.
#[derive(Debug, Default)]
pub struct ScriptedHitTestSource {
    script: VecDeque<Option<Pose>>,
    last: Option<Pose>,
    cancelled: bool,
    tally: Option<HitTestTally>,
}

impl ScriptedHitTestSource {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<Pose>>,
    {
        Self {
            script: script.into_iter().collect(),
            last: None,
            cancelled: false,
            tally: None,
        }
    }

    /// Counts this source in `tally`, now as issued and later as cancelled.
    pub fn with_tally(mut self, tally: HitTestTally) -> Self {
        tally.issued.set(tally.issued.get() + 1);
        self.tally = Some(tally);
        self
    }

    pub fn constant(pose: Pose) -> Self {
        Self::new([Some(pose)])
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl HitTestSource for ScriptedHitTestSource {
    fn poll(&mut self, _frame: &XrFrame) -> Option<Pose> {
        if self.cancelled {
            return None;
        }
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        if let Some(tally) = &self.tally {
            tally.cancelled.set(tally.cancelled.get() + 1);
        }
        self.cancelled = true;
        self.script.clear();
        self.last = None;
    }
}

/// In-process session provider for tests and demos. Each started session
/// receives a hit-test source built from the configured script.
pub struct SimulatedArProvider {
    supported: bool,
    fail_start: bool,
    hit_test_available: bool,
    script: Vec<Option<Pose>>,
    sessions_started: u32,
    tally: HitTestTally,
}

impl SimulatedArProvider {
    pub fn new(script: Vec<Option<Pose>>) -> Self {
        Self {
            supported: true,
            fail_start: false,
            hit_test_available: true,
            script,
            sessions_started: 0,
            tally: HitTestTally::default(),
        }
    }

    pub fn with_surface(pose: Pose) -> Self {
        Self::new(vec![Some(pose)])
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn without_hit_test(mut self) -> Self {
        self.hit_test_available = false;
        self
    }

    pub fn sessions_started(&self) -> u32 {
        self.sessions_started
    }

    /// Handle onto the counters of every hit-test source this provider issues.
    /// Stays valid after the provider is moved into a runtime.
    pub fn hit_test_tally(&self) -> HitTestTally {
        self.tally.clone()
    }
}

impl Default for SimulatedArProvider {
    fn default() -> Self {
        Self::with_surface(Pose::from_position([0.0, -1.2, -1.5]))
    }
}

impl ArSessionProvider for SimulatedArProvider {
    fn label(&self) -> &'static str {
        "Simulated AR"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self, options: &SessionOptions) -> ArResult<Box<dyn ArSession>> {
        if !self.supported {
            return Err(ArError::Unsupported);
        }
        if self.fail_start {
            return Err(ArError::SessionStart(format!(
                "simulated refusal for mode {}",
                options.mode
            )));
        }
        self.sessions_started += 1;
        Ok(Box::new(SimulatedSession {
            script: self.script.clone(),
            hit_test_available: self.hit_test_available && options.requires("hit-test"),
            tally: self.tally.clone(),
            ended: false,
        }))
    }
}

struct SimulatedSession {
    script: Vec<Option<Pose>>,
    hit_test_available: bool,
    tally: HitTestTally,
    ended: bool,
}

impl ArSession for SimulatedSession {
    fn label(&self) -> &'static str {
        "Simulated AR session"
    }

    fn request_hit_test_source(&mut self) -> ArResult<Box<dyn HitTestSource>> {
        if !self.hit_test_available {
            return Err(ArError::HitTestUnavailable(
                "simulated session has no hit-test feature".to_string(),
            ));
        }
        let source =
            ScriptedHitTestSource::new(self.script.clone()).with_tally(self.tally.clone());
        Ok(Box::new(source))
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn dom_overlay_type(&self) -> Option<String> {
        Some("screen".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u64) -> XrFrame {
        XrFrame::new(index, Duration::from_millis(index * 16))
    }

    #[test]
    fn column_major_matrix_yields_translation() {
        let mut matrix = [0.0f32; 16];
        matrix[0] = 1.0;
        matrix[5] = 1.0;
        matrix[10] = 1.0;
        matrix[15] = 1.0;
        matrix[12] = 0.5;
        matrix[13] = -1.0;
        matrix[14] = -2.0;

        let pose = Pose::from_column_major(&matrix);
        assert_eq!(pose.position, [0.5, -1.0, -2.0]);
        assert_eq!(pose.orientation, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn column_major_matrix_recovers_half_turn_about_y() {
        // 180 degrees about +Y: x -> -x, z -> -z
        let matrix = [
            -1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, -1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let pose = Pose::from_column_major(&matrix);
        let [x, y, z, w] = pose.orientation;
        assert!(x.abs() < 1e-6);
        assert!((y.abs() - 1.0).abs() < 1e-6);
        assert!(z.abs() < 1e-6);
        assert!(w.abs() < 1e-6);
    }

    #[test]
    fn scripted_source_repeats_last_entry() {
        let pose = Pose::from_position([1.0, 0.0, 0.0]);
        let mut source = ScriptedHitTestSource::new([None, Some(pose)]);

        assert_eq!(source.poll(&frame(1)), None);
        assert_eq!(source.poll(&frame(2)), Some(pose));
        assert_eq!(source.poll(&frame(3)), Some(pose));
    }

    #[test]
    fn cancelled_source_goes_dark() {
        let mut source = ScriptedHitTestSource::constant(Pose::default());
        assert!(source.poll(&frame(1)).is_some());
        source.cancel();
        assert!(source.is_cancelled());
        assert_eq!(source.poll(&frame(2)), None);
    }

    #[test]
    fn tally_tracks_issued_and_cancelled_sources() {
        let mut provider = SimulatedArProvider::default();
        let tally = provider.hit_test_tally();
        let mut session = provider.start(&SessionOptions::default()).expect("session");
        let mut source = session.request_hit_test_source().expect("source");
        assert_eq!(tally.issued(), 1);
        assert_eq!(tally.live(), 1);

        source.cancel();
        source.cancel();
        assert_eq!(tally.cancelled(), 1);
        assert_eq!(tally.live(), 0);
    }

    #[test]
    fn simulated_provider_reports_start_failure() {
        let mut provider = SimulatedArProvider::failing_start();
        let err = provider
            .start(&SessionOptions::default())
            .err()
            .expect("start should fail");
        assert!(matches!(err, ArError::SessionStart(_)));
        assert_eq!(provider.sessions_started(), 0);
    }

    #[test]
    fn simulated_session_without_hit_test_refuses_source() {
        let mut provider = SimulatedArProvider::default().without_hit_test();
        let mut session = provider.start(&SessionOptions::default()).expect("session");
        assert!(matches!(
            session.request_hit_test_source(),
            Err(ArError::HitTestUnavailable(_))
        ));
    }
}
