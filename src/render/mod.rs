use crate::scene::{NodeKind, SceneGraph};
use crate::vr::XrFrame;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub frame_index: u64,
    pub models: usize,
    pub reticle_visible: bool,
}

#[derive(Debug)]
pub enum RenderError {
    FrameOutOfOrder { expected: u64, got: u64 },
    Backend(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::FrameOutOfOrder { expected, got } => write!(
                f,
                "renderer expected frame {expected} or later but host delivered {got}"
            ),
            RenderError::Backend(reason) => write!(f, "render backend failure: {reason}"),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;

/// Draws a scene for one host frame. Implementations own every pixel; the
/// assembly core only hands over the scene graph.
pub trait SceneRenderer {
    fn label(&self) -> &'static str;
    fn draw(&mut self, scene: &SceneGraph, frame: &XrFrame) -> RenderResult<DrawStats>;
}

#[derive(Default)]
pub struct NullSceneRenderer;

impl SceneRenderer for NullSceneRenderer {
    fn label(&self) -> &'static str {
        "Null Scene Renderer"
    }

    fn draw(&mut self, scene: &SceneGraph, frame: &XrFrame) -> RenderResult<DrawStats> {
        let models = scene
            .models()
            .iter()
            .filter(|(_, node)| node.visible && matches!(node.kind, NodeKind::Model(_)))
            .count();
        Ok(DrawStats {
            frame_index: frame.index,
            models,
            reticle_visible: scene.reticle().is_some(),
        })
    }
}

/// Wraps a [`SceneRenderer`] and rejects frames the host delivers out of order.
pub struct Renderer {
    backend: Box<dyn SceneRenderer>,
    last_frame: Option<u64>,
    frames_drawn: u64,
    last_stats: Option<DrawStats>,
}

impl Renderer {
    pub fn new(backend: Box<dyn SceneRenderer>) -> Self {
        Self {
            backend,
            last_frame: None,
            frames_drawn: 0,
            last_stats: None,
        }
    }

    pub fn render(&mut self, scene: &SceneGraph, frame: &XrFrame) -> RenderResult<DrawStats> {
        if let Some(last) = self.last_frame {
            if frame.index <= last {
                log::debug!("[render] dropping frame {} after {last}", frame.index);
                return Err(RenderError::FrameOutOfOrder {
                    expected: last + 1,
                    got: frame.index,
                });
            }
        }

        let stats = self.backend.draw(scene, frame)?;
        self.last_frame = Some(frame.index);
        self.frames_drawn += 1;
        self.last_stats = Some(stats);
        Ok(stats)
    }

    /// Forgets frame ordering; each AR session restarts its frame counter.
    pub fn reset(&mut self) {
        log::debug!("[render] {} reset", self.backend.label());
        self.last_frame = None;
        self.last_stats = None;
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn last_stats(&self) -> Option<DrawStats> {
        self.last_stats
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Box::new(NullSceneRenderer))
    }
}
