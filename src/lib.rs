pub mod assembly;
pub mod assets;
pub mod engine;
pub mod render;
pub mod scene;
pub mod ui;
pub mod vr;

pub use engine::{ArRuntime, RuntimeConfig, SessionEvent, SessionToggle};
