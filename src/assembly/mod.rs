pub mod affordance;
pub mod catalog;
pub mod controller;
pub mod state;

pub use affordance::{Notice, ReadinessGate, UiAffordanceState};
pub use catalog::{AssemblyCatalog, CatalogError, CatalogId, CatalogSet, ModelRef, Stage};
pub use controller::{ActionOutcome, AssemblyController, DEFAULT_ASSET_TIMEOUT};
pub use state::{IgnoreReason, StepState, Transition, UserAction};
