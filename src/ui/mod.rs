use crate::assembly::{CatalogId, UiAffordanceState};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub const ENTER_LABEL: &str = "Enter AR";
pub const EXIT_LABEL: &str = "Exit AR";
pub const UNSUPPORTED_LABEL: &str = "AR not found";
pub const START_FAILED_MESSAGE: &str = "Failed to start AR session.";

/// Named overlay controls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Control {
    Session,
    Previous,
    Next,
    Confirm,
    SwitchTo(CatalogId),
}

impl Control {
    pub fn parse(name: &str) -> Option<Control> {
        match name {
            "xr-button" => Some(Control::Session),
            "previous" => Some(Control::Previous),
            "next" => Some(Control::Next),
            "confirm" => Some(Control::Confirm),
            other => other
                .strip_prefix("switch-to-")
                .filter(|id| !id.is_empty())
                .map(|id| Control::SwitchTo(CatalogId::new(id))),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Session => f.write_str("xr-button"),
            Control::Previous => f.write_str("previous"),
            Control::Next => f.write_str("next"),
            Control::Confirm => f.write_str("confirm"),
            Control::SwitchTo(id) => write!(f, "switch-to-{id}"),
        }
    }
}

/// Host overlay the runtime drives.
pub trait UiSurface {
    fn set_enabled(&mut self, control: &Control, enabled: bool);
    fn set_label(&mut self, control: &Control, label: &str);
    fn set_instruction(&mut self, text: &str);
    fn set_notice(&mut self, text: Option<&str>);
    fn set_info(&mut self, text: &str);
    fn set_overlay_visible(&mut self, visible: bool);
}

/// Pushes affordance changes to a [`UiSurface`], touching only controls whose
/// state differs from what was presented last.
pub struct UiPresenter {
    surface: Box<dyn UiSurface>,
    last: Option<UiAffordanceState>,
    presented: u64,
}

impl UiPresenter {
    pub fn new(surface: Box<dyn UiSurface>) -> Self {
        Self {
            surface,
            last: None,
            presented: 0,
        }
    }

    /// Returns whether anything was pushed to the surface.
    pub fn present(&mut self, state: &UiAffordanceState) -> bool {
        let previous = self.last.take();
        if previous.as_ref() == Some(state) {
            self.last = previous;
            return false;
        }

        let changed = |select: fn(&UiAffordanceState) -> bool| {
            previous
                .as_ref()
                .map_or(true, |last| select(last) != select(state))
        };
        if changed(|s| s.previous) {
            self.surface.set_enabled(&Control::Previous, state.previous);
        }
        if changed(|s| s.next) {
            self.surface.set_enabled(&Control::Next, state.next);
        }
        if changed(|s| s.confirm) {
            self.surface.set_enabled(&Control::Confirm, state.confirm);
        }

        let catalog_changed = previous
            .as_ref()
            .map_or(true, |last| last.catalog != state.catalog);
        let targets_changed = previous
            .as_ref()
            .map_or(true, |last| last.switch_targets != state.switch_targets);
        if catalog_changed || targets_changed {
            self.surface
                .set_enabled(&Control::SwitchTo(state.catalog.clone()), false);
            for target in &state.switch_targets {
                self.surface
                    .set_enabled(&Control::SwitchTo(target.clone()), true);
            }
        }

        if previous
            .as_ref()
            .map_or(true, |last| last.instruction != state.instruction)
        {
            self.surface.set_instruction(&state.instruction);
        }
        if previous
            .as_ref()
            .map_or(true, |last| last.notice != state.notice)
        {
            self.surface
                .set_notice(state.notice.map(|notice| notice.message()));
        }

        self.presented += 1;
        log::debug!(
            "[ui] stage {}/{} prev:{} next:{} confirm:{} notice:{:?}",
            state.stage,
            state.stage_count,
            state.previous,
            state.next,
            state.confirm,
            state.notice
        );
        self.last = Some(state.clone());
        true
    }

    pub fn session_available(&mut self, supported: bool) {
        let label = if supported {
            ENTER_LABEL
        } else {
            UNSUPPORTED_LABEL
        };
        self.surface.set_label(&Control::Session, label);
        self.surface.set_enabled(&Control::Session, supported);
    }

    pub fn session_started(&mut self, overlay_type: Option<&str>) {
        self.last = None;
        self.surface.set_label(&Control::Session, EXIT_LABEL);
        self.surface.set_overlay_visible(true);
        if let Some(kind) = overlay_type {
            self.surface.set_info(&format!("DOM Overlay type: {kind}"));
        }
    }

    pub fn session_failed(&mut self) {
        self.surface.set_info(START_FAILED_MESSAGE);
    }

    pub fn session_ended(&mut self) {
        self.last = None;
        self.surface.set_label(&Control::Session, ENTER_LABEL);
        self.surface.set_info("");
        self.surface.set_overlay_visible(false);
    }

    pub fn last_presented(&self) -> Option<&UiAffordanceState> {
        self.last.as_ref()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub struct RecordedUi {
    pub controls: HashMap<Control, ControlState>,
    pub labels: HashMap<Control, String>,
    pub instruction: String,
    pub notice: Option<String>,
    pub info: String,
    pub overlay_visible: bool,
    pub writes: usize,
}

/// In-memory surface. Clones share the same record so callers can inspect
/// what the runtime pushed.
#[derive(Debug, Clone, Default)]
pub struct RecordingUi {
    record: Rc<RefCell<RecordedUi>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, control: &Control) -> bool {
        self.record
            .borrow()
            .controls
            .get(control)
            .map(|state| state.enabled)
            .unwrap_or(false)
    }

    pub fn label(&self, control: &Control) -> Option<String> {
        self.record.borrow().labels.get(control).cloned()
    }

    pub fn instruction(&self) -> String {
        self.record.borrow().instruction.clone()
    }

    pub fn notice(&self) -> Option<String> {
        self.record.borrow().notice.clone()
    }

    pub fn info(&self) -> String {
        self.record.borrow().info.clone()
    }

    pub fn overlay_visible(&self) -> bool {
        self.record.borrow().overlay_visible
    }

    pub fn writes(&self) -> usize {
        self.record.borrow().writes
    }
}

impl UiSurface for RecordingUi {
    fn set_enabled(&mut self, control: &Control, enabled: bool) {
        let mut record = self.record.borrow_mut();
        record.writes += 1;
        record
            .controls
            .insert(control.clone(), ControlState { enabled });
    }

    fn set_label(&mut self, control: &Control, label: &str) {
        let mut record = self.record.borrow_mut();
        record.writes += 1;
        record.labels.insert(control.clone(), label.to_string());
    }

    fn set_instruction(&mut self, text: &str) {
        let mut record = self.record.borrow_mut();
        record.writes += 1;
        record.instruction = text.to_string();
    }

    fn set_notice(&mut self, text: Option<&str>) {
        let mut record = self.record.borrow_mut();
        record.writes += 1;
        record.notice = text.map(str::to_string);
    }

    fn set_info(&mut self, text: &str) {
        let mut record = self.record.borrow_mut();
        record.writes += 1;
        record.info = text.to_string();
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        let mut record = self.record.borrow_mut();
        record.writes += 1;
        record.overlay_visible = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Notice;

    fn state(stage: u32) -> UiAffordanceState {
        UiAffordanceState {
            catalog: CatalogId::new("shelf"),
            stage,
            stage_count: 8,
            previous: stage >= 2,
            next: (2..8).contains(&stage),
            confirm: stage == 1,
            switch_targets: vec![CatalogId::new("table")],
            instruction: format!("stage {stage}"),
            notice: (stage == 8).then_some(Notice::Finished),
        }
    }

    #[test]
    fn control_names_round_trip() {
        for control in [
            Control::Session,
            Control::Previous,
            Control::Next,
            Control::Confirm,
            Control::SwitchTo(CatalogId::new("table")),
        ] {
            assert_eq!(Control::parse(&control.to_string()), Some(control));
        }
        assert_eq!(Control::parse("switch-to-"), None);
        assert_eq!(Control::parse("reload"), None);
    }

    #[test]
    fn presenting_identical_state_is_silent() {
        let ui = RecordingUi::new();
        let mut presenter = UiPresenter::new(Box::new(ui.clone()));

        assert!(presenter.present(&state(1)));
        let writes = ui.writes();
        assert!(!presenter.present(&state(1)));
        assert_eq!(ui.writes(), writes);
        assert_eq!(presenter.presented(), 1);
    }

    #[test]
    fn only_changed_controls_are_touched() {
        let ui = RecordingUi::new();
        let mut presenter = UiPresenter::new(Box::new(ui.clone()));
        presenter.present(&state(3));
        let writes = ui.writes();

        presenter.present(&state(4));
        // only the instruction text differs between two middle stages
        assert_eq!(ui.writes(), writes + 1);
        assert_eq!(ui.instruction(), "stage 4");
        assert!(ui.is_enabled(&Control::Previous));
        assert!(ui.is_enabled(&Control::Next));
        assert!(!ui.is_enabled(&Control::Confirm));
        assert!(ui.is_enabled(&Control::SwitchTo(CatalogId::new("table"))));
        assert!(!ui.is_enabled(&Control::SwitchTo(CatalogId::new("shelf"))));
    }

    #[test]
    fn finished_notice_is_shown_at_terminal_stage() {
        let ui = RecordingUi::new();
        let mut presenter = UiPresenter::new(Box::new(ui.clone()));
        presenter.present(&state(8));
        assert_eq!(ui.notice().as_deref(), Some(Notice::Finished.message()));
        assert!(ui.is_enabled(&Control::Previous));
        assert!(!ui.is_enabled(&Control::Next));
    }

    #[test]
    fn session_lifecycle_updates_labels() {
        let ui = RecordingUi::new();
        let mut presenter = UiPresenter::new(Box::new(ui.clone()));

        presenter.session_available(false);
        assert_eq!(ui.label(&Control::Session).as_deref(), Some(UNSUPPORTED_LABEL));
        assert!(!ui.is_enabled(&Control::Session));

        presenter.session_available(true);
        presenter.session_started(Some("screen"));
        assert_eq!(ui.label(&Control::Session).as_deref(), Some(EXIT_LABEL));
        assert!(ui.overlay_visible());
        assert_eq!(ui.info(), "DOM Overlay type: screen");

        presenter.session_ended();
        assert_eq!(ui.label(&Control::Session).as_deref(), Some(ENTER_LABEL));
        assert!(!ui.overlay_visible());
        assert_eq!(ui.info(), "");
        assert!(presenter.last_presented().is_none());
    }
}
