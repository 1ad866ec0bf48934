use crate::assembly::catalog::CatalogId;
use serde::Serialize;
use std::fmt;

/// Position in the step sequence of the active catalog.
///
/// `Step(k)` always satisfies `1 <= k < N`; the terminal stage is its own
/// variant so "complete" can never be confused with a swap-carrying stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum StepState {
    Searching,
    Step(u32),
    Complete,
}

impl StepState {
    /// Maps a numeric stage index in `[0, N]` back to a state.
    pub fn from_index(index: u32, stage_count: u32) -> Option<Self> {
        match index {
            0 => Some(StepState::Searching),
            k if k == stage_count => Some(StepState::Complete),
            k if k < stage_count => Some(StepState::Step(k)),
            _ => None,
        }
    }

    pub fn index(self, stage_count: u32) -> u32 {
        match self {
            StepState::Searching => 0,
            StepState::Step(k) => k,
            StepState::Complete => stage_count,
        }
    }

    /// Pure transition table. Readiness gating happens on top of this in the
    /// controller.
    pub fn transition(
        self,
        action: &UserAction,
        stage_count: u32,
        surface_available: bool,
    ) -> Transition {
        use UserAction::{Confirm, Next, Previous, SwitchAssembly};

        match (self, action) {
            (_, SwitchAssembly(target)) => Transition::Switch {
                to: target.clone(),
            },
            (StepState::Searching, Confirm) if surface_available => Transition::Place,
            (StepState::Searching, Confirm) => Transition::Ignored(IgnoreReason::NoSurface),
            (StepState::Searching, Next | Previous) => {
                Transition::Ignored(IgnoreReason::NotPlaced)
            }
            (StepState::Step(k), Confirm | Next) if k + 1 >= stage_count => {
                Transition::Finish { from: k }
            }
            (StepState::Step(k), Confirm | Next) => Transition::Advance { from: k, to: k + 1 },
            (StepState::Step(k), Previous) if k <= 1 => {
                Transition::Ignored(IgnoreReason::AtFirstStage)
            }
            (StepState::Step(k), Previous) => Transition::Retreat { from: k, to: k - 1 },
            (StepState::Complete, Confirm | Next) => Transition::Ignored(IgnoreReason::AtTerminal),
            (StepState::Complete, Previous) => Transition::Reopen {
                from: stage_count,
                to: stage_count - 1,
            },
        }
    }

    /// State reached after applying `transition`.
    pub fn after(self, transition: &Transition, stage_count: u32) -> StepState {
        match transition {
            Transition::Place => StepState::Step(1).clamped(stage_count),
            Transition::Advance { to, .. } | Transition::Retreat { to, .. } => {
                StepState::Step(*to).clamped(stage_count)
            }
            Transition::Finish { .. } => StepState::Complete,
            Transition::Reopen { to, .. } => StepState::Step(*to).clamped(stage_count),
            Transition::Switch { .. } => StepState::Searching,
            Transition::Ignored(_) => self,
        }
    }

    fn clamped(self, stage_count: u32) -> StepState {
        match self {
            StepState::Step(k) if k >= stage_count => StepState::Complete,
            StepState::Step(0) => StepState::Searching,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserAction {
    Confirm,
    Next,
    Previous,
    SwitchAssembly(CatalogId),
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserAction::Confirm => f.write_str("confirm"),
            UserAction::Next => f.write_str("next"),
            UserAction::Previous => f.write_str("previous"),
            UserAction::SwitchAssembly(id) => write!(f, "switch-to-{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Searching -> 1: the first model appears at the tracked surface.
    Place,
    /// k -> k+1 with a model swap; the new model inherits the old position.
    Advance { from: u32, to: u32 },
    /// N-1 -> N; nothing is swapped.
    Finish { from: u32 },
    /// k -> k-1 with a model swap back to the recorded position.
    Retreat { from: u32, to: u32 },
    /// N -> N-1; nothing is swapped.
    Reopen { from: u32, to: u32 },
    Switch { to: CatalogId },
    Ignored(IgnoreReason),
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Transition::Ignored(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NoSurface,
    NotPlaced,
    AtFirstStage,
    AtTerminal,
    Loading { stage: u32 },
    Unavailable { stage: u32 },
    UnknownCatalog(CatalogId),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NoSurface => f.write_str("no surface tracked"),
            IgnoreReason::NotPlaced => f.write_str("nothing placed yet"),
            IgnoreReason::AtFirstStage => f.write_str("already at the first stage"),
            IgnoreReason::AtTerminal => f.write_str("assembly already complete"),
            IgnoreReason::Loading { stage } => write!(f, "stage {stage} still loading"),
            IgnoreReason::Unavailable { stage } => write!(f, "stage {stage} content unavailable"),
            IgnoreReason::UnknownCatalog(id) => write!(f, "unknown catalog {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: u32 = 8;

    #[test]
    fn index_round_trips_through_from_index() {
        for index in 0..=N {
            let state = StepState::from_index(index, N).expect("in range");
            assert_eq!(state.index(N), index);
        }
        assert_eq!(StepState::from_index(N + 1, N), None);
    }

    #[test]
    fn confirm_while_searching_needs_a_surface() {
        let searching = StepState::Searching;
        assert_eq!(
            searching.transition(&UserAction::Confirm, N, false),
            Transition::Ignored(IgnoreReason::NoSurface)
        );
        assert_eq!(
            searching.transition(&UserAction::Confirm, N, true),
            Transition::Place
        );
        assert_eq!(
            searching.transition(&UserAction::Next, N, true),
            Transition::Ignored(IgnoreReason::NotPlaced)
        );
    }

    #[test]
    fn next_and_confirm_advance_equally() {
        let state = StepState::Step(3);
        assert_eq!(
            state.transition(&UserAction::Next, N, false),
            state.transition(&UserAction::Confirm, N, false)
        );
        assert_eq!(
            state.transition(&UserAction::Next, N, false),
            Transition::Advance { from: 3, to: 4 }
        );
    }

    #[test]
    fn last_working_stage_finishes_without_swap() {
        let transition = StepState::Step(N - 1).transition(&UserAction::Next, N, false);
        assert_eq!(transition, Transition::Finish { from: N - 1 });
        assert_eq!(
            StepState::Step(N - 1).after(&transition, N),
            StepState::Complete
        );
    }

    #[test]
    fn boundaries_ignore_out_of_range_moves() {
        assert_eq!(
            StepState::Step(1).transition(&UserAction::Previous, N, true),
            Transition::Ignored(IgnoreReason::AtFirstStage)
        );
        assert_eq!(
            StepState::Complete.transition(&UserAction::Next, N, true),
            Transition::Ignored(IgnoreReason::AtTerminal)
        );
        assert_eq!(
            StepState::Complete.transition(&UserAction::Previous, N, true),
            Transition::Reopen { from: N, to: N - 1 }
        );
    }

    #[test]
    fn switch_is_valid_everywhere() {
        let target = CatalogId::new("table");
        for state in [
            StepState::Searching,
            StepState::Step(1),
            StepState::Step(5),
            StepState::Complete,
        ] {
            let transition = state.transition(&UserAction::SwitchAssembly(target.clone()), N, false);
            assert_eq!(state.after(&transition, N), StepState::Searching);
        }
    }

    #[test]
    fn two_stage_catalog_finishes_from_first_step() {
        assert_eq!(
            StepState::Step(1).transition(&UserAction::Confirm, 2, false),
            Transition::Finish { from: 1 }
        );
        assert_eq!(
            StepState::Complete.transition(&UserAction::Previous, 2, false),
            Transition::Reopen { from: 2, to: 1 }
        );
    }
}
