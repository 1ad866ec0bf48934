use crate::assembly::catalog::{AssemblyCatalog, CatalogId};
use crate::assembly::state::StepState;
use crate::assets::{Readiness, ReadinessMap};
use crate::scene::ObjectKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    Loading,
    ContentUnavailable,
    Finished,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::Loading => "Loading furniture models...",
            Notice::ContentUnavailable => "Content for the next step is unavailable.",
            Notice::Finished => "Assembly complete.",
        }
    }
}

/// How much of a catalog must be loaded before the first placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessGate {
    /// Each stage waits only for its own model.
    #[default]
    PerStage,
    /// Placement waits until every model of the catalog has loaded.
    WholeCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Availability {
    Ready,
    Loading,
    Unavailable,
}

pub(crate) fn stage_availability(
    catalog: &AssemblyCatalog,
    readiness: &ReadinessMap,
    ordinal: u32,
) -> Availability {
    if catalog.model(ordinal).is_none() {
        // the terminal stage swaps nothing in
        return Availability::Ready;
    }
    match readiness.get(&ObjectKey::new(catalog.id().clone(), ordinal)) {
        Some(Readiness::Ready(_)) => Availability::Ready,
        Some(Readiness::Failed(_)) => Availability::Unavailable,
        Some(Readiness::Pending { .. }) | None => Availability::Loading,
    }
}

pub(crate) fn placement_availability(
    catalog: &AssemblyCatalog,
    readiness: &ReadinessMap,
    gate: ReadinessGate,
) -> Availability {
    match gate {
        ReadinessGate::PerStage => stage_availability(catalog, readiness, 1),
        ReadinessGate::WholeCatalog => {
            let mut result = Availability::Ready;
            for (ordinal, _) in catalog.models() {
                match stage_availability(catalog, readiness, ordinal) {
                    Availability::Unavailable => return Availability::Unavailable,
                    Availability::Loading => result = Availability::Loading,
                    Availability::Ready => {}
                }
            }
            result
        }
    }
}

/// Derived control state for the overlay. Always recomputed from the
/// session, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiAffordanceState {
    pub catalog: CatalogId,
    pub stage: u32,
    pub stage_count: u32,
    pub previous: bool,
    pub next: bool,
    pub confirm: bool,
    pub switch_targets: Vec<CatalogId>,
    pub instruction: String,
    pub notice: Option<Notice>,
}

impl UiAffordanceState {
    pub fn derive(
        catalog: &AssemblyCatalog,
        state: StepState,
        readiness: &ReadinessMap,
        gate: ReadinessGate,
        switch_targets: Vec<CatalogId>,
    ) -> Self {
        let stage_count = catalog.stage_count();
        let stage = state.index(stage_count);

        let (previous, next, confirm, notice) = match state {
            StepState::Searching => {
                let notice = notice_for(placement_availability(catalog, readiness, gate));
                (false, false, false, notice)
            }
            StepState::Step(1) => {
                let availability = stage_availability(catalog, readiness, 2);
                (
                    false,
                    false,
                    availability == Availability::Ready,
                    notice_for(availability),
                )
            }
            StepState::Step(k) => {
                let availability = stage_availability(catalog, readiness, k + 1);
                (
                    true,
                    availability == Availability::Ready,
                    false,
                    notice_for(availability),
                )
            }
            StepState::Complete => (true, false, false, Some(Notice::Finished)),
        };

        Self {
            catalog: catalog.id().clone(),
            stage,
            stage_count,
            previous,
            next,
            confirm,
            switch_targets,
            instruction: catalog.instruction(stage).to_string(),
            notice,
        }
    }
}

fn notice_for(availability: Availability) -> Option<Notice> {
    match availability {
        Availability::Ready => None,
        Availability::Loading => Some(Notice::Loading),
        Availability::Unavailable => Some(Notice::ContentUnavailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::catalog::shelf;
    use crate::assets::{AssetCompletion, LoadError, ModelId};
    use crate::scene::SceneObject;
    use std::time::Duration;

    fn loaded(catalog: &AssemblyCatalog) -> ReadinessMap {
        let mut readiness = ReadinessMap::new();
        for (ordinal, model) in catalog.models() {
            let key = ObjectKey::new(catalog.id().clone(), ordinal);
            readiness.mark_requested(key.clone(), model.path.clone(), Duration::ZERO);
            readiness.complete(AssetCompletion {
                session: 0,
                key,
                result: Ok(SceneObject::new(model.id.clone(), model.path.clone())),
            });
        }
        readiness
    }

    fn derive(state: StepState, readiness: &ReadinessMap) -> UiAffordanceState {
        UiAffordanceState::derive(
            &shelf(),
            state,
            readiness,
            ReadinessGate::PerStage,
            Vec::new(),
        )
    }

    #[test]
    fn affordances_follow_stage_rules() {
        let readiness = loaded(&shelf());

        let searching = derive(StepState::Searching, &readiness);
        assert!(!searching.previous && !searching.next && !searching.confirm);
        assert_eq!(searching.notice, None);

        let first = derive(StepState::Step(1), &readiness);
        assert!(first.confirm && !first.previous && !first.next);

        let middle = derive(StepState::Step(4), &readiness);
        assert!(middle.previous && middle.next && !middle.confirm);
        assert!(middle.instruction.starts_with("Step 4"));

        let done = derive(StepState::Complete, &readiness);
        assert!(done.previous && !done.next && !done.confirm);
        assert_eq!(done.stage, 8);
        assert_eq!(done.notice, Some(Notice::Finished));
    }

    #[test]
    fn derivation_is_deterministic() {
        let readiness = loaded(&shelf());
        for index in 0..=8 {
            let state = StepState::from_index(index, 8).expect("valid index");
            assert_eq!(derive(state, &readiness), derive(state, &readiness));
        }
    }

    #[test]
    fn pending_next_stage_disables_next_with_loading_notice() {
        let catalog = shelf();
        let mut readiness = ReadinessMap::new();
        let key = ObjectKey::new(catalog.id().clone(), 3);
        readiness.mark_requested(key, "./model/step-3.glb", Duration::ZERO);

        let state = derive(StepState::Step(2), &readiness);
        assert!(state.previous);
        assert!(!state.next);
        assert_eq!(state.notice, Some(Notice::Loading));
    }

    #[test]
    fn failed_next_stage_reports_unavailable() {
        let catalog = shelf();
        let mut readiness = ReadinessMap::new();
        let key = ObjectKey::new(catalog.id().clone(), 2);
        readiness.mark_requested(key.clone(), "./model/step-2.glb", Duration::ZERO);
        readiness.complete(AssetCompletion {
            session: 0,
            key,
            result: Err(LoadError::NotFound("./model/step-2.glb".to_string())),
        });

        let state = derive(StepState::Step(1), &readiness);
        assert!(!state.confirm);
        assert_eq!(state.notice, Some(Notice::ContentUnavailable));
    }

    #[test]
    fn whole_catalog_gate_waits_for_every_model() {
        let catalog = shelf();
        let mut readiness = ReadinessMap::new();
        let first = ObjectKey::new(catalog.id().clone(), 1);
        readiness.mark_requested(first.clone(), "./model/step-1.glb", Duration::ZERO);
        readiness.complete(AssetCompletion {
            session: 0,
            key: first,
            result: Ok(SceneObject::new(ModelId::new("step-1"), "./model/step-1.glb")),
        });

        assert_eq!(
            placement_availability(&catalog, &readiness, ReadinessGate::PerStage),
            Availability::Ready
        );
        assert_eq!(
            placement_availability(&catalog, &readiness, ReadinessGate::WholeCatalog),
            Availability::Loading
        );
    }
}
