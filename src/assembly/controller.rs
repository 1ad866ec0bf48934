use crate::assembly::affordance::{
    Availability, ReadinessGate, UiAffordanceState, placement_availability, stage_availability,
};
use crate::assembly::catalog::{AssemblyCatalog, CatalogId, CatalogSet};
use crate::assembly::state::{IgnoreReason, StepState, Transition, UserAction};
use crate::assets::{AssetCompletion, AssetRequest, ReadinessMap, ReadinessSummary};
use crate::scene::{ObjectKey, SceneCommand, SceneObject};
use crate::vr::Pose;
use std::time::Duration;

pub const DEFAULT_ASSET_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of handling one user action: the transition taken and the scene
/// mutations to apply, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub transition: Transition,
    pub commands: Vec<SceneCommand>,
}

impl ActionOutcome {
    fn ignored(reason: IgnoreReason) -> Self {
        Self {
            transition: Transition::Ignored(reason),
            commands: Vec::new(),
        }
    }
}

/// Owns the live assembly session: active catalog, step state, placement
/// history and per-stage asset readiness.
pub struct AssemblyController {
    session: u32,
    catalogs: CatalogSet,
    active: CatalogId,
    state: StepState,
    readiness: ReadinessMap,
    /// Placement recorded for each stage ordinal; slot 0 is unused.
    history: Vec<Option<Pose>>,
    visible: Option<ObjectKey>,
    gate: ReadinessGate,
    asset_timeout: Duration,
    clock: Duration,
}

impl AssemblyController {
    pub fn new(catalogs: CatalogSet, initial: Option<&CatalogId>) -> Self {
        let active = match initial {
            Some(id) if catalogs.contains(id) => id.clone(),
            Some(id) => {
                log::warn!(
                    "[assembly] unknown initial catalog {id}; using {}",
                    catalogs.first().id()
                );
                catalogs.first().id().clone()
            }
            None => catalogs.first().id().clone(),
        };

        let mut controller = Self {
            session: 0,
            catalogs,
            active,
            state: StepState::Searching,
            readiness: ReadinessMap::new(),
            history: Vec::new(),
            visible: None,
            gate: ReadinessGate::default(),
            asset_timeout: DEFAULT_ASSET_TIMEOUT,
            clock: Duration::ZERO,
        };
        controller.reset_history();
        controller
    }

    /// Tags this controller's load requests; completions carrying any other
    /// session number are discarded.
    pub fn with_session(mut self, session: u32) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> u32 {
        self.session
    }

    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_asset_timeout(mut self, timeout: Duration) -> Self {
        self.asset_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &AssemblyCatalog {
        self.catalogs
            .get(&self.active)
            .unwrap_or_else(|| self.catalogs.first())
    }

    pub fn catalogs(&self) -> &CatalogSet {
        &self.catalogs
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Numeric stage in `[0, N]`.
    pub fn stage_index(&self) -> u32 {
        self.state.index(self.catalog().stage_count())
    }

    pub fn visible(&self) -> Option<&ObjectKey> {
        self.visible.as_ref()
    }

    pub fn visible_pose(&self) -> Option<Pose> {
        self.visible
            .as_ref()
            .and_then(|key| self.recorded_pose(key.stage))
    }

    pub fn recorded_pose(&self, ordinal: u32) -> Option<Pose> {
        self.history.get(ordinal as usize).copied().flatten()
    }

    pub fn readiness(&self) -> &ReadinessMap {
        &self.readiness
    }

    pub fn readiness_summary(&self) -> ReadinessSummary {
        self.readiness.summary(&self.active)
    }

    /// Load requests for every model of the active catalog not yet tracked.
    pub fn request_assets(&mut self) -> Vec<AssetRequest> {
        let catalog_id = self.active.clone();
        let models = self
            .catalog()
            .models()
            .map(|(ordinal, model)| (ordinal, model.clone()))
            .collect::<Vec<_>>();

        let mut requests = Vec::new();
        for (ordinal, model) in models {
            let key = ObjectKey::new(catalog_id.clone(), ordinal);
            if self
                .readiness
                .mark_requested(key.clone(), model.path.clone(), self.clock)
            {
                requests.push(AssetRequest {
                    session: self.session,
                    key,
                    model: model.id,
                    path: model.path,
                });
            }
        }
        if !requests.is_empty() {
            log::info!(
                "[assembly] requesting {} models for {}",
                requests.len(),
                catalog_id
            );
        }
        requests
    }

    /// Records a loader completion. Completions may arrive for any catalog
    /// in any order; ones from another session or naming a stage the catalog
    /// does not have are dropped.
    pub fn record_completion(&mut self, completion: AssetCompletion) -> bool {
        if completion.session != self.session {
            log::debug!(
                "[assembly] dropping completion for {} from session {} (live session {})",
                completion.key,
                completion.session,
                self.session
            );
            return false;
        }
        let known = self
            .catalogs
            .get(&completion.key.catalog)
            .and_then(|catalog| catalog.model(completion.key.stage))
            .is_some();
        if !known {
            log::warn!(
                "[assembly] dropping completion for unknown stage {}",
                completion.key
            );
            return false;
        }
        self.readiness.complete(completion)
    }

    /// Advances the controller clock and fails loads pending past the timeout.
    pub fn advance_clock(&mut self, now: Duration) -> Vec<ObjectKey> {
        self.clock = self.clock.max(now);
        self.readiness
            .expire_overdue(self.clock, self.asset_timeout)
    }

    pub fn affordances(&self) -> UiAffordanceState {
        let switch_targets = self
            .catalogs
            .ids()
            .filter(|id| **id != self.active)
            .cloned()
            .collect();
        UiAffordanceState::derive(
            self.catalog(),
            self.state,
            &self.readiness,
            self.gate,
            switch_targets,
        )
    }

    pub fn handle(&mut self, action: &UserAction, surface: Option<Pose>) -> ActionOutcome {
        let stage_count = self.catalog().stage_count();
        let before = self.stage_index();
        let planned = self
            .state
            .transition(action, stage_count, surface.is_some());

        let outcome = match planned {
            Transition::Place => match surface {
                Some(pose) => self.place(pose),
                None => ActionOutcome::ignored(IgnoreReason::NoSurface),
            },
            Transition::Advance { from, to } => self.swap(from, to, planned.clone()),
            Transition::Retreat { from, to } => self.swap(from, to, planned.clone()),
            Transition::Finish { .. } | Transition::Reopen { .. } => ActionOutcome {
                transition: planned,
                commands: Vec::new(),
            },
            Transition::Switch { ref to } => self.switch(to),
            Transition::Ignored(reason) => ActionOutcome::ignored(reason),
        };

        match &outcome.transition {
            Transition::Ignored(reason) => {
                log::debug!(
                    "[assembly] {action} ignored at stage {}: {reason}",
                    self.stage_index()
                );
            }
            transition => {
                if !matches!(transition, Transition::Switch { .. }) {
                    self.state = self.state.after(transition, stage_count);
                }
                log::info!(
                    "[assembly] {action}: stage {before} -> {} ({:?})",
                    self.stage_index(),
                    transition
                );
            }
        }
        outcome
    }

    fn place(&mut self, surface: Pose) -> ActionOutcome {
        match placement_availability(self.catalog(), &self.readiness, self.gate) {
            Availability::Ready => {}
            Availability::Loading => {
                return ActionOutcome::ignored(IgnoreReason::Loading { stage: 1 });
            }
            Availability::Unavailable => {
                return ActionOutcome::ignored(IgnoreReason::Unavailable { stage: 1 });
            }
        }
        let object = match self.object_for(1) {
            Ok(object) => object,
            Err(reason) => return ActionOutcome::ignored(reason),
        };

        let pose = surface.translation();
        let key = self.key(1);
        self.record(1, pose);
        self.visible = Some(key.clone());
        ActionOutcome {
            transition: Transition::Place,
            commands: vec![
                SceneCommand::HideReticle,
                SceneCommand::Add { key, object, pose },
            ],
        }
    }

    /// Replaces the stage `from` object with the stage `to` object. Forward
    /// swaps carry the current position over; backward swaps restore the
    /// position recorded when `to` was last shown.
    fn swap(&mut self, from: u32, to: u32, transition: Transition) -> ActionOutcome {
        let object = match self.object_for(to) {
            Ok(object) => object,
            Err(reason) => return ActionOutcome::ignored(reason),
        };

        let current = self.visible_pose().or_else(|| self.recorded_pose(from));
        let target = if to > from {
            current
        } else {
            self.recorded_pose(to).or(current)
        };
        let pose = target.unwrap_or_default();

        self.record(to, pose);
        let mut commands = Vec::with_capacity(2);
        if let Some(previous) = self.visible.take() {
            commands.push(SceneCommand::Remove { key: previous });
        }
        let key = self.key(to);
        self.visible = Some(key.clone());
        commands.push(SceneCommand::Add { key, object, pose });

        ActionOutcome {
            transition,
            commands,
        }
    }

    fn switch(&mut self, to: &CatalogId) -> ActionOutcome {
        if !self.catalogs.contains(to) {
            return ActionOutcome::ignored(IgnoreReason::UnknownCatalog(to.clone()));
        }

        let mut commands = Vec::with_capacity(2);
        if let Some(previous) = self.visible.take() {
            commands.push(SceneCommand::Remove { key: previous });
        }
        commands.push(SceneCommand::HideReticle);

        self.active = to.clone();
        self.state = StepState::Searching;
        self.reset_history();

        ActionOutcome {
            transition: Transition::Switch { to: to.clone() },
            commands,
        }
    }

    fn object_for(&self, ordinal: u32) -> Result<SceneObject, IgnoreReason> {
        match stage_availability(self.catalog(), &self.readiness, ordinal) {
            Availability::Loading => return Err(IgnoreReason::Loading { stage: ordinal }),
            Availability::Unavailable => return Err(IgnoreReason::Unavailable { stage: ordinal }),
            Availability::Ready => {}
        }
        self.readiness
            .object(&self.key(ordinal))
            .cloned()
            .ok_or(IgnoreReason::Unavailable { stage: ordinal })
    }

    fn key(&self, ordinal: u32) -> ObjectKey {
        ObjectKey::new(self.active.clone(), ordinal)
    }

    fn record(&mut self, ordinal: u32, pose: Pose) {
        let slot = ordinal as usize;
        if self.history.len() <= slot {
            self.history.resize(slot + 1, None);
        }
        self.history[slot] = Some(pose);
    }

    fn reset_history(&mut self) {
        let slots = self.catalog().stage_count() as usize + 1;
        self.history = vec![None; slots];
        self.visible = None;
    }
}
