use crate::vr::XrFrame;
use std::time::{Duration, Instant};

pub trait System<W> {
    fn run(&mut self, world: &mut W, frame: &XrFrame);
}

/// Fixed per-frame phases, executed in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Tracking,
    Assets,
    Present,
}

impl Stage {
    pub const fn ordered() -> [Stage; 3] {
        [Stage::Tracking, Stage::Assets, Stage::Present]
    }

    pub const fn count() -> usize {
        3
    }

    pub fn index(self) -> usize {
        match self {
            Stage::Tracking => 0,
            Stage::Assets => 1,
            Stage::Present => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Tracking => "Tracking",
            Stage::Assets => "Assets",
            Stage::Present => "Present",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameProfile {
    frame_index: u64,
    stages: Vec<StageProfile>,
}

impl FrameProfile {
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn stages(&self) -> &[StageProfile] {
        &self.stages
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageProfile> {
        self.stages.iter().find(|profile| profile.stage == stage)
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|profile| profile.total).sum()
    }
}

#[derive(Debug, Clone)]
pub struct StageProfile {
    pub stage: Stage,
    pub total: Duration,
    pub systems: Vec<SystemProfile>,
}

impl StageProfile {
    pub fn total_ms(&self) -> f32 {
        self.total.as_secs_f64() as f32 * 1000.0
    }
}

#[derive(Debug, Clone)]
pub struct SystemProfile {
    pub name: &'static str,
    pub duration: Duration,
}

const SLOW_SYSTEM_THRESHOLD_MS: f32 = 4.0;
const SLOW_STAGE_THRESHOLD_MS: f32 = 12.0;

struct SystemEntry<W> {
    name: &'static str,
    system: Box<dyn System<W>>,
}

struct StageBucket<W> {
    stage: Stage,
    systems: Vec<SystemEntry<W>>,
}

/// Runs registered systems against a world once per host frame. Everything
/// executes on the caller's thread, stage by stage.
pub struct Scheduler<W> {
    buckets: Vec<StageBucket<W>>,
    last_profile: FrameProfile,
}

impl<W> Default for Scheduler<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Scheduler<W> {
    pub fn new() -> Self {
        let buckets = Stage::ordered()
            .into_iter()
            .map(|stage| StageBucket {
                stage,
                systems: Vec::new(),
            })
            .collect();
        Self {
            buckets,
            last_profile: FrameProfile::default(),
        }
    }

    pub fn last_profile(&self) -> &FrameProfile {
        &self.last_profile
    }

    pub fn system_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.systems.len()).sum()
    }

    pub fn add_system<S>(&mut self, stage: Stage, name: &'static str, system: S)
    where
        S: System<W> + 'static,
    {
        let bucket = &mut self.buckets[stage.index()];
        bucket.systems.push(SystemEntry {
            name,
            system: Box::new(system),
        });
    }

    pub fn add_system_fn<F>(&mut self, stage: Stage, name: &'static str, func: F)
    where
        F: FnMut(&mut W, &XrFrame) + 'static,
        W: 'static,
    {
        self.add_system(stage, name, FnSystem { func });
    }

    pub fn tick(&mut self, world: &mut W, frame: &XrFrame) {
        let mut frame_profile = FrameProfile {
            frame_index: frame.index,
            stages: Vec::with_capacity(self.buckets.len()),
        };

        for bucket in &mut self.buckets {
            let stage_start = Instant::now();
            let mut systems = Vec::with_capacity(bucket.systems.len());

            for entry in &mut bucket.systems {
                let system_start = Instant::now();
                entry.system.run(world, frame);
                let duration = system_start.elapsed();
                systems.push(SystemProfile {
                    name: entry.name,
                    duration,
                });

                if duration.as_secs_f32() * 1000.0 > SLOW_SYSTEM_THRESHOLD_MS {
                    log::warn!(
                        "[scheduler::{}] system {} took {:.3} ms",
                        bucket.stage.label(),
                        entry.name,
                        duration.as_secs_f64() * 1000.0,
                    );
                }
            }

            let total = stage_start.elapsed();
            if total.as_secs_f32() * 1000.0 > SLOW_STAGE_THRESHOLD_MS {
                log::warn!(
                    "[scheduler::{}] stage took {:.3} ms on frame {}",
                    bucket.stage.label(),
                    total.as_secs_f64() * 1000.0,
                    frame.index
                );
            }
            log::debug!(
                "[scheduler::{}] frame {} stage {:.3} ms ({} systems)",
                bucket.stage.label(),
                frame.index,
                total.as_secs_f64() * 1000.0,
                systems.len()
            );

            frame_profile.stages.push(StageProfile {
                stage: bucket.stage,
                total,
                systems,
            });
        }

        self.last_profile = frame_profile;
    }
}

struct FnSystem<F> {
    func: F,
}

impl<W, F> System<W> for FnSystem<F>
where
    F: FnMut(&mut W, &XrFrame),
{
    fn run(&mut self, world: &mut W, frame: &XrFrame) {
        (self.func)(world, frame);
    }
}
