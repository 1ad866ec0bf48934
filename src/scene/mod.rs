use crate::assembly::catalog::CatalogId;
use crate::assets::ModelId;
use crate::vr::Pose;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Handle referencing a node within the scene graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// A loaded 3-D asset ready to be attached to the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub model: ModelId,
    pub source: String,
    pub scale: [f32; 3],
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl SceneObject {
    pub fn new(model: ModelId, source: impl Into<String>) -> Self {
        Self {
            model,
            source: source.into(),
            scale: [1.0, 1.0, 1.0],
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = [scale, scale, scale];
        self
    }

    pub fn with_shadows(mut self, enabled: bool) -> Self {
        self.cast_shadow = enabled;
        self.receive_shadow = enabled;
        self
    }
}

/// Identifies the object owned by one assembly stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub catalog: CatalogId,
    pub stage: u32,
}

impl ObjectKey {
    pub fn new(catalog: CatalogId, stage: u32) -> Self {
        Self { catalog, stage }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.catalog, self.stage)
    }
}

/// Scene mutations issued by the assembly controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    Add {
        key: ObjectKey,
        object: SceneObject,
        pose: Pose,
    },
    Remove {
        key: ObjectKey,
    },
    HideReticle,
}

impl SceneCommand {
    pub fn is_add(&self) -> bool {
        matches!(self, SceneCommand::Add { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, SceneCommand::Remove { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Light { intensity: f32, range: f32 },
    Reticle,
    Model(ObjectKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub object: Option<SceneObject>,
    pub pose: Pose,
    pub visible: bool,
}

#[derive(Default)]
struct NodeRecord {
    generation: u32,
    alive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    NoSuchNode(NodeHandle),
    DuplicateObject(ObjectKey),
    UnknownObject(ObjectKey),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::NoSuchNode(handle) => {
                write!(f, "node {:?} is not alive in this scene", handle)
            }
            SceneError::DuplicateObject(key) => write!(f, "object {key} is already in the scene"),
            SceneError::UnknownObject(key) => write!(f, "object {key} is not in the scene"),
        }
    }
}

impl std::error::Error for SceneError {}

/// Node storage for one AR session. Slots are recycled with bumped
/// generations so stale handles never alias a newer node.
pub struct SceneGraph {
    records: Vec<NodeRecord>,
    nodes: Vec<Option<SceneNode>>,
    free_list: Vec<u32>,
    objects: HashMap<ObjectKey, NodeHandle>,
    reticle: NodeHandle,
    mutations: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Creates a scene holding the soft point light and a hidden reticle.
    pub fn new() -> Self {
        let mut scene = Self {
            records: Vec::new(),
            nodes: Vec::new(),
            free_list: Vec::new(),
            objects: HashMap::new(),
            reticle: NodeHandle::new(0, 0),
            mutations: 0,
        };
        scene.spawn(SceneNode {
            kind: NodeKind::Light {
                intensity: 2.0,
                range: 100.0,
            },
            object: None,
            pose: Pose::from_position([0.0, 5.0, 1.0]),
            visible: true,
        });
        scene.reticle = scene.spawn(SceneNode {
            kind: NodeKind::Reticle,
            object: None,
            pose: Pose::default(),
            visible: false,
        });
        scene
    }

    pub fn spawn(&mut self, node: SceneNode) -> NodeHandle {
        self.mutations += 1;
        if let Some(index) = self.free_list.pop() {
            let record = &mut self.records[index as usize];
            record.alive = true;
            self.nodes[index as usize] = Some(node);
            NodeHandle::new(index, record.generation)
        } else {
            let index = self.records.len() as u32;
            self.records.push(NodeRecord {
                generation: 0,
                alive: true,
            });
            self.nodes.push(Some(node));
            NodeHandle::new(index, 0)
        }
    }

    pub fn despawn(&mut self, handle: NodeHandle) -> Result<SceneNode, SceneError> {
        self.validate(handle)?;
        self.mutations += 1;
        let record = &mut self.records[handle.index as usize];
        record.alive = false;
        record.generation = record.generation.wrapping_add(1);
        if !self.free_list.contains(&handle.index) {
            self.free_list.push(handle.index);
        }
        self.nodes[handle.index as usize]
            .take()
            .ok_or(SceneError::NoSuchNode(handle))
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.records
            .get(handle.index as usize)
            .map(|record| record.alive && record.generation == handle.generation)
            .unwrap_or(false)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&SceneNode> {
        if !self.contains(handle) {
            return None;
        }
        self.nodes.get(handle.index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut SceneNode> {
        if !self.contains(handle) {
            return None;
        }
        self.nodes.get_mut(handle.index as usize)?.as_mut()
    }

    pub fn apply(&mut self, command: SceneCommand) -> Result<(), SceneError> {
        match command {
            SceneCommand::Add { key, object, pose } => {
                if self.objects.contains_key(&key) {
                    return Err(SceneError::DuplicateObject(key));
                }
                let handle = self.spawn(SceneNode {
                    kind: NodeKind::Model(key.clone()),
                    object: Some(object),
                    pose,
                    visible: true,
                });
                log::debug!("[scene] added {key} at {:?}", pose.position);
                self.objects.insert(key, handle);
                Ok(())
            }
            SceneCommand::Remove { key } => {
                let handle = self
                    .objects
                    .remove(&key)
                    .ok_or_else(|| SceneError::UnknownObject(key.clone()))?;
                self.despawn(handle)?;
                log::debug!("[scene] removed {key}");
                Ok(())
            }
            SceneCommand::HideReticle => {
                self.set_reticle(None);
                Ok(())
            }
        }
    }

    /// Positions the reticle at `pose`, or hides it when no surface is tracked.
    pub fn set_reticle(&mut self, pose: Option<Pose>) {
        let reticle = self.reticle;
        if let Some(node) = self.get_mut(reticle) {
            match pose {
                Some(pose) => {
                    node.pose = pose;
                    node.visible = true;
                }
                None => node.visible = false,
            }
        }
    }

    pub fn reticle(&self) -> Option<Pose> {
        self.get(self.reticle)
            .filter(|node| node.visible)
            .map(|node| node.pose)
    }

    pub fn object(&self, key: &ObjectKey) -> Option<&SceneNode> {
        self.objects.get(key).and_then(|handle| self.get(*handle))
    }

    /// Assembly objects currently attached, ordered by stage.
    pub fn models(&self) -> Vec<(&ObjectKey, &SceneNode)> {
        let mut models = self
            .objects
            .iter()
            .filter_map(|(key, handle)| self.get(*handle).map(|node| (key, node)))
            .collect::<Vec<_>>();
        models.sort_by_key(|(key, _)| key.stage);
        models
    }

    pub fn model_count(&self) -> usize {
        self.objects.len()
    }

    pub fn node_count(&self) -> usize {
        self.records.iter().filter(|record| record.alive).count()
    }

    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    fn validate(&self, handle: NodeHandle) -> Result<(), SceneError> {
        if self.contains(handle) {
            Ok(())
        } else {
            Err(SceneError::NoSuchNode(handle))
        }
    }
}
