use crate::assets::ModelId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(String);

impl CatalogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub id: ModelId,
    pub path: String,
}

impl ModelRef {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: ModelId::new(id),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub ordinal: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    pub instruction: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog id must not be empty")]
    MissingId,
    #[error("catalog {catalog} needs at least 2 stages, found {count}")]
    TooFewStages { catalog: CatalogId, count: usize },
    #[error("catalog {catalog}: expected stage {expected}, found {found}")]
    NonContiguous {
        catalog: CatalogId,
        expected: u32,
        found: u32,
    },
    #[error("catalog {catalog}: stage {ordinal} has no model")]
    MissingModel { catalog: CatalogId, ordinal: u32 },
    #[error("catalog {catalog}: terminal stage {ordinal} must not swap models")]
    TerminalModel { catalog: CatalogId, ordinal: u32 },
    #[error("duplicate catalog id {0}")]
    DuplicateCatalog(CatalogId),
    #[error("catalog set is empty")]
    NoCatalogs,
    #[error("invalid catalog manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to access catalog manifest: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogManifest {
    id: CatalogId,
    #[serde(default)]
    title: String,
    searching_instruction: String,
    stages: Vec<Stage>,
}

/// Fixed, validated step sequence for one piece of furniture.
///
/// Ordinals run contiguously from 1 to N. Every stage before N names the
/// model shown while the user works on it; stage N is the terminal
/// "complete" stage and carries no model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogManifest")]
pub struct AssemblyCatalog {
    id: CatalogId,
    title: String,
    searching_instruction: String,
    stages: Vec<Stage>,
}

impl TryFrom<CatalogManifest> for AssemblyCatalog {
    type Error = CatalogError;

    fn try_from(manifest: CatalogManifest) -> Result<Self, Self::Error> {
        AssemblyCatalog::new(
            manifest.id,
            manifest.title,
            manifest.searching_instruction,
            manifest.stages,
        )
    }
}

impl AssemblyCatalog {
    pub fn new(
        id: CatalogId,
        title: impl Into<String>,
        searching_instruction: impl Into<String>,
        mut stages: Vec<Stage>,
    ) -> Result<Self, CatalogError> {
        if id.as_str().is_empty() {
            return Err(CatalogError::MissingId);
        }
        if stages.len() < 2 {
            return Err(CatalogError::TooFewStages {
                catalog: id,
                count: stages.len(),
            });
        }

        stages.sort_by_key(|stage| stage.ordinal);
        let last = stages.len() as u32;
        for (position, stage) in stages.iter().enumerate() {
            let expected = position as u32 + 1;
            if stage.ordinal != expected {
                return Err(CatalogError::NonContiguous {
                    catalog: id,
                    expected,
                    found: stage.ordinal,
                });
            }
            match (&stage.model, stage.ordinal == last) {
                (None, false) => {
                    return Err(CatalogError::MissingModel {
                        catalog: id,
                        ordinal: stage.ordinal,
                    });
                }
                (Some(_), true) => {
                    return Err(CatalogError::TerminalModel {
                        catalog: id,
                        ordinal: stage.ordinal,
                    });
                }
                _ => {}
            }
        }

        let title = title.into();
        Ok(Self {
            title: if title.is_empty() {
                id.to_string()
            } else {
                title
            },
            id,
            searching_instruction: searching_instruction.into(),
            stages,
        })
    }

    pub fn id(&self) -> &CatalogId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// N: the ordinal of the terminal stage.
    pub fn stage_count(&self) -> u32 {
        self.stages.len() as u32
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, ordinal: u32) -> Option<&Stage> {
        ordinal
            .checked_sub(1)
            .and_then(|index| self.stages.get(index as usize))
    }

    pub fn model(&self, ordinal: u32) -> Option<&ModelRef> {
        self.stage(ordinal).and_then(|stage| stage.model.as_ref())
    }

    /// Instruction for a stage index; index 0 is the surface search.
    pub fn instruction(&self, index: u32) -> &str {
        if index == 0 {
            return &self.searching_instruction;
        }
        self.stage(index)
            .map(|stage| stage.instruction.as_str())
            .unwrap_or_default()
    }

    pub fn models(&self) -> impl Iterator<Item = (u32, &ModelRef)> {
        self.stages
            .iter()
            .filter_map(|stage| stage.model.as_ref().map(|model| (stage.ordinal, model)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogSetManifest {
    catalogs: Vec<AssemblyCatalog>,
}

/// Catalogs available to one runtime, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSet {
    catalogs: Vec<AssemblyCatalog>,
}

impl CatalogSet {
    pub fn new(catalogs: Vec<AssemblyCatalog>) -> Result<Self, CatalogError> {
        if catalogs.is_empty() {
            return Err(CatalogError::NoCatalogs);
        }
        let mut seen = HashSet::new();
        for catalog in &catalogs {
            if !seen.insert(catalog.id().clone()) {
                return Err(CatalogError::DuplicateCatalog(catalog.id().clone()));
            }
        }
        Ok(Self { catalogs })
    }

    pub fn builtin() -> Self {
        Self {
            catalogs: vec![shelf(), table()],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let manifest: CatalogSetManifest = serde_json::from_str(json)?;
        Self::new(manifest.catalogs)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, CatalogError> {
        let manifest = CatalogSetManifest {
            catalogs: self.catalogs.clone(),
        };
        Ok(serde_json::to_string_pretty(&manifest)?)
    }

    pub fn get(&self, id: &CatalogId) -> Option<&AssemblyCatalog> {
        self.catalogs.iter().find(|catalog| catalog.id() == id)
    }

    pub fn contains(&self, id: &CatalogId) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> &AssemblyCatalog {
        &self.catalogs[0]
    }

    pub fn ids(&self) -> impl Iterator<Item = &CatalogId> {
        self.catalogs.iter().map(AssemblyCatalog::id)
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}

fn build_stages(model_dir: &str, steps: &[&str], terminal: &str) -> Vec<Stage> {
    let mut stages = steps
        .iter()
        .enumerate()
        .map(|(index, instruction)| {
            let ordinal = index as u32 + 1;
            Stage {
                ordinal,
                model: Some(ModelRef::new(
                    format!("{model_dir}step-{ordinal}"),
                    format!("./model/{model_dir}step-{ordinal}.glb"),
                )),
                instruction: (*instruction).to_string(),
            }
        })
        .collect::<Vec<_>>();
    stages.push(Stage {
        ordinal: steps.len() as u32 + 1,
        model: None,
        instruction: terminal.to_string(),
    });
    stages
}

/// The eight-stage shelf walkthrough.
pub fn shelf() -> AssemblyCatalog {
    AssemblyCatalog {
        id: CatalogId::new("shelf"),
        title: "Shelf".to_string(),
        searching_instruction:
            "When green reticle shows, click on screen to place base of shelf.".to_string(),
        stages: build_stages(
            "",
            &[
                "Step 1 : Place lateral plank in left side of base plank, click screen to show result.",
                "Step 2 : Place lateral plank in right side of base plank, click screen to show result.",
                "Step 3 : Place small interior plank in top of base plank, click screen to show result.",
                "Step 4 : Place big interior plank on top of the last small plank, click screen to show result.",
                "Step 5 : Place another small interior plank in top of the big interior plank, click screen to show result.",
                "Step 6 : Place last big plank on top of lateral planks and small interior plank, click screen to show result.",
                "Step 7 : Shelf assembled, click screen to finish.",
            ],
            "Furniture assembly finished. Use previous to review the steps.",
        ),
    }
}

pub fn table() -> AssemblyCatalog {
    AssemblyCatalog {
        id: CatalogId::new("table"),
        title: "Table".to_string(),
        searching_instruction:
            "When green reticle shows, click on screen to place the table top.".to_string(),
        stages: build_stages(
            "table/",
            &[
                "Step 1 : Lay the table top upside down, click screen to show result.",
                "Step 2 : Screw the first leg into a corner of the table top, click screen to show result.",
                "Step 3 : Screw the remaining three legs into their corners, click screen to show result.",
                "Step 4 : Turn the table upright, click screen to finish.",
            ],
            "Furniture assembly finished. Use previous to review the steps.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(ordinal: u32, model: bool) -> Stage {
        Stage {
            ordinal,
            model: model.then(|| ModelRef::new(format!("m{ordinal}"), format!("m{ordinal}.glb"))),
            instruction: format!("stage {ordinal}"),
        }
    }

    #[test]
    fn builtin_catalogs_are_valid() {
        let set = CatalogSet::builtin();
        for catalog in [shelf(), table()] {
            let rebuilt = AssemblyCatalog::new(
                catalog.id().clone(),
                catalog.title(),
                catalog.instruction(0),
                catalog.stages().to_vec(),
            )
            .expect("builtin catalog validates");
            assert_eq!(rebuilt, catalog);
        }
        assert_eq!(set.len(), 2);
        assert_eq!(set.first().id().as_str(), "shelf");
    }

    #[test]
    fn shelf_has_eight_stages_with_terminal_last() {
        let shelf = shelf();
        assert_eq!(shelf.stage_count(), 8);
        assert_eq!(shelf.models().count(), 7);
        assert!(shelf.model(8).is_none());
        assert_eq!(
            shelf.model(1).map(|model| model.path.as_str()),
            Some("./model/step-1.glb")
        );
        assert!(shelf.instruction(0).contains("green reticle"));
        assert!(shelf.instruction(3).starts_with("Step 3"));
        assert_eq!(shelf.instruction(9), "");
    }

    #[test]
    fn stages_are_sorted_before_validation() {
        let catalog = AssemblyCatalog::new(
            CatalogId::new("stool"),
            "",
            "search",
            vec![stage(2, false), stage(1, true)],
        )
        .expect("valid");
        assert_eq!(catalog.stage(1).map(|s| s.ordinal), Some(1));
        assert_eq!(catalog.title(), "stool");
    }

    #[test]
    fn gaps_in_ordinals_are_rejected() {
        let err = AssemblyCatalog::new(
            CatalogId::new("gap"),
            "Gap",
            "search",
            vec![stage(1, true), stage(3, false)],
        )
        .expect_err("gap");
        assert!(matches!(
            err,
            CatalogError::NonContiguous {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn terminal_stage_must_not_carry_a_model() {
        let err = AssemblyCatalog::new(
            CatalogId::new("bad"),
            "Bad",
            "search",
            vec![stage(1, true), stage(2, true)],
        )
        .expect_err("terminal model");
        assert!(matches!(err, CatalogError::TerminalModel { ordinal: 2, .. }));
    }

    #[test]
    fn non_terminal_stage_needs_a_model() {
        let err = AssemblyCatalog::new(
            CatalogId::new("bad"),
            "Bad",
            "search",
            vec![stage(1, false), stage(2, false)],
        )
        .expect_err("missing model");
        assert!(matches!(err, CatalogError::MissingModel { ordinal: 1, .. }));
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let set = CatalogSet::builtin();
        let json = set.to_json_pretty().expect("serialize");
        let parsed = CatalogSet::from_json(&json).expect("parse");
        assert_eq!(parsed, set);
    }

    #[test]
    fn manifest_validation_runs_on_parse() {
        let json = r#"{
            "catalogs": [{
                "id": "broken",
                "searching_instruction": "search",
                "stages": [{ "ordinal": 1, "instruction": "only" }]
            }]
        }"#;
        let err = CatalogSet::from_json(json).expect_err("too few stages");
        assert!(matches!(err, CatalogError::Parse(_)));
        assert!(err.to_string().contains("at least 2 stages"));
    }

    #[test]
    fn duplicate_catalog_ids_are_rejected() {
        let err = CatalogSet::new(vec![shelf(), shelf()]).expect_err("duplicate");
        assert!(matches!(err, CatalogError::DuplicateCatalog(id) if id.as_str() == "shelf"));
    }
}
