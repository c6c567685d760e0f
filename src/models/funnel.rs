use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funnel {
    pub id: Uuid,
    pub name: String,
    pub position: i64,
    /// Ordered by `Stage::position`.
    pub stages: Vec<Stage>,
}

impl Funnel {
    pub fn stage_named(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stage a newly created patient lands in.
    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub funnel_id: Uuid,
    pub name: String,
    pub position: i64,
    pub color: Option<String>,
}
