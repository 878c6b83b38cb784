use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::geography::DepartmentId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGroupId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileCategoryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    Initiation,
    Review,
    Approval,
    Closure,
}

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiation => "initiation",
            Self::Review => "review",
            Self::Approval => "approval",
            Self::Closure => "closure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "initiation" => Some(Self::Initiation),
            "review" => Some(Self::Review),
            "approval" => Some(Self::Approval),
            "closure" => Some(Self::Closure),
            _ => None,
        }
    }
}

impl Default for StageType {
    fn default() -> Self {
        Self::Review
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCapabilities {
    pub can_attach_files: bool,
    pub can_comment: bool,
    pub can_return: bool,
    pub can_escalate: bool,
    pub requires_signature: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Forward,
    Return,
    Escalate,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Return => "return",
            Self::Escalate => "escalate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "forward" => Some(Self::Forward),
            "return" => Some(Self::Return),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
    pub file_category_id: FileCategoryId,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub template_id: TemplateId,
    pub order: u32,
    pub name: String,
    pub code: Option<String>,
    pub stage_type: StageType,
    pub department_id: Option<DepartmentId>,
    pub role_id: Option<RoleId>,
    pub role_group_id: Option<RoleGroupId>,
    pub sla_hours_default: Option<u32>,
    /// Opaque to this crate; stored and returned verbatim.
    pub requirements: Value,
    pub capabilities: StageCapabilities,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub from_stage_id: StageId,
    pub to_stage_id: StageId,
    pub kind: TransitionKind,
    /// Forwarded to the file-workflow engine, never evaluated here.
    pub condition: Value,
    pub is_active: bool,
}

/// Administrative payload for one stage of a create/update call.
///
/// `id` is only honoured on update, and only when the stage already belongs
/// to the template being edited.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StageInput {
    pub id: Option<StageId>,
    pub name: String,
    pub code: Option<String>,
    #[serde(default)]
    pub stage_type: StageType,
    pub department_id: Option<DepartmentId>,
    pub role_id: Option<RoleId>,
    pub role_group_id: Option<RoleGroupId>,
    pub sla_hours_default: Option<u32>,
    #[serde(default)]
    pub requirements: Value,
    #[serde(default)]
    pub capabilities: StageCapabilities,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub description: Option<String>,
    pub file_category_id: Option<FileCategoryId>,
    pub stages: Vec<StageInput>,
    pub created_by: Option<String>,
}

impl TemplateInput {
    pub fn validate(&self) -> Result<FileCategoryId, DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("template name is required".to_string()));
        }
        let Some(file_category_id) = self.file_category_id else {
            return Err(DomainError::Validation("file_category_id is required".to_string()));
        };
        if self.stages.is_empty() {
            return Err(DomainError::Validation("at least one stage is required".to_string()));
        }
        if let Some(position) = self.stages.iter().position(|stage| stage.name.trim().is_empty()) {
            return Err(DomainError::Validation(format!(
                "stage at position {} is missing a name",
                position + 1
            )));
        }
        Ok(file_category_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageView {
    #[serde(flatten)]
    pub stage: Stage,
    pub department_name: Option<String>,
    pub role_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateDetail {
    pub template: WorkflowTemplate,
    pub stages: Vec<StageView>,
    pub transitions: Vec<Transition>,
}

impl TemplateDetail {
    pub fn active_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(|transition| transition.is_active)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Disabled,
}
