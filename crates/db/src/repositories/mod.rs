use async_trait::async_trait;
use thiserror::Error;

use efiling_core::domain::workflow::{
    DeleteOutcome, Stage, StageId, TemplateDetail, TemplateId, TemplateInput, WorkflowTemplate,
};
use efiling_core::errors::{ApplicationError, DomainError};

pub mod file;
pub mod geography;
pub mod sla;
pub mod workflow;

pub use file::SqlFileRepository;
pub use geography::SqlGeographyDirectory;
pub use sla::SqlSlaRuleRepository;
pub use workflow::SqlWorkflowGraphStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("transaction rolled back: {0}")]
    Transaction(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}

impl From<DomainError> for RepositoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(message) => Self::Validation(message),
            DomainError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Persistence(error.to_string()),
            RepositoryError::Decode(message) => Self::Persistence(message),
            RepositoryError::Validation(message) => {
                Self::Domain(DomainError::Validation(message))
            }
            RepositoryError::NotFound { entity, id } => {
                Self::Domain(DomainError::NotFound { entity, id })
            }
            RepositoryError::Transaction(message) => Self::Transaction(message),
        }
    }
}

/// Administrative access to workflow templates and their stage graph.
///
/// Every mutating call is a single transaction.
#[async_trait]
pub trait WorkflowGraphStore: Send + Sync {
    async fn create_template(&self, input: TemplateInput)
        -> Result<TemplateDetail, RepositoryError>;

    /// `input.created_by` is ignored; the original author is kept.
    async fn update_template(
        &self,
        id: TemplateId,
        input: TemplateInput,
    ) -> Result<TemplateDetail, RepositoryError>;

    async fn delete_template(&self, id: TemplateId) -> Result<DeleteOutcome, RepositoryError>;

    async fn get_template(&self, id: TemplateId) -> Result<TemplateDetail, RepositoryError>;

    async fn list_templates(
        &self,
        active_only: bool,
    ) -> Result<Vec<WorkflowTemplate>, RepositoryError>;

    /// Stages reachable from `stage_id` through one active forward transition.
    async fn next_stages(&self, stage_id: StageId) -> Result<Vec<Stage>, RepositoryError>;
}
