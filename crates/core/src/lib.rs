pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod geography;
pub mod routing;
pub mod workflow;

pub use auth::{Authenticator, StaticTokenAuthenticator, VerifiedCaller};
pub use domain::file::{EfilingFile, FileId, NewFile};
pub use domain::geography::{
    DepartmentId, FileLocation, GeoPoint, ResolvedLocation, ScopeLevel, UserGeography, UserId,
};
pub use domain::sla::{RoutingDecision, RoutingReason, SlaRule, SlaRuleId};
pub use domain::workflow::{
    DeleteOutcome, FileCategoryId, RoleGroupId, RoleId, Stage, StageCapabilities, StageId,
    StageInput, StageType, StageView, TemplateDetail, TemplateId, TemplateInput, Transition,
    TransitionId, TransitionKind, WorkflowTemplate,
};
pub use errors::{ApplicationError, DomainError};
pub use geography::{
    GeographyClause, GeographyColumns, GeographyDirectory, GeographyFilter,
    GeographyFilterBuilder, InMemoryGeographyDirectory, RecordGeography, ScopeRequest,
    ScopeResolution, SqlPredicate,
};
pub use routing::{GlobalRoleSet, RolePattern, RoutingResolver, SlaCalculator, SlaRuleSource};
pub use workflow::{plan_forward_transitions, TransitionPlan};
