use serde::{Deserialize, Serialize};

use crate::domain::geography::{ScopeLevel, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlaRuleId(pub i64);

/// One row of the SLA/routing matrix. Patterns are role globs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRule {
    pub id: Option<SlaRuleId>,
    pub from_role_pattern: String,
    pub to_role_pattern: String,
    pub scope_level: ScopeLevel,
    pub sla_hours: u32,
    pub is_active: bool,
}

impl SlaRule {
    pub fn new(
        from_role_pattern: impl Into<String>,
        to_role_pattern: impl Into<String>,
        scope_level: ScopeLevel,
        sla_hours: u32,
    ) -> Self {
        Self {
            id: None,
            from_role_pattern: from_role_pattern.into(),
            to_role_pattern: to_role_pattern.into(),
            scope_level,
            sla_hours,
            is_active: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingReason {
    GlobalRole,
    SlaRule,
}

impl RoutingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlobalRole => "GLOBAL_ROLE",
            Self::SlaRule => "SLA_RULE",
        }
    }
}

/// A user allowed to become the next custodian, with the scope that justified it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub recipient_id: UserId,
    pub matched_scope: ScopeLevel,
    pub reason: RoutingReason,
}
