use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::sla::{SlaRule, SlaRuleId};
use crate::errors::{ApplicationError, DomainError};
use crate::routing::pattern::RolePattern;

pub const DEFAULT_SLA_HOURS: u32 = 24;

#[async_trait]
pub trait SlaRuleSource: Send + Sync {
    /// Active rules in stored order.
    async fn list_active_rules(&self) -> Result<Vec<SlaRule>, ApplicationError>;
}

#[async_trait]
impl<T> SlaRuleSource for Arc<T>
where
    T: SlaRuleSource + ?Sized,
{
    async fn list_active_rules(&self) -> Result<Vec<SlaRule>, ApplicationError> {
        (**self).list_active_rules().await
    }
}

#[derive(Default)]
pub struct InMemorySlaRuleSource {
    rules: RwLock<Vec<SlaRule>>,
}

impl InMemorySlaRuleSource {
    pub fn with_rules(rules: Vec<SlaRule>) -> Self {
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(index, mut rule)| {
                rule.id = rule.id.or(Some(SlaRuleId(index as i64 + 1)));
                rule
            })
            .collect();
        Self { rules: RwLock::new(rules) }
    }
}

#[async_trait]
impl SlaRuleSource for InMemorySlaRuleSource {
    async fn list_active_rules(&self) -> Result<Vec<SlaRule>, ApplicationError> {
        Ok(self.rules.read().await.iter().filter(|rule| rule.is_active).cloned().collect())
    }
}

/// A rule with both patterns compiled once per lookup.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub rule: SlaRule,
    pub from: RolePattern,
    pub to: RolePattern,
}

impl CompiledRule {
    pub fn compile(rule: SlaRule) -> Result<Self, DomainError> {
        let from = RolePattern::compile(&rule.from_role_pattern)?;
        let to = RolePattern::compile(&rule.to_role_pattern)?;
        Ok(Self { rule, from, to })
    }
}

pub fn compile_rules(rules: Vec<SlaRule>) -> Result<Vec<CompiledRule>, DomainError> {
    rules.into_iter().map(CompiledRule::compile).collect()
}

/// First matching rule wins; `default_hours` when nothing matches or either
/// role code is blank.
pub fn sla_hours_for(
    rules: &[CompiledRule],
    from_role: &str,
    to_role: &str,
    default_hours: u32,
) -> u32 {
    if from_role.trim().is_empty() || to_role.trim().is_empty() {
        return default_hours;
    }

    rules
        .iter()
        .find(|compiled| compiled.from.matches(from_role) && compiled.to.matches(to_role))
        .map(|compiled| compiled.rule.sla_hours)
        .unwrap_or(default_hours)
}

pub struct SlaCalculator<R> {
    rules: R,
    default_hours: u32,
}

impl<R> SlaCalculator<R>
where
    R: SlaRuleSource,
{
    pub fn new(rules: R) -> Self {
        Self { rules, default_hours: DEFAULT_SLA_HOURS }
    }

    pub fn with_default_hours(mut self, default_hours: u32) -> Self {
        self.default_hours = default_hours;
        self
    }

    pub async fn get_sla(&self, from_role: &str, to_role: &str) -> Result<u32, ApplicationError> {
        if from_role.trim().is_empty() || to_role.trim().is_empty() {
            return Ok(self.default_hours);
        }

        let rules = compile_rules(self.rules.list_active_rules().await?)?;
        Ok(sla_hours_for(&rules, from_role, to_role, self.default_hours))
    }

    /// Deadline for a hand-off assigned at `assigned_at`.
    pub async fn deadline(
        &self,
        from_role: &str,
        to_role: &str,
        assigned_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ApplicationError> {
        let hours = self.get_sla(from_role, to_role).await?;
        Ok(assigned_at + Duration::hours(i64::from(hours)))
    }
}
