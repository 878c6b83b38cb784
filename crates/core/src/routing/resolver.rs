use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::geography::{FileLocation, GeoPoint, ScopeLevel, UserGeography, UserId};
use crate::domain::sla::{RoutingDecision, RoutingReason, SlaRule};
use crate::errors::{ApplicationError, DomainError};
use crate::geography::profile::{same_id, GeographyDirectory};
use crate::routing::sla::{compile_rules, CompiledRule, SlaRuleSource, DEFAULT_SLA_HOURS};
use crate::routing::GlobalRoleSet;

/// Whether a candidate at `candidate` satisfies a rule of scope `level` for a
/// file located at `file`.
pub fn scope_matches(level: ScopeLevel, file: &GeoPoint, candidate: &GeoPoint) -> bool {
    match level {
        ScopeLevel::Global => true,
        ScopeLevel::Division => same_id(file.division_id, candidate.division_id),
        ScopeLevel::Town => match (file.town_id, candidate.town_id) {
            (Some(file_town), Some(candidate_town)) => file_town == candidate_town,
            _ => same_id(file.district_id, candidate.district_id),
        },
        ScopeLevel::District => same_id(file.district_id, candidate.district_id),
    }
}

/// Computes who may legally receive a file next.
///
/// Nothing is cached between calls: a posting or role change is visible on
/// the very next resolution.
pub struct RoutingResolver<D, R> {
    directory: D,
    rules: R,
    global_roles: GlobalRoleSet,
}

impl<D, R> RoutingResolver<D, R>
where
    D: GeographyDirectory,
    R: SlaRuleSource,
{
    pub fn new(directory: D, rules: R, global_roles: GlobalRoleSet) -> Self {
        Self { directory, rules, global_roles }
    }

    pub async fn resolve(
        &self,
        sender_id: UserId,
        location: &FileLocation,
    ) -> Result<Vec<RoutingDecision>, ApplicationError> {
        let sender = self
            .directory
            .find_profile(sender_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user geography", sender_id.0))?;

        if self.global_roles.contains(&sender.role_code) {
            let recipients = self.directory.list_active_users(sender.user_id).await?;
            debug!(
                event_name = "routing.global_short_circuit",
                sender_id = sender.user_id.0,
                recipient_count = recipients.len(),
                "global role bypassed rule matrix"
            );
            return Ok(dedup(recipients.into_iter().filter(|user| user.user_id != sender.user_id).map(
                |user| RoutingDecision {
                    recipient_id: user.user_id,
                    matched_scope: ScopeLevel::Global,
                    reason: RoutingReason::GlobalRole,
                },
            )));
        }

        let resolved = location.resolve_against(&sender);
        let department_type = self.department_type(location, &sender).await?;
        let rules = self.rules_for_sender(&sender, department_type).await?;
        let candidates = self.directory.list_candidates(sender.user_id, &resolved.point).await?;

        let decisions = candidates
            .into_iter()
            .filter(|candidate| candidate.user_id != sender.user_id)
            .filter_map(|candidate| {
                best_scope(&rules, &resolved.point, &candidate).map(|matched_scope| {
                    RoutingDecision {
                        recipient_id: candidate.user_id,
                        matched_scope,
                        reason: RoutingReason::SlaRule,
                    }
                })
            });
        let decisions = dedup(decisions);

        debug!(
            event_name = "routing.resolved",
            sender_id = sender.user_id.0,
            department_type = department_type.as_str(),
            rule_count = rules.len(),
            recipient_count = decisions.len(),
            "routing candidates resolved"
        );
        Ok(decisions)
    }

    async fn department_type(
        &self,
        location: &FileLocation,
        sender: &UserGeography,
    ) -> Result<ScopeLevel, ApplicationError> {
        let scope = match location.department_id {
            Some(department_id) => self
                .directory
                .department_scope(department_id)
                .await?
                .or(sender.department_type),
            None => sender.department_type,
        };
        Ok(scope.unwrap_or_default())
    }

    async fn rules_for_sender(
        &self,
        sender: &UserGeography,
        department_type: ScopeLevel,
    ) -> Result<Vec<CompiledRule>, ApplicationError> {
        let selected: Vec<CompiledRule> = compile_rules(self.rules.list_active_rules().await?)?
            .into_iter()
            .filter(|compiled| compiled.from.matches(&sender.role_code))
            .collect();

        if !selected.is_empty() {
            return Ok(selected);
        }

        debug!(
            event_name = "routing.fallback_rule",
            sender_id = sender.user_id.0,
            role_code = %sender.role_code,
            scope_level = department_type.as_str(),
            "no rule matched sender role; using department-scope fallback"
        );
        let fallback = SlaRule::new("*", "*", department_type, DEFAULT_SLA_HOURS);
        Ok(vec![CompiledRule::compile(fallback)?])
    }
}

fn best_scope(
    rules: &[CompiledRule],
    file: &GeoPoint,
    candidate: &UserGeography,
) -> Option<ScopeLevel> {
    let candidate_point = candidate.location();
    rules
        .iter()
        .filter(|compiled| compiled.to.matches(&candidate.role_code))
        .map(|compiled| compiled.rule.scope_level)
        .filter(|scope| scope_matches(*scope, file, &candidate_point))
        .max_by_key(ScopeLevel::priority)
}

/// Keeps one decision per recipient, preferring the higher-priority scope.
fn dedup(decisions: impl IntoIterator<Item = RoutingDecision>) -> Vec<RoutingDecision> {
    let mut by_recipient: BTreeMap<UserId, RoutingDecision> = BTreeMap::new();
    for decision in decisions {
        let keep_existing = by_recipient.get(&decision.recipient_id).is_some_and(|existing| {
            existing.matched_scope.priority() >= decision.matched_scope.priority()
        });
        if !keep_existing {
            by_recipient.insert(decision.recipient_id, decision);
        }
    }
    by_recipient.into_values().collect()
}
