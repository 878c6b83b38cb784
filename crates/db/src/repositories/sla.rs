use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use efiling_core::domain::geography::ScopeLevel;
use efiling_core::domain::sla::{SlaRule, SlaRuleId};
use efiling_core::errors::ApplicationError;
use efiling_core::routing::{RolePattern, SlaRuleSource};

use super::RepositoryError;
use crate::DbPool;

/// The shared rule matrix. Stored order is insertion order (`id`), which is
/// the precedence SLA lookup relies on.
pub struct SqlSlaRuleRepository {
    pool: DbPool,
}

impl SqlSlaRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts a rule without an id, otherwise overwrites the stored row.
    pub async fn save(&self, mut rule: SlaRule) -> Result<SlaRule, RepositoryError> {
        RolePattern::compile(&rule.from_role_pattern)?;
        RolePattern::compile(&rule.to_role_pattern)?;
        if rule.sla_hours == 0 {
            return Err(RepositoryError::Validation(
                "sla_hours must be greater than zero".to_string(),
            ));
        }

        match rule.id {
            Some(id) => {
                let updated = sqlx::query(
                    "UPDATE sla_rules
                     SET from_role_pattern = ?, to_role_pattern = ?, scope_level = ?,
                         sla_hours = ?, is_active = ?
                     WHERE id = ?",
                )
                .bind(rule.from_role_pattern.trim())
                .bind(rule.to_role_pattern.trim())
                .bind(rule.scope_level.as_str())
                .bind(i64::from(rule.sla_hours))
                .bind(rule.is_active)
                .bind(id.0)
                .execute(&self.pool)
                .await?
                .rows_affected();
                if updated == 0 {
                    return Err(RepositoryError::not_found("sla rule", id.0));
                }
            }
            None => {
                let id = sqlx::query(
                    "INSERT INTO sla_rules
                         (from_role_pattern, to_role_pattern, scope_level, sla_hours, is_active, created_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(rule.from_role_pattern.trim())
                .bind(rule.to_role_pattern.trim())
                .bind(rule.scope_level.as_str())
                .bind(i64::from(rule.sla_hours))
                .bind(rule.is_active)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?
                .last_insert_rowid();
                rule.id = Some(SlaRuleId(id));
            }
        }

        info!(
            event_name = "routing.sla_rule.saved",
            rule_id = rule.id.map(|id| id.0),
            scope_level = rule.scope_level.as_str(),
            sla_hours = rule.sla_hours,
            "sla rule saved"
        );
        Ok(rule)
    }

    pub async fn deactivate(&self, id: SlaRuleId) -> Result<(), RepositoryError> {
        let updated = sqlx::query("UPDATE sla_rules SET is_active = 0 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(RepositoryError::not_found("sla rule", id.0));
        }
        Ok(())
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<SlaRule>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, from_role_pattern, to_role_pattern, scope_level, sla_hours, is_active
             FROM sla_rules
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY id",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_rule).collect()
    }
}

#[async_trait]
impl SlaRuleSource for SqlSlaRuleRepository {
    async fn list_active_rules(&self) -> Result<Vec<SlaRule>, ApplicationError> {
        Ok(self.list(true).await?)
    }
}

fn row_to_rule(row: &SqliteRow) -> Result<SlaRule, RepositoryError> {
    let scope_level: String = row.try_get("scope_level")?;
    let sla_hours: i64 = row.try_get("sla_hours")?;

    Ok(SlaRule {
        id: Some(SlaRuleId(row.try_get("id")?)),
        from_role_pattern: row.try_get("from_role_pattern")?,
        to_role_pattern: row.try_get("to_role_pattern")?,
        scope_level: ScopeLevel::parse(&scope_level).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown scope in `scope_level`: `{scope_level}`"))
        })?,
        sla_hours: u32::try_from(sla_hours).map_err(|_| {
            RepositoryError::Decode(format!("invalid value for `sla_hours`: {sla_hours}"))
        })?,
        is_active: row.try_get("is_active")?,
    })
}
