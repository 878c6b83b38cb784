use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Row counts the demo dataset guarantees for its fixed ids.
const SEED_CONTRACT: &[SeedTableContract] = &[
    SeedTableContract { table: "departments", label: "departments", expected_rows: 3 },
    SeedTableContract { table: "roles", label: "roles", expected_rows: 5 },
    SeedTableContract { table: "role_groups", label: "role-groups", expected_rows: 1 },
    SeedTableContract { table: "file_categories", label: "file-categories", expected_rows: 1 },
    SeedTableContract { table: "efiling_users", label: "users", expected_rows: 6 },
    SeedTableContract { table: "sla_rules", label: "sla-rules", expected_rows: 3 },
    SeedTableContract { table: "workflow_templates", label: "templates", expected_rows: 1 },
    SeedTableContract { table: "workflow_stages", label: "stages", expected_rows: 3 },
    SeedTableContract { table: "workflow_transitions", label: "transitions", expected_rows: 3 },
    SeedTableContract { table: "workflow_stage_actions", label: "stage-actions", expected_rows: 2 },
    SeedTableContract { table: "efiling_files", label: "files", expected_rows: 2 },
    SeedTableContract { table: "file_workflows", label: "file-workflows", expected_rows: 1 },
    SeedTableContract { table: "file_workflow_movements", label: "movements", expected_rows: 1 },
];

/// Highest id the dataset assigns in any table.
const SEED_MAX_ID: i64 = 6;

/// Demo dataset for routing, SLA lookup and template inspection.
///
/// Sender 2 (`WAT_AEN`) routes to user 3, user 1 holds a global role, and the
/// `Budget Approval` template is referenced by a running file workflow.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            highlights: vec![
                SeedHighlight { name: "route", description: "sender 2 (WAT_AEN) -> user 3 (WAT_XEN)" },
                SeedHighlight { name: "sla", description: "WAT_AEN -> WAT_XEN = 48h" },
                SeedHighlight {
                    name: "template",
                    description: "template 1 Budget Approval, 3 stages, referenced by file EF-2026-0001",
                },
            ],
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_CONTRACT.len() + 1);

        for contract in SEED_CONTRACT {
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM {} WHERE id <= ?1",
                contract.table
            ))
            .bind(SEED_MAX_ID)
            .fetch_one(pool)
            .await?;
            checks.push((contract.label, count == contract.expected_rows));
        }

        let zone_assignment: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_zones WHERE user_id = 5 AND zone_id = 7)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("user-zones", zone_assignment == 1));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the fixed-id rows in dependency order.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM user_zones WHERE user_id <= ?1")
            .bind(SEED_MAX_ID)
            .execute(&mut *tx)
            .await?;
        for contract in SEED_CONTRACT.iter().rev() {
            sqlx::query(&format!("DELETE FROM {} WHERE id <= ?1", contract.table))
                .bind(SEED_MAX_ID)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedTableContract {
    table: &'static str,
    label: &'static str,
    expected_rows: i64,
}

#[derive(Debug)]
pub struct SeedResult {
    pub highlights: Vec<SeedHighlight>,
}

#[derive(Debug)]
pub struct SeedHighlight {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
