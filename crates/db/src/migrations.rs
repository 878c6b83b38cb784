use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &[
        "departments",
        "roles",
        "role_groups",
        "file_categories",
        "efiling_users",
        "user_zones",
        "sla_rules",
        "workflow_templates",
        "workflow_stages",
        "workflow_transitions",
        "workflow_stage_actions",
        "efiling_files",
        "file_workflows",
        "file_workflow_movements",
    ];

    const MANAGED_INDEXES: &[&str] = &[
        "idx_efiling_users_department_id",
        "idx_sla_rules_is_active",
        "idx_workflow_stages_template_order",
        "idx_workflow_transitions_active_pair",
        "idx_workflow_transitions_to_stage_id",
        "idx_workflow_stage_actions_stage_id",
        "idx_file_workflows_template_id",
        "idx_file_workflow_movements_transition_id",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(*table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "table `{table}` should exist after migrations");
        }
    }

    #[tokio::test]
    async fn active_forward_pairs_are_unique_but_inactive_duplicates_are_allowed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO file_categories (id, name) VALUES (1, 'Budget');
             INSERT INTO workflow_templates (id, name, file_category_id, created_at, updated_at)
             VALUES (1, 'Budget Approval', 1, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');
             INSERT INTO workflow_stages (id, template_id, stage_order, name, created_at, updated_at)
             VALUES (1, 1, 1, 'Draft', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
                    (2, 1, 2, 'Review', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');",
        )
        .execute(&pool)
        .await
        .expect("seed stages");

        let insert = "INSERT INTO workflow_transitions (from_stage_id, to_stage_id, is_active, created_at)
                      VALUES (1, 2, ?, '2026-01-01T00:00:00Z')";
        sqlx::query(insert).bind(0_i64).execute(&pool).await.expect("inactive row");
        sqlx::query(insert).bind(0_i64).execute(&pool).await.expect("second inactive row");
        sqlx::query(insert).bind(1_i64).execute(&pool).await.expect("active row");

        let duplicate = sqlx::query(insert).bind(1_i64).execute(&pool).await;
        assert!(duplicate.is_err(), "second active forward row for a pair must be rejected");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let template_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'workflow_templates'",
        )
        .fetch_one(&pool)
        .await
        .expect("check workflow_templates table removed")
        .get::<i64, _>("count");

        assert_eq!(template_count, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_TABLES.len() + MANAGED_INDEXES.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            let managed = MANAGED_TABLES.contains(&name.as_str())
                || MANAGED_INDEXES.contains(&name.as_str());
            if managed {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
