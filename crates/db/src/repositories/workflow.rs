use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, Transaction as SqlTransaction};
use tracing::{debug, info, warn};

use efiling_core::domain::geography::DepartmentId;
use efiling_core::domain::workflow::{
    DeleteOutcome, FileCategoryId, RoleGroupId, RoleId, Stage, StageCapabilities, StageId,
    StageInput, StageType, StageView, TemplateDetail, TemplateId, TemplateInput, Transition,
    TransitionId, TransitionKind, WorkflowTemplate,
};
use efiling_core::workflow::plan_forward_transitions;

use super::{RepositoryError, WorkflowGraphStore};
use crate::DbPool;

const TEMPLATE_COLUMNS: &str =
    "id, name, description, file_category_id, is_active, created_by, created_at, updated_at";

const STAGE_COLUMNS: &str = "s.id, s.template_id, s.stage_order, s.name, s.code, s.stage_type,
    s.department_id, s.role_id, s.role_group_id, s.sla_hours_default, s.requirements_json,
    s.can_attach_files, s.can_comment, s.can_return, s.can_escalate, s.requires_signature,
    s.is_active";

const TRANSITION_COLUMNS: &str =
    "t.id, t.from_stage_id, t.to_stage_id, t.transition_type, t.condition_json, t.is_active";

pub struct SqlWorkflowGraphStore {
    pool: DbPool,
}

impl SqlWorkflowGraphStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowGraphStore for SqlWorkflowGraphStore {
    async fn create_template(
        &self,
        input: TemplateInput,
    ) -> Result<TemplateDetail, RepositoryError> {
        let file_category_id = input.validate()?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = create_in_tx(&mut tx, &input, file_category_id, &now).await;
        let template_id = finish(tx, "create template", result).await?;

        info!(
            event_name = "workflow.template.created",
            template_id = template_id.0,
            stage_count = input.stages.len(),
            "workflow template created"
        );
        self.get_template(template_id).await
    }

    async fn update_template(
        &self,
        id: TemplateId,
        input: TemplateInput,
    ) -> Result<TemplateDetail, RepositoryError> {
        let file_category_id = input.validate()?;
        reject_repeated_stage_ids(&input.stages)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = update_in_tx(&mut tx, id, &input, file_category_id, &now).await;
        finish(tx, "update template", result).await?;

        info!(
            event_name = "workflow.template.updated",
            template_id = id.0,
            stage_count = input.stages.len(),
            "workflow template updated"
        );
        self.get_template(id).await
    }

    async fn delete_template(&self, id: TemplateId) -> Result<DeleteOutcome, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let result = delete_in_tx(&mut tx, id, &now).await;
        let outcome = finish(tx, "delete template", result).await?;

        match outcome {
            DeleteOutcome::Deleted => info!(
                event_name = "workflow.template.deleted",
                template_id = id.0,
                "unreferenced workflow template deleted"
            ),
            DeleteOutcome::Disabled => info!(
                event_name = "workflow.template.disabled",
                template_id = id.0,
                "workflow template is referenced by file workflows; disabled instead"
            ),
        }
        Ok(outcome)
    }

    async fn get_template(&self, id: TemplateId) -> Result<TemplateDetail, RepositoryError> {
        let template = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row_to_template(&row))
        .transpose()?
        .ok_or_else(|| RepositoryError::not_found("workflow template", id.0))?;

        let stages = sqlx::query(&format!(
            "SELECT {STAGE_COLUMNS}, d.name AS department_name, r.name AS role_name
             FROM workflow_stages s
             LEFT JOIN departments d ON d.id = s.department_id
             LEFT JOIN roles r ON r.id = s.role_id
             WHERE s.template_id = ?
             ORDER BY s.stage_order ASC, s.id ASC"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(StageView {
                stage: row_to_stage(row)?,
                department_name: row.try_get("department_name")?,
                role_name: row.try_get("role_name")?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let transitions = sqlx::query(&format!(
            "SELECT {TRANSITION_COLUMNS}
             FROM workflow_transitions t
             JOIN workflow_stages fs ON fs.id = t.from_stage_id
             WHERE fs.template_id = ? AND t.is_active = 1
             ORDER BY t.id"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(row_to_transition)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(TemplateDetail { template, stages, transitions })
    }

    async fn list_templates(
        &self,
        active_only: bool,
    ) -> Result<Vec<WorkflowTemplate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM workflow_templates
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY id"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_template).collect()
    }

    async fn next_stages(&self, stage_id: StageId) -> Result<Vec<Stage>, RepositoryError> {
        let known: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM workflow_stages WHERE id = ?)")
                .bind(stage_id.0)
                .fetch_one(&self.pool)
                .await?;
        if !known {
            return Err(RepositoryError::not_found("workflow stage", stage_id.0));
        }

        let rows = sqlx::query(&format!(
            "SELECT {STAGE_COLUMNS}
             FROM workflow_transitions t
             JOIN workflow_stages s ON s.id = t.to_stage_id
             WHERE t.from_stage_id = ? AND t.is_active = 1 AND t.transition_type = 'forward'
             ORDER BY s.stage_order ASC, s.id ASC"
        ))
        .bind(stage_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stage).collect()
    }
}

/// Commits on success; otherwise rolls back and reports database failures as
/// a transaction failure.
async fn finish<T>(
    tx: SqlTransaction<'_, Sqlite>,
    operation: &'static str,
    result: Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|error| {
                RepositoryError::Transaction(format!("{operation}: commit failed: {error}"))
            })?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(
                    event_name = "workflow.transaction.rollback_failed",
                    operation,
                    error = %rollback_error,
                    "rollback failed"
                );
            }
            warn!(
                event_name = "workflow.transaction.rolled_back",
                operation,
                error = %error,
                "workflow mutation rolled back"
            );
            Err(match error {
                RepositoryError::Database(source) => {
                    RepositoryError::Transaction(format!("{operation}: {source}"))
                }
                other => other,
            })
        }
    }
}

fn reject_repeated_stage_ids(stages: &[StageInput]) -> Result<(), RepositoryError> {
    let mut seen = HashSet::new();
    match stages.iter().filter_map(|stage| stage.id).find(|id| !seen.insert(*id)) {
        Some(repeated) => Err(RepositoryError::Validation(format!(
            "stage id {} appears more than once",
            repeated.0
        ))),
        None => Ok(()),
    }
}

async fn create_in_tx(
    conn: &mut SqliteConnection,
    input: &TemplateInput,
    file_category_id: FileCategoryId,
    now: &str,
) -> Result<TemplateId, RepositoryError> {
    let template_id = TemplateId(
        sqlx::query(
            "INSERT INTO workflow_templates
                 (name, description, file_category_id, is_active, created_by, created_at, updated_at)
             VALUES (?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(file_category_id.0)
        .bind(input.created_by.as_deref())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid(),
    );

    let mut ordered = Vec::with_capacity(input.stages.len());
    for (index, stage) in input.stages.iter().enumerate() {
        ordered.push(insert_stage(conn, template_id, stage_order(index)?, stage, now).await?);
    }

    sync_forward_transitions(conn, template_id, &ordered, now).await?;
    Ok(template_id)
}

async fn update_in_tx(
    conn: &mut SqliteConnection,
    id: TemplateId,
    input: &TemplateInput,
    file_category_id: FileCategoryId,
    now: &str,
) -> Result<(), RepositoryError> {
    let updated = sqlx::query(
        "UPDATE workflow_templates
         SET name = ?, description = ?, file_category_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(input.name.trim())
    .bind(input.description.as_deref())
    .bind(file_category_id.0)
    .bind(now)
    .bind(id.0)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(RepositoryError::not_found("workflow template", id.0));
    }

    let owned: HashSet<StageId> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM workflow_stages WHERE template_id = ?")
            .bind(id.0)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(StageId)
            .collect();

    let mut ordered = Vec::with_capacity(input.stages.len());
    for (index, stage) in input.stages.iter().enumerate() {
        let order = stage_order(index)?;
        let stage_id = match stage.id.filter(|stage_id| owned.contains(stage_id)) {
            Some(stage_id) => {
                update_stage(conn, id, stage_id, order, stage, now).await?;
                stage_id
            }
            None => insert_stage(conn, id, order, stage, now).await?,
        };
        ordered.push(stage_id);
    }

    sync_forward_transitions(conn, id, &ordered, now).await
}

async fn delete_in_tx(
    conn: &mut SqliteConnection,
    id: TemplateId,
    now: &str,
) -> Result<DeleteOutcome, RepositoryError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM workflow_templates WHERE id = ?)")
            .bind(id.0)
            .fetch_one(&mut *conn)
            .await?;
    if !exists {
        return Err(RepositoryError::not_found("workflow template", id.0));
    }

    let referenced: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM file_workflows WHERE template_id = ?)")
            .bind(id.0)
            .fetch_one(&mut *conn)
            .await?;
    if referenced {
        sqlx::query("UPDATE workflow_templates SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
        return Ok(DeleteOutcome::Disabled);
    }

    const TEMPLATE_STAGES: &str = "SELECT id FROM workflow_stages WHERE template_id = ?1";

    const TEMPLATE_TRANSITIONS: &str = "SELECT id FROM workflow_transitions
         WHERE from_stage_id IN (SELECT id FROM workflow_stages WHERE template_id = ?1)
            OR to_stage_id IN (SELECT id FROM workflow_stages WHERE template_id = ?1)";

    sqlx::query(&format!(
        "UPDATE file_workflow_movements SET
             transition_id = CASE WHEN transition_id IN ({TEMPLATE_TRANSITIONS})
                 THEN NULL ELSE transition_id END,
             from_stage_id = CASE WHEN from_stage_id IN ({TEMPLATE_STAGES})
                 THEN NULL ELSE from_stage_id END,
             to_stage_id = CASE WHEN to_stage_id IN ({TEMPLATE_STAGES})
                 THEN NULL ELSE to_stage_id END
         WHERE transition_id IN ({TEMPLATE_TRANSITIONS})
            OR from_stage_id IN ({TEMPLATE_STAGES})
            OR to_stage_id IN ({TEMPLATE_STAGES})"
    ))
    .bind(id.0)
    .execute(&mut *conn)
    .await?;

    // Only workflows of other templates can still point here.
    sqlx::query(&format!(
        "UPDATE file_workflows SET current_stage_id = NULL
         WHERE current_stage_id IN ({TEMPLATE_STAGES})"
    ))
    .bind(id.0)
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "DELETE FROM workflow_stage_actions WHERE stage_id IN ({TEMPLATE_STAGES})"
    ))
    .bind(id.0)
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "DELETE FROM workflow_transitions
         WHERE from_stage_id IN ({TEMPLATE_STAGES}) OR to_stage_id IN ({TEMPLATE_STAGES})"
    ))
    .bind(id.0)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM workflow_stages WHERE template_id = ?")
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM workflow_templates WHERE id = ?")
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

    Ok(DeleteOutcome::Deleted)
}

async fn insert_stage(
    conn: &mut SqliteConnection,
    template_id: TemplateId,
    order: u32,
    stage: &StageInput,
    now: &str,
) -> Result<StageId, RepositoryError> {
    let requirements = encode_json("requirements", &stage.requirements)?;
    let capabilities = stage.capabilities;

    let result = sqlx::query(
        "INSERT INTO workflow_stages
             (template_id, stage_order, name, code, stage_type, department_id, role_id,
              role_group_id, sla_hours_default, requirements_json, can_attach_files, can_comment,
              can_return, can_escalate, requires_signature, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(template_id.0)
    .bind(i64::from(order))
    .bind(stage.name.trim())
    .bind(stage.code.as_deref())
    .bind(stage.stage_type.as_str())
    .bind(stage.department_id.map(|id| id.0))
    .bind(stage.role_id.map(|id| id.0))
    .bind(stage.role_group_id.map(|id| id.0))
    .bind(stage.sla_hours_default.map(i64::from))
    .bind(requirements)
    .bind(capabilities.can_attach_files)
    .bind(capabilities.can_comment)
    .bind(capabilities.can_return)
    .bind(capabilities.can_escalate)
    .bind(capabilities.requires_signature)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(StageId(result.last_insert_rowid()))
}

async fn update_stage(
    conn: &mut SqliteConnection,
    template_id: TemplateId,
    stage_id: StageId,
    order: u32,
    stage: &StageInput,
    now: &str,
) -> Result<(), RepositoryError> {
    let requirements = encode_json("requirements", &stage.requirements)?;
    let capabilities = stage.capabilities;

    sqlx::query(
        "UPDATE workflow_stages
         SET stage_order = ?, name = ?, code = ?, stage_type = ?, department_id = ?, role_id = ?,
             role_group_id = ?, sla_hours_default = ?, requirements_json = ?,
             can_attach_files = ?, can_comment = ?, can_return = ?, can_escalate = ?,
             requires_signature = ?, updated_at = ?
         WHERE id = ? AND template_id = ?",
    )
    .bind(i64::from(order))
    .bind(stage.name.trim())
    .bind(stage.code.as_deref())
    .bind(stage.stage_type.as_str())
    .bind(stage.department_id.map(|id| id.0))
    .bind(stage.role_id.map(|id| id.0))
    .bind(stage.role_group_id.map(|id| id.0))
    .bind(stage.sla_hours_default.map(i64::from))
    .bind(requirements)
    .bind(capabilities.can_attach_files)
    .bind(capabilities.can_comment)
    .bind(capabilities.can_return)
    .bind(capabilities.can_escalate)
    .bind(capabilities.requires_signature)
    .bind(now)
    .bind(stage_id.0)
    .bind(template_id.0)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn sync_forward_transitions(
    conn: &mut SqliteConnection,
    template_id: TemplateId,
    ordered: &[StageId],
    now: &str,
) -> Result<(), RepositoryError> {
    let existing = sqlx::query(&format!(
        "SELECT {TRANSITION_COLUMNS}
         FROM workflow_transitions t
         JOIN workflow_stages fs ON fs.id = t.from_stage_id
         JOIN workflow_stages ts ON ts.id = t.to_stage_id
         WHERE fs.template_id = ?1 AND ts.template_id = ?1
         ORDER BY t.id"
    ))
    .bind(template_id.0)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(row_to_transition)
    .collect::<Result<Vec<_>, _>>()?;

    let plan = plan_forward_transitions(ordered, &existing);

    // Deactivate first so the active-pair unique index never sees two rows.
    for transition_id in &plan.deactivate {
        sqlx::query("UPDATE workflow_transitions SET is_active = 0 WHERE id = ?")
            .bind(transition_id.0)
            .execute(&mut *conn)
            .await?;
    }
    for transition_id in &plan.activate {
        sqlx::query("UPDATE workflow_transitions SET is_active = 1 WHERE id = ?")
            .bind(transition_id.0)
            .execute(&mut *conn)
            .await?;
    }
    for (from, to) in &plan.insert {
        sqlx::query(
            "INSERT INTO workflow_transitions
                 (from_stage_id, to_stage_id, transition_type, condition_json, is_active, created_at)
             VALUES (?, ?, 'forward', '{}', 1, ?)",
        )
        .bind(from.0)
        .bind(to.0)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        event_name = "workflow.transitions.synced",
        template_id = template_id.0,
        inserted = plan.insert.len(),
        activated = plan.activate.len(),
        deactivated = plan.deactivate.len(),
        "forward transitions synced"
    );
    Ok(())
}

fn stage_order(index: usize) -> Result<u32, RepositoryError> {
    u32::try_from(index + 1)
        .map_err(|_| RepositoryError::Validation("too many stages in one template".to_string()))
}

fn encode_json(field: &str, value: &Value) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Validation(format!("invalid {field} payload: {error}")))
}

fn decode_json(column: &str, value: String) -> Result<Value, RepositoryError> {
    serde_json::from_str(&value)
        .map_err(|error| RepositoryError::Decode(format!("invalid JSON in `{column}`: {error}")))
}

fn row_to_template(row: &SqliteRow) -> Result<WorkflowTemplate, RepositoryError> {
    Ok(WorkflowTemplate {
        id: TemplateId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        file_category_id: FileCategoryId(row.try_get("file_category_id")?),
        is_active: row.try_get("is_active")?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn row_to_stage(row: &SqliteRow) -> Result<Stage, RepositoryError> {
    let stage_type: String = row.try_get("stage_type")?;
    let stage_type = StageType::parse(&stage_type).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown stage_type `{stage_type}`"))
    })?;
    let sla_hours_default: Option<i64> = row.try_get("sla_hours_default")?;

    Ok(Stage {
        id: StageId(row.try_get("id")?),
        template_id: TemplateId(row.try_get("template_id")?),
        order: parse_u32("stage_order", row.try_get("stage_order")?)?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        stage_type,
        department_id: row.try_get::<Option<i64>, _>("department_id")?.map(DepartmentId),
        role_id: row.try_get::<Option<i64>, _>("role_id")?.map(RoleId),
        role_group_id: row.try_get::<Option<i64>, _>("role_group_id")?.map(RoleGroupId),
        sla_hours_default: sla_hours_default
            .map(|hours| parse_u32("sla_hours_default", hours))
            .transpose()?,
        requirements: decode_json("requirements_json", row.try_get("requirements_json")?)?,
        capabilities: StageCapabilities {
            can_attach_files: row.try_get("can_attach_files")?,
            can_comment: row.try_get("can_comment")?,
            can_return: row.try_get("can_return")?,
            can_escalate: row.try_get("can_escalate")?,
            requires_signature: row.try_get("requires_signature")?,
        },
        is_active: row.try_get("is_active")?,
    })
}

fn row_to_transition(row: &SqliteRow) -> Result<Transition, RepositoryError> {
    let kind: String = row.try_get("transition_type")?;
    let kind = TransitionKind::parse(&kind)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown transition_type `{kind}`")))?;

    Ok(Transition {
        id: TransitionId(row.try_get("id")?),
        from_stage_id: StageId(row.try_get("from_stage_id")?),
        to_stage_id: StageId(row.try_get("to_stage_id")?),
        kind,
        condition: decode_json("condition_json", row.try_get("condition_json")?)?,
        is_active: row.try_get("is_active")?,
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
