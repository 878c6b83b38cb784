use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use efiling_core::domain::file::{EfilingFile, FileId, NewFile};
use efiling_core::domain::geography::DepartmentId;
use efiling_core::geography::{GeographyColumns, GeographyFilter};

use super::RepositoryError;
use crate::DbPool;

const FILE_COLUMNS: GeographyColumns<'static> = GeographyColumns {
    zone_id: "f.zone_id",
    division_id: "f.division_id",
    district_id: "f.district_id",
    town_id: "f.town_id",
};

pub struct SqlFileRepository {
    pool: DbPool,
}

impl SqlFileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, file: NewFile) -> Result<EfilingFile, RepositoryError> {
        let file_number = file.file_number.trim();
        if file_number.is_empty() {
            return Err(RepositoryError::Validation("file_number must not be empty".to_string()));
        }
        let subject = file.subject.trim();
        if subject.is_empty() {
            return Err(RepositoryError::Validation("subject must not be empty".to_string()));
        }

        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO efiling_files
                 (file_number, subject, department_id, division_id, district_id, town_id, zone_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file_number)
        .bind(subject)
        .bind(file.department_id.map(|id| id.0))
        .bind(file.division_id)
        .bind(file.district_id)
        .bind(file.town_id)
        .bind(file.zone_id)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(EfilingFile {
            id: FileId(id),
            file_number: file_number.to_string(),
            subject: subject.to_string(),
            department_id: file.department_id,
            zone_id: file.zone_id,
            division_id: file.division_id,
            district_id: file.district_id,
            town_id: file.town_id,
            created_at,
        })
    }

    /// Files inside the filter's jurisdiction, oldest first.
    pub async fn list_visible(
        &self,
        filter: &GeographyFilter,
    ) -> Result<Vec<EfilingFile>, RepositoryError> {
        let predicate = filter.to_sql(&FILE_COLUMNS);
        let sql = format!(
            "SELECT f.id, f.file_number, f.subject, f.department_id, f.zone_id,
                    f.division_id, f.district_id, f.town_id, f.created_at
             FROM efiling_files f
             WHERE {}
             ORDER BY f.id",
            predicate.clause
        );

        let mut query = sqlx::query(&sql);
        for value in &predicate.binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        debug!(
            event_name = "geography.files.listed",
            clauses = filter.clauses.len(),
            rows = rows.len(),
            "listed visible files"
        );

        rows.iter().map(row_to_file).collect()
    }
}

fn row_to_file(row: &SqliteRow) -> Result<EfilingFile, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(EfilingFile {
        id: FileId(row.try_get("id")?),
        file_number: row.try_get("file_number")?,
        subject: row.try_get("subject")?,
        department_id: row.try_get::<Option<i64>, _>("department_id")?.map(DepartmentId),
        zone_id: row.try_get("zone_id")?,
        division_id: row.try_get("division_id")?,
        district_id: row.try_get("district_id")?,
        town_id: row.try_get("town_id")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|error| {
                RepositoryError::Decode(format!("invalid timestamp in `created_at`: {error}"))
            })?,
    })
}
