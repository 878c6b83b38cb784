use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use efiling_core::domain::geography::{DepartmentId, GeoPoint, ScopeLevel, UserGeography, UserId};
use efiling_core::errors::ApplicationError;
use efiling_core::geography::GeographyDirectory;

use super::RepositoryError;
use crate::DbPool;

const PROFILE_SELECT: &str = "SELECT u.id, r.code AS role_code, u.department_id,
        d.department_type, u.division_id, u.district_id, u.town_id,
        (SELECT group_concat(z.zone_id) FROM user_zones z WHERE z.user_id = u.id) AS zone_ids
     FROM efiling_users u
     JOIN roles r ON r.id = u.role_id
     LEFT JOIN departments d ON d.id = u.department_id";

/// Reads user geography straight from the user, role, department and zone
/// tables on every call.
pub struct SqlGeographyDirectory {
    pool: DbPool,
}

impl SqlGeographyDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_profile(&self, user_id: UserId) -> Result<Option<UserGeography>, RepositoryError> {
        let row = sqlx::query(&format!("{PROFILE_SELECT} WHERE u.id = ? AND u.is_active = 1"))
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn load_department_scope(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<ScopeLevel>, RepositoryError> {
        let department_type: Option<String> =
            sqlx::query_scalar("SELECT department_type FROM departments WHERE id = ?")
                .bind(department_id.0)
                .fetch_optional(&self.pool)
                .await?;

        department_type.map(|value| parse_scope("department_type", &value)).transpose()
    }

    async fn load_active_users(
        &self,
        exclude: UserId,
    ) -> Result<Vec<UserGeography>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROFILE_SELECT} WHERE u.is_active = 1 AND u.id <> ? ORDER BY u.id"
        ))
        .bind(exclude.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_profile).collect()
    }

    async fn load_candidates(
        &self,
        exclude: UserId,
        point: &GeoPoint,
    ) -> Result<Vec<UserGeography>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROFILE_SELECT}
             WHERE u.is_active = 1 AND u.id <> ?1
               AND (u.division_id = ?2
                    OR u.district_id = ?3
                    OR u.town_id = ?4
                    OR d.department_type = 'global')
             ORDER BY u.id"
        ))
        .bind(exclude.0)
        .bind(point.division_id)
        .bind(point.district_id)
        .bind(point.town_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_profile).collect()
    }
}

#[async_trait]
impl GeographyDirectory for SqlGeographyDirectory {
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserGeography>, ApplicationError> {
        Ok(self.load_profile(user_id).await?)
    }

    async fn department_scope(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<ScopeLevel>, ApplicationError> {
        Ok(self.load_department_scope(department_id).await?)
    }

    async fn list_active_users(
        &self,
        exclude: UserId,
    ) -> Result<Vec<UserGeography>, ApplicationError> {
        Ok(self.load_active_users(exclude).await?)
    }

    async fn list_candidates(
        &self,
        exclude: UserId,
        point: &GeoPoint,
    ) -> Result<Vec<UserGeography>, ApplicationError> {
        Ok(self.load_candidates(exclude, point).await?)
    }
}

fn row_to_profile(row: &SqliteRow) -> Result<UserGeography, RepositoryError> {
    let department_type: Option<String> = row.try_get("department_type")?;
    let zone_ids: Option<String> = row.try_get("zone_ids")?;

    Ok(UserGeography {
        user_id: UserId(row.try_get("id")?),
        role_code: row.try_get("role_code")?,
        department_id: row.try_get::<Option<i64>, _>("department_id")?.map(DepartmentId),
        department_type: department_type
            .map(|value| parse_scope("department_type", &value))
            .transpose()?,
        district_id: row.try_get("district_id")?,
        town_id: row.try_get("town_id")?,
        division_id: row.try_get("division_id")?,
        zone_ids: parse_zone_ids(zone_ids.as_deref())?,
    })
}

fn parse_scope(column: &str, value: &str) -> Result<ScopeLevel, RepositoryError> {
    ScopeLevel::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown scope in `{column}`: `{value}`")))
}

fn parse_zone_ids(value: Option<&str>) -> Result<Vec<i64>, RepositoryError> {
    let mut zone_ids = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>()
                .map_err(|_| RepositoryError::Decode(format!("invalid zone id `{item}`")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    zone_ids.sort_unstable();
    Ok(zone_ids)
}

#[cfg(test)]
mod tests {
    use efiling_core::domain::geography::{DepartmentId, GeoPoint, ScopeLevel, UserId};
    use efiling_core::geography::GeographyDirectory;

    use super::SqlGeographyDirectory;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query(
            "INSERT INTO departments (id, name, department_type) VALUES
                 (1, 'Head Office', 'global'),
                 (10, 'Water District', 'district');
             INSERT INTO roles (id, code, name) VALUES
                 (1, 'CEO', 'Chief Executive'),
                 (2, 'WAT_AEN', 'Assistant Engineer'),
                 (3, 'WAT_XEN', 'Executive Engineer');
             INSERT INTO efiling_users
                 (id, full_name, role_id, department_id, division_id, district_id, town_id, is_active)
             VALUES
                 (1, 'Sender', 2, 10, 1, 3, 30, 1),
                 (2, 'Same District', 3, 10, 2, 3, 31, 1),
                 (3, 'Other District', 3, 10, 2, 4, NULL, 1),
                 (4, 'Head Office', 1, 1, NULL, NULL, NULL, 1),
                 (5, 'Retired', 3, 10, 1, 3, 30, 0);
             INSERT INTO user_zones (user_id, zone_id) VALUES (1, 12), (1, 7);",
        )
        .execute(&pool)
        .await
        .expect("seed users");
        pool
    }

    #[tokio::test]
    async fn profile_carries_role_department_and_sorted_zones() {
        let directory = SqlGeographyDirectory::new(setup_pool().await);

        let profile = directory.find_profile(UserId(1)).await.expect("lookup").expect("profile");

        assert_eq!(profile.role_code, "WAT_AEN");
        assert_eq!(profile.department_id, Some(DepartmentId(10)));
        assert_eq!(profile.department_type, Some(ScopeLevel::District));
        assert_eq!(profile.location(), GeoPoint { division_id: Some(1), district_id: Some(3), town_id: Some(30) });
        assert_eq!(profile.zone_ids, vec![7, 12]);
    }

    #[tokio::test]
    async fn inactive_and_unknown_users_have_no_profile() {
        let directory = SqlGeographyDirectory::new(setup_pool().await);

        assert_eq!(directory.find_profile(UserId(5)).await.expect("lookup"), None);
        assert_eq!(directory.find_profile(UserId(99)).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn candidates_share_a_location_field_or_sit_in_a_global_department() {
        let directory = SqlGeographyDirectory::new(setup_pool().await);
        let point = GeoPoint { division_id: None, district_id: Some(3), town_id: Some(30) };

        let ids: Vec<i64> = directory
            .list_candidates(UserId(1), &point)
            .await
            .expect("candidates")
            .into_iter()
            .map(|profile| profile.user_id.0)
            .collect();

        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn active_users_exclude_sender_and_inactive_accounts() {
        let directory = SqlGeographyDirectory::new(setup_pool().await);

        let ids: Vec<i64> = directory
            .list_active_users(UserId(4))
            .await
            .expect("users")
            .into_iter()
            .map(|profile| profile.user_id.0)
            .collect();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            directory.department_scope(DepartmentId(1)).await.expect("scope"),
            Some(ScopeLevel::Global)
        );
        assert_eq!(directory.department_scope(DepartmentId(404)).await.expect("scope"), None);
    }
}
