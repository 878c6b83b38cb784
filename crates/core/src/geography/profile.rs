use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::geography::{DepartmentId, GeoPoint, ScopeLevel, UserGeography, UserId};
use crate::errors::ApplicationError;

/// Read access to users' role and jurisdiction.
///
/// Implementations must never cache: a role or posting can change between
/// two calls and routing has to see the change immediately.
#[async_trait]
pub trait GeographyDirectory: Send + Sync {
    /// Active profile for `user_id`, or `None` when the user is unknown or inactive.
    async fn find_profile(&self, user_id: UserId)
        -> Result<Option<UserGeography>, ApplicationError>;

    async fn department_scope(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<ScopeLevel>, ApplicationError>;

    /// Every active user except `exclude`.
    async fn list_active_users(
        &self,
        exclude: UserId,
    ) -> Result<Vec<UserGeography>, ApplicationError>;

    /// Active users except `exclude` sharing a division, district or town with
    /// `point`, plus every user of a globally scoped department.
    async fn list_candidates(
        &self,
        exclude: UserId,
        point: &GeoPoint,
    ) -> Result<Vec<UserGeography>, ApplicationError>;
}

#[async_trait]
impl<T> GeographyDirectory for Arc<T>
where
    T: GeographyDirectory + ?Sized,
{
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserGeography>, ApplicationError> {
        (**self).find_profile(user_id).await
    }

    async fn department_scope(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<ScopeLevel>, ApplicationError> {
        (**self).department_scope(department_id).await
    }

    async fn list_active_users(
        &self,
        exclude: UserId,
    ) -> Result<Vec<UserGeography>, ApplicationError> {
        (**self).list_active_users(exclude).await
    }

    async fn list_candidates(
        &self,
        exclude: UserId,
        point: &GeoPoint,
    ) -> Result<Vec<UserGeography>, ApplicationError> {
        (**self).list_candidates(exclude, point).await
    }
}

pub(crate) fn shares_jurisdiction(candidate: &UserGeography, point: &GeoPoint) -> bool {
    same_id(candidate.division_id, point.division_id)
        || same_id(candidate.district_id, point.district_id)
        || same_id(candidate.town_id, point.town_id)
        || candidate.is_globally_scoped()
}

pub(crate) fn same_id(left: Option<i64>, right: Option<i64>) -> bool {
    matches!((left, right), (Some(left), Some(right)) if left == right)
}

#[derive(Clone, Debug)]
struct DirectoryEntry {
    profile: UserGeography,
    active: bool,
}

#[derive(Default)]
pub struct InMemoryGeographyDirectory {
    users: RwLock<HashMap<UserId, DirectoryEntry>>,
    departments: RwLock<HashMap<DepartmentId, ScopeLevel>>,
}

impl InMemoryGeographyDirectory {
    pub async fn insert_department(&self, department_id: DepartmentId, scope: ScopeLevel) {
        self.departments.write().await.insert(department_id, scope);
    }

    pub async fn insert_user(&self, mut profile: UserGeography, active: bool) {
        if profile.department_type.is_none() {
            if let Some(department_id) = profile.department_id {
                profile.department_type = self.departments.read().await.get(&department_id).copied();
            }
        }
        self.users.write().await.insert(profile.user_id, DirectoryEntry { profile, active });
    }

    pub async fn set_active(&self, user_id: UserId, active: bool) {
        if let Some(entry) = self.users.write().await.get_mut(&user_id) {
            entry.active = active;
        }
    }

    async fn active_where(
        &self,
        keep: impl Fn(&UserGeography) -> bool + Send,
    ) -> Vec<UserGeography> {
        let users = self.users.read().await;
        let mut matched: Vec<UserGeography> = users
            .values()
            .filter(|entry| entry.active && keep(&entry.profile))
            .map(|entry| entry.profile.clone())
            .collect();
        matched.sort_by_key(|profile| profile.user_id);
        matched
    }
}

#[async_trait]
impl GeographyDirectory for InMemoryGeographyDirectory {
    async fn find_profile(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserGeography>, ApplicationError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).filter(|entry| entry.active).map(|entry| entry.profile.clone()))
    }

    async fn department_scope(
        &self,
        department_id: DepartmentId,
    ) -> Result<Option<ScopeLevel>, ApplicationError> {
        Ok(self.departments.read().await.get(&department_id).copied())
    }

    async fn list_active_users(
        &self,
        exclude: UserId,
    ) -> Result<Vec<UserGeography>, ApplicationError> {
        Ok(self.active_where(|profile| profile.user_id != exclude).await)
    }

    async fn list_candidates(
        &self,
        exclude: UserId,
        point: &GeoPoint,
    ) -> Result<Vec<UserGeography>, ApplicationError> {
        let point = *point;
        Ok(self
            .active_where(move |profile| {
                profile.user_id != exclude && shares_jurisdiction(profile, &point)
            })
            .await)
    }
}
