use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{Authenticator, VerifiedCaller};
use crate::domain::geography::UserGeography;
use crate::errors::{ApplicationError, DomainError};
use crate::geography::profile::GeographyDirectory;

/// One branch of a visibility disjunction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeographyClause {
    ZoneIn { zone_ids: Vec<i64> },
    DivisionEq { division_id: i64 },
    TownEq { town_id: i64 },
    DistrictEq { district_id: i64 },
}

/// OR-ed clauses restricting a listing to the caller's jurisdiction.
/// No clauses means no geographic restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyFilter {
    pub clauses: Vec<GeographyClause>,
}

/// Location columns of the record being listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeographyColumns<'a> {
    pub zone_id: &'a str,
    pub division_id: &'a str,
    pub district_id: &'a str,
    pub town_id: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlPredicate {
    pub clause: String,
    pub binds: Vec<i64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordGeography {
    pub zone_id: Option<i64>,
    pub division_id: Option<i64>,
    pub district_id: Option<i64>,
    pub town_id: Option<i64>,
}

impl GeographyFilter {
    /// Cascade: zones, then division, then town, then district. The highest
    /// applicable level suppresses every level below it.
    pub fn from_profile(geography: &UserGeography) -> Self {
        let mut clauses = Vec::new();

        if !geography.zone_ids.is_empty() {
            let mut zone_ids = geography.zone_ids.clone();
            zone_ids.sort_unstable();
            zone_ids.dedup();
            clauses.push(GeographyClause::ZoneIn { zone_ids });
            return Self { clauses };
        }

        if let Some(division_id) = geography.division_id {
            clauses.push(GeographyClause::DivisionEq { division_id });
        }
        if let (Some(town_id), None) = (geography.town_id, geography.division_id) {
            clauses.push(GeographyClause::TownEq { town_id });
        }
        if let (Some(district_id), None, None) =
            (geography.district_id, geography.division_id, geography.town_id)
        {
            clauses.push(GeographyClause::DistrictEq { district_id });
        }

        Self { clauses }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the disjunction with `?` placeholders; an unrestricted filter
    /// renders as `1 = 1`.
    pub fn to_sql(&self, columns: &GeographyColumns<'_>) -> SqlPredicate {
        if self.clauses.is_empty() {
            return SqlPredicate { clause: "1 = 1".to_string(), binds: Vec::new() };
        }

        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut binds = Vec::new();
        for clause in &self.clauses {
            match clause {
                GeographyClause::ZoneIn { zone_ids } => {
                    let placeholders = vec!["?"; zone_ids.len()].join(", ");
                    parts.push(format!("{} IN ({placeholders})", columns.zone_id));
                    binds.extend(zone_ids.iter().copied());
                }
                GeographyClause::DivisionEq { division_id } => {
                    parts.push(format!("{} = ?", columns.division_id));
                    binds.push(*division_id);
                }
                GeographyClause::TownEq { town_id } => {
                    parts.push(format!("{} = ?", columns.town_id));
                    binds.push(*town_id);
                }
                GeographyClause::DistrictEq { district_id } => {
                    parts.push(format!("{} = ?", columns.district_id));
                    binds.push(*district_id);
                }
            }
        }

        SqlPredicate { clause: format!("({})", parts.join(" OR ")), binds }
    }

    pub fn matches(&self, record: &RecordGeography) -> bool {
        if self.clauses.is_empty() {
            return true;
        }

        self.clauses.iter().any(|clause| match clause {
            GeographyClause::ZoneIn { zone_ids } => {
                record.zone_id.is_some_and(|zone_id| zone_ids.contains(&zone_id))
            }
            GeographyClause::DivisionEq { division_id } => record.division_id == Some(*division_id),
            GeographyClause::TownEq { town_id } => record.town_id == Some(*town_id),
            GeographyClause::DistrictEq { district_id } => record.district_id == Some(*district_id),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScopeRequest {
    /// Callers opt in to geographic scoping; unscoped listings skip the gate.
    pub apply_geography: bool,
    pub credential: Option<SecretString>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeResolution {
    Unscoped,
    Scoped { caller: VerifiedCaller, geography: UserGeography, filter: GeographyFilter },
}

impl ScopeResolution {
    pub fn filter(&self) -> GeographyFilter {
        match self {
            Self::Unscoped => GeographyFilter::default(),
            Self::Scoped { filter, .. } => filter.clone(),
        }
    }
}

pub struct GeographyFilterBuilder<A, D> {
    authenticator: A,
    directory: D,
}

impl<A, D> GeographyFilterBuilder<A, D>
where
    A: Authenticator,
    D: GeographyDirectory,
{
    pub fn new(authenticator: A, directory: D) -> Self {
        Self { authenticator, directory }
    }

    pub fn build_filters(geography: &UserGeography) -> GeographyFilter {
        GeographyFilter::from_profile(geography)
    }

    pub async fn resolve_scope(
        &self,
        request: &ScopeRequest,
    ) -> Result<ScopeResolution, ApplicationError> {
        if !request.apply_geography {
            return Ok(ScopeResolution::Unscoped);
        }

        let Some(credential) = request.credential.as_ref() else {
            return Err(DomainError::Unauthorized("no caller credential supplied".to_string()).into());
        };
        let Some(caller) = self.authenticator.verify(credential).await? else {
            return Err(DomainError::Unauthorized("caller could not be verified".to_string()).into());
        };
        let Some(geography) = self.directory.find_profile(caller.user_id).await? else {
            return Err(DomainError::Forbidden(format!(
                "user {} has no active geography profile",
                caller.user_id.0
            ))
            .into());
        };

        let filter = Self::build_filters(&geography);
        debug!(
            event_name = "geography.scope_resolved",
            user_id = caller.user_id.0,
            clause_count = filter.clauses.len(),
            "geography scope resolved"
        );
        Ok(ScopeResolution::Scoped { caller, geography, filter })
    }
}
