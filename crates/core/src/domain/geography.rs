use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepartmentId(pub i64);

/// Geographic granularity at which a department operates or a rule applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Global,
    Division,
    District,
    Town,
}

impl ScopeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Division => "division",
            Self::District => "district",
            Self::Town => "town",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Some(Self::Global),
            "division" => Some(Self::Division),
            "district" => Some(Self::District),
            "town" => Some(Self::Town),
            _ => None,
        }
    }

    /// Higher wins when several scopes justify the same recipient.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Global => 4,
            Self::Division => 3,
            Self::District => 2,
            Self::Town => 1,
        }
    }
}

impl Default for ScopeLevel {
    fn default() -> Self {
        Self::District
    }
}

/// Resolved role and jurisdiction of one e-filing user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGeography {
    pub user_id: UserId,
    pub role_code: String,
    pub department_id: Option<DepartmentId>,
    pub department_type: Option<ScopeLevel>,
    pub district_id: Option<i64>,
    pub town_id: Option<i64>,
    pub division_id: Option<i64>,
    pub zone_ids: Vec<i64>,
}

impl UserGeography {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            division_id: self.division_id,
            district_id: self.district_id,
            town_id: self.town_id,
        }
    }

    pub fn is_globally_scoped(&self) -> bool {
        self.department_type == Some(ScopeLevel::Global)
    }
}

/// Partial jurisdiction of a file as supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub department_id: Option<DepartmentId>,
    pub district_id: Option<i64>,
    pub town_id: Option<i64>,
    pub division_id: Option<i64>,
}

impl FileLocation {
    /// Fills every absent field from the sender's own geography.
    pub fn resolve_against(&self, sender: &UserGeography) -> ResolvedLocation {
        ResolvedLocation {
            department_id: self.department_id.or(sender.department_id),
            point: GeoPoint {
                division_id: self.division_id.or(sender.division_id),
                district_id: self.district_id.or(sender.district_id),
                town_id: self.town_id.or(sender.town_id),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub division_id: Option<i64>,
    pub district_id: Option<i64>,
    pub town_id: Option<i64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub department_id: Option<DepartmentId>,
    pub point: GeoPoint,
}

#[cfg(test)]
mod tests {
    use super::{DepartmentId, FileLocation, ScopeLevel, UserGeography, UserId};

    fn sender() -> UserGeography {
        UserGeography {
            user_id: UserId(1),
            role_code: "WAT_XEN".to_string(),
            department_id: Some(DepartmentId(10)),
            department_type: Some(ScopeLevel::District),
            district_id: Some(3),
            town_id: Some(30),
            division_id: None,
            zone_ids: vec![],
        }
    }

    #[test]
    fn absent_file_fields_fall_back_to_sender_geography() {
        let location = FileLocation { district_id: Some(7), ..FileLocation::default() };
        let resolved = location.resolve_against(&sender());

        assert_eq!(resolved.department_id, Some(DepartmentId(10)));
        assert_eq!(resolved.point.district_id, Some(7));
        assert_eq!(resolved.point.town_id, Some(30));
        assert_eq!(resolved.point.division_id, None);
    }

    #[test]
    fn scope_level_parse_is_case_insensitive() {
        assert_eq!(ScopeLevel::parse(" Division "), Some(ScopeLevel::Division));
        assert_eq!(ScopeLevel::parse("province"), None);
        assert!(ScopeLevel::Global.priority() > ScopeLevel::Division.priority());
        assert!(ScopeLevel::District.priority() > ScopeLevel::Town.priority());
    }
}
