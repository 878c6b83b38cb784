use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::geography::DepartmentId;
use crate::geography::filter::RecordGeography;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

/// A case file as seen by listing operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfilingFile {
    pub id: FileId,
    pub file_number: String,
    pub subject: String,
    pub department_id: Option<DepartmentId>,
    pub zone_id: Option<i64>,
    pub division_id: Option<i64>,
    pub district_id: Option<i64>,
    pub town_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl EfilingFile {
    pub fn geography(&self) -> RecordGeography {
        RecordGeography {
            zone_id: self.zone_id,
            division_id: self.division_id,
            district_id: self.district_id,
            town_id: self.town_id,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    pub file_number: String,
    pub subject: String,
    pub department_id: Option<DepartmentId>,
    pub zone_id: Option<i64>,
    pub division_id: Option<i64>,
    pub district_id: Option<i64>,
    pub town_id: Option<i64>,
}
