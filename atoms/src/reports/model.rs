use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::geo::GeoPoint;

/// Pipeline stage of a report. Dutch values from the first client release are accepted on input.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[serde(alias = "gemeld")]
    Reported,
    #[serde(alias = "in_behandeling")]
    InProgress,
    #[serde(alias = "opgehaald")]
    Collected,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [
        ReportStatus::Reported,
        ReportStatus::InProgress,
        ReportStatus::Collected,
    ];

    fn rank(self) -> u8 {
        match self {
            ReportStatus::Reported => 0,
            ReportStatus::InProgress => 1,
            ReportStatus::Collected => 2,
        }
    }

    /// Status only moves forward; skipping a stage is allowed, standing still is not
    pub fn can_advance_to(self, next: ReportStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Reported => "reported",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Collected => "collected",
        }
    }

    pub fn parse(raw: &str) -> Option<ReportStatus> {
        match raw {
            "reported" | "gemeld" => Some(ReportStatus::Reported),
            "in_progress" | "in_behandeling" => Some(ReportStatus::InProgress),
            "collected" | "opgehaald" => Some(ReportStatus::Collected),
            _ => None,
        }
    }
}

/// A single bulky-waste pickup request
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(rename = "type")]
    pub waste_type: String,
    #[serde(default)]
    pub description: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Report {
    pub fn is_open(&self) -> bool {
        self.status != ReportStatus::Collected
    }
}

/// Who files a report
#[derive(Debug, Clone)]
pub struct Submitter {
    pub user_id: String,
    pub display_name: String,
}

pub const ANONYMOUS_NAME: &str = "Anonymous user";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportPayload {
    #[serde(rename = "type")]
    pub waste_type: String,
    #[serde(default)]
    pub description: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub address: String,
    pub photo: Option<String>,
    /// Hide the submitter's name on the public report
    #[serde(default)]
    pub anonymous: bool,
}

pub const MAX_TYPE_BYTES: usize = 100;
pub const MAX_ADDRESS_BYTES: usize = 500;
pub const MAX_DESCRIPTION_BYTES: usize = 5_000;

/// Budget for the client-supplied fields of one stored report. The rest of
/// the 400 KB item limit is left for ids, names and timestamps.
pub const MAX_REPORT_BYTES: usize = 390_000;

fn check_length(field: &str, value: &str, limit: usize) -> Result<(), ServiceError> {
    if value.len() > limit {
        return Err(ServiceError::Validation(format!(
            "{} too long ({} bytes, limit {})",
            field,
            value.len(),
            limit
        )));
    }
    Ok(())
}

impl CreateReportPayload {
    pub fn validate(&self, max_photo_bytes: usize) -> Result<(), ServiceError> {
        if self.waste_type.trim().is_empty() {
            return Err(ServiceError::Validation("Report type is required".to_string()));
        }
        check_length("Type", &self.waste_type, MAX_TYPE_BYTES)?;
        check_length("Address", &self.address, MAX_ADDRESS_BYTES)?;
        check_length("Description", &self.description, MAX_DESCRIPTION_BYTES)?;
        if !self.location.is_valid() {
            return Err(ServiceError::Validation(format!(
                "Invalid location: {}, {}",
                self.location.lat, self.location.lng
            )));
        }
        if let Some(photo) = &self.photo {
            if photo.len() > max_photo_bytes {
                return Err(ServiceError::Validation(format!(
                    "Photo too large ({} bytes, limit {})",
                    photo.len(),
                    max_photo_bytes
                )));
            }
        }

        let total = self.waste_type.len()
            + self.address.len()
            + self.description.len()
            + self.photo.as_ref().map_or(0, String::len);
        if total > MAX_REPORT_BYTES {
            return Err(ServiceError::Validation(format!(
                "Report too large ({} bytes, limit {})",
                total, MAX_REPORT_BYTES
            )));
        }
        Ok(())
    }

    /// Address as given, or the coordinates when the client sent none
    pub fn resolved_address(&self) -> String {
        let trimmed = self.address.trim();
        if trimmed.is_empty() {
            format!("{:.6}, {:.6}", self.location.lat, self.location.lng)
        } else {
            trimmed.to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: ReportStatus,
}
