use chrono::{DateTime, Utc};

use super::model::{CreateReportPayload, Report, ReportStatus, Submitter, ANONYMOUS_NAME};
use crate::error::ServiceError;
use crate::store::KvStore;

pub const REPORT_PREFIX: &str = "report:";

/// Canonical store key for a report id.
/// Ids travel with their prefix (`report:...`), but bare ids are accepted too.
pub fn report_key(id: &str) -> String {
    if id.starts_with(REPORT_PREFIX) {
        id.to_string()
    } else {
        format!("{}{}", REPORT_PREFIX, id)
    }
}

/// `report:<unix millis>-<9 random chars>`
pub fn new_report_id(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}-{}", REPORT_PREFIX, now.timestamp_millis(), &random[..9])
}

/// Load every report, newest first (pure domain logic, no HTTP)
pub async fn load_reports(store: &dyn KvStore) -> Result<Vec<Report>, ServiceError> {
    let entries = store.get_by_prefix(REPORT_PREFIX).await?;

    let mut reports = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match serde_json::from_value::<Report>(value) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!("Skipping malformed report {}: {}", key, e),
        }
    }

    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(reports)
}

/// Get a specific report
pub async fn get_report(store: &dyn KvStore, id: &str) -> Result<Report, ServiceError> {
    let key = report_key(id);
    match store.get(&key).await? {
        Some(value) => serde_json::from_value(value).map_err(|e| {
            ServiceError::Internal(format!("Stored report {} is malformed: {}", key, e))
        }),
        None => Err(ServiceError::NotFound("Report not found".to_string())),
    }
}

pub async fn put_report(store: &dyn KvStore, report: &Report) -> Result<(), ServiceError> {
    let value = serde_json::to_value(report)
        .map_err(|e| ServiceError::Internal(format!("Failed to encode report: {}", e)))?;
    store.set(&report_key(&report.id), value).await?;
    Ok(())
}

/// Create a new report. Guards (spam radius, hourly quota) run in the caller.
pub async fn create_report(
    store: &dyn KvStore,
    payload: CreateReportPayload,
    submitter: &Submitter,
    now: DateTime<Utc>,
) -> Result<Report, ServiceError> {
    let address = payload.resolved_address();
    let user_name = if payload.anonymous {
        ANONYMOUS_NAME.to_string()
    } else {
        submitter.display_name.clone()
    };

    let report = Report {
        id: new_report_id(now),
        waste_type: payload.waste_type.trim().to_string(),
        description: payload.description,
        location: payload.location,
        address,
        photo: payload.photo,
        user_id: submitter.user_id.clone(),
        user_name,
        status: ReportStatus::Reported,
        created_at: now,
        updated_at: None,
        updated_by: None,
    };

    put_report(store, &report).await?;
    tracing::info!("Created report {} ({}) by {}", report.id, report.waste_type, report.user_id);
    Ok(report)
}

/// Move a report forward in the pipeline. Role checks run in the caller.
pub async fn update_status(
    store: &dyn KvStore,
    id: &str,
    status: ReportStatus,
    updated_by: &str,
    now: DateTime<Utc>,
) -> Result<Report, ServiceError> {
    let mut report = get_report(store, id).await?;

    if !report.status.can_advance_to(status) {
        return Err(ServiceError::Conflict(format!(
            "Cannot move report from {} to {}",
            report.status.as_str(),
            status.as_str()
        )));
    }

    report.status = status;
    report.updated_at = Some(now);
    report.updated_by = Some(updated_by.to_string());

    put_report(store, &report).await?;
    tracing::info!("Report {} moved to {} by {}", report.id, status.as_str(), updated_by);
    Ok(report)
}

/// Delete a report
pub async fn delete_report(store: &dyn KvStore, id: &str) -> Result<(), ServiceError> {
    let key = report_key(id);
    if store.get(&key).await?.is_none() {
        return Err(ServiceError::NotFound("Report not found".to_string()));
    }
    store.del(&key).await?;
    tracing::info!("Deleted report {}", key);
    Ok(())
}

/// Bulk write of externally prepared reports. Ids are canonicalised, missing ids are assigned.
/// Writes run concurrently; the first failure aborts the import.
pub async fn import_reports(
    store: &dyn KvStore,
    reports: Vec<Report>,
    now: DateTime<Utc>,
) -> Result<usize, ServiceError> {
    let writes = reports.into_iter().map(|mut report| {
        report.id = if report.id.trim().is_empty() {
            new_report_id(now)
        } else {
            report_key(report.id.trim())
        };
        async move { put_report(store, &report).await }
    });

    let written = futures::future::try_join_all(writes).await?;
    tracing::info!("Imported {} reports", written.len());
    Ok(written.len())
}
