use chrono::{DateTime, Utc};
use grofvuil_atoms::http::respond;
use grofvuil_atoms::reports::{self, CreateReportPayload, Report, ReportStatus, Submitter, UpdateStatusPayload};
use grofvuil_atoms::users::User;
use grofvuil_atoms::{KvStore, ServiceError};
use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::access::{require_admin, require_caller, require_staff};
use crate::submission::{check_submission, SubmissionPolicy};

/// Validate, guard and store a new report for the calling user
pub async fn submit_report(
    store: &dyn KvStore,
    policy: &SubmissionPolicy,
    caller: Option<&User>,
    payload: CreateReportPayload,
    now: DateTime<Utc>,
) -> Result<Report, ServiceError> {
    let user = require_caller(caller)?;
    payload.validate(policy.max_photo_bytes)?;

    let existing = reports::load_reports(store).await?;
    check_submission(&existing, &payload.location, &user.id, now, policy)?;

    let submitter = Submitter {
        user_id: user.id.clone(),
        display_name: user.display_name().to_string(),
    };
    reports::create_report(store, payload, &submitter, now).await
}

/// Move a report along the pipeline on behalf of a worker or admin
pub async fn change_status(
    store: &dyn KvStore,
    caller: Option<&User>,
    id: &str,
    status: ReportStatus,
    now: DateTime<Utc>,
) -> Result<Report, ServiceError> {
    let user = require_staff(caller)?;
    reports::update_status(store, id, status, user.display_name(), now).await
}

/// HTTP Handler: POST /reports
pub async fn create_report_handler(
    store: &dyn KvStore,
    policy: &SubmissionPolicy,
    caller: Option<&User>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async {
        require_caller(caller)?;
        let payload: CreateReportPayload = serde_json::from_slice(body)?;
        submit_report(store, policy, caller, payload, Utc::now()).await
    }
    .await
    .map(|report| serde_json::json!({ "report": report }));

    respond(result, StatusCode::CREATED)
}

/// HTTP Handler: PATCH /reports/{id}/status
pub async fn update_status_handler(
    store: &dyn KvStore,
    caller: Option<&User>,
    id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async {
        require_staff(caller)?;
        let payload: UpdateStatusPayload = serde_json::from_slice(body)?;
        change_status(store, caller, id, payload.status, Utc::now()).await
    }
    .await
    .map(|report| serde_json::json!({ "report": report }));

    respond(result, StatusCode::OK)
}

/// HTTP Handler: DELETE /reports/{id}
pub async fn delete_report_handler(
    store: &dyn KvStore,
    caller: Option<&User>,
    id: &str,
) -> Result<Response<Body>, Error> {
    let result = async {
        let admin = require_admin(caller)?;
        reports::delete_report(store, id).await?;
        tracing::info!("Report {} deleted by {}", id, admin.id);
        Ok::<_, ServiceError>(serde_json::json!({ "success": true }))
    }
    .await;

    respond(result, StatusCode::OK)
}

/// HTTP Handler: POST /reports/reconcile
/// Replays writes parked in the local fallback into the primary store.
pub async fn reconcile_handler(store: &dyn KvStore, caller: Option<&User>) -> Result<Response<Body>, Error> {
    let result = async {
        require_admin(caller)?;
        let reconciled = store.reconcile().await?;
        Ok::<_, ServiceError>(serde_json::json!({ "reconciled": reconciled }))
    }
    .await;

    respond(result, StatusCode::OK)
}
