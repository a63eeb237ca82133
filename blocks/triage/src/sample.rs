use chrono::Utc;
use grofvuil_atoms::http::respond;
use grofvuil_atoms::reports::{self, Report};
use grofvuil_atoms::users::User;
use grofvuil_atoms::{KvStore, ServiceError};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDataPayload {
    #[serde(default)]
    pub sample_reports: Vec<Report>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ImportSummary {
    pub success: bool,
    pub count: usize,
}

/// Bulk-load prepared reports (admin only)
pub async fn load_sample_data(
    store: &dyn KvStore,
    caller: Option<&User>,
    payload: SampleDataPayload,
) -> Result<ImportSummary, ServiceError> {
    let admin = crate::access::require_admin(caller)?;
    if payload.sample_reports.is_empty() {
        return Err(ServiceError::Validation("No sample reports provided".to_string()));
    }

    let count = reports::import_reports(store, payload.sample_reports, Utc::now()).await?;
    tracing::info!("{} loaded {} sample reports", admin.id, count);
    Ok(ImportSummary { success: true, count })
}

/// HTTP Handler: POST /reports/load-sample-data
pub async fn load_sample_data_handler(
    store: &dyn KvStore,
    caller: Option<&User>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async {
        crate::access::require_admin(caller)?;
        let payload: SampleDataPayload = serde_json::from_slice(body)?;
        load_sample_data(store, caller, payload).await
    }
    .await;

    respond(result, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::fixtures::user;
    use assert_matches::assert_matches;
    use grofvuil_atoms::store::MemoryKvStore;
    use grofvuil_atoms::users::Role;

    fn body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "sampleReports": [
                {
                    "id": "report:1700000000000-abcdefghi",
                    "type": "Bank",
                    "description": "Oude leren bank, nog in redelijke staat",
                    "location": {"lat": 52.3706, "lng": 5.2144},
                    "address": "30, Lastdragerstraat",
                    "userId": "sample-user",
                    "userName": "Demo",
                    "status": "gemeld",
                    "createdAt": "2024-11-02T10:00:00Z"
                },
                {
                    "id": "1700000000001-jklmnopqr",
                    "type": "Matras",
                    "description": "Eenpersoonsmatras, gebruikt",
                    "location": {"lat": 52.3689, "lng": 5.2178},
                    "address": "De Diagonaal",
                    "userId": "sample-user",
                    "userName": "Demo",
                    "status": "opgehaald",
                    "createdAt": "2024-11-01T10:00:00Z",
                    "updatedAt": "2024-11-03T16:00:00Z",
                    "updatedBy": "Werknemer Jan"
                }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn admins_import_sample_reports() {
        let store = MemoryKvStore::new();
        let resp = load_sample_data_handler(&store, Some(&user("a1", Role::Admin)), &body())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "count": 2}));

        let bare = reports::get_report(&store, "report:1700000000001-jklmnopqr").await.unwrap();
        assert_eq!(bare.status, reports::ReportStatus::Collected);
    }

    #[tokio::test]
    async fn import_is_admin_only_and_needs_reports() {
        let store = MemoryKvStore::new();
        let resp = load_sample_data_handler(&store, Some(&user("w1", Role::Worker)), &body())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let empty = load_sample_data(
            &store,
            Some(&user("a1", Role::Admin)),
            SampleDataPayload { sample_reports: vec![] },
        )
        .await;
        assert_matches!(empty, Err(ServiceError::Validation(_)));
        assert!(store.is_empty().await);
    }
}
