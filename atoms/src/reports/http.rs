use lambda_http::{http::StatusCode, Body, Error as LambdaError, Response};

use super::service::get_report;
use crate::http::respond;
use crate::store::KvStore;

/// HTTP Handler: GET /reports/{id}
pub async fn get_report_handler(store: &dyn KvStore, id: &str) -> Result<Response<Body>, LambdaError> {
    let result = get_report(store, id)
        .await
        .map(|report| serde_json::json!({ "report": report }));
    respond(result, StatusCode::OK)
}
