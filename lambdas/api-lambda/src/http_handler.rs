use std::sync::Arc;

use chrono::Utc;
use grofvuil_atoms::http::{error_response, json_response, method_not_allowed, not_found};
use grofvuil_atoms::reports;
use grofvuil_shared::{account, auth, AppState};
use lambda_http::{
    http::{header::HeaderValue, Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use triage_block::{pipeline, queue, sample, stats};

/// Path segments under `/reports` that are routes, not report ids
const RESERVED_REPORT_PATHS: [&str; 3] = ["stats", "load-sample-data", "reconcile"];

fn with_cors_headers(mut resp: Response<Body>, cors_origin: &str) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(cors_origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,X-User-Token"),
    );
    headers.insert("Access-Control-Max-Age", HeaderValue::from_static("600"));

    resp
}

fn finalize_response(resp: Result<Response<Body>, Error>, cors_origin: &str) -> Result<Response<Body>, Error> {
    resp.map(|r| with_cors_headers(r, cors_origin))
}

/// Route part of the path, or `None` when the path is outside the API prefix
fn strip_api_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Report ids contain `:`, which clients may send as `%3A`. Malformed escapes stay as sent.
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Methods served on a path; `None` for unknown paths
fn allowed_methods(parts: &[&str]) -> Option<&'static [&'static str]> {
    match parts {
        ["health"] | ["auth", "me"] | ["reports", "stats"] => Some(&["GET"]),
        ["auth", "signup"] | ["auth", "signin"] | ["reports", "load-sample-data"] | ["reports", "reconcile"] => {
            Some(&["POST"])
        }
        ["users", "profile"] | ["reports", _, "status"] => Some(&["PATCH"]),
        ["reports"] => Some(&["GET", "POST"]),
        ["reports", _] => Some(&["GET", "DELETE"]),
        _ => None,
    }
}

/// Main Lambda handler - CORS, prefix, then public or authenticated routes
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    let cors_origin = state.config.cors_origin.as_str();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp, cors_origin));
    }

    let Some(route) = strip_api_prefix(&path, &state.config.api_prefix) else {
        return finalize_response(not_found(), cors_origin);
    };
    let segments: Vec<String> = route.split('/').filter(|s| !s.is_empty()).map(decode_segment).collect();
    let parts: Vec<&str> = segments.iter().map(String::as_str).collect();

    match allowed_methods(&parts) {
        None => return finalize_response(not_found(), cors_origin),
        Some(methods) if !methods.iter().any(|m| *m == method.as_str()) => {
            return finalize_response(method_not_allowed(), cors_origin)
        }
        Some(_) => {}
    }

    let store = state.store.as_ref();
    let body: &[u8] = event.body();

    // Public routes (no token needed)
    let resp = match (method.as_str(), parts.as_slice()) {
        ("GET", ["health"]) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }),
        ),
        ("POST", ["auth", "signup"]) => account::signup(state.auth.as_ref(), store, body).await,
        ("POST", ["auth", "signin"]) => account::signin(state.auth.as_ref(), store, body).await,
        ("GET", ["reports"]) => {
            let params = event.query_string_parameters_ref();
            match queue::ReportQuery::parse(|name| params.and_then(|p| p.first(name)).map(str::to_string)) {
                Ok(query) => queue::list_reports_handler(store, &query).await,
                Err(e) => error_response(&e),
            }
        }
        ("GET", ["reports", id]) if !RESERVED_REPORT_PATHS.iter().any(|r| r == id) => {
            reports::get_report_handler(store, id).await
        }
        _ => authenticated_route(&event, &method, &parts, &state).await,
    };

    finalize_response(resp, cors_origin)
}

/// Routes that look at the caller
async fn authenticated_route(
    event: &Request,
    method: &Method,
    parts: &[&str],
    state: &AppState,
) -> Result<Response<Body>, Error> {
    let store = state.store.as_ref();
    let body: &[u8] = event.body();

    let caller = match auth::resolve_caller(state.auth.as_ref(), store, event.headers()).await {
        Ok(caller) => caller,
        Err(e) => return error_response(&e),
    };
    let caller = caller.as_ref();

    match (method.as_str(), parts) {
        ("GET", ["auth", "me"]) => account::me(caller),
        ("PATCH", ["users", "profile"]) => account::update_profile(store, caller, body).await,
        ("POST", ["reports"]) => {
            pipeline::create_report_handler(store, &state.config.submission, caller, body).await
        }
        ("GET", ["reports", "stats"]) => stats::stats_handler(store, caller).await,
        ("POST", ["reports", "load-sample-data"]) => sample::load_sample_data_handler(store, caller, body).await,
        ("POST", ["reports", "reconcile"]) => pipeline::reconcile_handler(store, caller).await,
        ("DELETE", ["reports", id]) => pipeline::delete_report_handler(store, caller, id).await,
        ("PATCH", ["reports", id, "status"]) => pipeline::update_status_handler(store, caller, id, body).await,
        _ => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grofvuil_atoms::store::MemoryKvStore;
    use grofvuil_shared::auth::DemoAuth;
    use grofvuil_shared::config::Config;
    use std::collections::HashMap;

    async fn demo_state() -> Arc<AppState> {
        let config = Config::from_lookup(|key| match key {
            "AUTH_MODE" => Some("demo".to_string()),
            "STORE_MODE" => Some("memory".to_string()),
            "CORS_ORIGIN" => Some("https://grofvuil.example".to_string()),
            _ => None,
        })
        .unwrap();

        let store = Arc::new(MemoryKvStore::new());
        let auth = DemoAuth::with_demo_accounts();
        auth.seed_profiles(store.as_ref()).await.unwrap();
        Arc::new(AppState::new(store, Arc::new(auth), config))
    }

    async fn token(state: &AppState, email: &str, password: &str) -> String {
        let (_, session) = state.auth.sign_in(email, password).await.unwrap();
        session.access_token
    }

    fn request(method: &str, path: &str, body: serde_json::Value, token: Option<&str>) -> Request {
        let mut builder = lambda_http::http::Request::builder()
            .method(method)
            .uri(format!("https://api.grofvuil.example/make-server{}", path))
            .header("Content-Type", "application/json");
        if let Some(t) = token {
            builder = builder.header("X-User-Token", t);
        }
        let body = if body.is_null() { String::new() } else { body.to_string() };
        builder.body(Body::from(body)).unwrap()
    }

    async fn call(state: &Arc<AppState>, req: Request) -> (StatusCode, serde_json::Value, Response<Body>) {
        let resp = function_handler(req, Arc::clone(state)).await.unwrap();
        let json = serde_json::from_slice(resp.body()).unwrap_or(serde_json::Value::Null);
        (resp.status(), json, resp)
    }

    fn report_body(lat: f64, lng: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Bank",
            "description": "Grote hoekbank die niet meer past",
            "location": {"lat": lat, "lng": lng},
            "address": "30, Lastdragerstraat",
        })
    }

    #[tokio::test]
    async fn health_and_cors() {
        let state = demo_state().await;
        let (status, json, resp) = call(&state, request("GET", "/health", serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "https://grofvuil.example");

        let (status, _, resp) = call(&state, request("OPTIONS", "/reports", serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.headers()["Access-Control-Allow-Headers"], "Content-Type,Authorization,X-User-Token");

        let outside = lambda_http::http::Request::builder()
            .method("GET")
            .uri("https://api.grofvuil.example/health")
            .body(Body::Empty)
            .unwrap();
        let (status, _, _) = call(&state, outside).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_routes_and_wrong_methods() {
        let state = demo_state().await;
        let (status, _, _) = call(&state, request("GET", "/nope", serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = call(&state, request("PUT", "/reports", serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _, _) = call(&state, request("GET", "/reports/reconcile", serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn report_lifecycle() {
        let state = demo_state().await;
        let user = token(&state, "user@example.nl", "user123").await;
        let worker = token(&state, "werknemer@grofvuil.nl", "werk123").await;
        let admin = token(&state, "admin@grofvuil.nl", "admin123").await;

        // Submitting needs a token
        let (status, _, _) = call(&state, request("POST", "/reports", report_body(52.3706, 5.2144), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json, _) = call(&state, request("POST", "/reports", report_body(52.3706, 5.2144), Some(&user))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["report"]["id"].as_str().unwrap().to_string();
        assert_eq!(json["report"]["status"], "reported");
        assert_eq!(json["report"]["userName"], "Normale Gebruiker");

        // Same spot again
        let (status, _, _) = call(&state, request("POST", "/reports", report_body(52.37062, 5.2144), Some(&admin))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Public listing ignores a bad token
        let (status, json, _) = call(&state, request("GET", "/reports", serde_json::Value::Null, Some("bogus"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reports"].as_array().unwrap().len(), 1);

        // Citizens cannot change status, workers can
        let status_path = format!("/reports/{}/status", id);
        let (status, _, _) = call(&state, request("PATCH", &status_path, serde_json::json!({"status": "in_progress"}), Some(&user))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json, _) = call(&state, request("PATCH", &status_path, serde_json::json!({"status": "in_behandeling"}), Some(&worker))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["report"]["status"], "in_progress");
        assert_eq!(json["report"]["updatedBy"], "Werknemer Jan");

        let (status, _, _) = call(&state, request("PATCH", &status_path, serde_json::json!({"status": "reported"}), Some(&worker))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, _) = call(&state, request("PATCH", &status_path, serde_json::json!({"status": "collected"}), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Stats are admin only
        let (status, _, _) = call(&state, request("GET", "/reports/stats", serde_json::Value::Null, Some(&worker))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json, _) = call(&state, request("GET", "/reports/stats", serde_json::Value::Null, Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["counts"]["inProgress"], 1);
        assert_eq!(json["hotspots"][0]["street"], "Lastdragerstraat");

        // Delete with an encoded id, then it is gone
        let encoded = format!("/reports/{}", id.replace(':', "%3A"));
        let (status, json, _) = call(&state, request("DELETE", &encoded, serde_json::Value::Null, Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (status, json, _) = call(&state, request("GET", &format!("/reports/{}", id), serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Report not found");
    }

    #[tokio::test]
    async fn hourly_quota_answers_429() {
        let state = demo_state().await;
        let user = token(&state, "user@example.nl", "user123").await;

        for i in 0..5 {
            let body = report_body(52.30 + i as f64 * 0.01, 5.20);
            let (status, _, _) = call(&state, request("POST", "/reports", body, Some(&user))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, _, resp) = call(&state, request("POST", "/reports", report_body(52.40, 5.30), Some(&user))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn listing_filters_by_query() {
        let state = demo_state().await;
        let user = token(&state, "user@example.nl", "user123").await;
        call(&state, request("POST", "/reports", report_body(52.3706, 5.2144), Some(&user))).await;
        call(&state, request("POST", "/reports", report_body(52.3456, 5.1934), Some(&user))).await;

        let params: HashMap<String, String> = [("lat", "52.3698"), ("lng", "5.2167"), ("nearby", "true")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let req = request("GET", "/reports", serde_json::Value::Null, None).with_query_string_parameters(params);
        let (status, json, _) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let reports = json["reports"].as_array().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0]["distanceKm"].as_f64().unwrap() < 2.0);

        let bad: HashMap<String, String> = [("sort".to_string(), "distance".to_string())].into_iter().collect();
        let req = request("GET", "/reports", serde_json::Value::Null, None).with_query_string_parameters(bad);
        let (status, _, _) = call(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signup_signin_and_profile() {
        let state = demo_state().await;
        let creds = serde_json::json!({"email": "nieuw@example.nl", "password": "geheim123", "name": "Nieuw"});
        let (status, json, _) = call(&state, request("POST", "/auth/signup", creds.clone(), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["role"], "user");

        let (status, json, _) = call(&state, request("POST", "/auth/signin", creds, None)).await;
        assert_eq!(status, StatusCode::OK);
        let access = json["session"]["accessToken"].as_str().unwrap().to_string();

        let (status, json, _) = call(&state, request("PATCH", "/users/profile", serde_json::json!({"neighborhood": "Muziekwijk"}), Some(&access))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["neighborhood"], "Muziekwijk");

        // Bearer works as well
        let req = lambda_http::http::Request::builder()
            .method("GET")
            .uri("https://api.grofvuil.example/make-server/auth/me")
            .header("Authorization", format!("Bearer {}", access))
            .body(Body::Empty)
            .unwrap();
        let (status, json, _) = call(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["name"], "Nieuw");

        let (status, _, _) = call(&state, request("GET", "/auth/me", serde_json::Value::Null, Some("local-token-unknown"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sample_import_and_reconcile_are_admin_only() {
        let state = demo_state().await;
        let admin = token(&state, "admin@grofvuil.nl", "admin123").await;
        let user = token(&state, "user@example.nl", "user123").await;

        let sample = serde_json::json!({"sampleReports": [{
            "id": "1700000000000-abcdefghi",
            "type": "Wasmachine",
            "description": "Defecte wasmachine",
            "location": {"lat": 52.3845, "lng": 5.2011},
            "address": "8, Botter",
            "userId": "sample",
            "userName": "Demo",
            "status": "gemeld",
            "createdAt": "2024-11-02T10:00:00Z"
        }]});

        let (status, _, _) = call(&state, request("POST", "/reports/load-sample-data", sample.clone(), Some(&user))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json, _) = call(&state, request("POST", "/reports/load-sample-data", sample, Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);

        let (status, json, _) = call(&state, request("GET", "/reports/report:1700000000000-abcdefghi", serde_json::Value::Null, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["report"]["status"], "reported");

        // Plain memory store has nothing parked
        let (status, json, _) = call(&state, request("POST", "/reports/reconcile", serde_json::Value::Null, Some(&admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reconciled"], 0);
    }

    #[test]
    fn path_helpers() {
        assert_eq!(strip_api_prefix("/make-server/reports", "/make-server"), Some("/reports"));
        assert_eq!(strip_api_prefix("/make-serverx/reports", "/make-server"), None);
        assert_eq!(strip_api_prefix("/reports", ""), Some("/reports"));
        assert_eq!(decode_segment("report%3A17-abc"), "report:17-abc");
        assert_eq!(decode_segment("100%"), "100%");
        assert_eq!(decode_segment("report%+1abc"), "report%+1abc");
        assert_eq!(decode_segment("%zz%3a"), "%zz:");
        assert_eq!(decode_segment("caf%C3%A9"), "café");
        // Invalid UTF-8 keeps the raw segment
        assert_eq!(decode_segment("%FF"), "%FF");
    }
}
