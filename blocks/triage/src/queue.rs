use std::cmp::Ordering;

use grofvuil_atoms::geo::{distance_km, GeoPoint};
use grofvuil_atoms::http::respond;
use grofvuil_atoms::reports::{self, Report, ReportStatus};
use grofvuil_atoms::{KvStore, ServiceError};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

/// Radius used by `nearby=true`
pub const NEARBY_RADIUS_KM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    Distance,
}

/// Filters and ordering for the report list
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub waste_type: Option<String>,
    pub text: Option<String>,
    pub active_only: bool,
    pub origin: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    pub sort: SortOrder,
}

fn parse_number(name: &str, raw: &str) -> Result<f64, ServiceError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ServiceError::Validation(format!("Invalid {}: {}", name, raw)))
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(raw.as_deref(), Some("true") | Some("1"))
}

impl ReportQuery {
    /// Build a query from request parameters; `param` looks up a single query value
    pub fn parse<F>(param: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| param(name).filter(|v| !v.trim().is_empty());

        let status = match non_empty("status") {
            Some(raw) if raw == "all" => None,
            Some(raw) => Some(
                ReportStatus::parse(&raw)
                    .ok_or_else(|| ServiceError::Validation(format!("Invalid status: {}", raw)))?,
            ),
            None => None,
        };

        let waste_type = non_empty("type").filter(|t| t != "all");
        let text = non_empty("q").map(|q| q.trim().to_lowercase());
        let active_only = parse_flag(param("active"));

        let origin = match (non_empty("lat"), non_empty("lng")) {
            (Some(lat), Some(lng)) => {
                let point = GeoPoint::new(parse_number("lat", &lat)?, parse_number("lng", &lng)?);
                if !point.is_valid() {
                    return Err(ServiceError::Validation("Invalid reference location".to_string()));
                }
                Some(point)
            }
            (None, None) => None,
            _ => {
                return Err(ServiceError::Validation(
                    "lat and lng must be given together".to_string(),
                ))
            }
        };

        let radius_km = match non_empty("radiusKm") {
            Some(raw) => {
                let radius = parse_number("radiusKm", &raw)?;
                if radius <= 0.0 {
                    return Err(ServiceError::Validation("radiusKm must be positive".to_string()));
                }
                Some(radius)
            }
            None if parse_flag(param("nearby")) => Some(NEARBY_RADIUS_KM),
            None => None,
        };

        let sort = match non_empty("sort").as_deref() {
            None | Some("date-desc") => SortOrder::DateDesc,
            Some("date-asc") => SortOrder::DateAsc,
            Some("distance") => SortOrder::Distance,
            Some(other) => return Err(ServiceError::Validation(format!("Invalid sort: {}", other))),
        };

        if origin.is_none() && (radius_km.is_some() || sort == SortOrder::Distance) {
            return Err(ServiceError::Validation(
                "lat and lng are required for proximity filters".to_string(),
            ));
        }

        Ok(Self {
            status,
            waste_type,
            text,
            active_only,
            origin,
            radius_km,
            sort,
        })
    }

    fn matches(&self, report: &Report) -> bool {
        if let Some(status) = self.status {
            if report.status != status {
                return false;
            }
        }
        if self.active_only && !report.is_open() {
            return false;
        }
        if let Some(t) = &self.waste_type {
            if !report.waste_type.eq_ignore_ascii_case(t) {
                return false;
            }
        }
        if let Some(q) = &self.text {
            let in_address = report.address.to_lowercase().contains(q.as_str());
            let in_type = report.waste_type.to_lowercase().contains(q.as_str());
            if !in_address && !in_type {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Filter and order reports for the list and worker views
pub fn apply_query(reports: Vec<Report>, query: &ReportQuery) -> Vec<QueueItem> {
    let mut items: Vec<QueueItem> = reports
        .into_iter()
        .filter(|r| query.matches(r))
        .map(|report| {
            let distance_km = query.origin.map(|o| distance_km(&o, &report.location));
            QueueItem { report, distance_km }
        })
        .filter(|item| match (query.radius_km, item.distance_km) {
            (Some(radius), Some(d)) => d <= radius,
            _ => true,
        })
        .collect();

    match query.sort {
        SortOrder::DateDesc => items.sort_by(|a, b| b.report.created_at.cmp(&a.report.created_at)),
        SortOrder::DateAsc => items.sort_by(|a, b| a.report.created_at.cmp(&b.report.created_at)),
        SortOrder::Distance => items.sort_by(|a, b| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        }),
    }

    items
}

/// HTTP Handler: GET /reports
pub async fn list_reports_handler(store: &dyn KvStore, query: &ReportQuery) -> Result<Response<Body>, Error> {
    let result = reports::load_reports(store)
        .await
        .map(|all| serde_json::json!({ "reports": apply_query(all, query) }));
    respond(result, StatusCode::OK)
}
