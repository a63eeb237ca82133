use std::collections::HashMap;

use grofvuil_atoms::geo::GeoPoint;
use grofvuil_atoms::http::respond;
use grofvuil_atoms::reports::{self, Report, ReportStatus};
use grofvuil_atoms::users::User;
use grofvuil_atoms::{KvStore, ServiceError};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::access::require_admin;

const TOP_HOTSPOTS: usize = 10;
const TOP_TYPES: usize = 5;
const RECENT_REPORTS: usize = 5;

#[derive(Debug, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub reported: usize,
    pub in_progress: usize,
    pub collected: usize,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionTime {
    pub hours: f64,
    pub display: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HeatLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub street: String,
    pub count: usize,
    /// Location of the first report seen for this street
    pub location: GeoPoint,
    /// Count relative to the busiest street, in (0, 1]
    pub intensity: f64,
    pub level: HeatLevel,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub waste_type: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub counts: StatusCounts,
    pub average_resolution: Option<ResolutionTime>,
    pub hotspots: Vec<Hotspot>,
    pub top_types: Vec<TypeCount>,
    pub recent: Vec<Report>,
}

/// Street part of a free-text address.
/// `"30, Lastdragerstraat"` gives `"Lastdragerstraat"`; without a comma a leading house number is dropped.
pub fn street_name(address: &str) -> String {
    let mut parts = address.split(',');
    let first = parts.next().unwrap_or_default();
    if let Some(second) = parts.next() {
        return second.trim().to_string();
    }

    // House number, plus a one-letter suffix when a separator follows (`12a Botter`, not `12Botter`)
    let rest = first.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = if rest.len() < first.len() {
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() && !chars.next().is_some_and(|n| n.is_alphabetic()) => {
                &rest[c.len_utf8()..]
            }
            _ => rest,
        }
    } else {
        rest
    };

    let cleaned = rest.trim();
    if cleaned.is_empty() {
        address.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `45m`, `5h`, `2d 3h`, `1w 2d`
pub fn format_duration_hours(hours: f64) -> String {
    if hours < 1.0 {
        return format!("{}m", (hours * 60.0).round() as i64);
    }
    if hours < 24.0 {
        return format!("{}h", hours.round() as i64);
    }
    if hours < 24.0 * 7.0 {
        let mut days = (hours / 24.0).floor() as i64;
        let mut rest = (hours % 24.0).round() as i64;
        if rest == 24 {
            days += 1;
            rest = 0;
        }
        return if rest > 0 {
            format!("{}d {}h", days, rest)
        } else {
            format!("{}d", days)
        };
    }
    let mut weeks = (hours / (24.0 * 7.0)).floor() as i64;
    let mut days = ((hours % (24.0 * 7.0)) / 24.0).round() as i64;
    if days == 7 {
        weeks += 1;
        days = 0;
    }
    if days > 0 {
        format!("{}w {}d", weeks, days)
    } else {
        format!("{}w", weeks)
    }
}

/// Mean time from creation to collection, counting whole hours per report
pub fn average_resolution(reports: &[Report]) -> Option<ResolutionTime> {
    let hours: Vec<i64> = reports
        .iter()
        .filter(|r| r.status == ReportStatus::Collected)
        .filter_map(|r| r.updated_at.map(|u| (u - r.created_at).num_hours()))
        .collect();

    if hours.is_empty() {
        return None;
    }

    let avg = hours.iter().sum::<i64>() as f64 / hours.len() as f64;
    Some(ResolutionTime {
        hours: avg,
        display: format_duration_hours(avg),
    })
}

fn heat_level(intensity: f64) -> HeatLevel {
    if intensity >= 0.7 {
        HeatLevel::High
    } else if intensity >= 0.4 {
        HeatLevel::Medium
    } else {
        HeatLevel::Low
    }
}

/// Busiest streets, ties in order of first appearance
pub fn hotspots(reports: &[Report]) -> Vec<Hotspot> {
    let mut order: Vec<(String, usize, GeoPoint)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for report in reports {
        let street = street_name(&report.address);
        match index.get(&street) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(street.clone(), order.len());
                order.push((street, 1, report.location));
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.truncate(TOP_HOTSPOTS);

    let max = order.first().map(|h| h.1).unwrap_or(1) as f64;
    order
        .into_iter()
        .map(|(street, count, location)| {
            let intensity = count as f64 / max;
            Hotspot {
                street,
                count,
                location,
                intensity,
                level: heat_level(intensity),
            }
        })
        .collect()
}

pub fn type_distribution(reports: &[Report]) -> Vec<TypeCount> {
    let mut order: Vec<TypeCount> = Vec::new();
    for report in reports {
        match order.iter_mut().find(|t| t.waste_type == report.waste_type) {
            Some(t) => t.count += 1,
            None => order.push(TypeCount {
                waste_type: report.waste_type.clone(),
                count: 1,
            }),
        }
    }
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_TYPES);
    order
}

/// Aggregate dashboard figures; `reports` is expected newest first
pub fn compute_stats(reports: &[Report]) -> DashboardStats {
    let mut counts = StatusCounts {
        total: reports.len(),
        ..Default::default()
    };
    for r in reports {
        match r.status {
            ReportStatus::Reported => counts.reported += 1,
            ReportStatus::InProgress => counts.in_progress += 1,
            ReportStatus::Collected => counts.collected += 1,
        }
    }

    DashboardStats {
        counts,
        average_resolution: average_resolution(reports),
        hotspots: hotspots(reports),
        top_types: type_distribution(reports),
        recent: reports.iter().take(RECENT_REPORTS).cloned().collect(),
    }
}

/// HTTP Handler: GET /reports/stats
pub async fn stats_handler(store: &dyn KvStore, caller: Option<&User>) -> Result<Response<Body>, Error> {
    let result = async {
        require_admin(caller)?;
        let all = reports::load_reports(store).await?;
        Ok::<_, ServiceError>(compute_stats(&all))
    }
    .await;

    respond(result, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn report(address: &str, waste_type: &str, status: ReportStatus, resolved_after_h: Option<i64>) -> Report {
        let created_at = Utc::now() - Duration::days(30);
        Report {
            id: format!("report:{}", address),
            waste_type: waste_type.to_string(),
            description: String::new(),
            location: GeoPoint::new(52.37, 5.21),
            address: address.to_string(),
            photo: None,
            user_id: "u1".to_string(),
            user_name: "u".to_string(),
            status,
            created_at,
            updated_at: resolved_after_h.map(|h| created_at + Duration::hours(h)),
            updated_by: None,
        }
    }

    #[test]
    fn street_names_drop_house_numbers() {
        assert_eq!(street_name("30, Lastdragerstraat"), "Lastdragerstraat");
        assert_eq!(street_name("De Nieuwe Bibliotheek"), "De Nieuwe Bibliotheek");
        assert_eq!(street_name("12a Botter"), "Botter");
        assert_eq!(street_name("12 Arend"), "Arend");
        assert_eq!(street_name("12Botter"), "Botter");
        assert_eq!(street_name("42"), "42");
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration_hours(0.5), "30m");
        assert_eq!(format_duration_hours(5.0), "5h");
        assert_eq!(format_duration_hours(24.0), "1d");
        assert_eq!(format_duration_hours(51.0), "2d 3h");
        assert_eq!(format_duration_hours(168.0), "1w");
        assert_eq!(format_duration_hours(216.0), "1w 2d");
    }

    #[test]
    fn average_counts_collected_reports_only() {
        let reports = vec![
            report("1, Botter", "Bank", ReportStatus::Collected, Some(10)),
            report("2, Botter", "Bank", ReportStatus::Collected, Some(30)),
            report("3, Botter", "Bank", ReportStatus::InProgress, Some(1000)),
            report("4, Botter", "Bank", ReportStatus::Collected, None),
        ];
        let avg = average_resolution(&reports).unwrap();
        assert_eq!(avg.hours, 20.0);
        assert_eq!(avg.display, "20h");

        assert!(average_resolution(&reports[2..]).is_none());
    }

    #[test]
    fn hotspots_rank_streets_with_intensity() {
        let reports = vec![
            report("1, Botter", "Bank", ReportStatus::Reported, None),
            report("2, Botter", "Matras", ReportStatus::Reported, None),
            report("3, Tjalk", "Matras", ReportStatus::Reported, None),
            report("4, Botter", "Matras", ReportStatus::Collected, Some(3)),
            report("5, Tjalk", "Koelkast", ReportStatus::Reported, None),
            report("Esplanade", "Bank", ReportStatus::Reported, None),
        ];
        let spots = hotspots(&reports);
        assert_eq!(spots.len(), 3);
        assert_eq!((spots[0].street.as_str(), spots[0].count), ("Botter", 3));
        assert_eq!(spots[0].level, HeatLevel::High);
        assert_eq!((spots[1].street.as_str(), spots[1].count), ("Tjalk", 2));
        assert!((spots[1].intensity - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(spots[1].level, HeatLevel::Medium);
        assert_eq!(spots[2].level, HeatLevel::Low);

        let stats = compute_stats(&reports);
        assert_eq!(stats.counts.total, 6);
        assert_eq!(stats.counts.reported, 5);
        assert_eq!(stats.counts.collected, 1);
        assert_eq!(stats.top_types[0], TypeCount { waste_type: "Matras".to_string(), count: 3 });
        assert_eq!(stats.recent.len(), 5);
    }
}
