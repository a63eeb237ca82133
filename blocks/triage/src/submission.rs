use chrono::{DateTime, Duration, Utc};
use grofvuil_atoms::geo::{distance_m, GeoPoint};
use grofvuil_atoms::reports::Report;
use grofvuil_atoms::ServiceError;

/// Limits applied before a report is accepted
#[derive(Debug, Clone)]
pub struct SubmissionPolicy {
    /// An open report closer than this blocks a new one
    pub spam_radius_m: f64,
    /// Only reports created within this window count as duplicates
    pub spam_window: Duration,
    pub max_reports_per_hour: usize,
    /// Inline photo limit; the whole item must fit in 400 KB
    pub max_photo_bytes: usize,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            spam_radius_m: 10.0,
            spam_window: Duration::hours(24),
            max_reports_per_hour: 5,
            max_photo_bytes: 350_000,
        }
    }
}

/// Reject a submission that duplicates a nearby open report (409),
/// or that exceeds the submitter's hourly quota (429).
pub fn check_submission(
    existing: &[Report],
    location: &GeoPoint,
    submitter_id: &str,
    now: DateTime<Utc>,
    policy: &SubmissionPolicy,
) -> Result<(), ServiceError> {
    let spam_since = now
        .checked_sub_signed(policy.spam_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let duplicate = existing.iter().find(|r| {
        r.is_open() && r.created_at > spam_since && distance_m(&r.location, location) < policy.spam_radius_m
    });
    if let Some(dup) = duplicate {
        tracing::warn!(
            "Duplicate submission by {} within {} m of {}",
            submitter_id,
            policy.spam_radius_m,
            dup.id
        );
        return Err(ServiceError::Conflict(format!(
            "A report already exists within {} meters of this location",
            policy.spam_radius_m
        )));
    }

    let hour_ago = now - Duration::hours(1);
    let recent: Vec<&Report> = existing
        .iter()
        .filter(|r| r.user_id == submitter_id && r.created_at > hour_ago)
        .collect();

    if recent.len() >= policy.max_reports_per_hour {
        // The quota frees up when the oldest report in the window ages out
        let oldest = recent.iter().map(|r| r.created_at).min().unwrap_or(now);
        let retry_after_secs = (oldest + Duration::hours(1) - now).num_seconds().max(1) as u64;
        return Err(ServiceError::RateLimited {
            message: format!(
                "Maximum of {} reports per hour reached, try again later",
                policy.max_reports_per_hour
            ),
            retry_after_secs,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use grofvuil_atoms::reports::ReportStatus;

    fn report(id: &str, user: &str, lat: f64, lng: f64, created_at: DateTime<Utc>) -> Report {
        Report {
            id: format!("report:{}", id),
            waste_type: "Matras".to_string(),
            description: String::new(),
            location: GeoPoint::new(lat, lng),
            address: "Lastdragerstraat".to_string(),
            photo: None,
            user_id: user.to_string(),
            user_name: user.to_string(),
            status: ReportStatus::Reported,
            created_at,
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn nearby_open_report_is_a_conflict() {
        let now = Utc::now();
        let existing = vec![report("a", "other", 52.3706, 5.2144, now - Duration::minutes(5))];

        // ~5.6 m north
        let close = GeoPoint::new(52.37065, 5.2144);
        let result = check_submission(&existing, &close, "me", now, &SubmissionPolicy::default());
        assert_matches!(result, Err(ServiceError::Conflict(_)));

        // ~11 m north
        let far = GeoPoint::new(52.3707, 5.2144);
        assert!(check_submission(&existing, &far, "me", now, &SubmissionPolicy::default()).is_ok());
    }

    #[test]
    fn collected_or_stale_reports_do_not_block() {
        let now = Utc::now();
        let mut collected = report("a", "other", 52.3706, 5.2144, now - Duration::minutes(5));
        collected.status = ReportStatus::Collected;
        let stale = report("b", "other", 52.3706, 5.2144, now - Duration::hours(25));

        let here = GeoPoint::new(52.3706, 5.2144);
        let result = check_submission(&[collected, stale], &here, "me", now, &SubmissionPolicy::default());
        assert!(result.is_ok());
    }

    #[test]
    fn unbounded_window_reaches_back_to_the_earliest_report() {
        let now = Utc::now();
        let policy = SubmissionPolicy {
            spam_window: Duration::max_value(),
            ..SubmissionPolicy::default()
        };
        let existing = vec![report("old", "other", 52.3706, 5.2144, now - Duration::days(3650))];

        let here = GeoPoint::new(52.3706, 5.2144);
        assert_matches!(
            check_submission(&existing, &here, "me", now, &policy),
            Err(ServiceError::Conflict(_))
        );
    }

    #[test]
    fn hourly_quota_is_per_submitter() {
        let now = Utc::now();
        let policy = SubmissionPolicy::default();
        let existing: Vec<Report> = (0..5)
            .map(|i| {
                report(
                    &i.to_string(),
                    "me",
                    52.30 + i as f64 * 0.01,
                    5.20,
                    now - Duration::minutes(50 - i * 10),
                )
            })
            .collect();

        let elsewhere = GeoPoint::new(52.40, 5.30);
        let result = check_submission(&existing, &elsewhere, "me", now, &policy);
        assert_matches!(result, Err(ServiceError::RateLimited { retry_after_secs, .. }) => {
            // oldest was 50 minutes ago
            assert!((590..=600).contains(&retry_after_secs));
        });

        assert!(check_submission(&existing, &elsewhere, "someone-else", now, &policy).is_ok());
    }

    #[test]
    fn reports_older_than_an_hour_free_the_quota() {
        let now = Utc::now();
        let existing: Vec<Report> = (0..5)
            .map(|i| report(&i.to_string(), "me", 52.30 + i as f64 * 0.01, 5.20, now - Duration::minutes(61 + i)))
            .collect();
        let elsewhere = GeoPoint::new(52.40, 5.30);
        assert!(check_submission(&existing, &elsewhere, "me", now, &SubmissionPolicy::default()).is_ok());
    }
}
