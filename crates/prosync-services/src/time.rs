use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_types::models::time::{NewTimeEntry, TimeEntry};
use prosync_types::{Filter, FilterOp, Query};

use crate::ServiceError;
use crate::rows::{self, current_user};

/// Totals over a set of time entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSummary {
    pub total_seconds: i64,
    pub billable_seconds: i64,
    pub non_billable_seconds: i64,
    /// Project name -> seconds. Entries without a project count under "".
    pub by_project: BTreeMap<String, i64>,
}

/// Total the entries, measuring running timers up to `now`.
pub fn summarize(entries: &[TimeEntry], now: DateTime<Utc>) -> TimeSummary {
    let mut summary = TimeSummary::default();
    for entry in entries {
        let seconds = entry.elapsed_seconds(now);
        summary.total_seconds += seconds;
        if entry.billable {
            summary.billable_seconds += seconds;
        } else {
            summary.non_billable_seconds += seconds;
        }
        *summary.by_project.entry(entry.project.clone()).or_default() += seconds;
    }
    summary
}

pub struct TimeTrackingService<R> {
    remote: Arc<R>,
}

impl<R> Clone for TimeTrackingService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> TimeTrackingService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// Start a timer for the current user. Only one timer may run at a
    /// time.
    pub async fn start_timer(
        &self,
        project: &str,
        description: &str,
        task_id: Option<Uuid>,
        billable: bool,
    ) -> Result<TimeEntry, ServiceError> {
        let user_id = current_user(&*self.remote)?;
        if let Some(running) = self.active_timer().await? {
            return Err(ServiceError::validation(format!(
                "A timer is already running for '{}'",
                running.project
            )));
        }

        let payload = NewTimeEntry {
            user_id,
            project: project.trim().to_string(),
            task_id,
            description: description.trim().to_string(),
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: 0,
            billable,
        };
        let entry: TimeEntry = rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to start timer: {}", e))?;
        info!("Timer started on '{}'", entry.project);
        Ok(entry)
    }

    /// Stop a running timer, recording its end and duration.
    pub async fn stop_timer(&self, id: Uuid) -> Result<TimeEntry, ServiceError> {
        let result: Result<TimeEntry, ServiceError> = async {
            let entry: TimeEntry = rows::fetch_one(&*self.remote, id).await?;
            if !entry.is_running() {
                return Err(ServiceError::validation("Timer is not running"));
            }
            let now = Utc::now();
            let duration = entry.elapsed_seconds(now);
            rows::update(&*self.remote, id, json!({ "ended_at": now, "duration_seconds": duration })).await
        }
        .await;

        let entry = result.inspect_err(|e| error!("Failed to stop timer {}: {}", id, e))?;
        info!("Timer stopped on '{}' after {}s", entry.project, entry.duration_seconds);
        Ok(entry)
    }

    /// The current user's running timer, if any.
    pub async fn active_timer(&self) -> Result<Option<TimeEntry>, ServiceError> {
        let user_id = current_user(&*self.remote)?;
        let query = Query::table("time_entries")
            .eq("user_id", user_id.to_string())
            .is_null("ended_at")
            .order_by("started_at", false);
        rows::fetch_first(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to load active timer: {}", e))
    }

    /// Record a finished block of work after the fact.
    pub async fn log_entry(
        &self,
        project: &str,
        description: &str,
        started_at: DateTime<Utc>,
        duration_seconds: i64,
        billable: bool,
    ) -> Result<TimeEntry, ServiceError> {
        let user_id = current_user(&*self.remote)?;
        if duration_seconds <= 0 {
            return Err(ServiceError::validation("Duration must be positive"));
        }
        let ended_at = Duration::try_seconds(duration_seconds)
            .and_then(|d| started_at.checked_add_signed(d))
            .ok_or_else(|| ServiceError::validation("Duration is out of range"))?;

        let payload = NewTimeEntry {
            user_id,
            project: project.trim().to_string(),
            task_id: None,
            description: description.trim().to_string(),
            started_at,
            ended_at: Some(ended_at),
            duration_seconds,
            billable,
        };
        rows::insert(&*self.remote, &payload)
            .await
            .inspect_err(|e| error!("Failed to log time entry: {}", e))
    }

    /// The current user's entries started in `[from, to)`, newest first.
    pub async fn list_entries(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<TimeEntry>, ServiceError> {
        let user_id = current_user(&*self.remote)?;
        let query = Query::table("time_entries")
            .eq("user_id", user_id.to_string())
            .filter(Filter::new("started_at", FilterOp::Gte, from.to_rfc3339()))
            .filter(Filter::new("started_at", FilterOp::Lt, to.to_rfc3339()))
            .order_by("started_at", false);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to list time entries: {}", e))
    }

    pub async fn delete_entry(&self, id: Uuid) -> Result<(), ServiceError> {
        rows::delete::<TimeEntry, _>(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to delete time entry {}: {}", id, e))
    }
}
