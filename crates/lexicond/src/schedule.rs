//! Daily trigger: run the pipeline at a fixed wall-clock time.
//!
//! The next fire time is computed only after the previous run has
//! finished, so two runs never overlap. Fire times that pass while a run is
//! still going are skipped rather than queued.

use crate::pipeline::Pipeline;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Cron expression '{0}' has no upcoming fire times")]
    Exhausted(String),
}

/// A cron expression evaluated in a fixed timezone
#[derive(Debug, Clone)]
pub struct DailySchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
}

/// Accept classic 5-field cron by prepending a seconds field
fn normalize_expression(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

impl DailySchedule {
    pub fn new(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        let schedule = Schedule::from_str(&normalize_expression(expression)).map_err(|e| {
            ScheduleError::InvalidExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            }
        })?;
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::UnknownTimezone(timezone.to_string()))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`, in the schedule's timezone
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
    }

    /// Fire times in `(from, to]`, i.e. triggers a long run slept through
    pub fn missed_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
        self.schedule
            .after(&from.with_timezone(&self.timezone))
            .take_while(|t| t.with_timezone(&Utc) <= to)
            .count()
    }
}

/// Run the pipeline on every fire time until `shutdown` resolves.
///
/// Failed runs are logged and do not stop the loop. A shutdown during a run
/// abandons it; entries already stored are kept.
pub async fn run_scheduled<S>(
    pipeline: &Pipeline,
    schedule: &DailySchedule,
    shutdown: S,
) -> Result<(), ScheduleError>
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let now = Utc::now();
        let next = schedule
            .next_after(now)
            .ok_or_else(|| ScheduleError::Exhausted(schedule.expression().to_string()))?;
        let wait = (next.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        info!("Next run at {}", next);

        tokio::select! {
            _ = &mut shutdown => {
                info!("Scheduler stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        info!("Generating and sending daily vocabulary email...");
        tokio::select! {
            _ = &mut shutdown => {
                warn!("Shutdown requested during a run; stored words are kept");
                return Ok(());
            }
            result = pipeline.run() => match result {
                Ok(summary) => info!(
                    "Daily run {} complete: {} words delivered",
                    summary.run_id,
                    summary.entries.len()
                ),
                Err(e) => error!("Daily run failed: {}", e),
            }
        }

        let skipped = schedule.missed_between(next.with_timezone(&Utc), Utc::now());
        if skipped > 0 {
            warn!("Skipped {} trigger(s) that fired while the run was in progress", skipped);
        }
    }
}
