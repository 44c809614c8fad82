//! Cron-driven resync loop.

use crate::error::{ResyncError, Result};
use crate::service::{ResyncService, SyncOutcome};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Hourly, on the hour.
pub const DEFAULT_SCHEDULE: &str = "0 * * * *";

/// A parsed cron expression.
///
/// Standard five-field expressions (`min hour dom month dow`) use Unix
/// day-of-week numbers (0 or 7 is Sunday, 1 is Monday) and are translated to
/// the `cron` crate's form. Six/seven-field expressions (with seconds and
/// year) are passed through unchanged, so their day-of-week numbers follow
/// the `cron` crate (1-7 is Sunday-Saturday).
#[derive(Debug, Clone)]
pub struct ResyncSchedule {
    expression: String,
    schedule: Schedule,
}

impl ResyncSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let invalid = |reason: String| ResyncError::Schedule {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let normalized = match fields.as_slice() {
            [minute, hour, day, month, weekday] => {
                let weekday = unix_weekdays(weekday).map_err(invalid)?;
                format!("0 {minute} {hour} {day} {month} {weekday}")
            }
            _ => trimmed.to_string(),
        };
        let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Rewrite a Unix day-of-week field (0-7, Sunday is 0 or 7) with day names.
///
/// Numeric items, ranges and stepped ranges are expanded to name lists.
/// `*`, `*/n`, `?` and items already using names are kept as-is.
fn unix_weekdays(field: &str) -> std::result::Result<String, String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u8 = step
                    .parse()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid day-of-week step in {item:?}"))?;
                (base, step)
            }
            None => (item, 1),
        };
        if !base.starts_with(|c: char| c.is_ascii_digit()) {
            items.push(item.to_string());
            continue;
        }

        let day = |value: &str| {
            value
                .parse::<u8>()
                .ok()
                .filter(|day| *day <= 7)
                .ok_or_else(|| format!("invalid day of week {value:?}"))
        };
        let (start, end) = match base.split_once('-') {
            Some((start, end)) => (day(start)?, day(end)?),
            // `n/step` runs from n to the end of the week
            None if step > 1 => (day(base)?, 6),
            None => (day(base)?, day(base)?),
        };
        if start > end {
            return Err(format!("invalid day-of-week range {item:?}"));
        }

        let mut names: Vec<&str> = Vec::new();
        for value in (start..=end).step_by(step as usize) {
            let name = WEEKDAY_NAMES[(value % 7) as usize];
            if !names.contains(&name) {
                names.push(name);
            }
        }
        items.push(names.join(","));
    }
    Ok(items.join(","))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub runs: u64,
    pub failures: u64,
}

pub struct ResyncScheduler {
    service: Arc<ResyncService>,
    schedule: ResyncSchedule,
    max_runs: Option<u64>,
}

impl ResyncScheduler {
    pub fn new(service: Arc<ResyncService>, schedule: ResyncSchedule) -> Self {
        Self {
            service,
            schedule,
            max_runs: None,
        }
    }

    /// Stop after `runs` scheduled syncs.
    pub fn with_max_runs(mut self, runs: u64) -> Self {
        self.max_runs = Some(runs);
        self
    }

    /// Run syncs on schedule until `shutdown` fires.
    ///
    /// Syncs never overlap; a failed sync is logged and the loop waits for the
    /// next slot.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut last_fire: Option<DateTime<Utc>> = None;

        info!(
            "Database sync scheduled with {:?}",
            self.schedule.expression()
        );

        loop {
            if self.max_runs.is_some_and(|max| stats.runs >= max) {
                break;
            }

            let now = Utc::now();
            let from = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = self.schedule.next_after(from) else {
                warn!("Schedule {:?} has no upcoming runs", self.schedule.expression());
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            info!("Next database sync at {next}");

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            last_fire = Some(next);
            stats.runs += 1;
            match self.service.clone().sync_blocking().await {
                Ok(SyncOutcome::Completed { .. }) | Ok(SyncOutcome::Skipped) => {}
                Err(e) => {
                    error!("Scheduled database sync failed: {e}");
                    stats.failures += 1;
                }
            }
        }

        stats
    }
}
