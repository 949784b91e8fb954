use crate::degradation::{DegradationController, DegradationMode};
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use foreman_core::{Clock, ForemanError, ForemanResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// A recurring operator-defined window during which the scheduler runs in
/// Maintenance mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// Display name of the window.
    pub name: String,
    /// Start schedule, in the 7-field cron format:
    /// sec min hour day-of-month month day-of-week year.
    pub cron_expression: String,
    /// How long the window stays open after each start.
    pub duration_minutes: u64,
    /// Disabled windows are kept in config but never fire.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Evaluates maintenance windows and drives the controller in and out of
/// Maintenance mode.
///
/// The scheduler assumes it owns the Maintenance state: outside every window
/// it returns the controller to Full. Operators that need an unscheduled
/// maintenance state should degrade manually instead.
pub struct MaintenanceScheduler {
    windows: Vec<MaintenanceWindow>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}

impl MaintenanceScheduler {
    /// Create a scheduler, validating every window's cron expression.
    pub fn new(windows: Vec<MaintenanceWindow>, clock: Arc<dyn Clock>) -> ForemanResult<Self> {
        for window in &windows {
            Self::parse_cron(&window.cron_expression)?;
        }
        Ok(Self { windows, clock })
    }

    /// Parse a cron expression string into a [`cron::Schedule`].
    pub fn parse_cron(cron_expr: &str) -> ForemanResult<Schedule> {
        Schedule::from_str(cron_expr).map_err(|e| {
            ForemanError::Config(format!("Invalid cron expression '{cron_expr}': {e}"))
        })
    }

    /// The number of configured windows (enabled and disabled).
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// The name and start time of the next upcoming window, if any.
    pub fn next_window(&self) -> Option<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        self.windows
            .iter()
            .filter(|w| w.enabled)
            .filter_map(|w| {
                let schedule = Self::parse_cron(&w.cron_expression).ok()?;
                let start = schedule.after(&now).next()?;
                Some((w.name.clone(), start))
            })
            .min_by_key(|(_, start)| *start)
    }

    /// The window currently open, if any: its most recent start lies within
    /// `duration_minutes` of now.
    pub fn active_window(&self) -> Option<&MaintenanceWindow> {
        let now = self.clock.now();
        self.windows.iter().filter(|w| w.enabled).find(|w| {
            let Ok(schedule) = Self::parse_cron(&w.cron_expression) else {
                return false;
            };
            let lookback = now - Duration::minutes(w.duration_minutes as i64);
            schedule
                .after(&lookback)
                .next()
                .is_some_and(|start| start <= now)
        })
    }

    /// Drive the controller: enter Maintenance while a window is open,
    /// return to Full once it closes. Returns true when a transition fired.
    pub async fn apply(&self, controller: &DegradationController) -> bool {
        match self.active_window() {
            Some(window) => {
                if controller.mode().await != DegradationMode::Maintenance {
                    info!(window = %window.name, "maintenance window open");
                    return controller.transition_to_maintenance().await;
                }
                false
            }
            None => {
                if controller.mode().await == DegradationMode::Maintenance {
                    info!("maintenance window closed");
                    return controller.transition_to_full().await;
                }
                false
            }
        }
    }
}
