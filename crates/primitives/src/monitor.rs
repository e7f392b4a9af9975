use serde::{Deserialize, Serialize};

/// Reported state of a single monitored service.
///
/// The numeric codes follow the status gauge exposed by the server:
/// 0 = down, 1 = up, 3 = pending, 4 = maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorStatus {
    /// The service failed its last check.
    Down,
    /// The service passed its last check.
    Up,
    /// The service has not completed enough checks yet.
    Pending,
    /// The service is in a scheduled maintenance window.
    Maintenance,
}

impl MonitorStatus {
    /// Maps a status gauge value to a status. Unrecognized codes yield `None`
    /// ("status unknown"), never an error.
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Down),
            1 => Some(Self::Up),
            3 => Some(Self::Pending),
            4 => Some(Self::Maintenance),
            _ => None,
        }
    }

    /// Short human-readable label used in log output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Pending => "pending",
            Self::Maintenance => "maintenance",
        }
    }
}

/// One uptime-checked service as reconstructed from the metrics endpoint.
///
/// A monitor is only materialized when both its name and URL were observed;
/// status and response time may independently be absent. Negative response
/// times are valid sentinel data (e.g. keyword monitors report `-1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    /// Stable, externally assigned identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Health-check URL.
    pub url: String,
    /// Latest reported status, if any.
    pub status: Option<MonitorStatus>,
    /// Latest response time in milliseconds, if any.
    pub response_time_ms: Option<f64>,
}

impl Monitor {
    /// Whether the monitor's last check succeeded. Pending, maintenance and
    /// unknown statuses all count as not up.
    pub fn is_up(&self) -> bool {
        self.status == Some(MonitorStatus::Up)
    }
}

/// Aggregate health signal derived from the whole monitor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateStatus {
    /// Every monitor is up (or the list is empty).
    Healthy,
    /// Some monitors are not up, but fewer than the critical share.
    Warning,
    /// At least [`Self::CRITICAL_RATIO`] of the monitors are not up.
    Critical,
}

impl AggregateStatus {
    /// Share of not-up monitors at which the aggregate turns critical.
    /// The boundary is inclusive: exactly 30% is critical.
    pub const CRITICAL_RATIO: f64 = 0.3;

    /// Recomputes the aggregate from the current monitor list.
    pub fn from_monitors(monitors: &[Monitor]) -> Self {
        if monitors.is_empty() {
            return Self::Healthy;
        }

        let not_up = monitors.iter().filter(|m| !m.is_up()).count();
        if not_up == 0 {
            return Self::Healthy;
        }

        let share = not_up as f64 / monitors.len() as f64;
        if share < Self::CRITICAL_RATIO { Self::Warning } else { Self::Critical }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(id: i64, status: Option<MonitorStatus>) -> Monitor {
        Monitor {
            id,
            name: format!("svc-{id}"),
            url: "http://192.168.1.1/".to_owned(),
            status,
            response_time_ms: Some(100.0),
        }
    }

    fn mixed(up: usize, down: usize) -> Vec<Monitor> {
        let mut monitors = Vec::new();
        for i in 0..up {
            monitors.push(monitor(i as i64, Some(MonitorStatus::Up)));
        }
        for i in 0..down {
            monitors.push(monitor((up + i) as i64, Some(MonitorStatus::Down)));
        }
        monitors
    }

    #[test]
    fn empty_list_is_healthy() {
        assert_eq!(AggregateStatus::from_monitors(&[]), AggregateStatus::Healthy);
    }

    #[test]
    fn all_up_is_healthy() {
        assert_eq!(AggregateStatus::from_monitors(&mixed(10, 0)), AggregateStatus::Healthy);
    }

    #[test]
    fn under_thirty_percent_is_warning() {
        // 2 down out of 10 = 20%
        assert_eq!(AggregateStatus::from_monitors(&mixed(8, 2)), AggregateStatus::Warning);
    }

    #[test]
    fn exactly_thirty_percent_is_critical() {
        // 3 down out of 10 = 30%, boundary is inclusive
        assert_eq!(AggregateStatus::from_monitors(&mixed(7, 3)), AggregateStatus::Critical);
    }

    #[test]
    fn all_down_is_critical() {
        assert_eq!(AggregateStatus::from_monitors(&mixed(0, 5)), AggregateStatus::Critical);
    }

    #[test]
    fn single_down_out_of_four_is_warning() {
        assert_eq!(AggregateStatus::from_monitors(&mixed(3, 1)), AggregateStatus::Warning);
    }

    #[test]
    fn pending_counts_as_not_up() {
        let monitors = vec![
            monitor(1, Some(MonitorStatus::Up)),
            monitor(2, Some(MonitorStatus::Pending)),
        ];
        assert_eq!(AggregateStatus::from_monitors(&monitors), AggregateStatus::Critical);
    }

    #[test]
    fn maintenance_and_unknown_count_as_not_up() {
        let monitors = vec![
            monitor(1, Some(MonitorStatus::Maintenance)),
            monitor(2, None),
            monitor(3, Some(MonitorStatus::Up)),
        ];
        // 2 of 3 not up
        assert_eq!(AggregateStatus::from_monitors(&monitors), AggregateStatus::Critical);
    }

    #[test]
    fn status_codes_round_trip() {
        assert_eq!(MonitorStatus::from_code(0), Some(MonitorStatus::Down));
        assert_eq!(MonitorStatus::from_code(1), Some(MonitorStatus::Up));
        assert_eq!(MonitorStatus::from_code(3), Some(MonitorStatus::Pending));
        assert_eq!(MonitorStatus::from_code(4), Some(MonitorStatus::Maintenance));
        assert_eq!(MonitorStatus::from_code(2), None);
        assert_eq!(MonitorStatus::from_code(99), None);
        assert_eq!(MonitorStatus::from_code(-1), None);
    }
}
