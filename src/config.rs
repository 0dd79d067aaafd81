use std::time::Duration;

/// Knobs for the derived grid and the reschedule preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSettings {
    /// First hour of the fallback window used when nothing is configured or booked.
    pub default_start_hour: u32,
    /// End (exclusive) of the fallback window.
    pub default_end_hour: u32,
    /// A destination slot holding this many meetings for the target staff
    /// member is full. `None` never fills.
    pub max_meetings_per_slot: Option<usize>,
    /// Decline drops onto a slot where the target staff member is not configured.
    /// Off by default: only fullness is checked before a write unless a
    /// deployment asks for configured destinations.
    pub require_configured_destination: bool,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            default_start_hour: 8,
            default_end_hour: 20,
            max_meetings_per_slot: None,
            require_configured_destination: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub grid: GridSettings,
    pub refresh_interval: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid: GridSettings::default(),
            refresh_interval: Duration::from_secs(60),
            metrics_port: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let hour = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u32>().ok());

        let default_start_hour =
            hour("SLOTBOARD_DEFAULT_START_HOUR").unwrap_or(defaults.grid.default_start_hour);
        let default_end_hour = hour("SLOTBOARD_DEFAULT_END_HOUR").unwrap_or(defaults.grid.default_end_hour);
        let (default_start_hour, default_end_hour) =
            if default_start_hour < default_end_hour && default_end_hour <= 24 {
                (default_start_hour, default_end_hour)
            } else {
                tracing::warn!(
                    "ignoring default hours {default_start_hour}..{default_end_hour}, using {}..{}",
                    defaults.grid.default_start_hour,
                    defaults.grid.default_end_hour
                );
                (defaults.grid.default_start_hour, defaults.grid.default_end_hour)
            };

        let max_meetings_per_slot =
            lookup("SLOTBOARD_MAX_MEETINGS_PER_SLOT").and_then(|s| s.trim().parse::<usize>().ok());
        let require_configured_destination = lookup("SLOTBOARD_REQUIRE_CONFIGURED_DESTINATION")
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
        let refresh_interval = parse("SLOTBOARD_REFRESH_SECS")
            .filter(|&s| s > 0)
            .map_or(defaults.refresh_interval, Duration::from_secs);
        let metrics_port = lookup("SLOTBOARD_METRICS_PORT").and_then(|s| s.trim().parse().ok());

        Self {
            grid: GridSettings {
                default_start_hour,
                default_end_hour,
                max_meetings_per_slot,
                require_configured_destination,
            },
            refresh_interval,
            metrics_port,
        }
    }
}
