use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Everything the dashboard host needs, with defaults matching the known
/// deployment. Loaded from an optional JSON file plus env overrides; always
/// `sanitize()`d before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the thermostat backend.
    pub backend_url: String,
    /// Cadence of both polling loops, in milliseconds.
    pub poll_interval_ms: u64,
    /// Stride for history downsampling; also sets time-tick density.
    pub downsample_rate: usize,
    /// Slider range served to the browser, in °C.
    pub slider_min: f64,
    pub slider_max: f64,
    /// Setpoint shown until the first successful backend read.
    pub default_setpoint: f64,
    /// IANA zone name the history chart is rendered in.
    pub display_timezone: String,
    /// Idle time after which an uncommitted edit session is closed.
    pub edit_timeout_ms: u64,
    /// Port of the dashboard's own HTTP surface.
    pub http_port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://cobalt:1111".to_string(),
            poll_interval_ms: 500,
            downsample_rate: 10,
            slider_min: 16.0,
            slider_max: 22.0,
            default_setpoint: 20.0,
            display_timezone: "America/New_York".to_string(),
            edit_timeout_ms: 5_000,
            http_port: 8080,
        }
    }
}

impl DashboardConfig {
    pub fn sanitize(&mut self) {
        while self.backend_url.ends_with('/') {
            self.backend_url.pop();
        }

        self.poll_interval_ms = self.poll_interval_ms.clamp(100, 60_000);
        self.edit_timeout_ms = self.edit_timeout_ms.clamp(500, 600_000);

        if self.downsample_rate == 0 {
            self.downsample_rate = 1;
        }

        let defaults = Self::default();
        if !self.slider_min.is_finite()
            || !self.slider_max.is_finite()
            || self.slider_min >= self.slider_max
        {
            self.slider_min = defaults.slider_min;
            self.slider_max = defaults.slider_max;
        }
        if !self.default_setpoint.is_finite() {
            self.default_setpoint = defaults.default_setpoint;
        }
        self.default_setpoint = self.default_setpoint.clamp(self.slider_min, self.slider_max);

        if self.display_timezone.parse::<Tz>().is_err() {
            self.display_timezone = defaults.display_timezone;
        }
    }

    /// The sanitized zone, parsed. Falls back to the default zone so a
    /// caller can never end up without one.
    pub fn timezone(&self) -> Tz {
        self.display_timezone
            .parse()
            .unwrap_or(chrono_tz::America::New_York)
    }
}
