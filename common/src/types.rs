use serde::{Deserialize, Serialize};

/// Response body of `GET /get_temperature`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TemperatureReading {
    pub temperature: f64,
}

/// Response body of `GET /get_heater_state`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeaterStateReading {
    pub heater_state: bool,
}

/// Response body of `GET /get_setpoint`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetpointReading {
    pub setpoint: f64,
}

/// Request body of `POST /set_setpoint`. Also the command the live engine
/// hands back from an edit event; the host ships it as-is and only logs the
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetpointWrite {
    pub setpoint: f64,
}

/// Reconciled live state as served to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub temperature: f64,
    #[serde(rename = "heaterOn")]
    pub heater_on: bool,
    pub setpoint: f64,
    #[serde(rename = "editActive")]
    pub edit_active: bool,
    #[serde(rename = "sliderMin")]
    pub slider_min: f64,
    #[serde(rename = "sliderMax")]
    pub slider_max: f64,
}
