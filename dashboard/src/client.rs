use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use heatdash_common::{
    HeaterStateReading, ScheduleToggle, SetSchedulePayload, SetpointReading, SetpointWrite,
    TemperatureReading, WeeklySchedule,
};

/// A hung backend must not stall a 500 ms polling tick for long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin typed wrapper over the thermostat backend's JSON endpoints. One
/// shared connection pool; every failure is an `anyhow` chain the caller
/// decides to log or surface.
#[derive(Debug, Clone)]
pub struct HeatApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HeatApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("request to /{path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("backend answered /{path} with status {status}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode /{path} response"))
    }

    async fn post_json<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to /{path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("backend answered /{path} with status {status}");
        }

        debug!("backend accepted /{path}");
        Ok(())
    }

    pub async fn temperature(&self) -> Result<f64> {
        Ok(self
            .get_json::<TemperatureReading>("get_temperature")
            .await?
            .temperature)
    }

    pub async fn heater_state(&self) -> Result<bool> {
        Ok(self
            .get_json::<HeaterStateReading>("get_heater_state")
            .await?
            .heater_state)
    }

    pub async fn setpoint(&self) -> Result<f64> {
        Ok(self.get_json::<SetpointReading>("get_setpoint").await?.setpoint)
    }

    /// The history document is fetched untyped; the processing pipeline
    /// owns validation of the parallel-arrays contract.
    pub async fn full_history(&self) -> Result<Value> {
        self.get_json("get_full_history").await
    }

    pub async fn write_setpoint(&self, write: SetpointWrite) -> Result<()> {
        self.post_json("set_setpoint", &write).await
    }

    pub async fn schedule(&self) -> Result<WeeklySchedule> {
        self.get_json("get_schedule").await
    }

    pub async fn write_schedule(&self, schedule: &WeeklySchedule) -> Result<()> {
        self.post_json(
            "set_schedule",
            &SetSchedulePayload {
                schedule: schedule.clone(),
            },
        )
        .await
    }

    pub async fn toggle_schedule(&self, state: bool) -> Result<()> {
        self.post_json("toggle_schedule", &ScheduleToggle { state })
            .await
    }
}
