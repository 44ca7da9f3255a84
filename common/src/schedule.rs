use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("schedule field `{field}` holds an unparseable time `{value}`")]
    InvalidTime { field: &'static str, value: String },
    #[error("schedule field `{field}` is outside the allowed range: {value}")]
    TemperatureOutOfRange { field: &'static str, value: f64 },
}

/// The backend's weekly schedule object, on its wire contract: snake_case
/// field names, `HH:MM[:SS]` time strings, temperatures in °C. Reads
/// tolerate missing fields by falling back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklySchedule {
    pub weekday_wakeup_time: String,
    pub leave_for_work_time: String,
    pub home_from_work_time: String,
    pub weekday_bedtime: String,
    pub weekend_wakeup_time: String,
    pub weekend_bedtime: String,
    pub bedtime_temperature: f64,
    pub wakeup_temperature: f64,
    pub at_work_temperature: f64,
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            weekday_wakeup_time: "08:00:00".to_string(),
            leave_for_work_time: "09:00:00".to_string(),
            home_from_work_time: "17:00:00".to_string(),
            weekday_bedtime: "23:00:00".to_string(),
            weekend_wakeup_time: "09:00:00".to_string(),
            weekend_bedtime: "23:59:00".to_string(),
            bedtime_temperature: 17.0,
            wakeup_temperature: 20.0,
            at_work_temperature: 16.0,
        }
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

impl WeeklySchedule {
    fn time_fields(&self) -> [(&'static str, &str); 6] {
        [
            ("weekday_wakeup_time", &self.weekday_wakeup_time),
            ("leave_for_work_time", &self.leave_for_work_time),
            ("home_from_work_time", &self.home_from_work_time),
            ("weekday_bedtime", &self.weekday_bedtime),
            ("weekend_wakeup_time", &self.weekend_wakeup_time),
            ("weekend_bedtime", &self.weekend_bedtime),
        ]
    }

    fn time_fields_mut(&mut self) -> [&mut String; 6] {
        [
            &mut self.weekday_wakeup_time,
            &mut self.leave_for_work_time,
            &mut self.home_from_work_time,
            &mut self.weekday_bedtime,
            &mut self.weekend_wakeup_time,
            &mut self.weekend_bedtime,
        ]
    }

    fn temperature_fields(&self) -> [(&'static str, f64); 3] {
        [
            ("bedtime_temperature", self.bedtime_temperature),
            ("wakeup_temperature", self.wakeup_temperature),
            ("at_work_temperature", self.at_work_temperature),
        ]
    }

    /// Reject anything the backend would choke on before writing through.
    pub fn validate(&self, min_temp: f64, max_temp: f64) -> Result<(), ScheduleError> {
        for (field, value) in self.time_fields() {
            if parse_time(value).is_none() {
                return Err(ScheduleError::InvalidTime {
                    field,
                    value: value.to_string(),
                });
            }
        }

        for (field, value) in self.temperature_fields() {
            if !value.is_finite() || !(min_temp..=max_temp).contains(&value) {
                return Err(ScheduleError::TemperatureOutOfRange { field, value });
            }
        }

        Ok(())
    }

    /// Canonicalize times to the backend's `HH:MM:SS` isoformat. Fields
    /// that do not parse are left alone for `validate` to report.
    pub fn normalize(&mut self) {
        for value in self.time_fields_mut() {
            if let Some(time) = parse_time(value) {
                *value = time.format("%H:%M:%S").to_string();
            }
        }
    }
}

/// Request body of `POST /set_schedule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSchedulePayload {
    pub schedule: WeeklySchedule,
}

/// Request body of `POST /toggle_schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleToggle {
    pub state: bool,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_backend_response_falls_back_to_defaults() {
        let schedule: WeeklySchedule = serde_json::from_str(
            r#"{ "weekday_wakeup_time": "07:30:00", "wakeup_temperature": 19.0 }"#,
        )
        .unwrap();

        assert_eq!(schedule.weekday_wakeup_time, "07:30:00");
        assert_eq!(schedule.wakeup_temperature, 19.0);
        assert_eq!(schedule.weekend_bedtime, "23:59:00");
        assert_eq!(schedule.at_work_temperature, 16.0);
    }

    #[test]
    fn wire_names_match_the_backend_contract() {
        let json = serde_json::to_value(WeeklySchedule::default()).unwrap();

        assert_eq!(json["leave_for_work_time"], "09:00:00");
        assert_eq!(json["bedtime_temperature"], 17.0);
    }

    #[test]
    fn normalize_canonicalizes_short_times() {
        let mut schedule = WeeklySchedule {
            weekday_wakeup_time: "07:30".to_string(),
            ..WeeklySchedule::default()
        };

        schedule.normalize();

        assert_eq!(schedule.weekday_wakeup_time, "07:30:00");
    }

    #[test]
    fn validate_rejects_bad_time_and_out_of_range_temperature() {
        let bad_time = WeeklySchedule {
            weekday_bedtime: "midnightish".to_string(),
            ..WeeklySchedule::default()
        };
        assert_eq!(
            bad_time.validate(16.0, 22.0),
            Err(ScheduleError::InvalidTime {
                field: "weekday_bedtime",
                value: "midnightish".to_string(),
            })
        );

        let too_hot = WeeklySchedule {
            wakeup_temperature: 30.0,
            ..WeeklySchedule::default()
        };
        assert_eq!(
            too_hot.validate(16.0, 22.0),
            Err(ScheduleError::TemperatureOutOfRange {
                field: "wakeup_temperature",
                value: 30.0,
            })
        );

        let fine = WeeklySchedule::default();
        assert_eq!(fine.validate(16.0, 22.0), Ok(()));
    }
}
