use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Hours added on top of the viewer-zone conversion. The backend stamps
/// history rows with civil local time labelled as GMT; the dashboard has
/// always compensated with this constant shift. It encodes that convention,
/// not a timezone rule, and must stay a literal.
pub const HISTORY_SHIFT_HOURS: i64 = 5;

/// Time-axis target: roughly this many labelled ticks across the chart.
const TIME_TICK_DIVISIONS: usize = 6;

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("history response is not a JSON object")]
    NotAnObject,
    #[error("history response is missing the `{0}` series")]
    MissingSeries(&'static str),
    #[error("history series `{0}` is not an array")]
    NotASequence(&'static str),
    #[error(
        "history series lengths differ: {time} time, {temperature} temperature, {setpoint} setpoint"
    )]
    LengthMismatch {
        time: usize,
        temperature: usize,
        setpoint: usize,
    },
    #[error("history series `{series}` holds a non-conforming entry at index {index}")]
    BadEntry { series: &'static str, index: usize },
    #[error("unparseable history timestamp `{0}`")]
    BadTimestamp(String),
}

/// The backend's aligned-arrays history payload, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDocument {
    pub time: Vec<String>,
    pub temperature: Vec<f64>,
    pub setpoint: Vec<f64>,
}

/// One zipped tuple, timestamp still in backend form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub time: String,
    pub temperature: f64,
    pub setpoint: f64,
}

/// One retained sample after downsampling, timestamp normalized to an
/// ISO-8601 instant in the display time base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedSample {
    pub time: String,
    pub temperature: f64,
    pub setpoint: f64,
}

impl HistoryDocument {
    /// Check the parallel-arrays contract and pull the three series out of
    /// the raw JSON document. Unequal lengths are a contract violation and
    /// rejected outright rather than zipped to the shortest.
    pub fn parse(doc: &Value) -> Result<Self, HistoryError> {
        let object = doc.as_object().ok_or(HistoryError::NotAnObject)?;

        let series = |key: &'static str| -> Result<&[Value], HistoryError> {
            object
                .get(key)
                .ok_or(HistoryError::MissingSeries(key))?
                .as_array()
                .map(Vec::as_slice)
                .ok_or(HistoryError::NotASequence(key))
        };

        let time_raw = series("time")?;
        let temperature_raw = series("temperature")?;
        let setpoint_raw = series("setpoint")?;

        if time_raw.len() != temperature_raw.len() || time_raw.len() != setpoint_raw.len() {
            return Err(HistoryError::LengthMismatch {
                time: time_raw.len(),
                temperature: temperature_raw.len(),
                setpoint: setpoint_raw.len(),
            });
        }

        let strings = |key, raw: &[Value]| -> Result<Vec<String>, HistoryError> {
            raw.iter()
                .enumerate()
                .map(|(index, value)| {
                    value
                        .as_str()
                        .map(str::to_string)
                        .ok_or(HistoryError::BadEntry { series: key, index })
                })
                .collect()
        };
        let numbers = |key, raw: &[Value]| -> Result<Vec<f64>, HistoryError> {
            raw.iter()
                .enumerate()
                .map(|(index, value)| {
                    value
                        .as_f64()
                        .ok_or(HistoryError::BadEntry { series: key, index })
                })
                .collect()
        };

        Ok(Self {
            time: strings("time", time_raw)?,
            temperature: numbers("temperature", temperature_raw)?,
            setpoint: numbers("setpoint", setpoint_raw)?,
        })
    }

    /// Positional pairing of the three series. Infallible after `parse`
    /// established equal lengths.
    pub fn zip(&self) -> Vec<RawSample> {
        self.time
            .iter()
            .zip(self.temperature.iter().zip(self.setpoint.iter()))
            .map(|(time, (&temperature, &setpoint))| RawSample {
                time: time.clone(),
                temperature,
                setpoint,
            })
            .collect()
    }
}

/// Stride sampling: keep every `rate`-th sample by original index, index 0
/// always included. No averaging, so peaks between retained points are
/// dropped. Rate 1 is the identity.
pub fn downsample(samples: &[RawSample], rate: usize) -> Vec<RawSample> {
    samples.iter().step_by(rate.max(1)).cloned().collect()
}

/// Reinterpret a backend timestamp as an instant, move it into the viewer's
/// civil time, then apply the fixed shift. Output is millisecond-precision
/// ISO-8601 with a `Z` suffix, byte-stable for a fixed zone.
pub fn normalize_time(raw: &str, zone: Tz) -> Result<String, HistoryError> {
    let instant = DateTime::parse_from_rfc2822(raw)
        .map_err(|_| HistoryError::BadTimestamp(raw.to_string()))?;

    let shifted = instant.with_timezone(&zone).naive_local() + Duration::hours(HISTORY_SHIFT_HOURS);

    Ok(DateTime::<Utc>::from_naive_utc_and_offset(shifted, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Downsample and normalize in one pass: the chart-ready series.
pub fn process(
    samples: &[RawSample],
    rate: usize,
    zone: Tz,
) -> Result<Vec<ProcessedSample>, HistoryError> {
    downsample(samples, rate)
        .into_iter()
        .map(|sample| {
            Ok(ProcessedSample {
                time: normalize_time(&sample.time, zone)?,
                temperature: sample.temperature,
                setpoint: sample.setpoint,
            })
        })
        .collect()
}

/// Evenly strided timestamps over the processed series, index 0 always
/// included. A stride of zero (fewer samples than divisions) means every
/// sample is its own tick.
pub fn time_axis_ticks(samples: &[ProcessedSample]) -> Vec<String> {
    let step = samples.len() / TIME_TICK_DIVISIONS;
    if step == 0 {
        return samples.iter().map(|sample| sample.time.clone()).collect();
    }
    samples
        .iter()
        .step_by(step)
        .map(|sample| sample.time.clone())
        .collect()
}

/// One tick per whole degree spanning the joint range of temperature and
/// setpoint, floor(min) to ceil(max) inclusive.
pub fn value_axis_ticks(samples: &[ProcessedSample]) -> Vec<i64> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for sample in samples {
        min = min.min(sample.temperature.min(sample.setpoint));
        max = max.max(sample.temperature.max(sample.setpoint));
    }

    (min.floor() as i64..=max.ceil() as i64).collect()
}

/// Everything a chart mount needs, regenerated wholesale per refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub samples: Vec<ProcessedSample>,
    #[serde(rename = "timeTicks")]
    pub time_ticks: Vec<String>,
    #[serde(rename = "valueTicks")]
    pub value_ticks: Vec<i64>,
}

impl ChartSeries {
    /// Full pipeline from the raw history document. Ticks are derived from
    /// the already-downsampled series, so tick density follows the rate.
    pub fn build(doc: &Value, rate: usize, zone: Tz) -> Result<Self, HistoryError> {
        let document = HistoryDocument::parse(doc)?;
        let samples = process(&document.zip(), rate, zone)?;
        let time_ticks = time_axis_ticks(&samples);
        let value_ticks = value_axis_ticks(&samples);
        Ok(Self {
            samples,
            time_ticks,
            value_ticks,
        })
    }
}

/// Per-fetch lifecycle. `Ready` and `Error` are terminal until the next
/// explicit refresh calls `begin` again.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartState {
    Idle,
    Loading,
    Ready(ChartSeries),
    Error(String),
}

impl ChartState {
    /// Start a refresh from any state.
    pub fn begin(&mut self) {
        *self = ChartState::Loading;
    }

    /// Settle the in-flight fetch. Completions that arrive while no fetch
    /// is loading (a stale task after a newer `begin`/settle) are dropped.
    pub fn resolve(&mut self, outcome: Result<ChartSeries, String>) {
        if *self != ChartState::Loading {
            return;
        }
        *self = match outcome {
            Ok(series) => ChartState::Ready(series),
            Err(message) => ChartState::Error(message),
        };
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::America;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn raw(n: usize) -> Vec<RawSample> {
        (0..n)
            .map(|i| RawSample {
                time: format!("Tue, 14 Jan 2025 23:{:02}:00 GMT", i % 60),
                temperature: 18.0 + i as f64 * 0.1,
                setpoint: 19.5,
            })
            .collect()
    }

    fn processed(pairs: &[(f64, f64)]) -> Vec<ProcessedSample> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(temperature, setpoint))| ProcessedSample {
                time: format!("2025-01-14T23:{i:02}:00.000Z"),
                temperature,
                setpoint,
            })
            .collect()
    }

    #[test]
    fn parse_rejects_mismatched_lengths() {
        let doc = json!({
            "time": ["Tue, 14 Jan 2025 23:23:41 GMT", "Tue, 14 Jan 2025 23:24:41 GMT"],
            "temperature": [18.0],
            "setpoint": [19.5, 19.5],
        });

        assert_eq!(
            HistoryDocument::parse(&doc),
            Err(HistoryError::LengthMismatch {
                time: 2,
                temperature: 1,
                setpoint: 2,
            })
        );
    }

    #[test]
    fn parse_rejects_missing_and_non_sequence_series() {
        let missing = json!({ "time": [], "temperature": [] });
        assert_eq!(
            HistoryDocument::parse(&missing),
            Err(HistoryError::MissingSeries("setpoint"))
        );

        let scalar = json!({ "time": [], "temperature": 18.0, "setpoint": [] });
        assert_eq!(
            HistoryDocument::parse(&scalar),
            Err(HistoryError::NotASequence("temperature"))
        );

        assert_eq!(
            HistoryDocument::parse(&json!([1, 2])),
            Err(HistoryError::NotAnObject)
        );
    }

    #[test]
    fn parse_rejects_non_conforming_entries() {
        let doc = json!({
            "time": ["Tue, 14 Jan 2025 23:23:41 GMT"],
            "temperature": ["warm"],
            "setpoint": [19.5],
        });

        assert_eq!(
            HistoryDocument::parse(&doc),
            Err(HistoryError::BadEntry {
                series: "temperature",
                index: 0,
            })
        );
    }

    #[test]
    fn zip_pairs_positionally() {
        let doc = json!({
            "time": ["Tue, 14 Jan 2025 23:23:41 GMT", "Tue, 14 Jan 2025 23:24:41 GMT"],
            "temperature": [18.0, 18.2],
            "setpoint": [19.5, 19.5],
        });

        let samples = HistoryDocument::parse(&doc).unwrap().zip();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].temperature, 18.2);
        assert_eq!(samples[1].time, "Tue, 14 Jan 2025 23:24:41 GMT");
    }

    #[test]
    fn downsample_retains_ceil_n_over_rate_and_index_zero() {
        for (n, rate) in [(10, 3), (100, 10), (7, 2), (1, 10), (6, 6)] {
            let samples = raw(n);
            let kept = downsample(&samples, rate);

            assert_eq!(kept.len(), n.div_ceil(rate), "n={n} rate={rate}");
            assert_eq!(kept[0], samples[0]);
        }
    }

    #[test]
    fn downsample_rate_one_is_identity() {
        let samples = raw(25);
        assert_eq!(downsample(&samples, 1), samples);
    }

    #[test]
    fn normalize_time_is_byte_stable_for_a_fixed_zone() {
        let out = normalize_time("Tue, 14 Jan 2025 23:23:41 GMT", America::New_York).unwrap();
        // New York is UTC-5 in January: 23:23:41Z becomes 18:23:41 wall
        // time, plus the fixed five hours.
        assert_eq!(out, "2025-01-14T23:23:41.000Z");

        let out = normalize_time("Tue, 14 Jan 2025 23:23:41 GMT", America::Halifax).unwrap();
        assert_eq!(out, "2025-01-15T00:23:41.000Z");
    }

    #[test]
    fn normalize_time_rejects_garbage() {
        assert_eq!(
            normalize_time("not a date", America::New_York),
            Err(HistoryError::BadTimestamp("not a date".to_string()))
        );
    }

    #[test]
    fn time_ticks_stride_over_the_processed_series() {
        let samples = processed(&vec![(18.0, 19.0); 30]);
        let ticks = time_axis_ticks(&samples);

        // stride 30 / 6 = 5: indices 0, 5, 10, 15, 20, 25.
        assert_eq!(ticks.len(), 6);
        assert_eq!(ticks[0], samples[0].time);
        assert_eq!(ticks[1], samples[5].time);
    }

    #[test]
    fn short_series_makes_every_sample_a_tick() {
        let samples = processed(&vec![(18.0, 19.0); 4]);
        let ticks = time_axis_ticks(&samples);

        assert_eq!(ticks.len(), 4);
        assert!(time_axis_ticks(&[]).is_empty());
    }

    #[test]
    fn value_ticks_span_the_joint_whole_degree_range() {
        let samples = processed(&[(18.0, 19.0), (20.0, 21.0)]);
        assert_eq!(value_axis_ticks(&samples), vec![18, 19, 20, 21]);

        let fractional = processed(&[(18.2, 19.0), (20.0, 20.7)]);
        assert_eq!(value_axis_ticks(&fractional), vec![18, 19, 20, 21]);

        assert!(value_axis_ticks(&[]).is_empty());
    }

    #[test]
    fn chart_series_ticks_follow_the_downsample_rate() {
        let doc = json!({
            "time": (0..60).map(|i| format!("Tue, 14 Jan 2025 22:{i:02}:00 GMT")).collect::<Vec<_>>(),
            "temperature": vec![18.0; 60],
            "setpoint": vec![19.5; 60],
        });

        let dense = ChartSeries::build(&doc, 1, America::New_York).unwrap();
        let sparse = ChartSeries::build(&doc, 10, America::New_York).unwrap();

        assert_eq!(dense.samples.len(), 60);
        assert_eq!(dense.time_ticks.len(), 6);
        assert_eq!(sparse.samples.len(), 6);
        // 6 / 6 = 1: every retained sample becomes a tick.
        assert_eq!(sparse.time_ticks.len(), 6);
    }

    #[test]
    fn chart_state_is_terminal_until_next_refresh() {
        let mut state = ChartState::Idle;

        state.begin();
        assert_eq!(state, ChartState::Loading);

        state.resolve(Err("boom".to_string()));
        assert_eq!(state, ChartState::Error("boom".to_string()));

        // A stale completion does not clobber the settled state.
        state.resolve(Ok(ChartSeries {
            samples: Vec::new(),
            time_ticks: Vec::new(),
            value_ticks: Vec::new(),
        }));
        assert_eq!(state, ChartState::Error("boom".to_string()));

        state.begin();
        assert_eq!(state, ChartState::Loading);
    }
}
