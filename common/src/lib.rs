pub mod config;
pub mod history;
pub mod live;
pub mod schedule;
pub mod types;

pub use config::DashboardConfig;
pub use history::{
    ChartSeries, ChartState, HistoryDocument, HistoryError, ProcessedSample, RawSample,
};
pub use live::{EditSession, LiveEngine, SetpointUpdate};
pub use schedule::{ScheduleError, ScheduleToggle, SetSchedulePayload, WeeklySchedule};
pub use types::{
    HeaterStateReading, LiveStatus, SetpointReading, SetpointWrite, TemperatureReading,
};
