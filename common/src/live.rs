use crate::types::{LiveStatus, SetpointWrite};

/// Tolerance when comparing a polled remote setpoint against the local
/// value. The slider steps at fine granularity, so a value that round-trips
/// through the backend can come back with float rounding; exact equality
/// would keep re-applying our own echo.
pub const SETPOINT_TOLERANCE: f64 = 1e-3;

/// Edit-session state. A drag gesture is a sequence of `begin_edit` events
/// followed by an explicit `end_edit` (or, failing that, timeout expiry).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditSession {
    Idle,
    Editing {
        pending: f64,
        started_ms: u64,
        last_event_ms: u64,
    },
}

/// Outcome of offering a polled remote setpoint to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetpointUpdate {
    /// An edit session is active; the remote value was discarded unseen.
    SkippedEditing,
    /// Remote and local agree within tolerance.
    Unchanged,
    /// The remote value won and replaced the local one.
    Replaced { previous: f64 },
}

/// Holds the three observed display values and the edit-session guard.
///
/// The engine is pure: time arrives as a caller-supplied monotonic
/// millisecond clock and network effects are returned as commands, so tests
/// drive it without timers or I/O.
#[derive(Debug, Clone)]
pub struct LiveEngine {
    temperature: f64,
    heater_on: bool,
    setpoint: f64,
    edit: EditSession,
    edit_timeout_ms: u64,
}

impl LiveEngine {
    pub fn new(default_setpoint: f64, edit_timeout_ms: u64) -> Self {
        Self {
            temperature: default_setpoint,
            heater_on: false,
            setpoint: default_setpoint,
            edit: EditSession::Idle,
            edit_timeout_ms,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn heater_on(&self) -> bool {
        self.heater_on
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn edit_active(&self) -> bool {
        matches!(self.edit, EditSession::Editing { .. })
    }

    /// Replace temperature and heater state together. The caller only
    /// invokes this when both halves of the polling pair succeeded, so the
    /// display never mixes readings from different cycles.
    pub fn apply_reading(&mut self, temperature: f64, heater_on: bool) {
        self.temperature = temperature;
        self.heater_on = heater_on;
    }

    /// Offer a polled remote setpoint. Remote wins unless an edit session
    /// is active or the difference is within [`SETPOINT_TOLERANCE`].
    pub fn apply_remote_setpoint(&mut self, value: f64) -> SetpointUpdate {
        if self.edit_active() {
            return SetpointUpdate::SkippedEditing;
        }

        if (value - self.setpoint).abs() <= SETPOINT_TOLERANCE {
            return SetpointUpdate::Unchanged;
        }

        let previous = self.setpoint;
        self.setpoint = value;
        SetpointUpdate::Replaced { previous }
    }

    /// Record one slider movement: echo the value locally right away and
    /// return the write the host should ship fire-and-forget. Starts a new
    /// session or extends the running one.
    pub fn begin_edit(&mut self, value: f64, now_ms: u64) -> SetpointWrite {
        self.setpoint = value;

        let started_ms = match self.edit {
            EditSession::Editing { started_ms, .. } => started_ms,
            EditSession::Idle => now_ms,
        };
        self.edit = EditSession::Editing {
            pending: value,
            started_ms,
            last_event_ms: now_ms,
        };

        SetpointWrite { setpoint: value }
    }

    /// Explicit gesture end. The echoed value stays; polling resumes
    /// reconciling against the remote from the next cycle on.
    pub fn end_edit(&mut self) {
        self.edit = EditSession::Idle;
    }

    /// Close a session whose last movement is older than the configured
    /// timeout. Returns true when a session was expired.
    pub fn expire_stale_edit(&mut self, now_ms: u64) -> bool {
        if let EditSession::Editing { last_event_ms, .. } = self.edit {
            if now_ms.saturating_sub(last_event_ms) >= self.edit_timeout_ms {
                self.edit = EditSession::Idle;
                return true;
            }
        }
        false
    }

    pub fn status(&self, slider_min: f64, slider_max: f64) -> LiveStatus {
        LiveStatus {
            temperature: self.temperature,
            heater_on: self.heater_on,
            setpoint: self.setpoint,
            edit_active: self.edit_active(),
            slider_min,
            slider_max,
        }
    }
}
