use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{binder::ParameterContext, catalog::WILDCARD_ROLE};

pub const MAX_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlsError {
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall { field: &'static str, min: i64, value: i64 },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, min: i64, max: i64, value: i64 },
    #[error("role must not be empty")]
    EmptyRole,
}

/// The operator's current role and parameter inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorControls {
    pub role: String,
    pub patient_id: i64,
    pub caregiver_id: i64,
    pub staff_id: i64,
    pub device_id: i64,
    /// Minimum alert count before a patient is reported.
    pub alert_threshold: i64,
    /// Length of the look-back window for time-bounded queries.
    pub days: i64,
    /// Battery percentage under which a device counts as low.
    pub battery_threshold: i64,
    /// Execute as soon as the selection changes instead of on request.
    pub auto_run: bool,
}

impl Default for OperatorControls {
    fn default() -> Self {
        Self {
            role: WILDCARD_ROLE.to_string(),
            patient_id: 1,
            caregiver_id: 1,
            staff_id: 1,
            device_id: 1,
            alert_threshold: 5,
            days: 7,
            battery_threshold: 20,
            auto_run: false,
        }
    }
}

impl OperatorControls {
    pub fn new(role: &str) -> Self {
        Self { role: role.to_string(), ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), ControlsError> {
        if self.role.trim().is_empty() {
            return Err(ControlsError::EmptyRole);
        }
        for (field, value) in [
            ("patient_id", self.patient_id),
            ("caregiver_id", self.caregiver_id),
            ("staff_id", self.staff_id),
            ("device_id", self.device_id),
        ] {
            if value < 1 {
                return Err(ControlsError::TooSmall { field, min: 1, value });
            }
        }
        if self.alert_threshold < 0 {
            return Err(ControlsError::TooSmall { field: "alert_threshold", min: 0, value: self.alert_threshold });
        }
        if !(1..=MAX_DAYS).contains(&self.days) {
            return Err(ControlsError::OutOfRange { field: "days", min: 1, max: MAX_DAYS, value: self.days });
        }
        if !(0..=100).contains(&self.battery_threshold) {
            return Err(ControlsError::OutOfRange {
                field: "battery_threshold",
                min: 0,
                max: 100,
                value: self.battery_threshold,
            });
        }
        Ok(())
    }

    /// Builds the parameter context for one interaction.
    ///
    /// `since` is `now - days`, truncated to the minute so that repeated
    /// runs within the same minute share cache entries.
    pub fn to_context(&self, now: DateTime<Utc>) -> Result<ParameterContext, ControlsError> {
        self.validate()?;
        let since = now - TimeDelta::days(self.days);
        let since = since.duration_trunc(TimeDelta::minutes(1)).unwrap_or(since);
        Ok(ParameterContext::new()
            .with("patient_id", self.patient_id)
            .with("caregiver_id", self.caregiver_id)
            .with("staff_id", self.staff_id)
            .with("device_id", self.device_id)
            .with("alert_threshold", self.alert_threshold)
            .with("days", self.days)
            .with("battery_threshold", self.battery_threshold)
            .with("since", since))
    }
}
