//! Offboard task: relays the external trajectory stream. Activation
//! requires at least one fresh sample; a stream that goes stale fails the
//! update so the controller can fall into its failsafe.

use crate::msg::{Constraints, Setpoint};
use crate::params::Params;

use super::{default_constraints, TaskError, TaskInputs};

/// A stream older than this is considered lost.
const STREAM_TIMEOUT_US: u64 = 500_000;

pub struct OffboardTask {
    setpoint: Setpoint,
    constraints: Constraints,
}

impl OffboardTask {
    pub fn activate(params: &Params, inputs: &TaskInputs) -> Result<Self, TaskError> {
        let Some(setpoint) = inputs.offboard else {
            return Err(TaskError::ActivationFailed);
        };
        if stream_stale(&setpoint, inputs.now_us) {
            return Err(TaskError::ActivationFailed);
        }
        Ok(Self {
            setpoint,
            constraints: default_constraints(params),
        })
    }

    pub fn update(&mut self, inputs: &TaskInputs) -> bool {
        if let Some(setpoint) = inputs.offboard {
            self.setpoint = setpoint;
        }
        !stream_stale(&self.setpoint, inputs.now_us)
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }
}

fn stream_stale(setpoint: &Setpoint, now_us: u64) -> bool {
    now_us.saturating_sub(setpoint.timestamp) > STREAM_TIMEOUT_US
}
