//! Manual-mode flight tasks. With the stick shaping handled upstream,
//! these reduce to hold behaviors: Position holds the 3D point captured
//! on activation, Altitude holds the captured altitude with the lateral
//! axes released, Stabilized releases everything but the heading.

use crate::control::states::ControllerStates;
use crate::msg::{Constraints, Setpoint};
use crate::params::Params;

use super::{default_constraints, TaskError};

/// Flavor of the manual position task, selected by the `pos_mode`
/// parameter.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ManualFlavor {
    Position,
    Smooth,
    Sport,
}

pub struct PositionTask {
    setpoint: Setpoint,
    constraints: Constraints,
}

impl PositionTask {
    pub fn activate(
        states: &ControllerStates,
        params: &Params,
        flavor: ManualFlavor,
    ) -> Result<Self, TaskError> {
        let p = states.position;
        let v = states.velocity;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())
            || !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
        {
            return Err(TaskError::ActivationFailed);
        }

        let mut constraints = default_constraints(params);
        match flavor {
            ManualFlavor::Position => {}
            // The smooth flavor rides the same hold logic with gentler
            // vertical limits; sport opens the tilt envelope.
            ManualFlavor::Smooth => {
                constraints.speed_up = 0.7 * params.vel_max_up;
                constraints.speed_down = 0.7 * params.vel_max_down;
            }
            ManualFlavor::Sport => {
                constraints.tilt_max = 1.2 * params.tilt_max_air;
            }
        }

        let setpoint = Setpoint {
            x: p.x,
            y: p.y,
            z: p.z,
            yaw: states.yaw,
            ..Default::default()
        };

        Ok(Self {
            setpoint,
            constraints,
        })
    }

    pub fn update(&mut self, _states: &ControllerStates) -> bool {
        true
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }
}

pub struct AltitudeTask {
    setpoint: Setpoint,
    constraints: Constraints,
}

impl AltitudeTask {
    pub fn activate(states: &ControllerStates, params: &Params) -> Result<Self, TaskError> {
        if !states.position.z.is_finite() {
            return Err(TaskError::ActivationFailed);
        }

        let mut setpoint = Setpoint {
            z: states.position.z,
            yaw: states.yaw,
            ..Default::default()
        };
        // Lateral axes are attitude-only: no position tracking, no
        // sideways push.
        setpoint.thrust[0] = 0.0;
        setpoint.thrust[1] = 0.0;

        Ok(Self {
            setpoint,
            constraints: default_constraints(params),
        })
    }

    pub fn update(&mut self, _states: &ControllerStates) -> bool {
        true
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }
}

pub struct StabilizedTask {
    setpoint: Setpoint,
    constraints: Constraints,
}

impl StabilizedTask {
    pub fn activate(states: &ControllerStates, params: &Params) -> Result<Self, TaskError> {
        // Runs with any state: the whole trajectory is released and only
        // the heading is pinned.
        let setpoint = Setpoint {
            yaw: states.yaw,
            ..Default::default()
        };
        Ok(Self {
            setpoint,
            constraints: default_constraints(params),
        })
    }

    pub fn update(&mut self, states: &ControllerStates) -> bool {
        if states.yaw.is_finite() && self.setpoint.yaw.is_nan() {
            self.setpoint.yaw = states.yaw;
        }
        true
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }
}
