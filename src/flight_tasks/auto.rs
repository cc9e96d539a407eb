//! Auto line task: flies a straight line toward the navigator's current
//! target, or holds position while no target has been published.

use num_traits::Float;

use crate::control::states::ControllerStates;
use crate::msg::{Constraints, Setpoint};
use crate::params::Params;

use super::{default_constraints, TaskError, TaskInputs};

pub struct AutoLineTask {
    setpoint: Setpoint,
    constraints: Constraints,
    cruise_speed: f32,
}

impl AutoLineTask {
    pub fn activate(states: &ControllerStates, params: &Params) -> Result<Self, TaskError> {
        let p = states.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(TaskError::ActivationFailed);
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
            constraints: default_constraints(params),
            cruise_speed: 0.5 * params.vel_max_xy,
        })
    }

    pub fn update(&mut self, states: &ControllerStates, inputs: &TaskInputs) -> bool {
        let Some(target) = inputs.auto_target else {
            // Nothing to fly to yet: keep holding the activation point.
            return true;
        };

        self.setpoint.x = target.x;
        self.setpoint.y = target.y;
        self.setpoint.z = target.z;
        if target.yaw.is_finite() {
            self.setpoint.yaw = target.yaw;
        }

        // Feed-forward along the line, fading out on arrival.
        if states.position.x.is_finite() && states.position.y.is_finite() {
            let dx = target.x - states.position.x;
            let dy = target.y - states.position.y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > 1.0 {
                let scale = self.cruise_speed / dist;
                self.setpoint.vx = dx * scale;
                self.setpoint.vy = dy * scale;
            } else {
                self.setpoint.vx = f32::NAN;
                self.setpoint.vy = f32::NAN;
            }
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
