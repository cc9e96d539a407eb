//! Vehicle state consumed by the position controller, validated from raw
//! estimator samples. Any component may be NaN to mark the axis invalid;
//! xy validity is joint, z position and z velocity are tracked
//! independently.

use nalgebra::Vector3;

use super::derivative::Derivative;
use crate::msg::LocalPosition;
use crate::params::Params;

pub struct ControllerStates {
    /// NED position, m.
    pub position: Vector3<f32>,
    /// NED velocity, m/s.
    pub velocity: Vector3<f32>,
    /// Filtered derivative of the negated velocity (damping input of the
    /// velocity controller).
    pub acceleration: Vector3<f32>,
    pub yaw: f32,
}

impl Default for ControllerStates {
    fn default() -> Self {
        Self {
            position: Vector3::from_element(f32::NAN),
            velocity: Vector3::from_element(f32::NAN),
            acceleration: Vector3::from_element(f32::NAN),
            yaw: 0.0,
        }
    }
}

pub struct StateValidator {
    vel_x_deriv: Derivative,
    vel_y_deriv: Derivative,
    vel_z_deriv: Derivative,
}

impl StateValidator {
    pub fn new(params: &Params) -> Self {
        Self {
            vel_x_deriv: Derivative::new(params.veld_cutoff_hz),
            vel_y_deriv: Derivative::new(params.veld_cutoff_hz),
            vel_z_deriv: Derivative::new(params.veld_cutoff_hz),
        }
    }

    pub fn handle_parameter_update(&mut self, params: &Params) {
        self.vel_x_deriv.set_cutoff(params.veld_cutoff_hz);
        self.vel_y_deriv.set_cutoff(params.veld_cutoff_hz);
        self.vel_z_deriv.set_cutoff(params.veld_cutoff_hz);
    }

    /// Map a raw estimator sample onto `states`, axis by axis.
    ///
    /// `_vz_setpoint` is the vertical velocity currently demanded of the
    /// vehicle. An earlier revision blended the position-derivative into
    /// the velocity estimate while `|vz_setpoint|` was below the landing
    /// speed; the raw estimator velocity won out and the blend is gone,
    /// but the demand stays part of the interface so the call site keeps
    /// feeding it.
    pub fn update(
        &mut self,
        states: &mut ControllerStates,
        sample: &LocalPosition,
        _vz_setpoint: f32,
        dt: f32,
    ) {
        if sample.timestamp == 0 {
            // Nothing received yet.
            return;
        }

        if sample.xy_valid && sample.x.is_finite() && sample.y.is_finite() {
            states.position.x = sample.x;
            states.position.y = sample.y;
        } else {
            states.position.x = f32::NAN;
            states.position.y = f32::NAN;
        }

        if sample.z_valid && sample.z.is_finite() {
            states.position.z = sample.z;
        } else {
            states.position.z = f32::NAN;
        }

        if sample.v_xy_valid && sample.vx.is_finite() && sample.vy.is_finite() {
            states.velocity.x = sample.vx;
            states.velocity.y = sample.vy;
            states.acceleration.x = self.vel_x_deriv.update(-states.velocity.x, dt);
            states.acceleration.y = self.vel_y_deriv.update(-states.velocity.y, dt);
        } else {
            states.velocity.x = f32::NAN;
            states.velocity.y = f32::NAN;
            states.acceleration.x = f32::NAN;
            states.acceleration.y = f32::NAN;
            // No valid velocity; keep the filters coherent.
            self.vel_x_deriv.update(0.0, dt);
            self.vel_y_deriv.update(0.0, dt);
        }

        if sample.vz.is_finite() {
            states.velocity.z = sample.vz;
            states.acceleration.z = self.vel_z_deriv.update(-states.velocity.z, dt);
        } else {
            states.velocity.z = f32::NAN;
            states.acceleration.z = f32::NAN;
            self.vel_z_deriv.update(0.0, dt);
        }

        if sample.yaw.is_finite() {
            states.yaw = sample.yaw;
        }
    }
}
