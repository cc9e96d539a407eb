//! Thrust shaping around ground contact and touchdown.
//!
//! The land detector decides in stages (ground contact, maybe landed,
//! landed); each stage gets its own thrust response so the detector sees
//! a vehicle that stops fighting the ground, and the controller's
//! integrators forget the contact forces.

use nalgebra::Vector3;

use super::position::PositionControl;
use super::states::ControllerStates;
use crate::msg::{Constraints, GearCommand, LandDetected, Setpoint};

/// Post-controller thrust adjustment while the land detector is deciding.
pub fn limit_thrust_during_landing(
    thr_sp: &mut Vector3<f32>,
    land: &LandDetected,
    control: &mut PositionControl,
) {
    if land.ground_contact {
        // Stop pushing sideways against the ground; the integrator does
        // not know about the override and would keep winding up.
        thr_sp.x = 0.0;
        thr_sp.y = 0.0;
        control.reset_integral_xy();
    }

    if land.maybe_landed {
        // Cutting all thrust helps the detector confirm the touchdown.
        *thr_sp = Vector3::zeros();
        control.reset_integral_xy();
        control.reset_integral_z();
    }
}

/// Pre-controller override while landed with no vertical thrust demand:
/// keep the throttle low, drop every trajectory constraint and hold the
/// current heading.
pub fn apply_landed_idle(
    setpoint: &mut Setpoint,
    constraints: &mut Constraints,
    states: &ControllerStates,
) {
    setpoint.thrust = [0.0; 3];
    setpoint.x = f32::NAN;
    setpoint.y = f32::NAN;
    setpoint.z = f32::NAN;
    setpoint.vx = f32::NAN;
    setpoint.vy = f32::NAN;
    setpoint.vz = f32::NAN;
    setpoint.yaw_speed = f32::NAN;
    setpoint.yaw = states.yaw;
    constraints.landing_gear = Some(GearCommand::Keep);
}
