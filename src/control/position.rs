//! Core position controller: P loop on position error cascaded into a
//! PID loop on velocity error, producing a normalized NED thrust vector.
//!
//! NaN setpoint fields mean "no constraint on this axis". A finite
//! thrust-setpoint component bypasses the cascade for that axis. The
//! generated thrust, yaw and yaw-speed outputs are always finite, even
//! when every input is NaN — the controller then falls back to a gentle
//! descent so the vehicle stays recoverable.

use nalgebra::{Vector2, Vector3};
use num_traits::Float;

use super::states::ControllerStates;
use crate::msg::{Constraints, Setpoint};
use crate::params::Params;

pub struct PositionControl {
    // Gains and limits, refreshed from the parameter table.
    pos_p: Vector3<f32>,
    vel_p: Vector3<f32>,
    vel_i: Vector3<f32>,
    vel_d: Vector3<f32>,
    vel_max_xy: f32,
    vel_max_up: f32,
    vel_max_down: f32,
    thr_hover: f32,
    thr_min: f32,
    thr_max: f32,
    tilt_max: f32,
    land_speed: f32,

    // Inputs for the current tick.
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    acceleration: Vector3<f32>,
    setpoint: Setpoint,
    constraints: Constraints,

    // Outputs and persistent state.
    pos_sp: Vector3<f32>,
    vel_sp: Vector3<f32>,
    thr_sp: Vector3<f32>,
    thr_int: Vector3<f32>,
    yaw_sp: f32,
    yawspeed_sp: f32,
    yaw_sp_seeded: bool,
}

impl PositionControl {
    pub fn new(params: &Params) -> Self {
        let mut control = Self {
            pos_p: Vector3::zeros(),
            vel_p: Vector3::zeros(),
            vel_i: Vector3::zeros(),
            vel_d: Vector3::zeros(),
            vel_max_xy: 0.0,
            vel_max_up: 0.0,
            vel_max_down: 0.0,
            thr_hover: 0.5,
            thr_min: 0.0,
            thr_max: 1.0,
            tilt_max: 0.0,
            land_speed: 0.7,
            position: Vector3::from_element(f32::NAN),
            velocity: Vector3::from_element(f32::NAN),
            acceleration: Vector3::from_element(f32::NAN),
            setpoint: Setpoint::default(),
            constraints: Constraints::default(),
            pos_sp: Vector3::from_element(f32::NAN),
            vel_sp: Vector3::from_element(f32::NAN),
            thr_sp: Vector3::zeros(),
            thr_int: Vector3::zeros(),
            yaw_sp: 0.0,
            yawspeed_sp: 0.0,
            yaw_sp_seeded: false,
        };
        control.update_params(params);
        control
    }

    pub fn update_params(&mut self, params: &Params) {
        self.pos_p = Vector3::new(params.pos_p_xy, params.pos_p_xy, params.pos_p_z);
        self.vel_p = Vector3::new(params.vel_p_xy, params.vel_p_xy, params.vel_p_z);
        self.vel_i = Vector3::new(params.vel_i_xy, params.vel_i_xy, params.vel_i_z);
        self.vel_d = Vector3::new(params.vel_d_xy, params.vel_d_xy, params.vel_d_z);
        self.vel_max_xy = params.vel_max_xy;
        self.vel_max_up = params.vel_max_up;
        self.vel_max_down = params.vel_max_down;
        self.thr_hover = params.thr_hover;
        self.thr_min = params.thr_min;
        self.thr_max = params.thr_max;
        self.tilt_max = params.tilt_max_air;
        self.land_speed = params.land_speed;
    }

    pub fn update_constraints(&mut self, constraints: &Constraints) {
        self.constraints = *constraints;
    }

    pub fn update_state(&mut self, states: &ControllerStates) {
        self.position = states.position;
        self.velocity = states.velocity;
        self.acceleration = states.acceleration;
        if !self.yaw_sp_seeded && states.yaw.is_finite() {
            self.yaw_sp = states.yaw;
            self.yaw_sp_seeded = true;
        }
    }

    pub fn update_setpoint(&mut self, setpoint: &Setpoint) {
        self.setpoint = *setpoint;
    }

    pub fn thrust_setpoint(&self) -> Vector3<f32> {
        self.thr_sp
    }

    pub fn pos_setpoint(&self) -> Vector3<f32> {
        self.pos_sp
    }

    pub fn vel_setpoint(&self) -> Vector3<f32> {
        self.vel_sp
    }

    pub fn yaw_setpoint(&self) -> f32 {
        self.yaw_sp
    }

    pub fn yawspeed_setpoint(&self) -> f32 {
        self.yawspeed_sp
    }

    /// The lateral thrust override during ground contact invalidates the
    /// accumulated error; restart it.
    pub fn reset_integral_xy(&mut self) {
        self.thr_int.x = 0.0;
        self.thr_int.y = 0.0;
    }

    pub fn reset_integral_z(&mut self) {
        self.thr_int.z = 0.0;
    }

    /// Run one controller step over the latest state/setpoint/constraints.
    pub fn generate_thrust_yaw_setpoint(&mut self, dt: f32) {
        // Yaw: track when commanded, hold the last value otherwise.
        if self.setpoint.yaw.is_finite() {
            self.yaw_sp = self.setpoint.yaw;
        }
        self.yawspeed_sp = if self.setpoint.yaw_speed.is_finite() {
            self.setpoint.yaw_speed
        } else {
            0.0
        };

        self.control_vertical(dt);
        self.control_lateral(dt);
    }

    fn speed_up_limit(&self) -> f32 {
        if self.constraints.speed_up.is_finite() {
            self.constraints.speed_up
        } else {
            self.vel_max_up
        }
    }

    fn speed_down_limit(&self) -> f32 {
        if self.constraints.speed_down.is_finite() {
            self.constraints.speed_down
        } else {
            self.vel_max_down
        }
    }

    fn control_vertical(&mut self, dt: f32) {
        let z_sp = self.setpoint.z;
        let vz_sp = self.setpoint.vz;
        let thr_z_sp = self.setpoint.thrust[2];

        if thr_z_sp.is_finite() {
            // Direct thrust pass-through (landed idle, manual throttle).
            self.pos_sp.z = f32::NAN;
            self.vel_sp.z = f32::NAN;
            self.thr_sp.z = thr_z_sp.clamp(-self.thr_max, 0.0);
            return;
        }

        let mut vel_demand = 0.0;
        let mut controlled = false;
        if z_sp.is_finite() && self.position.z.is_finite() {
            vel_demand += (z_sp - self.position.z) * self.pos_p.z;
            controlled = true;
            self.pos_sp.z = z_sp;
        } else {
            self.pos_sp.z = f32::NAN;
        }
        if vz_sp.is_finite() {
            vel_demand += vz_sp;
            controlled = true;
        }

        if !controlled || !self.velocity.z.is_finite() {
            // No usable vertical reference: descend at a fraction of the
            // landing speed when the velocity is observable, otherwise
            // fall back to a fixed sub-hover thrust.
            if self.velocity.z.is_finite() {
                vel_demand = 0.7 * self.land_speed;
            } else {
                self.pos_sp.z = f32::NAN;
                self.vel_sp.z = f32::NAN;
                self.thr_sp.z = -0.6 * self.thr_hover;
                return;
            }
        }

        // The upward limit may be negative during the takeoff spool-up,
        // which forces a sink demand and with it a sub-hover thrust.
        vel_demand = vel_demand
            .max(-self.speed_up_limit())
            .min(self.speed_down_limit());
        self.vel_sp.z = vel_demand;

        let vel_err = vel_demand - self.velocity.z;
        let vel_dot = if self.acceleration.z.is_finite() {
            self.acceleration.z
        } else {
            0.0
        };
        let thrust_desired =
            self.vel_p.z * vel_err + self.vel_d.z * vel_dot + self.thr_int.z - self.thr_hover;

        let u_max = -self.thr_min;
        let u_min = -self.thr_max;

        // Freeze the integrator while saturated and still pushing outward.
        let stop_integral = (thrust_desired >= u_max && vel_err >= 0.0)
            || (thrust_desired <= u_min && vel_err <= 0.0);
        if !stop_integral {
            self.thr_int.z += self.vel_i.z * vel_err * dt;
            self.thr_int.z = self.thr_int.z.clamp(-self.thr_max, self.thr_max);
        }

        self.thr_sp.z = thrust_desired.clamp(u_min, u_max);
    }

    fn control_lateral(&mut self, dt: f32) {
        let xy_sp = Vector2::new(self.setpoint.x, self.setpoint.y);
        let vxy_sp = Vector2::new(self.setpoint.vx, self.setpoint.vy);
        let thr_xy_sp = Vector2::new(self.setpoint.thrust[0], self.setpoint.thrust[1]);

        // Lateral thrust is bounded by the tilt limit and by what the
        // vertical component leaves of the total thrust budget.
        let tilt_max = if self.constraints.tilt_max.is_finite() {
            self.constraints.tilt_max
        } else {
            self.tilt_max
        };
        let thrust_max_tilt = self.thr_sp.z.abs() * tilt_max.tan();
        let margin_sq = self.thr_max * self.thr_max - self.thr_sp.z * self.thr_sp.z;
        let thrust_max_xy = thrust_max_tilt.min(margin_sq.max(0.0).sqrt());

        if thr_xy_sp.x.is_finite() && thr_xy_sp.y.is_finite() {
            self.pos_sp.x = f32::NAN;
            self.pos_sp.y = f32::NAN;
            self.vel_sp.x = f32::NAN;
            self.vel_sp.y = f32::NAN;
            let mut thr = thr_xy_sp;
            if thr.norm() > thrust_max_xy && thr.norm() > f32::EPSILON {
                thr *= thrust_max_xy / thr.norm();
            }
            self.thr_sp.x = thr.x;
            self.thr_sp.y = thr.y;
            return;
        }

        let mut vel_demand = Vector2::zeros();
        let mut controlled = false;
        if xy_sp.x.is_finite()
            && xy_sp.y.is_finite()
            && self.position.x.is_finite()
            && self.position.y.is_finite()
        {
            vel_demand.x = (xy_sp.x - self.position.x) * self.pos_p.x;
            vel_demand.y = (xy_sp.y - self.position.y) * self.pos_p.y;
            controlled = true;
            self.pos_sp.x = xy_sp.x;
            self.pos_sp.y = xy_sp.y;
        } else {
            self.pos_sp.x = f32::NAN;
            self.pos_sp.y = f32::NAN;
        }
        if vxy_sp.x.is_finite() && vxy_sp.y.is_finite() {
            vel_demand += vxy_sp;
            controlled = true;
        }

        if !controlled || !self.velocity.x.is_finite() || !self.velocity.y.is_finite() {
            // Free or unobservable lateral axes: stay level.
            self.vel_sp.x = f32::NAN;
            self.vel_sp.y = f32::NAN;
            self.thr_sp.x = 0.0;
            self.thr_sp.y = 0.0;
            return;
        }

        if vel_demand.norm() > self.vel_max_xy {
            vel_demand *= self.vel_max_xy / vel_demand.norm();
        }
        self.vel_sp.x = vel_demand.x;
        self.vel_sp.y = vel_demand.y;

        let vel_err = vel_demand - Vector2::new(self.velocity.x, self.velocity.y);
        let vel_dot = Vector2::new(
            if self.acceleration.x.is_finite() {
                self.acceleration.x
            } else {
                0.0
            },
            if self.acceleration.y.is_finite() {
                self.acceleration.y
            } else {
                0.0
            },
        );

        let thrust_desired = Vector2::new(
            self.vel_p.x * vel_err.x + self.vel_d.x * vel_dot.x + self.thr_int.x,
            self.vel_p.y * vel_err.y + self.vel_d.y * vel_dot.y + self.thr_int.y,
        );

        let mut thrust = thrust_desired;
        if thrust.norm() > thrust_max_xy && thrust.norm() > f32::EPSILON {
            thrust *= thrust_max_xy / thrust.norm();
        }

        // Tracking anti-windup: shrink the integrated error by how much of
        // the demand the saturation swallowed.
        if self.vel_p.x > f32::EPSILON {
            let arw_gain = 2.0 / self.vel_p.x;
            let err_lim_x = vel_err.x - (thrust_desired.x - thrust.x) * arw_gain;
            let err_lim_y = vel_err.y - (thrust_desired.y - thrust.y) * arw_gain;
            self.thr_int.x += self.vel_i.x * err_lim_x * dt;
            self.thr_int.y += self.vel_i.y * err_lim_y * dt;
        }

        self.thr_sp.x = thrust.x;
        self.thr_sp.y = thrust.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn states(pos: [f32; 3], vel: [f32; 3]) -> ControllerStates {
        ControllerStates {
            position: Vector3::from(pos),
            velocity: Vector3::from(vel),
            acceleration: Vector3::zeros(),
            yaw: 0.0,
        }
    }

    fn constraints() -> Constraints {
        Constraints {
            speed_up: 3.0,
            speed_down: 1.0,
            min_distance_to_ground: f32::NAN,
            tilt_max: 0.7854,
            landing_gear: None,
        }
    }

    fn control() -> PositionControl {
        PositionControl::new(&Params::DEFAULT)
    }

    #[test]
    fn hover_tracking_produces_roughly_hover_thrust() {
        let mut c = control();
        c.update_state(&states([0.0, 0.0, -2.0], [0.0, 0.0, 0.0]));
        c.update_constraints(&constraints());
        c.update_setpoint(&Setpoint {
            z: -2.0,
            ..Default::default()
        });
        c.generate_thrust_yaw_setpoint(0.02);
        let thr = c.thrust_setpoint();
        assert!((thr.z - (-0.5)).abs() < 1e-3);
        assert_eq!(thr.x, 0.0);
        assert_eq!(thr.y, 0.0);
    }

    #[test]
    fn climb_demand_raises_thrust() {
        let mut c = control();
        c.update_state(&states([0.0, 0.0, -2.0], [0.0, 0.0, 0.0]));
        c.update_constraints(&constraints());
        c.update_setpoint(&Setpoint {
            vz: -1.0,
            ..Default::default()
        });
        c.generate_thrust_yaw_setpoint(0.02);
        assert!(c.thrust_setpoint().z < -0.5);
        assert_eq!(c.vel_setpoint().z, -1.0);
    }

    #[test]
    fn negative_speed_up_limit_forces_a_sink_demand() {
        // Takeoff spool-up: a -0.5 m/s "upward limit" must turn a climb
        // command into a slight descent demand with sub-hover thrust.
        let mut c = control();
        c.update_state(&states([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
        let mut cons = constraints();
        cons.speed_up = -0.5;
        c.update_constraints(&cons);
        c.update_setpoint(&Setpoint {
            z: -2.0,
            ..Default::default()
        });
        c.generate_thrust_yaw_setpoint(0.02);
        assert!((c.vel_setpoint().z - 0.5).abs() < 1e-6);
        assert!(c.thrust_setpoint().z > -0.5);
    }

    #[test]
    fn finite_thrust_setpoint_bypasses_the_cascade() {
        let mut c = control();
        c.update_state(&states([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
        c.update_constraints(&constraints());
        let mut sp = Setpoint::default();
        sp.thrust = [0.0, 0.0, 0.0];
        c.update_setpoint(&sp);
        c.generate_thrust_yaw_setpoint(0.02);
        assert_eq!(c.thrust_setpoint(), Vector3::zeros());
    }

    #[test]
    fn all_nan_inputs_still_produce_finite_thrust() {
        let mut c = control();
        c.update_state(&ControllerStates::default());
        c.update_constraints(&Constraints::default());
        c.update_setpoint(&Setpoint::default());
        c.generate_thrust_yaw_setpoint(0.02);
        let thr = c.thrust_setpoint();
        assert!(thr.x.is_finite() && thr.y.is_finite() && thr.z.is_finite());
        // Sub-hover fallback, upright.
        assert!(thr.z < 0.0 && thr.z > -0.5);
        assert!(c.yaw_setpoint().is_finite());
        assert!(c.yawspeed_setpoint().is_finite());
    }

    #[test]
    fn yaw_is_locked_while_uncommanded() {
        let mut c = control();
        let mut s = states([0.0, 0.0, -2.0], [0.0, 0.0, 0.0]);
        s.yaw = 1.2;
        c.update_state(&s);
        c.update_constraints(&constraints());
        c.update_setpoint(&Setpoint::default());
        c.generate_thrust_yaw_setpoint(0.02);
        assert_eq!(c.yaw_setpoint(), 1.2);

        c.update_setpoint(&Setpoint {
            yaw: 0.3,
            ..Default::default()
        });
        c.generate_thrust_yaw_setpoint(0.02);
        assert_eq!(c.yaw_setpoint(), 0.3);

        c.update_setpoint(&Setpoint::default());
        c.generate_thrust_yaw_setpoint(0.02);
        assert_eq!(c.yaw_setpoint(), 0.3);
    }

    #[test]
    fn integral_resets_clear_the_accumulators() {
        let mut c = control();
        c.update_state(&states([0.0, 0.0, -2.0], [0.3, 0.1, 0.2]));
        c.update_constraints(&constraints());
        c.update_setpoint(&Setpoint {
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            ..Default::default()
        });
        for _ in 0..50 {
            c.generate_thrust_yaw_setpoint(0.02);
        }
        assert!(c.thr_int.norm() > 0.0);
        c.reset_integral_xy();
        assert_eq!(c.thr_int.x, 0.0);
        assert_eq!(c.thr_int.y, 0.0);
        assert!(c.thr_int.z != 0.0);
        c.reset_integral_z();
        assert_eq!(c.thr_int.z, 0.0);
    }

    #[test]
    fn lateral_thrust_respects_the_tilt_limit() {
        let mut c = control();
        c.update_state(&states([0.0, 0.0, -2.0], [0.0, 0.0, 0.0]));
        let mut cons = constraints();
        cons.tilt_max = 0.2;
        c.update_constraints(&cons);
        c.update_setpoint(&Setpoint {
            x: 100.0,
            y: 0.0,
            z: -2.0,
            ..Default::default()
        });
        c.generate_thrust_yaw_setpoint(0.02);
        let thr = c.thrust_setpoint();
        let max_xy = thr.z.abs() * cons.tilt_max.tan();
        assert!(Vector2::new(thr.x, thr.y).norm() <= max_xy + 1e-5);
    }
}
