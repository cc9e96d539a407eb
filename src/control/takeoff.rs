//! Smooth-takeoff state machine.
//!
//! Gates the climb rate during the first ascent after arming from the
//! ground. On entry the ramp value starts at −0.5 m/s — fed to the
//! position controller as its upward speed limit, this commands a slight
//! sink, which keeps the thrust below hover while the motors spool up.
//! The ramp then grows through zero toward the desired climb speed over
//! `takeoff_ramp_time`, giving a bounded thrust/velocity ramp from idle
//! to flight.

use crate::msg::{Constraints, Setpoint};
use crate::params::Params;

pub struct SmoothTakeoff {
    active: bool,
    /// Ramped speed limit handed to the controller, m/s (negative = up).
    speed_ramp: f32,
}

impl SmoothTakeoff {
    pub const fn new() -> Self {
        Self {
            active: false,
            speed_ramp: -1.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn speed_ramp(&self) -> f32 {
        self.speed_ramp
    }

    /// Entry check. Only a landed vehicle can start a takeoff; it takes a
    /// position setpoint meaningfully above the vehicle or a climb-rate
    /// demand beyond the takeoff speed to trigger one.
    pub fn check_for_takeoff(
        &mut self,
        landed: bool,
        z_sp: f32,
        vz_sp: f32,
        position_z: f32,
        min_distance_to_ground: f32,
        takeoff_speed: f32,
    ) {
        if !landed || self.active {
            return;
        }

        // The takeoff altitude must clear the minimum distance to ground
        // when a distance sensor provides one, 20 cm otherwise.
        let min_altitude = if min_distance_to_ground.is_finite() {
            min_distance_to_ground + 0.05
        } else {
            0.2
        };

        let wants_position_takeoff = z_sp.is_finite() && z_sp < position_z - min_altitude;
        let wants_velocity_takeoff = vz_sp.is_finite() && vz_sp < (-takeoff_speed).min(-0.6);

        if wants_position_takeoff || wants_velocity_takeoff {
            self.active = true;
            self.speed_ramp = -0.5;
        }
    }

    /// Ramp the speed limit toward the demanded climb speed and release
    /// the machine once the reference is reached.
    pub fn update_ramp(&mut self, z_sp: f32, vz_sp: f32, position_z: f32, params: &Params, dt: f32) {
        if !self.active {
            return;
        }

        // With a position reference, climb at the configured takeoff
        // speed; otherwise ramp up to the demanded rate.
        let desired = if z_sp.is_finite() {
            params.takeoff_speed
        } else {
            -vz_sp
        };

        self.speed_ramp = (self.speed_ramp + desired * dt / params.takeoff_ramp_time).min(desired);

        if z_sp.is_finite() {
            // Stay in the ramp until within 20 cm below the target
            // altitude (capped by the short-final band).
            self.active = position_z - 0.2 > z_sp.max(-params.land_alt2);
        } else {
            self.active = self.speed_ramp < -vz_sp;
        }
    }

    /// Overrides applied to the outgoing setpoint while the ramp runs:
    /// the ramp becomes the upward speed limit, yaw is uncommanded and
    /// the lateral axes hold zero velocity.
    pub fn apply_override(&self, setpoint: &mut Setpoint, constraints: &mut Constraints) {
        constraints.speed_up = self.speed_ramp;
        setpoint.yaw = f32::NAN;
        setpoint.yaw_speed = f32::NAN;
        setpoint.x = f32::NAN;
        setpoint.y = f32::NAN;
        setpoint.vx = 0.0;
        setpoint.vy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        let mut p = Params::DEFAULT;
        p.takeoff_speed = 1.5;
        p.takeoff_ramp_time = 3.0;
        p
    }

    #[test]
    fn enters_on_position_setpoint_above_vehicle() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        assert!(t.is_active());
        assert_eq!(t.speed_ramp(), -0.5);
    }

    #[test]
    fn ignores_setpoint_within_minimum_altitude() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -0.1, f32::NAN, 0.0, f32::NAN, 1.5);
        assert!(!t.is_active());
    }

    #[test]
    fn distance_sensor_raises_the_entry_threshold() {
        let mut t = SmoothTakeoff::new();
        // 1 m minimum distance: a 0.5 m setpoint must not trigger.
        t.check_for_takeoff(true, -0.5, f32::NAN, 0.0, 1.0, 1.5);
        assert!(!t.is_active());
        t.check_for_takeoff(true, -1.2, f32::NAN, 0.0, 1.0, 1.5);
        assert!(t.is_active());
    }

    #[test]
    fn enters_on_strong_climb_rate_demand() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, f32::NAN, -0.4, 0.0, f32::NAN, 1.5);
        assert!(!t.is_active());
        t.check_for_takeoff(true, f32::NAN, -1.6, 0.0, f32::NAN, 1.5);
        assert!(t.is_active());
    }

    #[test]
    fn requires_landed() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(false, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        assert!(!t.is_active());
    }

    #[test]
    fn ramp_first_tick_matches_the_takeoff_profile() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        t.update_ramp(-2.0, f32::NAN, 0.0, &params(), 0.02);
        assert!((t.speed_ramp() - (-0.49)).abs() < 1e-6);
        assert!(t.is_active());
    }

    #[test]
    fn ramp_is_monotonic_and_capped_at_desired() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        let p = params();
        let mut prev = t.speed_ramp();
        for _ in 0..400 {
            t.update_ramp(-2.0, f32::NAN, 0.0, &p, 0.02);
            assert!(t.speed_ramp() >= prev);
            assert!(t.speed_ramp() <= p.takeoff_speed);
            prev = t.speed_ramp();
        }
        assert_eq!(prev, p.takeoff_speed);
    }

    #[test]
    fn releases_near_the_target_altitude() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        let p = params();
        // Still well below the target: stays active.
        t.update_ramp(-2.0, f32::NAN, -1.0, &p, 0.02);
        assert!(t.is_active());
        // Within 20 cm below the target: released.
        t.update_ramp(-2.0, f32::NAN, -1.81, &p, 0.02);
        assert!(!t.is_active());
    }

    #[test]
    fn velocity_takeoff_releases_once_ramp_reaches_demand() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, f32::NAN, -1.6, 0.0, f32::NAN, 1.5);
        assert!(t.is_active());
        let p = params();
        let mut ticks = 0;
        while t.is_active() && ticks < 1000 {
            t.update_ramp(f32::NAN, -1.6, -0.5, &p, 0.02);
            ticks += 1;
        }
        assert!(ticks < 1000);
        assert!((t.speed_ramp() - 1.6).abs() < 1e-4);
    }

    #[test]
    fn no_reentry_without_a_landed_cycle() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        let p = params();
        t.update_ramp(-2.0, f32::NAN, -1.81, &p, 0.02);
        assert!(!t.is_active());
        // Airborne now: the entry check must not re-trigger.
        t.check_for_takeoff(false, -5.0, f32::NAN, -2.0, f32::NAN, 1.5);
        assert!(!t.is_active());
    }

    #[test]
    fn override_shapes_the_setpoint() {
        let mut t = SmoothTakeoff::new();
        t.check_for_takeoff(true, -2.0, f32::NAN, 0.0, f32::NAN, 1.5);
        let mut sp = Setpoint {
            x: 1.0,
            y: 2.0,
            vx: 0.5,
            vy: 0.5,
            yaw: 1.0,
            yaw_speed: 0.1,
            ..Default::default()
        };
        let mut c = Constraints::default();
        t.apply_override(&mut sp, &mut c);
        assert_eq!(c.speed_up, -0.5);
        assert!(sp.x.is_nan() && sp.y.is_nan());
        assert_eq!(sp.vx, 0.0);
        assert_eq!(sp.vy, 0.0);
        assert!(sp.yaw.is_nan() && sp.yaw_speed.is_nan());
    }
}
