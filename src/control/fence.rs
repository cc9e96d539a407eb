//! Home-relative altitude ceiling.
//!
//! The ceiling comes from the land detector (`alt_max`, negative when
//! disabled). Instead of aborting the maneuver the setpoint is clamped to
//! the ceiling, so the vehicle parks just below it.

use num_traits::Float;

use super::states::ControllerStates;
use crate::msg::{HomePosition, LandDetected, Setpoint};

/// Clamp the vertical setpoint so the vehicle stays below the ceiling.
///
/// No-op when the fence is disabled, the home altitude is not valid, or
/// the vertical velocity estimate is unusable.
pub fn limit_altitude(
    setpoint: &mut Setpoint,
    states: &ControllerStates,
    land: &LandDetected,
    vz_valid: bool,
    home: &HomePosition,
    dt: f32,
) {
    if land.alt_max < 0.0 || !home.valid_alt || !vz_valid {
        return;
    }

    let altitude_above_home = -(states.position.z - home.z);

    if altitude_above_home > land.alt_max {
        // Already above the ceiling: park on it.
        setpoint.z = -land.alt_max + home.z;
        setpoint.vz = 0.0;
    } else if setpoint.vz <= 0.0 {
        // Climbing: clamp if one tick of the commanded rate would overshoot.
        let remaining = land.alt_max - altitude_above_home;
        if setpoint.vz.abs() * dt > remaining {
            setpoint.z = -land.alt_max + home.z;
            setpoint.vz = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn states_at(z: f32) -> ControllerStates {
        ControllerStates {
            position: Vector3::new(0.0, 0.0, z),
            velocity: Vector3::new(0.0, 0.0, -1.0),
            ..Default::default()
        }
    }

    fn fence(alt_max: f32) -> LandDetected {
        LandDetected {
            alt_max,
            ..Default::default()
        }
    }

    fn home() -> HomePosition {
        HomePosition {
            z: 0.0,
            valid_alt: true,
        }
    }

    #[test]
    fn clamps_climb_that_would_overshoot_within_one_tick() {
        // 9.9 m above home, ceiling 10 m, commanding 2 m/s up over 0.1 s.
        let mut sp = Setpoint {
            vz: -2.0,
            ..Default::default()
        };
        limit_altitude(&mut sp, &states_at(-9.9), &fence(10.0), true, &home(), 0.1);
        assert_eq!(sp.z, -10.0);
        assert_eq!(sp.vz, 0.0);
    }

    #[test]
    fn forces_setpoint_back_when_already_above_ceiling() {
        let mut sp = Setpoint {
            z: -12.0,
            vz: 1.0,
            ..Default::default()
        };
        limit_altitude(&mut sp, &states_at(-10.5), &fence(10.0), true, &home(), 0.02);
        assert_eq!(sp.z, -10.0);
        assert_eq!(sp.vz, 0.0);
    }

    #[test]
    fn leaves_slow_climb_untouched() {
        let mut sp = Setpoint {
            z: -9.0,
            vz: -0.5,
            ..Default::default()
        };
        limit_altitude(&mut sp, &states_at(-5.0), &fence(10.0), true, &home(), 0.02);
        assert_eq!(sp.z, -9.0);
        assert_eq!(sp.vz, -0.5);
    }

    #[test]
    fn disabled_fence_is_a_no_op() {
        let mut sp = Setpoint {
            vz: -5.0,
            ..Default::default()
        };
        limit_altitude(&mut sp, &states_at(-50.0), &fence(-1.0), true, &home(), 0.1);
        assert_eq!(sp.vz, -5.0);

        let mut sp = Setpoint {
            vz: -5.0,
            ..Default::default()
        };
        let no_home = HomePosition {
            z: 0.0,
            valid_alt: false,
        };
        limit_altitude(&mut sp, &states_at(-50.0), &fence(10.0), true, &no_home, 0.1);
        assert_eq!(sp.vz, -5.0);

        let mut sp = Setpoint {
            vz: -5.0,
            ..Default::default()
        };
        limit_altitude(&mut sp, &states_at(-50.0), &fence(10.0), false, &home(), 0.1);
        assert_eq!(sp.vz, -5.0);
    }
}
