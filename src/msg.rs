//! Topic payload types exchanged over the [`bus`](crate::bus).
//!
//! All types are `Copy` so a publication is a plain store and a
//! subscription copy never borrows across await points. Float fields use
//! NaN to mean "invalid" (estimator outputs) or "don't care" (setpoints).

/// Navigation state reported by the commander.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavState {
    #[default]
    Manual,
    Stab,
    Altctl,
    Posctl,
    AutoMission,
    AutoLoiter,
    AutoRtl,
    AutoTakeoff,
    AutoLand,
    AutoFollowTarget,
    Offboard,
}

#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VehicleStatus {
    pub nav_state: NavState,
    pub is_vtol: bool,
}

/// Local position estimate in NED (down is +z). Validity flags gate the
/// per-axis use of the float fields; the floats themselves may still be
/// non-finite and are checked again by the consumer.
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalPosition {
    /// Sample time in microseconds; 0 means "never received".
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    /// Derivative of the z position, from the estimator.
    pub z_deriv: f32,
    pub yaw: f32,
    pub xy_valid: bool,
    pub z_valid: bool,
    pub v_xy_valid: bool,
    pub v_z_valid: bool,
}

/// Land-detector output.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LandDetected {
    pub landed: bool,
    pub maybe_landed: bool,
    pub ground_contact: bool,
    /// Home-relative altitude ceiling in meters; negative disables the fence.
    pub alt_max: f32,
}

impl Default for LandDetected {
    fn default() -> Self {
        // Assume on-ground until the land detector says otherwise.
        Self {
            landed: true,
            maybe_landed: false,
            ground_contact: false,
            alt_max: -1.0,
        }
    }
}

#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlMode {
    pub armed: bool,
    pub auto_enabled: bool,
    pub offboard_enabled: bool,
    pub position_enabled: bool,
    pub velocity_enabled: bool,
    pub acceleration_enabled: bool,
}

#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomePosition {
    pub z: f32,
    pub valid_alt: bool,
}

/// Trajectory setpoint in NED. NaN fields are free: the position
/// controller treats them as "no constraint on this axis".
#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setpoint {
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub yaw: f32,
    pub yaw_speed: f32,
    /// Normalized NED thrust; a finite component bypasses the controller
    /// for that axis.
    pub thrust: [f32; 3],
}

impl Default for Setpoint {
    fn default() -> Self {
        Self {
            timestamp: 0,
            x: f32::NAN,
            y: f32::NAN,
            z: f32::NAN,
            vx: f32::NAN,
            vy: f32::NAN,
            vz: f32::NAN,
            yaw: f32::NAN,
            yaw_speed: f32::NAN,
            thrust: [f32::NAN; 3],
        }
    }
}

/// Gear command issued by a flight task.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GearCommand {
    Up,
    Down,
    /// Leave the gear where it is.
    Keep,
}

/// Constraints a flight task puts on the position controller.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Constraints {
    /// Upward speed limit, m/s, positive magnitude. The takeoff ramp
    /// injects values below the configured maximum (including negative
    /// ones at the start of the spool-up).
    pub speed_up: f32,
    /// Downward speed limit, m/s, positive magnitude.
    pub speed_down: f32,
    /// Minimum distance to ground, m; NaN if no distance sensor.
    pub min_distance_to_ground: f32,
    /// Maximum tilt from level, radians.
    pub tilt_max: f32,
    pub landing_gear: Option<GearCommand>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            speed_up: f32::NAN,
            speed_down: f32::NAN,
            min_distance_to_ground: f32::NAN,
            tilt_max: f32::NAN,
            landing_gear: None,
        }
    }
}

/// Physical gear position carried on the attitude setpoint.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GearState {
    Up,
    Down,
}

/// Output for the inner attitude controller. Every field is finite.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttitudeSetpoint {
    pub timestamp: u64,
    pub roll_body: f32,
    pub pitch_body: f32,
    pub yaw_body: f32,
    pub yaw_sp_move_rate: f32,
    /// Desired attitude quaternion, [w, x, y, z].
    pub q_d: [f32; 4],
    /// Normalized collective thrust.
    pub thrust: f32,
    pub landing_gear: GearState,
}

impl Default for AttitudeSetpoint {
    fn default() -> Self {
        Self {
            timestamp: 0,
            roll_body: 0.0,
            pitch_body: 0.0,
            yaw_body: 0.0,
            yaw_sp_move_rate: 0.0,
            q_d: [1.0, 0.0, 0.0, 0.0],
            thrust: 0.0,
            // Be safe and have the landing gear down by default.
            landing_gear: GearState::Down,
        }
    }
}

/// Goal for the auto line task.
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutoTarget {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
}

/// Notification that the parameter store changed.
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParameterUpdate;
