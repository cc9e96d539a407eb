//! Controller parameter table and store.
//!
//! The store is a single cell behind a blocking mutex; writers go through
//! [`store::modify`] which sanitizes the table and signals
//! `PARAMETER_UPDATE`. The controller re-reads the store at the top of its
//! tick when it sees the notification (or once, forced, at startup) so a
//! tick always runs against one consistent table.

use crate::bus;
use crate::msg::ParameterUpdate;

#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Params {
    /// Time constant of the takeoff speed ramp, s.
    pub takeoff_ramp_time: f32,
    /// Maximum climb speed, m/s (positive magnitude).
    pub vel_max_up: f32,
    /// Maximum descent speed, m/s (positive magnitude).
    pub vel_max_down: f32,
    /// Landing descent speed, m/s. Clamped to `vel_max_down`.
    pub land_speed: f32,
    /// Takeoff climb speed, m/s. Clamped to `vel_max_up`.
    pub takeoff_speed: f32,
    /// Altitude below which the descent speed limit reaches its minimum, m.
    pub land_alt2: f32,
    /// Manual position task flavor: 0 = position, 1 = smooth, 2 = sport.
    pub pos_mode: u8,
    /// Maximum horizontal speed, m/s.
    pub vel_max_xy: f32,

    // Position controller gains (normalized thrust units).
    pub pos_p_xy: f32,
    pub pos_p_z: f32,
    pub vel_p_xy: f32,
    pub vel_i_xy: f32,
    pub vel_d_xy: f32,
    pub vel_p_z: f32,
    pub vel_i_z: f32,
    pub vel_d_z: f32,

    /// Hover throttle, normalized.
    pub thr_hover: f32,
    pub thr_min: f32,
    pub thr_max: f32,
    /// Maximum tilt while airborne, radians.
    pub tilt_max_air: f32,

    /// Cutoff of the velocity-derivative low-pass, Hz.
    pub veld_cutoff_hz: f32,
}

impl Params {
    pub const DEFAULT: Params = Params {
        takeoff_ramp_time: 3.0,
        vel_max_up: 3.0,
        vel_max_down: 1.0,
        land_speed: 0.7,
        takeoff_speed: 1.5,
        land_alt2: 5.0,
        pos_mode: 0,
        vel_max_xy: 12.0,
        pos_p_xy: 0.95,
        pos_p_z: 1.0,
        vel_p_xy: 0.09,
        vel_i_xy: 0.02,
        vel_d_xy: 0.01,
        vel_p_z: 0.2,
        vel_i_z: 0.02,
        vel_d_z: 0.0,
        thr_hover: 0.5,
        thr_min: 0.12,
        thr_max: 1.0,
        tilt_max_air: 0.7854,
        veld_cutoff_hz: 5.0,
    };

    /// Enforce cross-field constraints. Applied on every refresh.
    pub fn sanitize(&mut self) {
        if self.takeoff_speed > self.vel_max_up {
            self.takeoff_speed = self.vel_max_up;
        }
        if self.land_speed > self.vel_max_down {
            self.land_speed = self.vel_max_down;
        }
        if !(self.takeoff_ramp_time >= 0.1) {
            self.takeoff_ramp_time = 0.1;
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub mod store {
    use core::cell::Cell;

    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::blocking_mutex::Mutex;

    use super::*;

    static STORE: Mutex<CriticalSectionRawMutex, Cell<Params>> =
        Mutex::new(Cell::new(Params::DEFAULT));

    /// Copy of the current table.
    pub fn get() -> Params {
        STORE.lock(|cell| cell.get())
    }

    /// Change the table and notify subscribers of `PARAMETER_UPDATE`.
    pub fn modify(f: impl FnOnce(&mut Params)) {
        let mut params = get();
        f(&mut params);
        params.sanitize();
        STORE.lock(|cell| cell.set(params));
        bus::PARAMETER_UPDATE.sender().send(ParameterUpdate);
    }
}
