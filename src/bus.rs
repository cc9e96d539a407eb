//! Last-value-wins topics connecting the controller to the rest of the
//! stack. Each topic has one advertising writer and up to [`SUBSCRIBERS`]
//! readers; a publication overwrites the previous value, readers either
//! wait for a change or copy the latest value without blocking.

use core::sync::atomic::AtomicBool;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;

use crate::msg::{
    AttitudeSetpoint, AutoTarget, ControlMode, HomePosition, LandDetected, LocalPosition,
    ParameterUpdate, Setpoint, VehicleStatus,
};

/// Receiver slots per topic.
pub const SUBSCRIBERS: usize = 4;

pub type Topic<T> = Watch<CriticalSectionRawMutex, T, SUBSCRIBERS>;

// ── Inputs to the controller ─────────────────────────────────────────────────
pub static VEHICLE_STATUS: Topic<VehicleStatus> = Watch::new();
pub static VEHICLE_LAND_DETECTED: Topic<LandDetected> = Watch::new();
pub static VEHICLE_CONTROL_MODE: Topic<ControlMode> = Watch::new();
pub static VEHICLE_LOCAL_POSITION: Topic<LocalPosition> = Watch::new();
pub static HOME_POSITION: Topic<HomePosition> = Watch::new();
pub static PARAMETER_UPDATE: Topic<ParameterUpdate> = Watch::new();

// ── Trajectory sources consumed by flight tasks ──────────────────────────────
pub static OFFBOARD_SETPOINT: Topic<Setpoint> = Watch::new();
pub static AUTO_TARGET: Topic<AutoTarget> = Watch::new();

// ── Controller outputs ───────────────────────────────────────────────────────
/// For logging and downstream consumers.
pub static VEHICLE_LOCAL_POSITION_SETPOINT: Topic<Setpoint> = Watch::new();
/// Attitude setpoint for a plain multicopter airframe.
pub static VEHICLE_ATTITUDE_SETPOINT: Topic<AttitudeSetpoint> = Watch::new();
/// Attitude setpoint while the airframe is a VTOL in multicopter mode.
pub static MC_VIRTUAL_ATTITUDE_SETPOINT: Topic<AttitudeSetpoint> = Watch::new();

// ── Controller lifecycle ─────────────────────────────────────────────────────
/// Set by the stop command; observed at the top of every loop iteration.
pub static CONTROL_TASK_STOP: AtomicBool = AtomicBool::new(false);
/// True while the controller loop is alive.
pub static CONTROL_TASK_RUNNING: AtomicBool = AtomicBool::new(false);
