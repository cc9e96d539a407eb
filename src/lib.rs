//! Multicopter position-and-velocity control stack.
//!
//! Transforms estimated vehicle state plus a mode-selected trajectory
//! setpoint into a thrust vector and an attitude setpoint for the inner
//! attitude controller. Topics on the [`bus`] are the only way in and out:
//! the controller task consumes estimator and mode topics and publishes
//! `VEHICLE_LOCAL_POSITION_SETPOINT` plus the attitude setpoint.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

// This must go first, so that the macros are visible to the other modules.
mod fmt;

pub mod bus;
pub mod control;
pub mod flight_tasks;
pub mod msg;
pub mod params;
pub mod tasks;
