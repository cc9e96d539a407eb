//! Position controller loop.
//!
//! [`PositionControlLoop`] is the synchronous tick: gather → select task →
//! validate → takeoff shaping → landed idle → altitude fence → PID →
//! landing shaping → publish decision. [`position_control_task`] wraps it
//! for the executor: it owns the topic subscriptions, waits (bounded) for
//! estimator samples and routes the outputs to the right topics.

use core::sync::atomic::Ordering;

use embassy_time::{with_timeout, Duration, Instant};

use crate::bus;
use crate::control::hysteresis::Hysteresis;
use crate::control::position::PositionControl;
use crate::control::states::{ControllerStates, StateValidator};
use crate::control::takeoff::SmoothTakeoff;
use crate::control::{control_math, fence, landing};
use crate::flight_tasks::{FlightTaskIndex, FlightTasks, TaskInputs};
use crate::msg::{
    AttitudeSetpoint, ControlMode, GearCommand, GearState, HomePosition, LandDetected,
    LocalPosition, NavState, Setpoint, VehicleStatus,
};
use crate::params::{self, Params};

/// Time the vehicle must stay armed before a takeoff may start, so the
/// propellers have spun up to idle.
const IDLE_BEFORE_TAKEOFF_US: u64 = 2_500_000;

/// Minimum spacing of user-visible warnings.
const WARN_INTERVAL_US: u64 = 200_000;

/// Bounded wait on the estimator topic; a timeout still runs the tick so
/// mode changes are picked up.
const POLL_TIMEOUT_MS: u64 = 20;

/// Everything one tick consumes, copied out of the bus by the task (or
/// synthesized by a test harness).
#[derive(Clone, Copy, Default)]
pub struct LoopInputs {
    pub local_pos: LocalPosition,
    pub status: VehicleStatus,
    pub land: LandDetected,
    pub control_mode: ControlMode,
    pub home: HomePosition,
    pub offboard: Option<Setpoint>,
    pub auto_target: Option<crate::msg::AutoTarget>,
    pub param_update: bool,
}

#[derive(Clone, Copy, Default)]
pub struct LoopOutputs {
    /// Present when the gating conditions allow attitude publication.
    pub attitude_sp: Option<AttitudeSetpoint>,
    /// Present whenever a flight task ran.
    pub local_position_sp: Option<Setpoint>,
}

pub struct PositionControlLoop {
    params: Params,
    flight_tasks: FlightTasks,
    control: PositionControl,
    validator: StateValidator,
    states: ControllerStates,
    takeoff: SmoothTakeoff,
    arm_hysteresis: Hysteresis,
    gear: GearState,
    att_sp: AttitudeSetpoint,
    prev_t_us: u64,
    last_warn_us: u64,
}

impl PositionControlLoop {
    pub fn new(params: Params) -> Self {
        let mut arm_hysteresis = Hysteresis::new(false);
        arm_hysteresis.set_transition_time(false, IDLE_BEFORE_TAKEOFF_US);

        Self {
            flight_tasks: FlightTasks::new(params),
            control: PositionControl::new(&params),
            validator: StateValidator::new(&params),
            states: ControllerStates::default(),
            takeoff: SmoothTakeoff::new(),
            arm_hysteresis,
            // Be safe and have the landing gear down by default.
            gear: GearState::Down,
            att_sp: AttitudeSetpoint::default(),
            prev_t_us: 0,
            last_warn_us: 0,
            params,
        }
    }

    pub fn active_task(&self) -> FlightTaskIndex {
        self.flight_tasks.active_index()
    }

    /// One controller tick. The sequence is total and deterministic; the
    /// only caller-provided nondeterminism is `now_us` and the inputs.
    pub fn iterate(&mut self, now_us: u64, inputs: &LoopInputs) -> LoopOutputs {
        if inputs.param_update {
            self.refresh_params();
        }

        let dt = if self.prev_t_us != 0 {
            (now_us - self.prev_t_us) as f32 / 1e6
        } else {
            0.004
        };
        self.prev_t_us = now_us;

        let task_inputs = TaskInputs {
            now_us,
            offboard: inputs.offboard,
            auto_target: inputs.auto_target,
        };

        if inputs.control_mode.armed {
            self.select_flight_task(now_us, inputs, &task_inputs);
        } else {
            let _ = self
                .flight_tasks
                .switch_task(FlightTaskIndex::None, &self.states, &task_inputs);
            self.arm_hysteresis.update(false, now_us);
        }

        let mut outputs = LoopOutputs::default();

        if self.flight_tasks.is_any_task_active() {
            let mut setpoint;
            if !self.flight_tasks.update(&self.states, &task_inputs) {
                // The task could not produce a setpoint: failsafe.
                setpoint = Setpoint::default();
                if self.states.velocity.z.is_finite() {
                    // Vertical velocity is observable; descend at land speed.
                    setpoint.vz = self.params.land_speed;
                    setpoint.thrust[0] = 0.0;
                    setpoint.thrust[1] = 0.0;
                    if self.warn_gate(now_us) {
                        warn!("failsafe: descending with land speed");
                    }
                } else if self.warn_gate(now_us) {
                    warn!("failsafe: descending with attitude control only");
                }
            } else {
                setpoint = self.flight_tasks.position_setpoint();
            }
            let mut constraints = self.flight_tasks.constraints();

            self.validator
                .update(&mut self.states, &inputs.local_pos, setpoint.vz, dt);

            self.arm_hysteresis.update(inputs.control_mode.armed, now_us);

            // A takeoff ramp needs the propellers at idle and a usable
            // vertical state.
            if self.arm_hysteresis.state()
                && self.states.position.z.is_finite()
                && self.states.velocity.z.is_finite()
            {
                self.takeoff.check_for_takeoff(
                    inputs.land.landed,
                    setpoint.z,
                    setpoint.vz,
                    self.states.position.z,
                    constraints.min_distance_to_ground,
                    self.params.takeoff_speed,
                );
                self.takeoff.update_ramp(
                    setpoint.z,
                    setpoint.vz,
                    self.states.position.z,
                    &self.params,
                    dt,
                );
                if self.takeoff.is_active() {
                    self.takeoff.apply_override(&mut setpoint, &mut constraints);
                }
            }

            if inputs.land.landed && !self.takeoff.is_active() && !setpoint.thrust[2].is_finite() {
                landing::apply_landed_idle(&mut setpoint, &mut constraints, &self.states);
            }

            if self.states.position.z.is_finite() {
                fence::limit_altitude(
                    &mut setpoint,
                    &self.states,
                    &inputs.land,
                    inputs.local_pos.v_z_valid,
                    &inputs.home,
                    dt,
                );
            }

            self.control.update_constraints(&constraints);
            self.control.update_state(&self.states);
            self.control.update_setpoint(&setpoint);
            self.control.generate_thrust_yaw_setpoint(dt);

            let mut thr_sp = self.control.thrust_setpoint();

            // The landed shaping must not fight a takeoff ramp or an
            // explicit thrust demand.
            if !self.takeoff.is_active() && !setpoint.thrust[2].is_finite() {
                landing::limit_thrust_during_landing(&mut thr_sp, &inputs.land, &mut self.control);
            }

            let mut local_pos_sp = Setpoint::default();
            local_pos_sp.timestamp = now_us;
            local_pos_sp.x = self.control.pos_setpoint().x;
            local_pos_sp.y = self.control.pos_setpoint().y;
            local_pos_sp.z = self.control.pos_setpoint().z;
            local_pos_sp.vx = self.control.vel_setpoint().x;
            local_pos_sp.vy = self.control.vel_setpoint().y;
            local_pos_sp.vz = self.control.vel_setpoint().z;
            local_pos_sp.yaw = self.control.yaw_setpoint();
            local_pos_sp.yaw_speed = self.control.yawspeed_setpoint();
            local_pos_sp.thrust = [thr_sp.x, thr_sp.y, thr_sp.z];
            outputs.local_position_sp = Some(local_pos_sp);

            self.att_sp = control_math::thrust_to_attitude(thr_sp, self.control.yaw_setpoint());
            self.att_sp.timestamp = now_us;
            self.att_sp.yaw_sp_move_rate = self.control.yawspeed_setpoint();
            match constraints.landing_gear {
                Some(GearCommand::Up) => self.gear = GearState::Up,
                Some(GearCommand::Down) => self.gear = GearState::Down,
                Some(GearCommand::Keep) | None => {}
            }
            self.att_sp.landing_gear = self.gear;
        } else {
            // No flight task: idle level attitude at the current heading,
            // zero thrust.
            let yaw = if inputs.local_pos.yaw.is_finite() {
                inputs.local_pos.yaw
            } else {
                0.0
            };
            self.att_sp = control_math::thrust_to_attitude(nalgebra::Vector3::zeros(), yaw);
            self.att_sp.timestamp = now_us;
            self.att_sp.landing_gear = self.gear;
        }

        // Do not publish the attitude setpoint while the vehicle has not
        // been armed long enough, or while offboard runs its own attitude
        // stream (offboard enabled with position, velocity and
        // acceleration control all disabled).
        let offboard_owns_attitude = inputs.control_mode.offboard_enabled
            && !(inputs.control_mode.position_enabled
                || inputs.control_mode.velocity_enabled
                || inputs.control_mode.acceleration_enabled);
        if self.arm_hysteresis.state() && !offboard_owns_attitude {
            outputs.attitude_sp = Some(self.att_sp);
        }

        outputs
    }

    fn refresh_params(&mut self) {
        let mut params = params::store::get();
        params.sanitize();
        self.params = params;
        self.flight_tasks.handle_parameter_update(params);
        self.validator.handle_parameter_update(&params);
        self.control.update_params(&params);
    }

    /// Map the navigation state onto a flight task, falling back through
    /// the manual cascade when an activation fails.
    fn select_flight_task(&mut self, now_us: u64, inputs: &LoopInputs, task_inputs: &TaskInputs) {
        let nav_state = inputs.status.nav_state;
        let mut task_failure = false;

        if nav_state == NavState::Offboard {
            if let Err(e) =
                self.flight_tasks
                    .switch_task(FlightTaskIndex::Offboard, &self.states, task_inputs)
            {
                if self.warn_gate(now_us) {
                    warn!("offboard activation failed: {}", e.as_str());
                }
                task_failure = true;
            }
        }

        if nav_state == NavState::AutoFollowTarget {
            if let Err(e) = self.flight_tasks.switch_task(
                FlightTaskIndex::AutoFollowMe,
                &self.states,
                task_inputs,
            ) {
                if self.warn_gate(now_us) {
                    warn!("follow-me activation failed: {}", e.as_str());
                }
                task_failure = true;
            }
        } else if inputs.control_mode.auto_enabled {
            if let Err(e) =
                self.flight_tasks
                    .switch_task(FlightTaskIndex::AutoLine, &self.states, task_inputs)
            {
                if self.warn_gate(now_us) {
                    warn!("auto activation failed: {}", e.as_str());
                }
                task_failure = true;
            }
        }

        if nav_state == NavState::Posctl || task_failure {
            let index = match self.params.pos_mode {
                0 => FlightTaskIndex::Position,
                1 => FlightTaskIndex::PositionSmooth,
                2 => FlightTaskIndex::Sport,
                _ => FlightTaskIndex::Position,
            };
            match self.flight_tasks.switch_task(index, &self.states, task_inputs) {
                Ok(()) => task_failure = false,
                Err(e) => {
                    if self.warn_gate(now_us) {
                        warn!("position control activation failed: {}", e.as_str());
                    }
                    task_failure = true;
                }
            }
        }

        if nav_state == NavState::Altctl || task_failure {
            match self
                .flight_tasks
                .switch_task(FlightTaskIndex::Altitude, &self.states, task_inputs)
            {
                Ok(()) => task_failure = false,
                Err(e) => {
                    if self.warn_gate(now_us) {
                        warn!("altitude control activation failed: {}", e.as_str());
                    }
                    task_failure = true;
                }
            }
        }

        if matches!(nav_state, NavState::Manual | NavState::Stab) || task_failure {
            match self
                .flight_tasks
                .switch_task(FlightTaskIndex::Stabilized, &self.states, task_inputs)
            {
                Ok(()) => task_failure = false,
                Err(e) => {
                    if self.warn_gate(now_us) {
                        warn!("stabilized control activation failed: {}", e.as_str());
                    }
                    task_failure = true;
                }
            }
        }

        if task_failure {
            let _ = self
                .flight_tasks
                .switch_task(FlightTaskIndex::None, &self.states, task_inputs);
            if self.warn_gate(now_us) {
                warn!("no flight task running");
            }
        }
    }

    /// Shared rate limit for every warning site: true when a warning may
    /// go out now.
    fn warn_gate(&mut self, now_us: u64) -> bool {
        if now_us.saturating_sub(self.last_warn_us) > WARN_INTERVAL_US {
            self.last_warn_us = now_us;
            true
        } else {
            false
        }
    }
}

/// Controller task: single mutator of the loop state, one suspension
/// point (the bounded wait on the local-position topic).
#[embassy_executor::task]
pub async fn position_control_task() {
    let mut local_pos_rcv = bus::VEHICLE_LOCAL_POSITION.receiver().unwrap();
    let mut status_rcv = bus::VEHICLE_STATUS.receiver().unwrap();
    let mut land_rcv = bus::VEHICLE_LAND_DETECTED.receiver().unwrap();
    let mut mode_rcv = bus::VEHICLE_CONTROL_MODE.receiver().unwrap();
    let mut home_rcv = bus::HOME_POSITION.receiver().unwrap();
    let mut param_rcv = bus::PARAMETER_UPDATE.receiver().unwrap();
    let mut offboard_rcv = bus::OFFBOARD_SETPOINT.anon_receiver();
    let mut auto_target_rcv = bus::AUTO_TARGET.anon_receiver();

    let att_sp_snd = bus::VEHICLE_ATTITUDE_SETPOINT.sender();
    let mc_virtual_att_sp_snd = bus::MC_VIRTUAL_ATTITUDE_SETPOINT.sender();
    let local_pos_sp_snd = bus::VEHICLE_LOCAL_POSITION_SETPOINT.sender();

    let mut ctl = PositionControlLoop::new(params::store::get());
    let mut inputs = LoopInputs::default();
    // The attitude setpoint topic is fixed on the first status sample.
    let mut is_vtol: Option<bool> = None;

    bus::CONTROL_TASK_RUNNING.store(true, Ordering::Release);
    info!("position controller started");

    while !bus::CONTROL_TASK_STOP.load(Ordering::Acquire) {
        if let Ok(sample) =
            with_timeout(Duration::from_millis(POLL_TIMEOUT_MS), local_pos_rcv.changed()).await
        {
            inputs.local_pos = sample;
        }
        // Timed out: tick anyway to catch control-mode changes.

        if let Some(v) = status_rcv.try_changed() {
            if is_vtol.is_none() {
                is_vtol = Some(v.is_vtol);
            }
            inputs.status = v;
        }
        if let Some(v) = land_rcv.try_changed() {
            inputs.land = v;
        }
        if let Some(v) = mode_rcv.try_changed() {
            inputs.control_mode = v;
        }
        if let Some(v) = home_rcv.try_changed() {
            inputs.home = v;
        }
        inputs.offboard = offboard_rcv.try_get();
        inputs.auto_target = auto_target_rcv.try_get();
        inputs.param_update = param_rcv.try_changed().is_some();

        let now_us = Instant::now().as_micros();
        let out = ctl.iterate(now_us, &inputs);

        if let Some(local_pos_sp) = out.local_position_sp {
            local_pos_sp_snd.send(local_pos_sp);
        }
        if let Some(att_sp) = out.attitude_sp {
            if is_vtol == Some(true) {
                mc_virtual_att_sp_snd.send(att_sp);
            } else {
                att_sp_snd.send(att_sp);
            }
        }
    }

    bus::CONTROL_TASK_RUNNING.store(false, Ordering::Release);
    info!("position controller stopped");
}
