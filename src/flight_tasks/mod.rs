//! Flight tasks: black-box generators of `(setpoint, constraints)` for
//! one navigation mode each. The collection owns at most one active task;
//! the controller switches tasks as the navigation state changes and
//! falls back through a cascade when an activation fails.

mod auto;
mod manual;
mod offboard;

pub use auto::AutoLineTask;
pub use manual::{AltitudeTask, ManualFlavor, PositionTask, StabilizedTask};
pub use offboard::OffboardTask;

use crate::control::states::ControllerStates;
use crate::msg::{AutoTarget, Constraints, Setpoint};
use crate::params::Params;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightTaskIndex {
    None,
    Stabilized,
    Altitude,
    Position,
    PositionSmooth,
    Sport,
    Offboard,
    AutoLine,
    AutoFollowMe,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskError {
    /// The task cannot run with the current vehicle state or inputs.
    ActivationFailed,
    /// The task is not available on this build.
    NotImplemented,
}

impl TaskError {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskError::ActivationFailed => "activation failed",
            TaskError::NotImplemented => "not implemented",
        }
    }
}

/// Per-tick inputs a task may consume besides the vehicle state.
#[derive(Clone, Copy, Default)]
pub struct TaskInputs {
    pub now_us: u64,
    pub offboard: Option<Setpoint>,
    pub auto_target: Option<AutoTarget>,
}

/// Constraints every task starts from; tasks tighten what they care about.
pub(crate) fn default_constraints(params: &Params) -> Constraints {
    Constraints {
        speed_up: params.vel_max_up,
        speed_down: params.vel_max_down,
        min_distance_to_ground: f32::NAN,
        tilt_max: params.tilt_max_air,
        landing_gear: None,
    }
}

enum ActiveTask {
    Stabilized(StabilizedTask),
    Altitude(AltitudeTask),
    Position(PositionTask),
    Offboard(OffboardTask),
    AutoLine(AutoLineTask),
}

pub struct FlightTasks {
    index: FlightTaskIndex,
    task: Option<ActiveTask>,
    params: Params,
}

impl FlightTasks {
    pub fn new(params: Params) -> Self {
        Self {
            index: FlightTaskIndex::None,
            task: None,
            params,
        }
    }

    pub fn is_any_task_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn active_index(&self) -> FlightTaskIndex {
        self.index
    }

    pub fn handle_parameter_update(&mut self, params: Params) {
        self.params = params;
    }

    /// Activate the task for `index`, replacing whatever ran before. On
    /// failure no task is left active and the error goes back to the
    /// selector cascade.
    pub fn switch_task(
        &mut self,
        index: FlightTaskIndex,
        states: &ControllerStates,
        inputs: &TaskInputs,
    ) -> Result<(), TaskError> {
        if index == self.index && self.task.is_some() {
            // Already running.
            return Ok(());
        }

        self.task = None;
        self.index = FlightTaskIndex::None;

        let task = match index {
            FlightTaskIndex::None => return Ok(()),
            FlightTaskIndex::Stabilized => {
                ActiveTask::Stabilized(StabilizedTask::activate(states, &self.params)?)
            }
            FlightTaskIndex::Altitude => {
                ActiveTask::Altitude(AltitudeTask::activate(states, &self.params)?)
            }
            FlightTaskIndex::Position => ActiveTask::Position(PositionTask::activate(
                states,
                &self.params,
                ManualFlavor::Position,
            )?),
            FlightTaskIndex::PositionSmooth => ActiveTask::Position(PositionTask::activate(
                states,
                &self.params,
                ManualFlavor::Smooth,
            )?),
            FlightTaskIndex::Sport => ActiveTask::Position(PositionTask::activate(
                states,
                &self.params,
                ManualFlavor::Sport,
            )?),
            FlightTaskIndex::Offboard => {
                ActiveTask::Offboard(OffboardTask::activate(&self.params, inputs)?)
            }
            FlightTaskIndex::AutoLine => {
                ActiveTask::AutoLine(AutoLineTask::activate(states, &self.params)?)
            }
            FlightTaskIndex::AutoFollowMe => return Err(TaskError::NotImplemented),
        };

        self.task = Some(task);
        self.index = index;
        Ok(())
    }

    /// Run the active task for one tick. `false` means the task could not
    /// produce a setpoint; the caller then synthesizes a failsafe.
    pub fn update(&mut self, states: &ControllerStates, inputs: &TaskInputs) -> bool {
        match &mut self.task {
            Some(ActiveTask::Stabilized(t)) => t.update(states),
            Some(ActiveTask::Altitude(t)) => t.update(states),
            Some(ActiveTask::Position(t)) => t.update(states),
            Some(ActiveTask::Offboard(t)) => t.update(inputs),
            Some(ActiveTask::AutoLine(t)) => t.update(states, inputs),
            None => false,
        }
    }

    pub fn position_setpoint(&self) -> Setpoint {
        match &self.task {
            Some(ActiveTask::Stabilized(t)) => t.setpoint(),
            Some(ActiveTask::Altitude(t)) => t.setpoint(),
            Some(ActiveTask::Position(t)) => t.setpoint(),
            Some(ActiveTask::Offboard(t)) => t.setpoint(),
            Some(ActiveTask::AutoLine(t)) => t.setpoint(),
            None => Setpoint::default(),
        }
    }

    pub fn constraints(&self) -> Constraints {
        match &self.task {
            Some(ActiveTask::Stabilized(t)) => t.constraints(),
            Some(ActiveTask::Altitude(t)) => t.constraints(),
            Some(ActiveTask::Position(t)) => t.constraints(),
            Some(ActiveTask::Offboard(t)) => t.constraints(),
            Some(ActiveTask::AutoLine(t)) => t.constraints(),
            None => default_constraints(&self.params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn valid_states() -> ControllerStates {
        ControllerStates {
            position: Vector3::new(1.0, 2.0, -3.0),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            yaw: 0.3,
        }
    }

    #[test]
    fn position_task_needs_a_full_state() {
        let mut tasks = FlightTasks::new(Params::DEFAULT);
        let err = tasks.switch_task(
            FlightTaskIndex::Position,
            &ControllerStates::default(),
            &TaskInputs::default(),
        );
        assert_eq!(err, Err(TaskError::ActivationFailed));
        assert!(!tasks.is_any_task_active());

        let ok = tasks.switch_task(
            FlightTaskIndex::Position,
            &valid_states(),
            &TaskInputs::default(),
        );
        assert_eq!(ok, Ok(()));
        assert_eq!(tasks.active_index(), FlightTaskIndex::Position);
    }

    #[test]
    fn switching_to_the_running_task_is_a_no_op() {
        let mut tasks = FlightTasks::new(Params::DEFAULT);
        tasks
            .switch_task(
                FlightTaskIndex::Stabilized,
                &valid_states(),
                &TaskInputs::default(),
            )
            .unwrap();
        assert!(tasks
            .switch_task(
                FlightTaskIndex::Stabilized,
                &ControllerStates::default(),
                &TaskInputs::default(),
            )
            .is_ok());
        assert!(tasks.is_any_task_active());
    }

    #[test]
    fn follow_me_reports_not_implemented() {
        let mut tasks = FlightTasks::new(Params::DEFAULT);
        let err = tasks.switch_task(
            FlightTaskIndex::AutoFollowMe,
            &valid_states(),
            &TaskInputs::default(),
        );
        assert_eq!(err, Err(TaskError::NotImplemented));
        assert!(!tasks.is_any_task_active());
    }

    #[test]
    fn position_hold_tracks_the_captured_point() {
        let mut tasks = FlightTasks::new(Params::DEFAULT);
        tasks
            .switch_task(
                FlightTaskIndex::Position,
                &valid_states(),
                &TaskInputs::default(),
            )
            .unwrap();
        assert!(tasks.update(&valid_states(), &TaskInputs::default()));
        let sp = tasks.position_setpoint();
        assert_eq!(sp.x, 1.0);
        assert_eq!(sp.y, 2.0);
        assert_eq!(sp.z, -3.0);
        assert_eq!(sp.yaw, 0.3);
    }

    #[test]
    fn deactivation_clears_the_task() {
        let mut tasks = FlightTasks::new(Params::DEFAULT);
        tasks
            .switch_task(
                FlightTaskIndex::Stabilized,
                &valid_states(),
                &TaskInputs::default(),
            )
            .unwrap();
        tasks
            .switch_task(
                FlightTaskIndex::None,
                &valid_states(),
                &TaskInputs::default(),
            )
            .unwrap();
        assert!(!tasks.is_any_task_active());
        assert_eq!(tasks.active_index(), FlightTaskIndex::None);
    }
}
