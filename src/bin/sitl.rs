//! Host runner for the position control stack.
//!
//! `sitl start` boots the executor with the controller task plus a small
//! vertical-kinematics simulator, then serves `status` and `stop` on
//! stdin. `stop`/`status` against no running instance exit with 1, like
//! the on-target module shim would.
//!
//! ```sh
//! cargo run --bin sitl --features std -- start
//! ```

use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::time::Duration as StdDuration;

use embassy_executor::Executor;
use embassy_time::{Duration, Instant, Ticker};

use windhover::bus;
use windhover::msg::{ControlMode, HomePosition, LandDetected, LocalPosition, NavState, Setpoint, VehicleStatus};
use windhover::params;
use windhover::tasks::position_control::position_control_task;

const GRAVITY: f32 = 9.81;
const SIM_RATE_HZ: u64 = 100;
const TAKEOFF_ALTITUDE: f32 = 2.5;

/// Vertical-only vehicle: integrates the published collective thrust and
/// feeds the estimator topics back to the controller.
#[embassy_executor::task]
async fn simulator_task() {
    let mut att_sp_rcv = bus::VEHICLE_ATTITUDE_SETPOINT.receiver().unwrap();

    let status_snd = bus::VEHICLE_STATUS.sender();
    let land_snd = bus::VEHICLE_LAND_DETECTED.sender();
    let mode_snd = bus::VEHICLE_CONTROL_MODE.sender();
    let home_snd = bus::HOME_POSITION.sender();
    let local_pos_snd = bus::VEHICLE_LOCAL_POSITION.sender();
    let offboard_snd = bus::OFFBOARD_SETPOINT.sender();

    status_snd.send(VehicleStatus {
        nav_state: NavState::Offboard,
        is_vtol: false,
    });
    mode_snd.send(ControlMode {
        armed: true,
        offboard_enabled: true,
        position_enabled: true,
        ..Default::default()
    });
    home_snd.send(HomePosition {
        z: 0.0,
        valid_alt: true,
    });

    let thr_hover = params::store::get().thr_hover;
    let mut z = 0.0f32;
    let mut vz = 0.0f32;
    let mut thrust = 0.0f32;
    let mut last_report = Instant::now();

    let mut ticker = Ticker::every(Duration::from_hz(SIM_RATE_HZ));
    loop {
        ticker.next().await;
        let now_us = Instant::now().as_micros();
        let dt = 1.0 / SIM_RATE_HZ as f32;

        if let Some(att_sp) = att_sp_rcv.try_changed() {
            thrust = att_sp.thrust;
        }

        // Collective thrust against gravity; the ground is rigid.
        let accel = GRAVITY * (1.0 - thrust / thr_hover.max(0.01));
        vz += accel * dt;
        z += vz * dt;
        if z > 0.0 {
            z = 0.0;
            vz = vz.min(0.0);
        }

        land_snd.send(LandDetected {
            landed: z > -0.05,
            maybe_landed: z > -0.05,
            ground_contact: z > -0.02,
            alt_max: -1.0,
        });

        local_pos_snd.send(LocalPosition {
            timestamp: now_us,
            x: 0.0,
            y: 0.0,
            z,
            vx: 0.0,
            vy: 0.0,
            vz,
            z_deriv: vz,
            yaw: 0.0,
            xy_valid: true,
            z_valid: true,
            v_xy_valid: true,
            v_z_valid: true,
        });

        offboard_snd.send(Setpoint {
            timestamp: now_us,
            z: -TAKEOFF_ALTITUDE,
            ..Default::default()
        });

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            log::info!("sim: alt {:.2} m, vz {:.2} m/s, thrust {:.2}", -z, -vz, thrust);
        }
    }
}

fn console() {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        match line.trim() {
            "status" => {
                if bus::CONTROL_TASK_RUNNING.load(Ordering::Acquire) {
                    println!("running");
                } else {
                    println!("not running");
                }
            }
            "stop" => {
                bus::CONTROL_TASK_STOP.store(true, Ordering::Release);
                // Give the loop a second to quit at our request.
                for _ in 0..50 {
                    if !bus::CONTROL_TASK_RUNNING.load(Ordering::Acquire) {
                        println!("stopped");
                        std::process::exit(0);
                    }
                    std::thread::sleep(StdDuration::from_millis(20));
                }
                eprintln!("controller did not stop in time");
                std::process::exit(1);
            }
            "" => {}
            other => eprintln!("unknown command: {other} (status|stop)"),
        }
    }
}

fn start() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    std::thread::spawn(console);

    let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
    executor.run(|spawner| {
        spawner.spawn(position_control_task()).unwrap();
        spawner.spawn(simulator_task()).unwrap();
    });
}

fn main() {
    let arg = std::env::args().nth(1);
    let code = match arg.as_deref() {
        Some("start") => start(),
        Some("stop") | Some("status") => {
            eprintln!("not running");
            1
        }
        _ => {
            eprintln!("usage: sitl {{start|stop|status}}");
            1
        }
    };
    std::process::exit(code);
}
