//! Projection of a thrust vector and yaw heading onto an attitude
//! setpoint for the inner attitude controller.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use num_traits::Float;

use crate::msg::AttitudeSetpoint;

/// Build the attitude whose body z-axis opposes the commanded thrust and
/// whose heading matches `yaw_sp`. The collective thrust magnitude rides
/// along on the setpoint.
pub fn thrust_to_attitude(thr_sp: Vector3<f32>, yaw_sp: f32) -> AttitudeSetpoint {
    let thrust_mag = thr_sp.norm();

    // Thrust points along -body_z (rotors push up in NED).
    let body_z = if thrust_mag > f32::EPSILON {
        -thr_sp / thrust_mag
    } else {
        // No thrust commanded: stay upright.
        Vector3::new(0.0, 0.0, 1.0)
    };

    // Desired heading expressed as the body y-axis direction for level
    // flight, then made orthogonal to body_z.
    let y_c = Vector3::new(-yaw_sp.sin(), yaw_sp.cos(), 0.0);

    let mut body_x = y_c.cross(&body_z);
    if body_z.z < 0.000_001 {
        // Thrust is (nearly) horizontal: heading is ill-defined, keep the
        // nose pointing down-range.
        body_x = Vector3::new(0.0, 0.0, 1.0);
    }
    let body_x = if body_x.norm() > f32::EPSILON {
        body_x / body_x.norm()
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    };

    let body_y = body_z.cross(&body_x);

    let rot = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[body_x, body_y, body_z]));
    let q = UnitQuaternion::from_rotation_matrix(&rot);
    let (roll, pitch, yaw) = q.euler_angles();

    AttitudeSetpoint {
        roll_body: roll,
        pitch_body: pitch,
        yaw_body: yaw,
        q_d: [q.w, q.i, q.j, q.k],
        thrust: thrust_mag,
        ..Default::default()
    }
}
