pub mod control_math;
pub mod derivative;
pub mod fence;
pub mod hysteresis;
pub mod landing;
pub mod position;
pub mod states;
pub mod takeoff;
