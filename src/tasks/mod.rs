pub mod position_control;
