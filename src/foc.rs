// FOC (Field Oriented Control) module
// Math building blocks for the current loop: transforms, modulation, PI and encoder correction

pub mod angle_correction;
pub mod pi_controller;
pub mod svpwm;
pub mod transforms;

// Re-export main types for easier access
pub use angle_correction::AngleCorrection;
pub use pi_controller::{LoopMode, PiController};
pub use svpwm::calculate_svpwm;
pub use transforms::{clarke, inverse_clarke, inverse_park, park, CosSin};
