pub mod controller;
pub mod state;

pub use controller::{MeterController, MeterSnapshot};
pub use state::{MeterState, MeterStatus, TouchPoint, APPROACH_STEP};
