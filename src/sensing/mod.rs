pub mod controller;
pub(crate) mod worker;

pub use controller::GravityWatcher;

/// One gravity sample: acceleration along the device axes in m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Where gravity samples come from. The worker polls rather than blocks so a
/// watch can be cancelled between samples; a source returns `None` until it
/// has something fresh to report.
///
/// Availability is decided once, when the controller is built: a meter
/// either has a gravity sensor for its whole lifetime or it never does.
pub trait GravitySource: Send + Sync {
    fn sample(&self) -> Option<GravityVector>;
}
