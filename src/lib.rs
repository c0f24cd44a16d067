//! A novelty meter. Hold your finger on the sensor, listen to the beeps,
//! and after a few seconds the needle settles on how much you give.
//!
//! The session logic lives in [`meter`]; [`sensing`] supplies the gravity
//! shortcut, [`audio`] the cues, and [`panel`] the display event stream.

pub mod audio;
pub mod config;
pub mod meter;
pub mod panel;
pub mod sensing;

pub use audio::{AudioEngineHandle, Cue, CuePlayer, SilentCues};
pub use config::MeterConfig;
pub use meter::{MeterController, MeterSnapshot, MeterState, MeterStatus, TouchPoint};
pub use panel::{format_readout, PanelEvent, BAD_READ_LABEL, GIVEN_LABEL};
pub use sensing::{GravitySource, GravityVector, GravityWatcher};
