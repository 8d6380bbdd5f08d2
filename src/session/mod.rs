//! Device sessions and the operations issued against them.
//!
//! A [`CameraManager`] owns the driver and a fixed table of up to 16 open
//! handles. Callers address devices by index; every operation other than
//! `open`, `close` and `count_devices` requires the index to be open and
//! fails with `NotOpen` without touching the driver otherwise.

mod expose;
mod manager;
mod params;
mod table;

pub use manager::CameraManager;
pub use params::ParamRange;
pub use table::{DeviceIndex, SessionTable};
