// cover-rf-sync: sensor-synchronised position simulation for RF-controlled covers

pub mod config;
pub mod cover;
pub mod host;
pub mod script;
pub mod sensor;
pub mod web;

pub use config::{Config, CoverConfig, load_config};
pub use cover::{CoverSnapshot, MotionController};
pub use host::{CoverHandle, CoverRegistry, spawn_all, spawn_cover};
pub use sensor::SensorBus;
