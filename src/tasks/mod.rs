//! Background Tasks Module
//!
//! Contains the maintenance loops that run beside caller traffic.
//!
//! # Tasks
//! - Reaper: removes entries expired for longer than the grace period
//! - Evictor: removes a fraction of live entries under memory pressure

mod maintenance;

pub use maintenance::{spawn_evictor, spawn_reaper, MaintenanceHandle};
