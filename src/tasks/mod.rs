//! Background Tasks Module
//!
//! # Tasks
//! - Renewal worker: applies bump renewals off the caller's thread
//! - Pressure relay: turns host low-memory events into store purges

mod pressure;
mod renewal;

pub use pressure::spawn_pressure_relay;
pub use renewal::RenewalQueue;
