//! Joystick subsystem: raw device access and state mirroring.
//!
//! 1. [`sys`] - Linux joystick interface bindings
//! 2. [`device`] - Capability discovery and the event pump
//! 3. [`deadzone`] - Axis rescaling
//! 4. [`handle`] - Supervision task and state publishing
//!
//! # Architecture
//!
//! ```text
//! /dev/input/jsN ──► Joystick::pump() ──► JoystickHandle ──► watch::Receiver<JoystickOutput>
//!                    (raw mirrors)        (cadence + rediscovery)
//! ```
//!
//! The [`Joystick`] component itself is single-threaded and non-blocking;
//! applications either drive the pump from their own control loop or let the
//! supervision handle do it and subscribe to snapshots.

pub mod deadzone;
pub mod device;
pub mod error;
pub mod handle;
pub mod sys;

pub use device::{Capabilities, DeadzoneSettings, Joystick};
pub use error::JoystickError;
pub use handle::{JoystickHandle, JoystickOutput, JoystickSettings};
