//! Error definitions for the joystick subsystem.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by device discovery.
///
/// The event pump never returns these: per the consumer contract it reports
/// device health as a plain bool and transitions to the uninitialized state
/// on fatal I/O.
#[derive(Debug, Error)]
pub enum JoystickError {
    /// The device node could not be opened. Not fatal: the joystick may
    /// simply be unplugged, and the caller may retry with the same path.
    #[error("joystick {path:?} not present: {source}")]
    NotPresent { path: PathBuf, source: io::Error },

    /// The device opened but a capability or mapping query failed, so it does
    /// not speak the joystick protocol.
    #[error("capability query {query} failed for {path:?}: {source}")]
    CapabilityQuery {
        query: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}
