//! Poll-able joystick device state for teleoperation frontends.
//!
//! joypoll mirrors one Linux joystick device (`/dev/input/js*`) into memory:
//! it discovers the device's capabilities, keeps raw axis and button values
//! current by draining the kernel's event stream without blocking, applies
//! per-group deadzone rescaling, and hands consumers normalized values by
//! stable slot index.

pub mod config;
pub mod joystick;

pub use config::Config;
pub use joystick::{
    Capabilities, DeadzoneSettings, Joystick, JoystickError, JoystickHandle, JoystickOutput,
    JoystickSettings,
};
