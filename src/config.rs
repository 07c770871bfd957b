//! Application configuration, stored as TOML in the platform config
//! directory (`joypoll/joypoll.toml`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::joystick::{DeadzoneSettings, JoystickSettings};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Device node of the joystick.
    pub device: PathBuf,
    /// Pump cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Rediscovery cadence in milliseconds while the device is absent.
    pub reconnect_interval_ms: u64,
    /// Deadzone fraction for the locomotion axis pair, in [0.0, 1.0).
    pub deadzone_locomotion: f64,
    /// Deadzone fraction for the remaining (pan-tilt) axes, in [0.0, 1.0).
    pub deadzone_ptu: f64,
    /// Keep the compound deadzone application of the field implementation.
    pub double_pass_deadzone: bool,
    /// Axis slots treated as the locomotion pair.
    pub locomotion_axes: [u8; 2],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/input/js0"),
            poll_interval_ms: 10,
            reconnect_interval_ms: 1000,
            deadzone_locomotion: 0.05, // 5% suits typical sticks
            deadzone_ptu: 0.05,
            double_pass_deadzone: true,
            locomotion_axes: [0, 1],
        }
    }
}

impl Config {
    /// Location of the configuration file, if a config directory exists on
    /// this platform.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("joypoll").join("joypoll.toml"))
    }

    /// Loads the configuration file, falling back to defaults when it is
    /// missing or malformed.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::path() else {
            warn!("no config directory on this platform, using defaults");
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => {
                    info!("loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("ignoring malformed {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                debug!("no configuration at {} ({e}), using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Writes the configuration, creating the directory if needed.
    pub fn save(&self) -> io::Result<()> {
        let path = Self::path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no config directory on this platform")
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, raw)?;
        info!("saved configuration to {}", path.display());
        Ok(())
    }

    /// The supervision settings this configuration describes.
    pub fn joystick_settings(&self) -> JoystickSettings {
        JoystickSettings {
            device: self.device.clone(),
            poll_interval_ms: self.poll_interval_ms,
            reconnect_interval_ms: self.reconnect_interval_ms,
            deadzone: DeadzoneSettings {
                locomotion: self.deadzone_locomotion,
                ptu: self.deadzone_ptu,
                double_pass: self.double_pass_deadzone,
                locomotion_axes: self.locomotion_axes,
            },
        }
    }
}
