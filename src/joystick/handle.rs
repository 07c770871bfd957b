//! Joystick supervision: pump cadence, rediscovery, and state publishing.
//!
//! The [`Joystick`] component is deliberately passive: somebody has to call
//! `pump()` on a cadence and re-run discovery when the device goes away. This
//! module is that somebody: a Tokio task owns the component and publishes
//! immutable snapshots through a watch channel for any number of consumers.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::device::{DeadzoneSettings, Joystick};

/// Configuration for the supervision task.
#[derive(Clone, Debug)]
pub struct JoystickSettings {
    /// Device node to open.
    pub device: PathBuf,
    /// Pump cadence in milliseconds.
    ///
    /// One pump drains one kernel batch; at 10ms even a busy device stays
    /// current. Larger values trade input latency for CPU.
    pub poll_interval_ms: u64,
    /// Rediscovery cadence in milliseconds while the device is absent or has
    /// become unusable.
    pub reconnect_interval_ms: u64,
    /// Deadzone tuning handed to the component.
    pub deadzone: DeadzoneSettings,
}

impl Default for JoystickSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/input/js0"),
            poll_interval_ms: 10,
            reconnect_interval_ms: 1000,
            deadzone: DeadzoneSettings::default(),
        }
    }
}

/// Snapshot published after every state-changing pump tick.
#[derive(Clone, Debug, Default)]
pub struct JoystickOutput {
    /// Whether a device is currently initialized.
    pub connected: bool,
    /// Display name of the connected device.
    pub device_name: Option<String>,
    /// Normalized axis positions in slot order, about [-1.0, 1.0].
    pub axes: Vec<f64>,
    /// Button states in slot order.
    pub buttons: Vec<bool>,
    /// When this snapshot was taken.
    pub timestamp: Option<DateTime<Local>>,
}

/// Handle to a running supervision task.
///
/// The task is fire-and-forget: it runs until the process exits or until the
/// handle and every subscriber have been dropped.
pub struct JoystickHandle {
    output_receiver: watch::Receiver<JoystickOutput>,
}

impl JoystickHandle {
    /// Spawns the supervision task.
    pub fn spawn(settings: JoystickSettings) -> Self {
        info!("Spawning joystick supervisor with settings: {:?}", settings);
        let (sender, output_receiver) = watch::channel(JoystickOutput::default());
        tokio::spawn(run_supervisor(settings, sender));
        Self { output_receiver }
    }

    /// A receiver for state snapshots. Receivers only observe values, they
    /// never block the supervisor.
    pub fn subscribe(&self) -> watch::Receiver<JoystickOutput> {
        self.output_receiver.clone()
    }
}

async fn run_supervisor(settings: JoystickSettings, sender: watch::Sender<JoystickOutput>) {
    let mut joystick = Joystick::with_deadzone(settings.deadzone);
    let mut poll = interval(Duration::from_millis(settings.poll_interval_ms.max(1)));
    let reconnect = Duration::from_millis(settings.reconnect_interval_ms.max(1));

    loop {
        if sender.is_closed() {
            info!("all joystick subscribers dropped, stopping supervisor");
            return;
        }

        if !joystick.is_initialized() {
            if joystick.initialize(&settings.device) {
                publish(&sender, &joystick);
                poll.reset();
            } else {
                debug!(
                    device = %settings.device.display(),
                    "joystick not present, retrying"
                );
                publish(&sender, &joystick);
                tokio::time::sleep(reconnect).await;
                continue;
            }
        }

        poll.tick().await;
        if !joystick.pump() {
            warn!("joystick became unusable, scheduling rediscovery");
        }
        publish(&sender, &joystick);
    }
}

/// Publishes the current state, notifying subscribers only when something
/// other than the timestamp changed.
fn publish(sender: &watch::Sender<JoystickOutput>, joystick: &Joystick) {
    sender.send_if_modified(|current| {
        let connected = joystick.is_initialized();
        let axes = joystick.axes();
        let buttons = joystick.buttons();
        if current.connected == connected && current.axes == axes && current.buttons == buttons {
            return false;
        }
        *current = JoystickOutput {
            connected,
            device_name: joystick.name().map(str::to_owned),
            axes,
            buttons,
            timestamp: Some(Local::now()),
        };
        true
    });
}
