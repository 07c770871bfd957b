//! Device state: capability discovery, the event pump, and read-back.

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::path::Path;

use tracing::{debug, info, warn};

use super::deadzone::{rescale, AXIS_MAX};
use super::error::JoystickError;
use super::sys::{self, JsEvent};

/// Axis slots whose sign is flipped after normalization. The forward and tilt
/// axes on the reference hardware report positive when pulled back.
const INVERTED_AXES: [u8; 2] = [1, 5];

/// Upper bound on events consumed by one pump call; the kernel batches
/// pending events into a single read.
const EVENT_BATCH: usize = 64;

/// Deadzone tuning for the two control-surface groups.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeadzoneSettings {
    /// Fraction in [0.0, 1.0) applied to the locomotion axis pair.
    pub locomotion: f64,
    /// Fraction in [0.0, 1.0) applied to every remaining axis (the pan-tilt
    /// group).
    pub ptu: f64,
    /// Apply the rescale twice per event, compounding the dead band. Matches
    /// the long-standing behavior of the field implementation.
    pub double_pass: bool,
    /// Axis slots that make up the locomotion pair.
    pub locomotion_axes: [u8; 2],
}

impl Default for DeadzoneSettings {
    fn default() -> Self {
        Self {
            locomotion: 0.0,
            ptu: 0.0,
            double_pass: true,
            locomotion_axes: [0, 1],
        }
    }
}

/// Capabilities reported by the device at discovery.
#[derive(Clone, Debug)]
pub struct Capabilities {
    /// Display name from the driver.
    pub name: String,
    /// Number of axes, fixed for the life of the handle.
    pub axis_count: u8,
    /// Number of buttons, fixed for the life of the handle.
    pub button_count: u8,
}

/// A fully discovered device: handle, capabilities, code tables and the live
/// raw-value mirrors, all sized consistently.
#[derive(Debug)]
struct OpenDevice {
    fd: OwnedFd,
    capabilities: Capabilities,
    axis_codes: Vec<u8>,
    button_codes: Vec<u16>,
    axes: Vec<i32>,
    buttons: Vec<i16>,
}

impl OpenDevice {
    /// Applies one hardware event to the live mirrors. Initial-state events
    /// are treated the same as live updates. Events addressing slots outside
    /// the discovered range are dropped so the mirrors keep their discovery
    /// lengths.
    fn apply(&mut self, event: JsEvent, deadzone: &DeadzoneSettings) {
        if event.is_button() {
            let Some(slot) = self.buttons.get_mut(event.number as usize) else {
                debug!(slot = event.number, "button event outside discovered range");
                return;
            };
            *slot = event.value;
        } else if event.is_axis() {
            let number = event.number;
            let Some(slot) = self.axes.get_mut(number as usize) else {
                debug!(slot = number, "axis event outside discovered range");
                return;
            };
            let fraction = if deadzone.locomotion_axes.contains(&number) {
                deadzone.locomotion
            } else {
                deadzone.ptu
            };
            let mut value = rescale(i32::from(event.value), fraction, AXIS_MAX);
            if deadzone.double_pass {
                value = rescale(value, fraction, AXIS_MAX);
            }
            if INVERTED_AXES.contains(&number) {
                value = -value;
            }
            *slot = value;
        }
    }
}

/// Either everything about the device is known or nothing is; there is no
/// partially discovered state.
#[derive(Debug)]
enum DeviceState {
    Uninitialized,
    Initialized(OpenDevice),
}

/// Poll-able mirror of one joystick device.
///
/// Drive it with [`Joystick::initialize`] once and [`Joystick::pump`] on a
/// regular cadence; read values back between pump calls through the slot
/// accessors. One writer, any number of interleaved readers; concurrent use
/// from several threads needs external serialization.
///
/// The handle closes when the value drops, when discovery re-runs, and when
/// the pump hits a fatal read error.
#[derive(Debug)]
pub struct Joystick {
    state: DeviceState,
    deadzone: DeadzoneSettings,
}

impl Joystick {
    /// Creates an uninitialized joystick with no deadzone filtering.
    pub fn new() -> Self {
        Self::with_deadzone(DeadzoneSettings::default())
    }

    /// Creates an uninitialized joystick with the given deadzone tuning.
    pub fn with_deadzone(deadzone: DeadzoneSettings) -> Self {
        Self {
            state: DeviceState::Uninitialized,
            deadzone,
        }
    }

    /// Opens and discovers the device at `path`.
    ///
    /// Any prior handle and state are torn down first, whether or not the new
    /// device opens, so the call is safe to re-enter after failures. On error
    /// the component is left uninitialized with no handle open.
    pub fn try_initialize(&mut self, path: impl AsRef<Path>) -> Result<Capabilities, JoystickError> {
        let path = path.as_ref();

        // Dropping the old state closes the previous handle.
        self.state = DeviceState::Uninitialized;

        let fd = sys::open_nonblocking(path).map_err(|source| JoystickError::NotPresent {
            path: path.to_path_buf(),
            source,
        })?;

        let device = discover(fd, path)?;
        info!(
            name = %device.capabilities.name,
            axes = device.capabilities.axis_count,
            buttons = device.capabilities.button_count,
            "joystick initialized"
        );
        debug!(
            axis_codes = ?device.axis_codes,
            button_codes = ?device.button_codes,
            "raw code tables"
        );

        let capabilities = device.capabilities.clone();
        self.state = DeviceState::Initialized(device);
        Ok(capabilities)
    }

    /// Boolean facade over [`Joystick::try_initialize`]: logs the failure and
    /// reports it as `false`.
    pub fn initialize(&mut self, path: impl AsRef<Path>) -> bool {
        match self.try_initialize(path.as_ref()) {
            Ok(_) => true,
            Err(e) => {
                warn!("joystick initialization failed: {e}");
                false
            }
        }
    }

    /// Drains one batch of pending hardware events into the live mirrors.
    ///
    /// Returns whether the device is still usable. "No data available" is a
    /// normal poll outcome, not an error. Any other read error closes the
    /// handle and leaves the component uninitialized; every later call
    /// returns `false` until discovery is re-run.
    ///
    /// One call performs one read; a busy device may need several calls to
    /// drain, which a fixed pump cadence covers.
    pub fn pump(&mut self) -> bool {
        let DeviceState::Initialized(device) = &mut self.state else {
            return false;
        };

        let mut buf = [0u8; JsEvent::SIZE * EVENT_BATCH];
        match sys::read_raw(device.fd.as_fd(), &mut buf) {
            Ok(n) => {
                for chunk in buf[..n].chunks_exact(JsEvent::SIZE) {
                    let mut raw = [0u8; JsEvent::SIZE];
                    raw.copy_from_slice(chunk);
                    device.apply(JsEvent::from_bytes(raw), &self.deadzone);
                }
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => {
                warn!("fatal joystick read error, closing device: {e}");
                self.state = DeviceState::Uninitialized;
                false
            }
        }
    }

    /// Sets the deadzone fraction for the locomotion axis pair.
    pub fn set_deadzone_locomotion(&mut self, fraction: f64) {
        self.deadzone.locomotion = fraction;
    }

    /// Sets the deadzone fraction for the remaining (pan-tilt) axes.
    pub fn set_deadzone_ptu(&mut self, fraction: f64) {
        self.deadzone.ptu = fraction;
    }

    /// Current deadzone tuning.
    pub fn deadzone(&self) -> DeadzoneSettings {
        self.deadzone
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, DeviceState::Initialized(_))
    }

    /// Capabilities of the open device, `None` while uninitialized.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        match &self.state {
            DeviceState::Initialized(device) => Some(&device.capabilities),
            DeviceState::Uninitialized => None,
        }
    }

    /// Display name of the open device, `None` while uninitialized.
    pub fn name(&self) -> Option<&str> {
        self.capabilities().map(|c| c.name.as_str())
    }

    /// Raw hardware codes per axis slot, for a naming collaborator. Empty
    /// while uninitialized.
    pub fn axis_codes(&self) -> &[u8] {
        match &self.state {
            DeviceState::Initialized(device) => &device.axis_codes,
            DeviceState::Uninitialized => &[],
        }
    }

    /// Raw hardware codes per button slot, for a naming collaborator. Empty
    /// while uninitialized.
    pub fn button_codes(&self) -> &[u16] {
        match &self.state {
            DeviceState::Initialized(device) => &device.button_codes,
            DeviceState::Uninitialized => &[],
        }
    }

    /// Pressed state of one button. `false` when uninitialized or when the
    /// slot is out of range.
    pub fn button(&self, slot: usize) -> bool {
        match &self.state {
            DeviceState::Initialized(device) => {
                device.buttons.get(slot).is_some_and(|v| *v != 0)
            }
            DeviceState::Uninitialized => false,
        }
    }

    /// Pressed states in slot order; empty while uninitialized.
    pub fn buttons(&self) -> Vec<bool> {
        match &self.state {
            DeviceState::Initialized(device) => device.buttons.iter().map(|v| *v != 0).collect(),
            DeviceState::Uninitialized => Vec::new(),
        }
    }

    /// Position of one axis scaled to about [-1.0, 1.0]. NaN when
    /// uninitialized or when the slot is out of range.
    pub fn axis(&self, slot: usize) -> f64 {
        match &self.state {
            DeviceState::Initialized(device) => device
                .axes
                .get(slot)
                .map_or(f64::NAN, |v| f64::from(*v) / f64::from(AXIS_MAX)),
            DeviceState::Uninitialized => f64::NAN,
        }
    }

    /// Axis positions in slot order; empty while uninitialized.
    pub fn axes(&self) -> Vec<f64> {
        match &self.state {
            DeviceState::Initialized(device) => device
                .axes
                .iter()
                .map(|v| f64::from(*v) / f64::from(AXIS_MAX))
                .collect(),
            DeviceState::Uninitialized => Vec::new(),
        }
    }
}

impl Default for Joystick {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the capability and mapping queries in protocol order. All-or-nothing:
/// the first failing query aborts discovery and the handle closes when `fd`
/// drops.
fn discover(fd: OwnedFd, path: &Path) -> Result<OpenDevice, JoystickError> {
    let fail = |query: &'static str, source: io::Error| JoystickError::CapabilityQuery {
        query,
        path: path.to_path_buf(),
        source,
    };

    let axis_count =
        sys::count_query(fd.as_fd(), sys::JSIOCGAXES).map_err(|e| fail("JSIOCGAXES", e))?;
    let button_count =
        sys::count_query(fd.as_fd(), sys::JSIOCGBUTTONS).map_err(|e| fail("JSIOCGBUTTONS", e))?;
    let name = sys::device_name(fd.as_fd()).map_err(|e| fail("JSIOCGNAME", e))?;
    let axis_map = sys::axis_map(fd.as_fd()).map_err(|e| fail("JSIOCGAXMAP", e))?;
    let button_map = sys::button_map(fd.as_fd()).map_err(|e| fail("JSIOCGBTNMAP", e))?;

    // The driver cannot report more slots than its code tables hold.
    let axes = usize::from(axis_count).min(sys::AXIS_MAP_LEN);
    let buttons = usize::from(button_count).min(sys::BUTTON_MAP_LEN);

    Ok(OpenDevice {
        fd,
        capabilities: Capabilities {
            name,
            axis_count: axes as u8,
            button_count: buttons as u8,
        },
        axis_codes: axis_map[..axes].to_vec(),
        button_codes: button_map[..buttons].to_vec(),
        axes: vec![0; axes],
        buttons: vec![0; buttons],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joystick::sys::{JS_EVENT_AXIS, JS_EVENT_BUTTON, JS_EVENT_INIT};
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    fn event_bytes(kind: u8, number: u8, value: i16) -> [u8; JsEvent::SIZE] {
        let mut raw = [0u8; JsEvent::SIZE];
        raw[4..6].copy_from_slice(&value.to_ne_bytes());
        raw[6] = kind;
        raw[7] = number;
        raw
    }

    /// A joystick in the initialized state whose "device" is one end of a
    /// socket pair, so tests can feed it wire records through the other end.
    fn joystick_over(fd: OwnedFd, axis_count: u8, button_count: u8) -> Joystick {
        Joystick {
            state: DeviceState::Initialized(OpenDevice {
                fd,
                capabilities: Capabilities {
                    name: "Test Pad".into(),
                    axis_count,
                    button_count,
                },
                axis_codes: (0..axis_count).collect(),
                button_codes: (0x120..0x120 + u16::from(button_count)).collect(),
                axes: vec![0; usize::from(axis_count)],
                buttons: vec![0; usize::from(button_count)],
            }),
            deadzone: DeadzoneSettings::default(),
        }
    }

    fn socket_device(axis_count: u8, button_count: u8) -> (Joystick, UnixStream) {
        let (device_end, test_end) = UnixStream::pair().unwrap();
        device_end.set_nonblocking(true).unwrap();
        (
            joystick_over(OwnedFd::from(device_end), axis_count, button_count),
            test_end,
        )
    }

    #[test]
    fn uninitialized_is_inert() {
        let mut joystick = Joystick::new();
        assert!(!joystick.is_initialized());
        assert!(!joystick.pump());
        assert!(!joystick.button(0));
        assert!(joystick.axis(0).is_nan());
        assert!(joystick.axes().is_empty());
        assert!(joystick.buttons().is_empty());
        assert!(joystick.axis_codes().is_empty());
        assert!(joystick.button_codes().is_empty());
        assert!(joystick.name().is_none());
    }

    #[test]
    fn failed_discovery_leaves_uninitialized() {
        let mut joystick = Joystick::new();
        assert!(!joystick.initialize("/nonexistent/input/js99"));
        assert!(!joystick.is_initialized());
        assert!(!joystick.pump());
        assert!(joystick.axis(0).is_nan());

        let err = joystick
            .try_initialize("/nonexistent/input/js99")
            .unwrap_err();
        assert!(matches!(err, JoystickError::NotPresent { .. }));
    }

    #[test]
    fn button_then_axis_scenario() {
        // 4 axes, 8 buttons, locomotion deadzone 0.2 applied twice.
        let (mut joystick, mut feeder) = socket_device(4, 8);
        joystick.set_deadzone_locomotion(0.2);

        feeder
            .write_all(&event_bytes(JS_EVENT_BUTTON, 2, 1))
            .unwrap();
        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 0, 20_000))
            .unwrap();

        assert!(joystick.pump());
        assert!(joystick.button(2));
        assert!(!joystick.button(0));

        let expected = f64::from(rescale(rescale(20_000, 0.2, AXIS_MAX), 0.2, AXIS_MAX))
            / f64::from(AXIS_MAX);
        assert_eq!(joystick.axis(0), expected);
        assert!((joystick.axis(0) - 0.391_19).abs() < 1e-4);
    }

    #[test]
    fn batch_applies_in_order_last_write_wins() {
        let (mut joystick, mut feeder) = socket_device(4, 8);

        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 2, 100))
            .unwrap();
        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 2, -200))
            .unwrap();
        feeder.write_all(&event_bytes(JS_EVENT_BUTTON, 3, 1)).unwrap();
        feeder.write_all(&event_bytes(JS_EVENT_BUTTON, 3, 0)).unwrap();

        assert!(joystick.pump());
        assert_eq!(joystick.axis(2), -200.0 / f64::from(AXIS_MAX));
        assert!(!joystick.button(3));
    }

    #[test]
    fn reversed_axes_flip_sign() {
        let (mut joystick, mut feeder) = socket_device(6, 2);

        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 5, 1000))
            .unwrap();
        assert!(joystick.pump());
        assert_eq!(joystick.axis(5), -1000.0 / f64::from(AXIS_MAX));
    }

    #[test]
    fn initial_state_events_apply_like_live_ones() {
        let (mut joystick, mut feeder) = socket_device(4, 8);

        feeder
            .write_all(&event_bytes(JS_EVENT_BUTTON | JS_EVENT_INIT, 7, 1))
            .unwrap();
        assert!(joystick.pump());
        assert!(joystick.button(7));
    }

    #[test]
    fn out_of_range_slots_are_discarded() {
        let (mut joystick, mut feeder) = socket_device(4, 8);

        feeder
            .write_all(&event_bytes(JS_EVENT_BUTTON, 250, 1))
            .unwrap();
        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 99, 5000))
            .unwrap();

        assert!(joystick.pump());
        assert_eq!(joystick.buttons(), vec![false; 8]);
        assert_eq!(joystick.axes(), vec![0.0; 4]);
    }

    #[test]
    fn trailing_partial_record_is_ignored() {
        let (mut joystick, mut feeder) = socket_device(4, 8);

        feeder
            .write_all(&event_bytes(JS_EVENT_BUTTON, 1, 1))
            .unwrap();
        feeder.write_all(&[0u8; 3]).unwrap();

        assert!(joystick.pump());
        assert!(joystick.button(1));
    }

    #[test]
    fn no_data_keeps_device_usable() {
        let (mut joystick, _feeder) = socket_device(4, 8);

        assert!(joystick.pump());
        assert!(joystick.is_initialized());
        assert_eq!(joystick.axes(), vec![0.0; 4]);
        assert_eq!(joystick.buttons(), vec![false; 8]);
    }

    #[test]
    fn closed_peer_reads_zero_events_and_stays_usable() {
        let (mut joystick, feeder) = socket_device(4, 8);
        drop(feeder);

        assert!(joystick.pump());
        assert!(joystick.is_initialized());
    }

    #[test]
    fn fatal_read_error_uninitializes() {
        // Reading a directory fd fails with EISDIR, which is not WouldBlock.
        let dir = File::open("/").unwrap();
        let mut joystick = joystick_over(OwnedFd::from(dir), 4, 8);

        assert!(!joystick.pump());
        assert!(!joystick.is_initialized());
        assert!(!joystick.pump());
        assert!(!joystick.button(0));
        assert!(joystick.axis(0).is_nan());
    }

    #[test]
    fn accessor_lengths_match_capabilities() {
        let (joystick, _feeder) = socket_device(6, 11);
        assert_eq!(joystick.axes().len(), 6);
        assert_eq!(joystick.buttons().len(), 11);
        assert_eq!(joystick.axis_codes().len(), 6);
        assert_eq!(joystick.button_codes().len(), 11);
        assert!(joystick.axes().iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(joystick.name(), Some("Test Pad"));
    }

    #[test]
    fn slot_equal_to_count_is_out_of_range() {
        let (joystick, _feeder) = socket_device(4, 8);
        assert!(!joystick.button(8));
        assert!(joystick.axis(4).is_nan());
    }

    #[test]
    fn ptu_group_uses_its_own_fraction() {
        let (mut joystick, mut feeder) = socket_device(6, 2);
        joystick.set_deadzone_locomotion(0.9);
        joystick.set_deadzone_ptu(0.0);

        // Slot 3 sits outside the default locomotion pair: no dead band.
        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 3, 2000))
            .unwrap();
        // Slot 0 is locomotion: 2000 disappears inside the 90% band.
        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 0, 2000))
            .unwrap();

        assert!(joystick.pump());
        assert_eq!(joystick.axis(3), 2000.0 / f64::from(AXIS_MAX));
        assert_eq!(joystick.axis(0), 0.0);
    }

    #[test]
    fn single_pass_skips_the_compounding() {
        let (mut joystick, mut feeder) = socket_device(4, 2);
        joystick.deadzone = DeadzoneSettings {
            locomotion: 0.2,
            double_pass: false,
            ..DeadzoneSettings::default()
        };

        feeder
            .write_all(&event_bytes(JS_EVENT_AXIS, 0, 20_000))
            .unwrap();
        assert!(joystick.pump());
        assert_eq!(
            joystick.axis(0),
            f64::from(rescale(20_000, 0.2, AXIS_MAX)) / f64::from(AXIS_MAX)
        );
    }
}
