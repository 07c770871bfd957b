//! Bindings for the Linux joystick interface (`/dev/input/js*`).
//!
//! The kernel speaks a tiny protocol on these nodes: a handful of `JSIOCG*`
//! ioctls report capabilities and code tables, and every `read(2)` yields a
//! stream of fixed-size [`JsEvent`] records. All `unsafe` in the crate lives
//! here.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Event type bit: button state change.
pub const JS_EVENT_BUTTON: u8 = 0x01;
/// Event type bit: axis position change.
pub const JS_EVENT_AXIS: u8 = 0x02;
/// Event type bit: synthetic initial-state report sent right after open.
pub const JS_EVENT_INIT: u8 = 0x80;

/// Size of the kernel's axis code table (`ABS_CNT`).
pub const AXIS_MAP_LEN: usize = 0x40;
/// Size of the kernel's button code table (`KEY_MAX - BTN_MISC + 1`).
pub const BUTTON_MAP_LEN: usize = 0x2ff - 0x100 + 1;
/// Buffer size for the device display name query.
pub const NAME_LEN: usize = 128;

/// Builds a `_IOR('j', nr, len)` request code.
const fn jsioc_read(nr: u8, len: usize) -> libc::c_ulong {
    (2 << 30) | ((len as libc::c_ulong) << 16) | ((b'j' as libc::c_ulong) << 8) | nr as libc::c_ulong
}

/// Number of axes, one byte.
pub const JSIOCGAXES: libc::c_ulong = jsioc_read(0x11, 1);
/// Number of buttons, one byte.
pub const JSIOCGBUTTONS: libc::c_ulong = jsioc_read(0x12, 1);
/// Device display name, NUL-terminated.
pub const JSIOCGNAME: libc::c_ulong = jsioc_read(0x13, NAME_LEN);
/// Axis slot -> raw hardware code table.
pub const JSIOCGAXMAP: libc::c_ulong = jsioc_read(0x32, AXIS_MAP_LEN);
/// Button slot -> raw hardware code table.
pub const JSIOCGBTNMAP: libc::c_ulong = jsioc_read(0x34, BUTTON_MAP_LEN * 2);

/// One `js_event` record as the kernel writes it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsEvent {
    /// Event timestamp in milliseconds.
    pub time: u32,
    /// Raw value: 0/1 for buttons, -32767..32767 for axes.
    pub value: i16,
    /// Event type bits (`JS_EVENT_*`).
    pub kind: u8,
    /// Logical slot index of the control.
    pub number: u8,
}

impl JsEvent {
    /// Wire size of one record.
    pub const SIZE: usize = 8;

    /// Decodes one record. The kernel writes records in native byte order.
    pub fn from_bytes(raw: [u8; Self::SIZE]) -> Self {
        Self {
            time: u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]),
            value: i16::from_ne_bytes([raw[4], raw[5]]),
            kind: raw[6],
            number: raw[7],
        }
    }

    pub fn is_button(&self) -> bool {
        self.kind & JS_EVENT_BUTTON != 0
    }

    pub fn is_axis(&self) -> bool {
        self.kind & JS_EVENT_AXIS != 0
    }
}

/// Opens the device node read-only and non-blocking.
pub fn open_nonblocking(path: &Path) -> io::Result<OwnedFd> {
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains interior NUL"))?;
    // SAFETY: cpath is a valid NUL-terminated string for the duration of the call.
    let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDONLY | libc::O_NONBLOCK) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd was just returned by open(2) and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Runs a one-byte count query (`JSIOCGAXES` / `JSIOCGBUTTONS`).
pub fn count_query(fd: BorrowedFd<'_>, request: libc::c_ulong) -> io::Result<u8> {
    let mut count: u8 = 0;
    // SAFETY: request is a read ioctl that writes exactly one byte to count.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request, &mut count as *mut u8) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(count)
}

/// Queries the device display name.
pub fn device_name(fd: BorrowedFd<'_>) -> io::Result<String> {
    let mut raw = [0u8; NAME_LEN];
    // SAFETY: JSIOCGNAME writes at most NAME_LEN bytes into raw.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), JSIOCGNAME, raw.as_mut_ptr()) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..len]).into_owned())
}

/// Queries the axis slot -> raw code table.
pub fn axis_map(fd: BorrowedFd<'_>) -> io::Result<[u8; AXIS_MAP_LEN]> {
    let mut map = [0u8; AXIS_MAP_LEN];
    // SAFETY: JSIOCGAXMAP writes at most AXIS_MAP_LEN bytes into map.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), JSIOCGAXMAP, map.as_mut_ptr()) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(map)
}

/// Queries the button slot -> raw code table.
pub fn button_map(fd: BorrowedFd<'_>) -> io::Result<[u16; BUTTON_MAP_LEN]> {
    let mut map = [0u16; BUTTON_MAP_LEN];
    // SAFETY: JSIOCGBTNMAP writes at most BUTTON_MAP_LEN u16 entries into map.
    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), JSIOCGBTNMAP, map.as_mut_ptr()) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(map)
}

/// One non-blocking read into `buf`, returning the number of bytes read.
pub fn read_raw(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: the kernel writes at most buf.len() bytes into buf.
    let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn event_record_is_eight_bytes() {
        assert_eq!(mem::size_of::<JsEvent>(), JsEvent::SIZE);
        assert_eq!(JsEvent::SIZE, 8);
    }

    #[test]
    fn request_codes_match_kernel_values() {
        assert_eq!(JSIOCGAXES, 0x8001_6a11);
        assert_eq!(JSIOCGBUTTONS, 0x8001_6a12);
        assert_eq!(JSIOCGNAME, 0x8080_6a13);
        assert_eq!(JSIOCGAXMAP, 0x8040_6a32);
        assert_eq!(JSIOCGBTNMAP, 0x8400_6a34);
    }

    #[test]
    fn decodes_native_order_records() {
        let mut raw = [0u8; JsEvent::SIZE];
        raw[0..4].copy_from_slice(&123_456u32.to_ne_bytes());
        raw[4..6].copy_from_slice(&(-20_000i16).to_ne_bytes());
        raw[6] = JS_EVENT_AXIS;
        raw[7] = 3;

        let event = JsEvent::from_bytes(raw);
        assert_eq!(event.time, 123_456);
        assert_eq!(event.value, -20_000);
        assert_eq!(event.kind, JS_EVENT_AXIS);
        assert_eq!(event.number, 3);
    }

    #[test]
    fn type_bits_survive_the_init_flag() {
        let button = JsEvent {
            time: 0,
            value: 1,
            kind: JS_EVENT_BUTTON | JS_EVENT_INIT,
            number: 0,
        };
        assert!(button.is_button());
        assert!(!button.is_axis());

        let axis = JsEvent {
            time: 0,
            value: 0,
            kind: JS_EVENT_AXIS | JS_EVENT_INIT,
            number: 0,
        };
        assert!(axis.is_axis());
        assert!(!axis.is_button());
    }

    #[test]
    fn open_missing_node_errors() {
        let err = open_nonblocking(Path::new("/nonexistent/input/js99")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
