//! Reset, shutdown and failure-mode semantics for the hosted build.
//!
//! A flight controller never just exits. Reset re-launches the process with
//! the arguments it was started with, the way a watchdog reset reboots the
//! board; only the persisted configuration survives. Failure mode locks up
//! and keeps signalling instead of unwinding.
//!
//! Reset and reset-to-bootloader do not act directly. They produce a
//! [`SystemRequest`] that the hosting entry point carries out, so callers
//! stay testable.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io;
use std::process;
use tracing::{error, info};

/// Failure mode re-reports its code this often while halted.
pub const FAILURE_REPORT_INTERVAL_S: u32 = 10;

#[cfg(unix)]
const FALLBACK_DESCRIPTOR_LIMIT: i32 = 1024;
/// Upper bound of the close loop used where close_range is unavailable.
#[cfg(unix)]
const MAX_DESCRIPTOR_SWEEP: i32 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FailureMode {
    Developer = 0,
    MissingAcc = 1,
    AccInit = 2,
    AccIncompatible = 3,
    InvalidEepromContents = 4,
    FlashWriteFailed = 5,
    GyroInitFailed = 6,
    FlashReadFailed = 7,
}

impl FailureMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The command line exactly as the process received it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchArgs(Vec<OsString>);

impl LaunchArgs {
    pub fn capture() -> Self {
        Self(std::env::args_os().collect())
    }

    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[OsString] {
        &self.0
    }

    pub fn program(&self) -> Option<&OsString> {
        self.0.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    args: LaunchArgs,
}

impl RestartRequest {
    pub fn args(&self) -> &LaunchArgs {
        &self.args
    }

    /// Close every descriptor above the standard three and replace the
    /// process image. Exits with status 1 if the exec itself fails.
    pub fn perform(self) -> ! {
        close_inherited_descriptors();
        let err = exec(&self.args);
        error!("[SYSTEM] Restart failed: {}", err);
        process::exit(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemRequest {
    Restart(RestartRequest),
    Shutdown,
}

impl SystemRequest {
    pub fn perform(self) -> ! {
        match self {
            SystemRequest::Restart(restart) => restart.perform(),
            SystemRequest::Shutdown => process::exit(0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    args: LaunchArgs,
}

impl Lifecycle {
    pub fn new(args: LaunchArgs) -> Self {
        Self { args }
    }

    pub fn launch_args(&self) -> &LaunchArgs {
        &self.args
    }

    pub fn reset(&self) -> SystemRequest {
        info!("[SYSTEM] Reset");
        SystemRequest::Restart(RestartRequest {
            args: self.args.clone(),
        })
    }

    /// There is no bootloader on a host; this is a clean shutdown.
    pub fn reset_to_bootloader(&self) -> SystemRequest {
        info!("[SYSTEM] Reset to bootloader");
        SystemRequest::Shutdown
    }
}

/// Halt forever, reporting `mode` on the error channel.
///
/// Sleeps between reports and never unwinds or cleans up.
pub fn failure_mode(clock: &Clock, mode: FailureMode) -> ! {
    error!("[SYSTEM] Failure mode {}", mode.code());

    let mut halted_s: u32 = 0;
    loop {
        clock.sleep_millis(1000);
        halted_s = halted_s.wrapping_add(1);
        if halted_s % FAILURE_REPORT_INTERVAL_S == 0 {
            error!("[SYSTEM] Failure mode {} ({} s)", mode.code(), halted_s);
        }
    }
}

/// The host environment cannot support the firmware at all.
pub fn fatal(message: &str) -> ! {
    error!("[SYSTEM] {}", message);
    process::exit(1)
}

#[cfg(unix)]
fn close_inherited_descriptors() {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: close_range only closes descriptors; the process image
        // is replaced right after and nothing reads them again.
        let (first, last, flags): (libc::c_uint, libc::c_uint, libc::c_uint) = (3, libc::c_uint::MAX, 0);
        let closed = unsafe { libc::syscall(libc::SYS_close_range, first, last, flags) };
        if closed == 0 {
            return;
        }
        // kernels before 5.9 lack close_range
    }

    close_descriptors_up_to(descriptor_limit());
}

#[cfg(unix)]
fn descriptor_limit() -> i32 {
    // SAFETY: sysconf has no preconditions
    let limit = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if limit <= 0 {
        FALLBACK_DESCRIPTOR_LIMIT
    } else {
        limit.min(MAX_DESCRIPTOR_SWEEP as libc::c_long) as i32
    }
}

#[cfg(unix)]
fn close_descriptors_up_to(limit: i32) {
    for fd in 3..limit {
        // SAFETY: the process image is replaced right after; nothing reads
        // these descriptors again. EBADF on unused slots is expected.
        unsafe {
            libc::close(fd);
        }
    }
}

#[cfg(not(unix))]
fn close_inherited_descriptors() {}

#[cfg(unix)]
fn exec(args: &LaunchArgs) -> io::Error {
    use std::os::unix::process::CommandExt;

    let mut argv = args.as_slice().iter();
    match argv.next() {
        Some(program) => process::Command::new(program).args(argv).exec(),
        None => io::Error::new(io::ErrorKind::InvalidInput, "empty launch arguments"),
    }
}

#[cfg(not(unix))]
fn exec(args: &LaunchArgs) -> io::Error {
    let mut argv = args.as_slice().iter();
    match argv.next() {
        Some(program) => match process::Command::new(program).args(argv).spawn() {
            Ok(_) => process::exit(0),
            Err(e) => e,
        },
        None => io::Error::new(io::ErrorKind::InvalidInput, "empty launch arguments"),
    }
}
