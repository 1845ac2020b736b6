//! OS-backed engine.
//!
//! Loops wrap a [`polling::Poller`]. Descriptor-based kinds check their
//! descriptor with `fstat` before attaching; filesystem watchers require the
//! watched path to exist. Descriptors are borrowed, never closed.

use super::{Engine, InitTarget, Platform, Setup, perform};
use crate::config::AioConfig;
use crate::event_loop::{Loop, LoopRef};
use nix::errno::Errno;
use nix::sys::stat::SFlag;
use std::io;
use std::num::NonZeroUsize;
use std::os::unix::io::RawFd;
use std::path::Path;

/// Engine that talks to the operating system.
#[derive(Debug, Clone, Copy)]
pub struct NativeEngine {
    events_capacity: NonZeroUsize,
}

impl NativeEngine {
    /// Creates a native engine whose loops poll for up to `events_capacity`
    /// events per turn.
    #[must_use]
    pub const fn new(events_capacity: NonZeroUsize) -> Self {
        Self { events_capacity }
    }

    /// Creates a native engine sized from `config`.
    #[must_use]
    pub fn from_config(config: &AioConfig) -> Self {
        Self::new(config.events_capacity)
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::from_config(&AioConfig::default())
    }
}

impl Engine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn create_loop(&self, config: &AioConfig) -> io::Result<LoopRef> {
        Loop::native(config.events_capacity)
    }

    fn init(&self, target: InitTarget<'_>, setup: &Setup) -> i32 {
        perform(self, target, setup)
    }
}

impl Platform for NativeEngine {
    fn new_loop(&self) -> io::Result<LoopRef> {
        Loop::native(self.events_capacity)
    }

    fn check_poll_fd(&self, fd: i32) -> Result<(), i32> {
        match file_type(fd).map_err(errno_code)? {
            // epoll refuses regular files and directories.
            t if t == SFlag::S_IFREG || t == SFlag::S_IFDIR => Err(-libc::EPERM),
            _ => Ok(()),
        }
    }

    fn check_tty_fd(&self, fd: i32) -> Result<(), i32> {
        match file_type(fd).map_err(errno_code)? {
            t if t == SFlag::S_IFREG || t == SFlag::S_IFDIR => Err(-libc::EINVAL),
            _ => Ok(()),
        }
    }

    fn check_path(&self, path: &Path) -> Result<(), i32> {
        std::fs::symlink_metadata(path)
            .map(drop)
            .map_err(|err| err.raw_os_error().map_or(-libc::EIO, |errno| -errno))
    }
}

fn errno_code(errno: Errno) -> i32 {
    -(errno as i32)
}

/// File type bits of an open descriptor.
#[allow(unsafe_code)]
fn file_type(fd: RawFd) -> Result<SFlag, Errno> {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();
    // SAFETY: fstat only writes the out-parameter; a closed descriptor fails
    // with EBADF and leaves it untouched.
    let rc = unsafe { libc::fstat(fd, stat.as_mut_ptr()) };
    if rc < 0 {
        return Err(Errno::last());
    }
    // SAFETY: fully written by the successful fstat above.
    let stat = unsafe { stat.assume_init() };
    Ok(SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT)
}
