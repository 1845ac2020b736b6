//! The engine seam.
//!
//! An [`Engine`] performs the per-kind setup calls the initialization protocol
//! drives. Callers never hand an engine raw positional arguments: validated
//! arguments are first turned into a typed [`Setup`], one variant per
//! initializable kind, so the exact argument order and types each setup call
//! needs are fixed by the type system.
//!
//! Engines report status the way libuv does: zero or a positive value is
//! success, a negative value is `-errno`. [`succeeded`] is the only place that
//! polarity is encoded.
//!
//! - [`native`]: OS-backed engine
//! - [`lab`]: deterministic engine with failure injection
//! - [`sync`]: synchronization primitives handed out by both engines

pub mod lab;
pub mod native;
pub mod sync;

pub use lab::{LabEngine, SetupCall};
pub use native::NativeEngine;

use crate::config::AioConfig;
use crate::error::AioError;
use crate::event_loop::{Callback, LoopRef, LoopRegistration};
use crate::kind::{BoundArgs, Kind, SignatureError};
use crate::storage::{COUNT_OFFSET, FLAGS_OFFSET, LOOP_ID_OFFSET, Storage};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Returns `true` if an engine status code reports success.
#[must_use]
pub const fn succeeded(code: i32) -> bool {
    code >= 0
}

/// Largest initial semaphore value the engine accepts (`SEM_VALUE_MAX`).
pub const SEM_VALUE_MAX: u32 = i32::MAX as u32;

/// Name of the setup operation for `kind`, as reported in errors.
#[must_use]
pub const fn operation_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Aio => "aio_init",
        Kind::Loop => "loop_init",
        Kind::Tcp => "tcp_init",
        Kind::Udp => "udp_init",
        Kind::Tty => "tty_init",
        Kind::Pipe => "pipe_init",
        Kind::Poll => "poll_init",
        Kind::Prepare => "prepare_init",
        Kind::Check => "check_init",
        Kind::Idle => "idle_init",
        Kind::Async => "async_init",
        Kind::Timer => "timer_init",
        Kind::FsPoll => "fs_poll_init",
        Kind::Signal => "signal_init",
        Kind::FsEvent => "fs_event_init",
        Kind::Handle => "handle_init",
        Kind::Process => "process_init",
        Kind::Stream => "stream_init",
        Kind::Req => "req_init",
        Kind::Connect => "connect_init",
        Kind::Write => "write_init",
        Kind::Shutdown => "shutdown_init",
        Kind::UdpSend => "udp_send_init",
        Kind::Fs => "fs_init",
        Kind::Work => "work_init",
        Kind::GetAddrInfo => "getaddrinfo_init",
        Kind::CpuInfo => "cpu_info_init",
        Kind::InterfaceAddress => "interface_address_init",
        Kind::Mutex => "mutex_init",
        Kind::RwLock => "rwlock_init",
        Kind::Sem => "sem_init",
        Kind::Cond => "cond_init",
        Kind::Barrier => "barrier_init",
    }
}

/// Typed arguments for one engine setup call.
#[derive(Debug, Clone)]
pub enum Setup {
    /// Create a new loop.
    Loop,
    /// A handle whose only argument is its loop (tcp, udp, prepare, check,
    /// idle, timer, fs_poll, signal).
    Handle {
        /// Handle kind.
        kind: Kind,
        /// Loop to attach to.
        lp: LoopRef,
    },
    /// Terminal handle over an existing descriptor.
    Tty {
        /// Loop to attach to.
        lp: LoopRef,
        /// Descriptor; not owned.
        fd: i32,
        /// Whether the terminal is read from.
        readable: bool,
    },
    /// Pipe handle.
    Pipe {
        /// Loop to attach to.
        lp: LoopRef,
        /// Whether the pipe passes handles between processes.
        ipc: bool,
    },
    /// Descriptor readiness watcher.
    Poll {
        /// Loop to attach to.
        lp: LoopRef,
        /// Descriptor; not owned.
        fd: i32,
    },
    /// Cross-thread wakeup handle.
    Async {
        /// Loop to attach to.
        lp: LoopRef,
        /// Run on the loop after each send.
        callback: Callback,
    },
    /// Filesystem watcher.
    FsEvent {
        /// Loop to attach to.
        lp: LoopRef,
        /// Watched path.
        path: PathBuf,
        /// Run on each change.
        callback: Callback,
        /// Watch flags.
        flags: u32,
    },
    /// Mutex.
    Mutex,
    /// Reader-writer lock.
    RwLock,
    /// Semaphore with an initial value.
    Sem {
        /// Initial permit count.
        value: u32,
    },
    /// Condition variable.
    Cond,
    /// Barrier for `count` threads.
    Barrier {
        /// Participant count.
        count: u32,
    },
}

impl Setup {
    /// Builds the setup call for `kind` from validated arguments.
    ///
    /// `lp` is the resolved loop; it must be present for every kind whose
    /// signature takes one.
    pub fn build(kind: Kind, args: &BoundArgs, lp: Option<LoopRef>) -> Result<Self, AioError> {
        let need_loop = || {
            lp.clone().ok_or(SignatureError::Missing {
                kind,
                param: "loop",
            })
        };

        let setup = match kind {
            Kind::Loop => Self::Loop,
            Kind::Tcp
            | Kind::Udp
            | Kind::Prepare
            | Kind::Check
            | Kind::Idle
            | Kind::Timer
            | Kind::FsPoll
            | Kind::Signal => Self::Handle {
                kind,
                lp: need_loop()?,
            },
            Kind::Tty => Self::Tty {
                lp: need_loop()?,
                fd: args.fd("file")?,
                readable: args.flag("readable")?,
            },
            Kind::Pipe => Self::Pipe {
                lp: need_loop()?,
                ipc: args.flag("ipc")?,
            },
            Kind::Poll => Self::Poll {
                lp: need_loop()?,
                fd: args.fd("fd")?,
            },
            Kind::Async => Self::Async {
                lp: need_loop()?,
                callback: args.callback("cb")?,
            },
            Kind::FsEvent => Self::FsEvent {
                lp: need_loop()?,
                path: PathBuf::from(args.string("filename")?),
                callback: args.callback("cb")?,
                flags: args.count("flags")?,
            },
            Kind::Mutex => Self::Mutex,
            Kind::RwLock => Self::RwLock,
            Kind::Sem => Self::Sem {
                value: args.count("value")?,
            },
            Kind::Cond => Self::Cond,
            Kind::Barrier => Self::Barrier {
                count: args.count("count")?,
            },
            Kind::Aio
            | Kind::Handle
            | Kind::Process
            | Kind::Stream
            | Kind::Req
            | Kind::Connect
            | Kind::Write
            | Kind::Shutdown
            | Kind::UdpSend
            | Kind::Fs
            | Kind::Work
            | Kind::GetAddrInfo
            | Kind::CpuInfo
            | Kind::InterfaceAddress => return Err(AioError::UnsupportedKind { kind }),
        };
        Ok(setup)
    }

    /// The kind this call initializes.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Loop => Kind::Loop,
            Self::Handle { kind, .. } => *kind,
            Self::Tty { .. } => Kind::Tty,
            Self::Pipe { .. } => Kind::Pipe,
            Self::Poll { .. } => Kind::Poll,
            Self::Async { .. } => Kind::Async,
            Self::FsEvent { .. } => Kind::FsEvent,
            Self::Mutex => Kind::Mutex,
            Self::RwLock => Kind::RwLock,
            Self::Sem { .. } => Kind::Sem,
            Self::Cond => Kind::Cond,
            Self::Barrier { .. } => Kind::Barrier,
        }
    }

    /// Operation name reported if the call fails.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        operation_name(self.kind())
    }

    /// The loop the call attaches to, if any.
    #[must_use]
    pub fn event_loop(&self) -> Option<&LoopRef> {
        match self {
            Self::Handle { lp, .. }
            | Self::Tty { lp, .. }
            | Self::Pipe { lp, .. }
            | Self::Poll { lp, .. }
            | Self::Async { lp, .. }
            | Self::FsEvent { lp, .. } => Some(lp),
            Self::Loop
            | Self::Mutex
            | Self::RwLock
            | Self::Sem { .. }
            | Self::Cond
            | Self::Barrier { .. } => None,
        }
    }
}

/// Engine-side state acquired by a successful setup call and owned by the
/// object. Dropping it releases everything it holds.
pub enum Resource {
    /// A loop created for a `loop` object.
    Loop(LoopRef),
    /// Attachment of a handle to its loop.
    Handle(LoopRegistration),
    /// Attachment of a descriptor-backed handle. The descriptor is not owned.
    Descriptor {
        /// Loop attachment.
        registration: LoopRegistration,
        /// Borrowed descriptor.
        fd: i32,
    },
    /// Attachment of a filesystem watcher.
    Watch {
        /// Loop attachment.
        registration: LoopRegistration,
        /// Watched path.
        path: PathBuf,
        /// Watch flags.
        flags: u32,
    },
    /// Mutex.
    Mutex(Arc<sync::Mutex>),
    /// Reader-writer lock.
    RwLock(Arc<sync::RwLock>),
    /// Semaphore.
    Semaphore(Arc<sync::Semaphore>),
    /// Condition variable.
    Cond(Arc<sync::Condvar>),
    /// Barrier.
    Barrier(Arc<sync::Barrier>),
}

impl Resource {
    /// The loop registration, for handle resources.
    #[must_use]
    pub fn registration(&self) -> Option<&LoopRegistration> {
        match self {
            Self::Handle(registration)
            | Self::Descriptor { registration, .. }
            | Self::Watch { registration, .. } => Some(registration),
            _ => None,
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loop(lp) => f.debug_tuple("Loop").field(&lp.id()).finish(),
            Self::Handle(registration) => f.debug_tuple("Handle").field(registration).finish(),
            Self::Descriptor { registration, fd } => f
                .debug_struct("Descriptor")
                .field("registration", registration)
                .field("fd", fd)
                .finish(),
            Self::Watch {
                registration,
                path,
                flags,
            } => f
                .debug_struct("Watch")
                .field("registration", registration)
                .field("path", path)
                .field("flags", flags)
                .finish(),
            Self::Mutex(_) => f.write_str("Mutex"),
            Self::RwLock(_) => f.write_str("RwLock"),
            Self::Semaphore(sem) => f.debug_tuple("Semaphore").field(&sem.value()).finish(),
            Self::Cond(_) => f.write_str("Cond"),
            Self::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

/// What a setup call may write: the object's storage and its resource slot.
#[derive(Debug)]
pub struct InitTarget<'a> {
    /// The object's zeroed storage block.
    pub storage: &'a mut Storage,
    /// Filled in on success.
    pub resource: &'a mut Option<Resource>,
}

/// An event-loop engine.
pub trait Engine: Send + Sync + fmt::Debug {
    /// Engine name, for logs.
    fn name(&self) -> &'static str;

    /// Creates a loop. Used for the context's default loop and for explicit
    /// loops the host asks for.
    fn create_loop(&self, config: &AioConfig) -> io::Result<LoopRef>;

    /// Performs one setup call against `target` and returns its status code.
    ///
    /// A failing call must leave `target.resource` empty.
    fn init(&self, target: InitTarget<'_>, setup: &Setup) -> i32;
}

/// OS checks a setup call depends on. Each returns `Err(-errno)` on failure.
pub(crate) trait Platform {
    fn new_loop(&self) -> io::Result<LoopRef>;
    fn check_poll_fd(&self, fd: i32) -> Result<(), i32>;
    fn check_tty_fd(&self, fd: i32) -> Result<(), i32>;
    fn check_path(&self, path: &Path) -> Result<(), i32>;
}

fn io_code(err: &io::Error) -> i32 {
    err.raw_os_error().map_or(-libc::EIO, |errno| -errno)
}

/// Records the loop id and flags word in a handle's header, then attaches it.
fn attach(
    storage: &mut Storage,
    lp: &LoopRef,
    kind: Kind,
    flags: u64,
    callback: Option<Callback>,
) -> Result<LoopRegistration, i32> {
    if !(storage.write_u64(LOOP_ID_OFFSET, lp.id().as_u64())
        && storage.write_u64(FLAGS_OFFSET, flags))
    {
        return Err(-libc::EINVAL);
    }
    Ok(lp.attach(kind, callback))
}

/// The setup algorithm shared by every engine.
pub(crate) fn perform(platform: &impl Platform, target: InitTarget<'_>, setup: &Setup) -> i32 {
    match try_perform(platform, target.storage, setup) {
        Ok(resource) => {
            *target.resource = Some(resource);
            0
        }
        Err(code) => code,
    }
}

fn try_perform(
    platform: &impl Platform,
    storage: &mut Storage,
    setup: &Setup,
) -> Result<Resource, i32> {
    let resource = match setup {
        Setup::Loop => {
            let lp = platform.new_loop().map_err(|err| io_code(&err))?;
            if !storage.write_u64(LOOP_ID_OFFSET, lp.id().as_u64()) {
                return Err(-libc::EINVAL);
            }
            Resource::Loop(lp)
        }
        Setup::Handle { kind, lp } => Resource::Handle(attach(storage, lp, *kind, 0, None)?),
        Setup::Tty { lp, fd, readable } => {
            platform.check_tty_fd(*fd)?;
            let registration = attach(storage, lp, Kind::Tty, u64::from(*readable), None)?;
            Resource::Descriptor {
                registration,
                fd: *fd,
            }
        }
        Setup::Pipe { lp, ipc } => {
            Resource::Handle(attach(storage, lp, Kind::Pipe, u64::from(*ipc), None)?)
        }
        Setup::Poll { lp, fd } => {
            platform.check_poll_fd(*fd)?;
            let registration = attach(storage, lp, Kind::Poll, 0, None)?;
            Resource::Descriptor {
                registration,
                fd: *fd,
            }
        }
        Setup::Async { lp, callback } => {
            Resource::Handle(attach(storage, lp, Kind::Async, 0, Some(callback.clone()))?)
        }
        Setup::FsEvent {
            lp,
            path,
            callback,
            flags,
        } => {
            if path.as_os_str().is_empty() {
                return Err(-libc::EINVAL);
            }
            platform.check_path(path)?;
            let registration = attach(
                storage,
                lp,
                Kind::FsEvent,
                u64::from(*flags),
                Some(callback.clone()),
            )?;
            Resource::Watch {
                registration,
                path: path.clone(),
                flags: *flags,
            }
        }
        Setup::Mutex => Resource::Mutex(Arc::new(sync::Mutex::new(()))),
        Setup::RwLock => Resource::RwLock(Arc::new(sync::RwLock::new(()))),
        Setup::Cond => Resource::Cond(Arc::new(sync::Condvar::new())),
        Setup::Sem { value } => {
            if *value > SEM_VALUE_MAX || !storage.write_u64(COUNT_OFFSET, u64::from(*value)) {
                return Err(-libc::EINVAL);
            }
            Resource::Semaphore(Arc::new(sync::Semaphore::new(*value)))
        }
        Setup::Barrier { count } => {
            let participants = usize::try_from(*count).map_err(|_| -libc::EINVAL)?;
            if participants == 0 || !storage.write_u64(COUNT_OFFSET, u64::from(*count)) {
                return Err(-libc::EINVAL);
            }
            Resource::Barrier(Arc::new(sync::Barrier::new(participants)))
        }
    };
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::Loop;
    use crate::kind::{KindRegistry, Value};

    fn bind(kind: Kind, args: &[Value]) -> BoundArgs {
        let registry = KindRegistry::standard();
        let sig = registry
            .lookup(kind)
            .and_then(|d| d.signature)
            .expect("signature");
        sig.bind(kind, args).expect("bind")
    }

    #[test]
    fn polarity_follows_errno_convention() {
        assert!(succeeded(0));
        assert!(succeeded(1));
        assert!(!succeeded(-libc::ENOENT));
        assert!(!succeeded(i32::MIN));
    }

    #[test]
    fn every_kind_has_an_operation_name() {
        for kind in Kind::ALL {
            let name = operation_name(kind);
            assert!(name.starts_with(kind.name()), "{name}");
            assert!(name.ends_with("_init"), "{name}");
        }
    }

    #[test]
    fn build_routes_loop_only_handles() {
        let lp = Loop::virtual_loop();
        let args = bind(Kind::Timer, &[]);
        let setup = Setup::build(Kind::Timer, &args, Some(Arc::clone(&lp))).expect("build");
        assert_eq!(setup.kind(), Kind::Timer);
        assert_eq!(setup.operation(), "timer_init");
        assert!(Arc::ptr_eq(setup.event_loop().expect("loop"), &lp));
    }

    #[test]
    fn build_without_loop_for_handle_is_missing_loop() {
        let args = bind(Kind::Tcp, &[]);
        let err = Setup::build(Kind::Tcp, &args, None).expect_err("no loop");
        assert!(matches!(
            err,
            AioError::Signature(SignatureError::Missing { param: "loop", .. })
        ));
    }

    #[test]
    fn build_rejects_kinds_without_setup() {
        let args = bind(Kind::Tcp, &[]);
        for kind in [Kind::Write, Kind::Stream, Kind::Aio, Kind::CpuInfo] {
            let err = Setup::build(kind, &args, None).expect_err("unsupported");
            assert_eq!(err, AioError::UnsupportedKind { kind });
        }
    }

    #[test]
    fn sync_setups_take_no_loop() {
        let args = bind(Kind::Barrier, &crate::args![3]);
        let setup = Setup::build(Kind::Barrier, &args, None).expect("build");
        assert!(setup.event_loop().is_none());
        assert!(matches!(setup, Setup::Barrier { count: 3 }));
    }
}
