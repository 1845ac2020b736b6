//! Kind tags for every object the layer can construct.
//!
//! A [`Kind`] is the static tag a host binding uses to name a concrete handle,
//! request, synchronization primitive or plain value. It is a closed enum: every
//! `match` over it is checked exhaustively, so a new kind cannot slip through a
//! dispatch site unnoticed.
//!
//! - [`signature`]: initializer parameter lists and host argument values
//! - [`registry`]: kind descriptors, the registration builder and the frozen registry

pub mod registry;
pub mod signature;

pub use registry::{KindDescriptor, KindRegistry, KindSpec, RegistryBuilder, RegistryError};
pub use signature::{BoundArg, BoundArgs, Param, ParamType, Signature, SignatureError, Value};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base capability class of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Long-lived object attached to an event loop.
    Handle,
    /// Short-lived object representing one in-flight operation.
    Request,
    /// Loop-independent concurrency primitive.
    SyncPrimitive,
    /// Plain data record (loops, cpu info, interface addresses).
    PlainValue,
}

impl Capability {
    /// All capability classes, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Handle,
        Self::Request,
        Self::SyncPrimitive,
        Self::PlainValue,
    ];

    /// Returns the capability name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handle => "handle",
            Self::Request => "request",
            Self::SyncPrimitive => "sync_primitive",
            Self::PlainValue => "plain_value",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static tag for one kind of aio object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Abstract base every other kind derives from.
    Aio,
    Loop,
    Tcp,
    Udp,
    Tty,
    Pipe,
    Poll,
    Prepare,
    Check,
    Idle,
    Async,
    Timer,
    FsPoll,
    Signal,
    FsEvent,
    Handle,
    Process,
    Stream,
    Req,
    Connect,
    Write,
    Shutdown,
    UdpSend,
    Fs,
    Work,
    #[serde(rename = "getaddrinfo")]
    GetAddrInfo,
    CpuInfo,
    InterfaceAddress,
    Mutex,
    #[serde(rename = "rwlock")]
    RwLock,
    Sem,
    Cond,
    Barrier,
}

impl Kind {
    /// Number of kinds.
    pub const COUNT: usize = 33;

    /// Every kind, base first.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Aio,
        Self::Loop,
        Self::Tcp,
        Self::Udp,
        Self::Tty,
        Self::Pipe,
        Self::Poll,
        Self::Prepare,
        Self::Check,
        Self::Idle,
        Self::Async,
        Self::Timer,
        Self::FsPoll,
        Self::Signal,
        Self::FsEvent,
        Self::Handle,
        Self::Process,
        Self::Stream,
        Self::Req,
        Self::Connect,
        Self::Write,
        Self::Shutdown,
        Self::UdpSend,
        Self::Fs,
        Self::Work,
        Self::GetAddrInfo,
        Self::CpuInfo,
        Self::InterfaceAddress,
        Self::Mutex,
        Self::RwLock,
        Self::Sem,
        Self::Cond,
        Self::Barrier,
    ];

    /// Short kind name used by the generic constructor (`"tcp"`, `"fs_event"`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aio => "aio",
            Self::Loop => "loop",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Tty => "tty",
            Self::Pipe => "pipe",
            Self::Poll => "poll",
            Self::Prepare => "prepare",
            Self::Check => "check",
            Self::Idle => "idle",
            Self::Async => "async",
            Self::Timer => "timer",
            Self::FsPoll => "fs_poll",
            Self::Signal => "signal",
            Self::FsEvent => "fs_event",
            Self::Handle => "handle",
            Self::Process => "process",
            Self::Stream => "stream",
            Self::Req => "req",
            Self::Connect => "connect",
            Self::Write => "write",
            Self::Shutdown => "shutdown",
            Self::UdpSend => "udp_send",
            Self::Fs => "fs",
            Self::Work => "work",
            Self::GetAddrInfo => "getaddrinfo",
            Self::CpuInfo => "cpu_info",
            Self::InterfaceAddress => "interface_address",
            Self::Mutex => "mutex",
            Self::RwLock => "rwlock",
            Self::Sem => "sem",
            Self::Cond => "cond",
            Self::Barrier => "barrier",
        }
    }

    /// Host-visible type name (`"aio_tcp"`; the base is plain `"aio"`).
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Aio => "aio",
            Self::Loop => "aio_loop",
            Self::Tcp => "aio_tcp",
            Self::Udp => "aio_udp",
            Self::Tty => "aio_tty",
            Self::Pipe => "aio_pipe",
            Self::Poll => "aio_poll",
            Self::Prepare => "aio_prepare",
            Self::Check => "aio_check",
            Self::Idle => "aio_idle",
            Self::Async => "aio_async",
            Self::Timer => "aio_timer",
            Self::FsPoll => "aio_fs_poll",
            Self::Signal => "aio_signal",
            Self::FsEvent => "aio_fs_event",
            Self::Handle => "aio_handle",
            Self::Process => "aio_process",
            Self::Stream => "aio_stream",
            Self::Req => "aio_req",
            Self::Connect => "aio_connect",
            Self::Write => "aio_write",
            Self::Shutdown => "aio_shutdown",
            Self::UdpSend => "aio_udp_send",
            Self::Fs => "aio_fs",
            Self::Work => "aio_work",
            Self::GetAddrInfo => "aio_getaddrinfo",
            Self::CpuInfo => "aio_cpu_info",
            Self::InterfaceAddress => "aio_interface_address",
            Self::Mutex => "aio_mutex",
            Self::RwLock => "aio_rwlock",
            Self::Sem => "aio_sem",
            Self::Cond => "aio_cond",
            Self::Barrier => "aio_barrier",
        }
    }

    /// Dense index of this kind in [`Kind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Resolves a short kind name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Resolves a host type name (`"aio_tcp"`).
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == type_name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_is_dense_and_ordered() {
        for (i, kind) in Kind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i, "{kind}");
        }
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = Kind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), Kind::COUNT);
        let type_names: HashSet<_> = Kind::ALL.iter().map(|k| k.type_name()).collect();
        assert_eq!(type_names.len(), Kind::COUNT);
    }

    #[test]
    fn name_round_trips() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_name(kind.name()), Some(kind));
            assert_eq!(Kind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(Kind::from_name("aio_tcp"), None);
        assert_eq!(Kind::from_type_name("tcp"), None);
        assert_eq!(Kind::from_name("nonexistent_kind"), None);
    }

    #[test]
    fn display_uses_type_name() {
        assert_eq!(Kind::FsEvent.to_string(), "aio_fs_event");
        assert_eq!(Kind::Aio.to_string(), "aio");
        assert_eq!(Capability::SyncPrimitive.to_string(), "sync_primitive");
    }

    #[test]
    fn capability_serde_is_snake_case() {
        let json = serde_json::to_string(&Capability::SyncPrimitive).expect("serialize");
        assert_eq!(json, "\"sync_primitive\"");
        let back: Capability = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Capability::SyncPrimitive);
        for kind in Kind::ALL {
            let json = serde_json::to_string(&kind).expect("serialize kind");
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }
}
