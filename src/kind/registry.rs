//! Kind descriptors and the kind registry.
//!
//! Registration happens once, in dependency order (the `aio` base first, then
//! every concrete kind), through a [`RegistryBuilder`]. [`RegistryBuilder::freeze`]
//! turns the builder into an immutable [`KindRegistry`]; after that point every
//! lookup is a read of shared, never-mutated data and needs no locking.
//!
//! [`KindRegistry::standard`] holds the built-in table. Storage sizes in that
//! table mirror the engine's native struct sizes (libuv 1.x, Linux x86_64);
//! the `aio` base declares only the common handle header.

use super::signature::{EMPTY, LOOP_ONLY, Param, ParamType, Signature};
use super::{Capability, Kind};
use crate::storage::HEADER_SIZE;
use hashbrown::HashMap;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Static, immutable description of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct KindDescriptor {
    /// Static tag.
    pub kind: Kind,
    /// Short name (`"tcp"`).
    pub name: &'static str,
    /// Host type name (`"aio_tcp"`).
    pub type_name: &'static str,
    /// Exact storage size in bytes.
    pub size: usize,
    /// Base capability class.
    pub capability: Capability,
    /// Parent kind; `None` only for the base.
    pub parent: Option<Kind>,
    /// Initializer signature; `None` for kinds without an initializer.
    pub signature: Option<Signature>,
}

impl KindDescriptor {
    /// Returns `true` if this kind can be initialized.
    #[must_use]
    pub fn has_initializer(&self) -> bool {
        self.signature.is_some()
    }

    /// Returns `true` if this kind binds to an event loop at initialization.
    #[must_use]
    pub fn takes_loop(&self) -> bool {
        self.signature.is_some_and(|sig| sig.takes_loop())
    }
}

/// Registration request for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    /// Kind tag.
    pub kind: Kind,
    /// Storage size in bytes; must be non-zero.
    pub size: usize,
    /// Capability class.
    pub capability: Capability,
    /// Parent kind, which must already be registered.
    pub parent: Option<Kind>,
    /// Initializer signature.
    pub signature: Option<Signature>,
}

impl KindSpec {
    const fn new(
        kind: Kind,
        size: usize,
        capability: Capability,
        signature: Option<Signature>,
    ) -> Self {
        Self {
            kind,
            size,
            capability,
            parent: Some(Kind::Aio),
            signature,
        }
    }
}

/// Registration failure. Any of these aborts startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name or tag was already registered.
    #[error("kind `{name}` registered twice")]
    Duplicate {
        /// Offending name.
        name: &'static str,
    },
    /// Declared storage size is zero.
    #[error("kind `{name}` declares zero storage size")]
    ZeroSize {
        /// Offending name.
        name: &'static str,
    },
    /// Parent kind has not been registered yet.
    #[error("kind `{name}` registered before its parent `{parent}`")]
    UnknownParent {
        /// Offending name.
        name: &'static str,
        /// Missing parent name.
        parent: &'static str,
    },
}

/// Mutable registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<KindDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one kind.
    pub fn register(&mut self, spec: KindSpec) -> Result<&mut Self, RegistryError> {
        let name = spec.kind.name();
        if spec.size == 0 {
            return Err(RegistryError::ZeroSize { name });
        }
        if self.by_name.contains_key(name) {
            return Err(RegistryError::Duplicate { name });
        }
        if let Some(parent) = spec.parent {
            if !self.by_name.contains_key(parent.name()) {
                return Err(RegistryError::UnknownParent {
                    name,
                    parent: parent.name(),
                });
            }
        }

        self.by_name.insert(name, self.descriptors.len());
        self.descriptors.push(KindDescriptor {
            kind: spec.kind,
            name,
            type_name: spec.kind.type_name(),
            size: spec.size,
            capability: spec.capability,
            parent: spec.parent,
            signature: spec.signature,
        });
        Ok(self)
    }

    /// Registers every spec in order, stopping at the first failure.
    pub fn register_all(
        &mut self,
        specs: impl IntoIterator<Item = KindSpec>,
    ) -> Result<&mut Self, RegistryError> {
        for spec in specs {
            self.register(spec)?;
        }
        Ok(self)
    }

    /// Freezes the registry. No registration is possible afterwards.
    #[must_use]
    pub fn freeze(self) -> KindRegistry {
        let mut by_kind = [None; Kind::COUNT];
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            by_kind[descriptor.kind.index()] = Some(i);
        }
        KindRegistry {
            descriptors: self.descriptors.into_boxed_slice(),
            by_name: self.by_name,
            by_kind,
        }
    }
}

/// Frozen, read-only kind registry.
#[derive(Debug)]
pub struct KindRegistry {
    descriptors: Box<[KindDescriptor]>,
    by_name: HashMap<&'static str, usize>,
    by_kind: [Option<usize>; Kind::COUNT],
}

impl KindRegistry {
    /// The built-in registry, created on first use.
    ///
    /// # Panics
    ///
    /// Panics if the built-in table is inconsistent; the process cannot
    /// start without a valid registry.
    #[must_use]
    pub fn standard() -> Arc<Self> {
        static STANDARD: OnceLock<Arc<KindRegistry>> = OnceLock::new();
        Arc::clone(STANDARD.get_or_init(|| {
            let mut builder = RegistryBuilder::new();
            builder
                .register_all(STANDARD_KINDS)
                .expect("built-in kind table is valid");
            Arc::new(builder.freeze())
        }))
    }

    /// Looks up a kind by its short name.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<&KindDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    /// Looks up a kind by its host type name (`"aio_tcp"`).
    #[must_use]
    pub fn lookup_by_type_name(&self, type_name: &str) -> Option<&KindDescriptor> {
        Kind::from_type_name(type_name).and_then(|kind| self.lookup(kind))
    }

    /// Looks up a kind by its static tag.
    #[must_use]
    pub fn lookup(&self, kind: Kind) -> Option<&KindDescriptor> {
        self.by_kind[kind.index()].map(|i| &self.descriptors[i])
    }

    /// All kinds with the given capability, in registration order.
    pub fn lookup_by_capability(
        &self,
        capability: Capability,
    ) -> impl Iterator<Item = &KindDescriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.capability == capability)
    }

    /// Returns `true` if `kind` is `ancestor` or derives from it.
    #[must_use]
    pub fn is_a(&self, kind: Kind, ancestor: Kind) -> bool {
        let mut current = Some(kind);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.lookup(k).and_then(|d| d.parent);
        }
        false
    }

    /// All descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.descriptors.iter()
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Serializes every descriptor as pretty JSON, for host introspection.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.descriptors)
    }
}

const TTY: Signature = Signature::new(&[
    Param::new("loop", ParamType::Loop),
    Param::new("file", ParamType::File),
    Param::new("readable", ParamType::Flag),
]);
const PIPE: Signature = Signature::new(&[
    Param::new("loop", ParamType::Loop),
    Param::new("ipc", ParamType::Flag),
]);
const POLL: Signature = Signature::new(&[
    Param::new("loop", ParamType::Loop),
    Param::new("fd", ParamType::Fd),
]);
const ASYNC: Signature = Signature::new(&[
    Param::new("loop", ParamType::Loop),
    Param::new("cb", ParamType::Callback),
]);
const FS_EVENT: Signature = Signature::new(&[
    Param::new("loop", ParamType::Loop),
    Param::new("filename", ParamType::Str),
    Param::new("cb", ParamType::Callback),
    Param::new("flags", ParamType::Count),
]);
const SEM: Signature = Signature::new(&[Param::new("value", ParamType::Count)]);
const BARRIER: Signature = Signature::new(&[Param::new("count", ParamType::Count)]);

use Capability::{Handle, PlainValue, Request, SyncPrimitive};

/// Built-in kind table, in registration order.
pub const STANDARD_KINDS: [KindSpec; Kind::COUNT] = [
    KindSpec {
        kind: Kind::Aio,
        size: HEADER_SIZE,
        capability: PlainValue,
        parent: None,
        signature: None,
    },
    KindSpec::new(Kind::Tcp, 248, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::Udp, 216, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::Loop, 848, PlainValue, Some(EMPTY)),
    KindSpec::new(Kind::Tty, 312, Handle, Some(TTY)),
    KindSpec::new(Kind::Pipe, 264, Handle, Some(PIPE)),
    KindSpec::new(Kind::Poll, 160, Handle, Some(POLL)),
    KindSpec::new(Kind::Prepare, 120, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::Check, 120, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::Idle, 120, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::Async, 128, Handle, Some(ASYNC)),
    KindSpec::new(Kind::Timer, 152, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::FsPoll, 104, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::Signal, 152, Handle, Some(LOOP_ONLY)),
    KindSpec::new(Kind::FsEvent, 136, Handle, Some(FS_EVENT)),
    KindSpec::new(Kind::Mutex, 40, SyncPrimitive, Some(EMPTY)),
    KindSpec::new(Kind::RwLock, 56, SyncPrimitive, Some(EMPTY)),
    KindSpec::new(Kind::Sem, 32, SyncPrimitive, Some(SEM)),
    KindSpec::new(Kind::Cond, 48, SyncPrimitive, Some(EMPTY)),
    KindSpec::new(Kind::Barrier, 32, SyncPrimitive, Some(BARRIER)),
    KindSpec::new(Kind::Handle, 96, Handle, None),
    KindSpec::new(Kind::Process, 136, Handle, None),
    KindSpec::new(Kind::Stream, 248, Handle, None),
    KindSpec::new(Kind::Req, 64, Request, None),
    KindSpec::new(Kind::Connect, 96, Request, None),
    KindSpec::new(Kind::Write, 192, Request, None),
    KindSpec::new(Kind::Shutdown, 80, Request, None),
    KindSpec::new(Kind::UdpSend, 320, Request, None),
    KindSpec::new(Kind::Fs, 440, Request, None),
    KindSpec::new(Kind::Work, 128, Request, None),
    KindSpec::new(Kind::GetAddrInfo, 160, Request, None),
    KindSpec::new(Kind::CpuInfo, 56, PlainValue, None),
    KindSpec::new(Kind::InterfaceAddress, 80, PlainValue, None),
];
