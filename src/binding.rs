//! Host method registration.
//!
//! [`register_methods`] walks a frozen registry once and emits, for every
//! kind, the constructor and `init` method a host object system should bind.
//! Signatures are rendered in the compact host notation (`loop=o,fd=N`).
//!
//! The `aio` base gets the generic constructor (`type=S`) and the deprecated
//! `init(loop)`. Kinds without their own initializer inherit that deprecated
//! `init`, which is what [`invoke_init`] routes to for them.

use crate::context::AioContext;
use crate::error::Result;
use crate::kind::signature::LOOP_ONLY;
use crate::kind::{Kind, KindRegistry, Value};
use crate::object::AioObject;
use serde::Serialize;

/// Role of a bound method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Zero-argument constructor for one kind.
    Constructor,
    /// Constructor taking a kind name.
    GenericConstructor,
    /// The kind's own initializer.
    Initializer,
    /// Inherited `init` that goes through the dispatch facade.
    LegacyInitializer,
}

/// One method for the host to bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodBinding {
    /// Host type the method is bound on (`"aio_tcp"`).
    pub type_name: &'static str,
    /// Method name (`"new"`, `"init"`).
    pub method: &'static str,
    /// Kind the method operates on.
    pub kind: Kind,
    /// Role.
    pub role: MethodKind,
    /// Compact parameter notation; empty for no parameters.
    pub signature: String,
    /// Whether hosts should flag calls as deprecated.
    pub deprecated: bool,
}

/// Receives method bindings.
pub trait MethodSink {
    /// Binds one method.
    fn bind(&mut self, binding: MethodBinding);
}

/// A sink that records every binding, in order.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct MethodTable {
    bindings: Vec<MethodBinding>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds a method by host type name and method name.
    #[must_use]
    pub fn find(&self, type_name: &str, method: &str) -> Option<&MethodBinding> {
        self.bindings
            .iter()
            .find(|b| b.type_name == type_name && b.method == method)
    }

    /// Every binding, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &MethodBinding> {
        self.bindings.iter()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl MethodSink for MethodTable {
    fn bind(&mut self, binding: MethodBinding) {
        self.bindings.push(binding);
    }
}

/// Emits every kind's `new` and `init` bindings into `sink`. Returns the
/// number of bindings emitted.
pub fn register_methods(registry: &KindRegistry, sink: &mut impl MethodSink) -> usize {
    let mut count = 0;
    let mut emit = |binding: MethodBinding| {
        sink.bind(binding);
        count += 1;
    };

    for descriptor in registry.iter() {
        let kind = descriptor.kind;
        let type_name = descriptor.type_name;

        if kind == Kind::Aio {
            emit(MethodBinding {
                type_name,
                method: "new",
                kind,
                role: MethodKind::GenericConstructor,
                signature: "type=S".to_owned(),
                deprecated: false,
            });
        } else {
            emit(MethodBinding {
                type_name,
                method: "new",
                kind,
                role: MethodKind::Constructor,
                signature: String::new(),
                deprecated: false,
            });
        }

        let init = match descriptor.signature {
            Some(signature) if kind != Kind::Aio => MethodBinding {
                type_name,
                method: "init",
                kind,
                role: MethodKind::Initializer,
                signature: signature.to_string(),
                deprecated: false,
            },
            _ => MethodBinding {
                type_name,
                method: "init",
                kind,
                role: MethodKind::LegacyInitializer,
                signature: LOOP_ONLY.to_string(),
                deprecated: true,
            },
        };
        emit(init);
    }
    count
}

/// Runs the `init` method a host bound for `object`'s kind: the kind's own
/// initializer if it has one, otherwise the deprecated dispatch facade with
/// the first argument as the loop.
#[allow(deprecated)]
pub fn invoke_init(cx: &AioContext, object: &mut AioObject, args: &[Value]) -> Result<()> {
    if object.descriptor().has_initializer() {
        return cx.initialize(object, args);
    }
    let bound = LOOP_ONLY.bind(object.kind(), args)?;
    let lp = bound.loop_arg().cloned().unwrap_or_default();
    crate::dispatch::generic_initialize(cx, object, lp)
}
