//! Aiobind: one kind-tagged object model over an event-loop I/O engine.
//!
//! # Overview
//!
//! Every handle (sockets, pipes, terminals, timers, watchers, loop hooks),
//! request and synchronization primitive the engine offers is a [`Kind`]. All
//! of them go through the same two generic entry points on an [`AioContext`]:
//! construction allocates a zeroed block of exactly the kind's declared size,
//! and initialization validates the kind's fixed argument list, resolves its
//! event loop, and runs the engine setup call.
//!
//! # Core Guarantees
//!
//! - **Exact storage**: an object's block is always its descriptor's size, zeroed before any engine call
//! - **One default loop**: an unspecified loop resolves to the same default loop every time, created once
//! - **Explicit loops stay explicit**: a supplied loop is never swapped for the default
//! - **No silent failures**: unknown names, unsupported kinds, bad arguments and engine failures are typed errors
//! - **Guaranteed release**: closing or dropping an object detaches it from its loop and frees its primitives
//!
//! # Module Structure
//!
//! - [`kind`]: Kind tags, signatures, descriptors and the frozen registry
//! - [`storage`]: Exact-size storage blocks and the allocator seam
//! - [`event_loop`]: Loops, handle registrations and async wakeups
//! - [`engine`]: The engine seam, the native engine and the lab engine
//! - [`object`]: Objects and their lifecycle
//! - [`context`]: Construction and initialization protocols
//! - [`dispatch`]: Deprecated dispatch facade
//! - [`binding`]: Host method registration
//! - [`error`](mod@error): Error types and engine error translation
//! - [`config`]: Context configuration
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use aiobind::engine::LabEngine;
//! use aiobind::{AioContext, Kind, args};
//! use std::sync::Arc;
//!
//! let cx = AioContext::builder().engine(Arc::new(LabEngine::new())).build();
//!
//! let mut barrier = cx.construct_by_name("barrier").unwrap();
//! cx.initialize(&mut barrier, &args![3]).unwrap();
//! assert!(barrier.barrier().is_some());
//! assert!(!cx.has_default_loop());
//!
//! let mut timer = cx.construct(Kind::Timer).unwrap();
//! cx.initialize(&mut timer, &[]).unwrap();
//! assert!(cx.has_default_loop());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

#[cfg(not(unix))]
compile_error!("aiobind requires a unix target: the native engine polls file descriptors.");

pub mod binding;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event_loop;
pub mod kind;
pub mod object;
pub mod storage;
pub mod tracing_compat;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use binding::{MethodBinding, MethodKind, MethodSink, MethodTable, register_methods};
pub use config::{AioConfig, ConfigError};
pub use context::{AioContext, AioContextBuilder};
pub use engine::{Engine, LabEngine, NativeEngine};
pub use error::{AioError, IoError, Recoverability, Result, translate};
pub use event_loop::{Callback, Loop, LoopArg, LoopId, LoopRef, LoopSource};
pub use kind::{
    Capability, Kind, KindDescriptor, KindRegistry, ParamType, Signature, SignatureError, Value,
};
pub use object::{AioObject, ObjectState};
pub use storage::{HostAllocator, Storage};
