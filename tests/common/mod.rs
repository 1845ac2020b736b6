//! Shared helpers for integration suites.

#![allow(dead_code)]

pub use aiobind::test_utils::init_test_logging;
pub use aiobind::{assert_with_log, test_complete, test_phase};

use aiobind::{AioContext, Callback, Kind, LabEngine, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A context over a fresh lab engine, plus the engine for inspection.
pub fn lab_context() -> (AioContext, Arc<LabEngine>) {
    let engine = Arc::new(LabEngine::new());
    let cx = AioContext::builder().engine(engine.clone()).build();
    (cx, engine)
}

/// A context over the native engine with its own default loop.
pub fn native_context() -> AioContext {
    AioContext::builder().build()
}

/// A callback that counts its invocations.
pub fn counting_callback() -> (Callback, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let cb = Callback::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (cb, hits)
}

/// Arguments that satisfy `kind`'s signature with an unspecified loop.
/// Returns `None` for kinds without an initializer.
pub fn valid_args(kind: Kind) -> Option<Vec<Value>> {
    let noop = Callback::new(|_| {});
    let args = match kind {
        Kind::Loop | Kind::Mutex | Kind::RwLock | Kind::Cond => vec![],
        Kind::Tcp
        | Kind::Udp
        | Kind::Prepare
        | Kind::Check
        | Kind::Idle
        | Kind::Timer
        | Kind::FsPoll
        | Kind::Signal => vec![Value::Nil],
        Kind::Tty => aiobind::args![Value::Nil, 0, 1],
        Kind::Pipe => aiobind::args![Value::Nil, 0],
        Kind::Poll => aiobind::args![Value::Nil, 0],
        Kind::Async => aiobind::args![Value::Nil, noop],
        Kind::FsEvent => aiobind::args![Value::Nil, "/watched", noop, 0],
        Kind::Sem => aiobind::args![1],
        Kind::Barrier => aiobind::args![2],
        _ => return None,
    };
    Some(args)
}
