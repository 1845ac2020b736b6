//! Deprecated dispatch facade.
//!
//! Older hosts call a single `init(loop)` on the `aio` base and expect it to
//! pick the right initializer from the object's kind. Only `tcp` and `udp`
//! were ever routed this way. Every other kind is an explicit
//! [`AioError::UnsupportedKind`]; the match below is exhaustive, so a new kind
//! must be placed on one side or the other.

use crate::context::AioContext;
use crate::error::{AioError, Result};
use crate::event_loop::LoopArg;
use crate::kind::{Kind, Value};
use crate::object::AioObject;
use crate::tracing_compat::warn;

/// Initializes `object` from its kind with only a loop argument.
#[deprecated(note = "call `AioContext::initialize` with the object's own arguments")]
pub fn generic_initialize(cx: &AioContext, object: &mut AioObject, lp: LoopArg) -> Result<()> {
    let kind = object.kind();
    warn!(kind = %kind, "deprecated generic initialize");
    if !cx.config().legacy_dispatch {
        return Err(AioError::UnsupportedKind { kind });
    }

    match kind {
        Kind::Tcp | Kind::Udp => cx.initialize(object, &[Value::from(lp)]),
        Kind::Aio
        | Kind::Loop
        | Kind::Tty
        | Kind::Pipe
        | Kind::Poll
        | Kind::Prepare
        | Kind::Check
        | Kind::Idle
        | Kind::Async
        | Kind::Timer
        | Kind::FsPoll
        | Kind::Signal
        | Kind::FsEvent
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
        | Kind::InterfaceAddress
        | Kind::Mutex
        | Kind::RwLock
        | Kind::Sem
        | Kind::Cond
        | Kind::Barrier => Err(AioError::UnsupportedKind { kind }),
    }
}
