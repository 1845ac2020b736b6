//! Aio objects and their lifecycle.
//!
//! An [`AioObject`] is a kind-tagged, exact-size storage block plus whatever
//! engine resources a successful initialization acquired. Objects move through
//! a small state machine:
//!
//! ```text
//! Constructed ──init ok──▶ Ready ──close──▶ Closed
//!      │                                      ▲
//!      └──init failed──▶ Unusable ──close─────┘
//! ```
//!
//! A signature error leaves the object `Constructed`: the engine was never
//! called, so the caller may retry with correct arguments. An engine failure
//! moves it to `Unusable` and records the [`IoError`]; the caller must discard
//! it. Dropping an object closes it, releasing its loop attachment and any
//! primitive it owns.

use crate::engine::{Resource, sync};
use crate::error::{AioError, IoError};
use crate::event_loop::{LoopRef, LoopSource};
use crate::kind::{Kind, KindDescriptor};
use crate::storage::Storage;
use crate::tracing_compat::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Lifecycle state of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    Constructed,
    Ready,
    Unusable,
    Closed,
}

impl ObjectState {
    /// Returns the state name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Ready => "ready",
            Self::Unusable => "unusable",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true when a state transition is legal.
#[must_use]
pub fn is_valid_transition(from: ObjectState, to: ObjectState) -> bool {
    if from == to {
        return from == ObjectState::Closed;
    }
    matches!(
        (from, to),
        (ObjectState::Constructed, ObjectState::Ready | ObjectState::Unusable)
            | (
                ObjectState::Constructed | ObjectState::Ready | ObjectState::Unusable,
                ObjectState::Closed
            )
    )
}

/// The loop a handle was attached to, and how it was chosen.
#[derive(Debug, Clone)]
pub struct LoopBinding {
    lp: LoopRef,
    source: LoopSource,
}

impl LoopBinding {
    /// Creates a binding.
    #[must_use]
    pub fn new(lp: LoopRef, source: LoopSource) -> Self {
        Self { lp, source }
    }

    /// The bound loop.
    #[must_use]
    pub fn event_loop(&self) -> &LoopRef {
        &self.lp
    }

    /// How the loop was chosen.
    #[must_use]
    pub fn source(&self) -> LoopSource {
        self.source
    }
}

/// A constructed aio object.
pub struct AioObject {
    descriptor: KindDescriptor,
    storage: Storage,
    state: ObjectState,
    binding: Option<LoopBinding>,
    resource: Option<Resource>,
    failure: Option<IoError>,
}

impl AioObject {
    pub(crate) fn new(descriptor: KindDescriptor, storage: Storage) -> Self {
        Self {
            descriptor,
            storage,
            state: ObjectState::Constructed,
            binding: None,
            resource: None,
            failure: None,
        }
    }

    /// The object's kind tag.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.descriptor.kind
    }

    /// The descriptor the object was stamped with.
    #[must_use]
    pub fn descriptor(&self) -> &KindDescriptor {
        &self.descriptor
    }

    /// The object's storage block.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Returns `true` after a successful initialization.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ObjectState::Ready
    }

    /// Returns `true` after a failed engine setup call.
    #[must_use]
    pub fn is_unusable(&self) -> bool {
        self.state == ObjectState::Unusable
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == ObjectState::Closed
    }

    /// The engine failure that made this object unusable.
    #[must_use]
    pub fn failure(&self) -> Option<&IoError> {
        self.failure.as_ref()
    }

    /// The loop binding of an initialized handle.
    #[must_use]
    pub fn binding(&self) -> Option<&LoopBinding> {
        self.binding.as_ref()
    }

    /// The loop this handle is attached to.
    #[must_use]
    pub fn event_loop(&self) -> Option<&LoopRef> {
        self.binding.as_ref().map(LoopBinding::event_loop)
    }

    /// Whether the loop was supplied or defaulted.
    #[must_use]
    pub fn loop_source(&self) -> Option<LoopSource> {
        self.binding.as_ref().map(LoopBinding::source)
    }

    /// The loop created by initializing a `loop` object, for passing as an
    /// explicit loop argument.
    #[must_use]
    pub fn as_loop(&self) -> Option<LoopRef> {
        match &self.resource {
            Some(Resource::Loop(lp)) => Some(Arc::clone(lp)),
            _ => None,
        }
    }

    /// The mutex of an initialized `mutex` object.
    #[must_use]
    pub fn mutex(&self) -> Option<Arc<sync::Mutex>> {
        match &self.resource {
            Some(Resource::Mutex(m)) => Some(Arc::clone(m)),
            _ => None,
        }
    }

    /// The lock of an initialized `rwlock` object.
    #[must_use]
    pub fn rwlock(&self) -> Option<Arc<sync::RwLock>> {
        match &self.resource {
            Some(Resource::RwLock(l)) => Some(Arc::clone(l)),
            _ => None,
        }
    }

    /// The semaphore of an initialized `sem` object.
    #[must_use]
    pub fn semaphore(&self) -> Option<Arc<sync::Semaphore>> {
        match &self.resource {
            Some(Resource::Semaphore(s)) => Some(Arc::clone(s)),
            _ => None,
        }
    }

    /// The condition variable of an initialized `cond` object.
    #[must_use]
    pub fn condvar(&self) -> Option<Arc<sync::Condvar>> {
        match &self.resource {
            Some(Resource::Cond(c)) => Some(Arc::clone(c)),
            _ => None,
        }
    }

    /// The barrier of an initialized `barrier` object.
    #[must_use]
    pub fn barrier(&self) -> Option<Arc<sync::Barrier>> {
        match &self.resource {
            Some(Resource::Barrier(b)) => Some(Arc::clone(b)),
            _ => None,
        }
    }

    /// The path watched by an initialized `fs_event` object.
    #[must_use]
    pub fn watched_path(&self) -> Option<&Path> {
        match &self.resource {
            Some(Resource::Watch { path, .. }) => Some(path),
            _ => None,
        }
    }

    /// The borrowed descriptor of an initialized `tty` or `poll` object.
    #[must_use]
    pub fn fd(&self) -> Option<i32> {
        match &self.resource {
            Some(Resource::Descriptor { fd, .. }) => Some(*fd),
            _ => None,
        }
    }

    /// Wakes the loop of a ready `async` handle; its callback runs on the
    /// loop's next turn. Sends before that turn are coalesced.
    pub fn async_send(&self) -> Result<(), AioError> {
        if self.kind() != Kind::Async {
            return Err(AioError::UnsupportedKind { kind: self.kind() });
        }
        self.expect_state(ObjectState::Ready)?;
        let registration = self
            .resource
            .as_ref()
            .and_then(Resource::registration)
            .ok_or(AioError::InvalidState {
                kind: self.kind(),
                state: self.state,
                expected: ObjectState::Ready,
            })?;
        registration
            .send()
            .map_err(|err| IoError::from_io("async_send", &err).into())
    }

    /// Releases every engine resource and marks the object closed.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ObjectState::Closed {
            return;
        }
        debug_assert!(is_valid_transition(self.state, ObjectState::Closed));
        trace!(kind = %self.kind(), state = %self.state, "closing aio object");
        self.resource = None;
        self.binding = None;
        self.state = ObjectState::Closed;
    }

    pub(crate) fn expect_state(&self, expected: ObjectState) -> Result<(), AioError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AioError::InvalidState {
                kind: self.kind(),
                state: self.state,
                expected,
            })
        }
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Storage, &mut Option<Resource>) {
        (&mut self.storage, &mut self.resource)
    }

    pub(crate) fn mark_ready(&mut self, binding: Option<LoopBinding>) {
        debug_assert!(is_valid_transition(self.state, ObjectState::Ready));
        self.binding = binding;
        self.state = ObjectState::Ready;
        debug!(kind = %self.kind(), "aio object ready");
    }

    pub(crate) fn mark_unusable(&mut self, failure: IoError) {
        debug_assert!(is_valid_transition(self.state, ObjectState::Unusable));
        self.resource = None;
        self.failure = Some(failure);
        self.state = ObjectState::Unusable;
    }
}

impl Drop for AioObject {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for AioObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AioObject")
            .field("kind", &self.kind())
            .field("state", &self.state)
            .field("size", &self.storage.len())
            .field("loop", &self.event_loop().map(|lp| lp.id()))
            .field("resource", &self.resource)
            .field("failure", &self.failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::Loop;
    use crate::kind::KindRegistry;

    fn object(kind: Kind) -> AioObject {
        let registry = KindRegistry::standard();
        let descriptor = *registry.lookup(kind).expect("registered");
        AioObject::new(descriptor, Storage::zeroed(descriptor.size))
    }

    #[test]
    fn transition_table() {
        use ObjectState::{Closed, Constructed, Ready, Unusable};
        assert!(is_valid_transition(Constructed, Ready));
        assert!(is_valid_transition(Constructed, Unusable));
        assert!(is_valid_transition(Ready, Closed));
        assert!(is_valid_transition(Unusable, Closed));
        assert!(is_valid_transition(Closed, Closed));

        assert!(!is_valid_transition(Ready, Unusable));
        assert!(!is_valid_transition(Ready, Ready));
        assert!(!is_valid_transition(Unusable, Ready));
        assert!(!is_valid_transition(Closed, Constructed));
    }

    #[test]
    fn close_releases_loop_attachment() {
        let lp = Loop::virtual_loop();
        let mut timer = object(Kind::Timer);
        let registration = lp.attach(Kind::Timer, None);
        *timer.parts_mut().1 = Some(Resource::Handle(registration));
        timer.mark_ready(Some(LoopBinding::new(Arc::clone(&lp), LoopSource::Explicit)));
        assert_eq!(lp.handle_count(), 1);
        assert!(Arc::ptr_eq(timer.event_loop().expect("bound"), &lp));

        timer.close();
        assert!(timer.is_closed());
        assert_eq!(lp.handle_count(), 0);
        assert!(timer.event_loop().is_none());

        timer.close();
        assert!(timer.is_closed());
    }

    #[test]
    fn drop_closes() {
        let lp = Loop::virtual_loop();
        {
            let mut idle = object(Kind::Idle);
            *idle.parts_mut().1 = Some(Resource::Handle(lp.attach(Kind::Idle, None)));
            idle.mark_ready(Some(LoopBinding::new(Arc::clone(&lp), LoopSource::Default)));
            assert_eq!(lp.handle_count(), 1);
        }
        assert_eq!(lp.handle_count(), 0);
    }

    #[test]
    fn expect_state_reports_both_states() {
        let obj = object(Kind::Mutex);
        let err = obj.expect_state(ObjectState::Ready).expect_err("not ready");
        assert_eq!(
            err,
            AioError::InvalidState {
                kind: Kind::Mutex,
                state: ObjectState::Constructed,
                expected: ObjectState::Ready,
            }
        );
        assert_eq!(err.to_string(), "aio_mutex object is constructed, expected ready");
    }

    #[test]
    fn async_send_requires_ready_async() {
        let timer = object(Kind::Timer);
        assert_eq!(
            timer.async_send(),
            Err(AioError::UnsupportedKind { kind: Kind::Timer })
        );
        let handle = object(Kind::Async);
        assert!(matches!(
            handle.async_send(),
            Err(AioError::InvalidState { .. })
        ));
    }

    #[test]
    fn unusable_records_failure() {
        let mut watcher = object(Kind::FsEvent);
        watcher.mark_unusable(IoError::from_code("fs_event_init", -libc::ENOENT));
        assert!(watcher.is_unusable());
        assert_eq!(
            watcher.failure().map(IoError::operation),
            Some("fs_event_init")
        );
        assert!(format!("{watcher:?}").contains("Unusable"));
    }
}
