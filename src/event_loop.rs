//! Event loop instances and handle attachment.
//!
//! A [`Loop`] is the engine-side object a handle attaches to at
//! initialization. The layer never runs a loop on its own; it only records
//! which handles are attached (through [`LoopRegistration`], released on drop)
//! and queues async wakeups for the engine to deliver from [`Loop::turn`].
//!
//! Native loops wrap a [`polling::Poller`] so that [`Loop::wake`] can interrupt
//! a blocked turn from another thread. Virtual loops (used by the lab engine)
//! have no poller and never block.

use crate::kind::Kind;
use parking_lot::Mutex;
use polling::{Events, Poller};
use slab::Slab;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared reference to a loop.
pub type LoopRef = Arc<Loop>;

/// Process-unique loop identifier. Zero is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(u64);

impl LoopId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Opaque host callback stored by handles that take one (`async`, `fs_event`).
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(Kind) + Send + Sync>);

impl Callback {
    /// Wraps a host function.
    pub fn new(f: impl Fn(Kind) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback for a handle of the given kind.
    pub fn invoke(&self, kind: Kind) {
        (self.0)(kind);
    }

    /// Returns `true` if both values refer to the same host function.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&format_args!("Arc<dyn Fn>(..)"))
            .finish()
    }
}

/// Loop argument as seen by the initialization protocol.
#[derive(Debug, Clone, Default)]
pub enum LoopArg {
    /// No loop given; resolves to the context's default loop.
    #[default]
    Unspecified,
    /// Use exactly this loop.
    Explicit(LoopRef),
}

impl From<LoopRef> for LoopArg {
    fn from(lp: LoopRef) -> Self {
        Self::Explicit(lp)
    }
}

impl From<Option<LoopRef>> for LoopArg {
    fn from(lp: Option<LoopRef>) -> Self {
        lp.map_or(Self::Unspecified, Self::Explicit)
    }
}

/// How a handle's loop was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopSource {
    /// Substituted from the process default.
    Default,
    /// Supplied by the caller.
    Explicit,
}

#[derive(Debug)]
struct Attached {
    kind: Kind,
    callback: Option<Callback>,
}

/// An event loop.
pub struct Loop {
    id: LoopId,
    poller: Option<Poller>,
    events_capacity: NonZeroUsize,
    handles: Mutex<Slab<Attached>>,
    pending: Mutex<VecDeque<usize>>,
    turns: AtomicU64,
}

impl Loop {
    /// Creates an OS-backed loop.
    pub fn native(events_capacity: NonZeroUsize) -> io::Result<LoopRef> {
        let poller = Poller::new()?;
        Ok(Arc::new(Self::with_poller(Some(poller), events_capacity)))
    }

    /// Creates a loop that never touches the OS.
    #[must_use]
    pub fn virtual_loop() -> LoopRef {
        Arc::new(Self::with_poller(None, NonZeroUsize::MIN))
    }

    fn with_poller(poller: Option<Poller>, events_capacity: NonZeroUsize) -> Self {
        Self {
            id: LoopId::next(),
            poller,
            events_capacity,
            handles: Mutex::new(Slab::new()),
            pending: Mutex::new(VecDeque::new()),
            turns: AtomicU64::new(0),
        }
    }

    /// Returns the loop identifier.
    #[must_use]
    pub fn id(&self) -> LoopId {
        self.id
    }

    /// Returns `true` for loops without an OS poller.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.poller.is_none()
    }

    /// Number of handles currently attached.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Number of completed turns.
    #[must_use]
    pub fn turns(&self) -> u64 {
        self.turns.load(Ordering::Acquire)
    }

    /// Attaches a handle and returns the registration that keeps it attached.
    pub fn attach(self: &Arc<Self>, kind: Kind, callback: Option<Callback>) -> LoopRegistration {
        let key = self.handles.lock().insert(Attached { kind, callback });
        LoopRegistration {
            lp: Arc::clone(self),
            key,
        }
    }

    /// Queues an async wakeup for `key` and interrupts a blocked turn.
    fn signal(&self, key: usize) -> io::Result<()> {
        {
            let mut pending = self.pending.lock();
            // Coalesce repeated sends before the next turn.
            if !pending.contains(&key) {
                pending.push_back(key);
            }
        }
        self.wake()
    }

    /// Interrupts a blocked [`turn`](Self::turn).
    pub fn wake(&self) -> io::Result<()> {
        match &self.poller {
            Some(poller) => poller.notify(),
            None => Ok(()),
        }
    }

    /// Runs one turn: waits up to `timeout` for a wakeup, then delivers every
    /// pending async callback. Returns the number of callbacks run.
    pub fn turn(&self, timeout: Option<Duration>) -> io::Result<usize> {
        if let Some(poller) = &self.poller {
            // Always wait so a notification latched by `signal` is consumed
            // here rather than cutting the next turn short.
            let timeout = if self.pending.lock().is_empty() {
                timeout
            } else {
                Some(Duration::ZERO)
            };
            let mut events = Events::with_capacity(self.events_capacity);
            poller.wait(&mut events, timeout)?;
        }

        let due: Vec<usize> = self.pending.lock().drain(..).collect();
        let callbacks: Vec<(Kind, Callback)> = {
            let handles = self.handles.lock();
            due.iter()
                .filter_map(|key| handles.get(*key))
                .filter_map(|attached| {
                    attached
                        .callback
                        .as_ref()
                        .map(|cb| (attached.kind, cb.clone()))
                })
                .collect()
        };

        // Callbacks run without holding loop locks so they may attach handles.
        for (kind, cb) in &callbacks {
            cb.invoke(*kind);
        }
        self.turns.fetch_add(1, Ordering::AcqRel);
        Ok(callbacks.len())
    }

    /// Returns the kinds of all attached handles, in attachment slot order.
    #[must_use]
    pub fn attached_kinds(&self) -> Vec<Kind> {
        self.handles
            .lock()
            .iter()
            .map(|(_, attached)| attached.kind)
            .collect()
    }
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("id", &self.id)
            .field("virtual", &self.is_virtual())
            .field("handles", &self.handle_count())
            .finish_non_exhaustive()
    }
}

/// Keeps one handle attached to a loop. Dropping it detaches the handle.
pub struct LoopRegistration {
    lp: LoopRef,
    key: usize,
}

impl LoopRegistration {
    /// The loop this handle is attached to.
    #[must_use]
    pub fn event_loop(&self) -> &LoopRef {
        &self.lp
    }

    /// Queues an async wakeup for this handle.
    pub fn send(&self) -> io::Result<()> {
        self.lp.signal(self.key)
    }
}

impl Drop for LoopRegistration {
    fn drop(&mut self) {
        let mut handles = self.lp.handles.lock();
        if handles.contains(self.key) {
            handles.remove(self.key);
        }
        drop(handles);
        self.lp.pending.lock().retain(|key| *key != self.key);
    }
}

impl fmt::Debug for LoopRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopRegistration")
            .field("loop", &self.lp.id)
            .field("key", &self.key)
            .finish()
    }
}
