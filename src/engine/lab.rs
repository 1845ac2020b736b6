//! Deterministic lab engine for testing.
//!
//! The [`LabEngine`] never touches the OS. Loops are virtual, descriptors and
//! paths are accepted as given, and every setup call is recorded so tests can
//! assert exactly what the initialization protocol asked for.
//!
//! # Failure injection
//!
//! - [`LabEngine::fail_next`]: the next call for an operation returns a code
//! - [`LabEngine::fail_always`]: every call for an operation returns a code
//!
//! Injections for `loop_init` also fail [`Engine::create_loop`], which is how
//! default-loop creation failures are simulated.
//!
//! ```
//! use aiobind::engine::{Engine, LabEngine};
//! use aiobind::{AioContext, Kind, args};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(LabEngine::new());
//! engine.fail_next("fs_event_init", -2);
//! let cx = AioContext::builder().engine(engine.clone()).build();
//!
//! let mut watcher = cx.construct(Kind::FsEvent).unwrap();
//! let cb = aiobind::Callback::new(|_| {});
//! let err = cx.initialize(&mut watcher, &args![aiobind::Value::Nil, "/watched", cb, 0]).unwrap_err();
//! assert_eq!(err.operation(), Some("fs_event_init"));
//! assert!(watcher.is_unusable());
//! ```

use super::{Engine, InitTarget, Platform, Setup, perform, succeeded};
use crate::config::AioConfig;
use crate::event_loop::{Loop, LoopId, LoopRef};
use crate::kind::Kind;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::path::Path;

/// One recorded setup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupCall {
    /// Operation name (`"timer_init"`).
    pub operation: &'static str,
    /// Kind initialized.
    pub kind: Kind,
    /// Loop the call attached to, if any.
    pub loop_id: Option<LoopId>,
    /// Status code returned.
    pub code: i32,
}

#[derive(Debug, Default)]
struct Injected {
    next: HashMap<&'static str, VecDeque<i32>>,
    always: HashMap<&'static str, i32>,
}

impl Injected {
    fn take(&mut self, operation: &str) -> Option<i32> {
        self.next
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.always.get(operation).copied())
    }
}

/// Engine that records calls and fails on demand.
#[derive(Debug, Default)]
pub struct LabEngine {
    calls: Mutex<Vec<SetupCall>>,
    injected: Mutex<Injected>,
    loops_created: Mutex<Vec<LoopId>>,
}

impl LabEngine {
    /// Creates an engine with no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call for `operation` return `code` without doing
    /// anything. Queued codes are used in order.
    pub fn fail_next(&self, operation: &'static str, code: i32) {
        self.injected
            .lock()
            .next
            .entry(operation)
            .or_default()
            .push_back(code);
    }

    /// Makes every call for `operation` return `code`.
    pub fn fail_always(&self, operation: &'static str, code: i32) {
        self.injected.lock().always.insert(operation, code);
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        let mut injected = self.injected.lock();
        injected.next.clear();
        injected.always.clear();
    }

    /// Every setup call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SetupCall> {
        self.calls.lock().clone()
    }

    /// Calls recorded for `operation`.
    #[must_use]
    pub fn calls_for(&self, operation: &str) -> Vec<SetupCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    /// Ids of every loop this engine created, in creation order.
    #[must_use]
    pub fn loops_created(&self) -> Vec<LoopId> {
        self.loops_created.lock().clone()
    }

    fn record(&self, setup: &Setup, code: i32) {
        self.calls.lock().push(SetupCall {
            operation: setup.operation(),
            kind: setup.kind(),
            loop_id: setup.event_loop().map(|lp| lp.id()),
            code,
        });
    }
}

impl Engine for LabEngine {
    fn name(&self) -> &'static str {
        "lab"
    }

    fn create_loop(&self, _config: &AioConfig) -> io::Result<LoopRef> {
        match self.injected.lock().take("loop_init") {
            Some(code) if !succeeded(code) => {
                Err(io::Error::from_raw_os_error(code.saturating_neg()))
            }
            _ => self.new_loop(),
        }
    }

    fn init(&self, target: InitTarget<'_>, setup: &Setup) -> i32 {
        let injected = self.injected.lock().take(setup.operation());
        let code = match injected {
            Some(code) => code,
            None => perform(self, target, setup),
        };
        self.record(setup, code);
        code
    }
}

impl Platform for LabEngine {
    fn new_loop(&self) -> io::Result<LoopRef> {
        let lp = Loop::virtual_loop();
        self.loops_created.lock().push(lp.id());
        Ok(lp)
    }

    fn check_poll_fd(&self, _fd: i32) -> Result<(), i32> {
        Ok(())
    }

    fn check_tty_fd(&self, _fd: i32) -> Result<(), i32> {
        Ok(())
    }

    fn check_path(&self, _path: &Path) -> Result<(), i32> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Resource;
    use crate::storage::Storage;

    fn init(engine: &LabEngine, setup: &Setup) -> (i32, Option<Resource>) {
        let mut storage = Storage::zeroed(64);
        let mut resource = None;
        let code = engine.init(
            InitTarget {
                storage: &mut storage,
                resource: &mut resource,
            },
            setup,
        );
        (code, resource)
    }

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn records_calls_in_order() {
        init_test("records_calls_in_order");
        let engine = LabEngine::new();
        let lp = engine
            .create_loop(&AioConfig::default())
            .expect("virtual loop");
        let timer = Setup::Handle {
            kind: Kind::Timer,
            lp: LoopRef::clone(&lp),
        };

        let (code, resource) = init(&engine, &timer);
        assert_eq!(code, 0);
        assert!(resource.is_some());
        let (code, _) = init(&engine, &Setup::Mutex);
        assert_eq!(code, 0);

        let calls = engine.calls();
        crate::assert_with_log!(calls.len() == 2, "two calls", 2, calls.len());
        assert_eq!(calls[0].operation, "timer_init");
        assert_eq!(calls[0].loop_id, Some(lp.id()));
        assert_eq!(calls[1].operation, "mutex_init");
        assert_eq!(calls[1].loop_id, None);
        assert_eq!(engine.loops_created(), vec![lp.id()]);
        crate::test_complete!("records_calls_in_order");
    }

    #[test]
    fn fail_next_is_consumed_once() {
        init_test("fail_next_is_consumed_once");
        let engine = LabEngine::new();
        engine.fail_next("sem_init", -libc::ENOMEM);

        let (code, resource) = init(&engine, &Setup::Sem { value: 1 });
        assert_eq!(code, -libc::ENOMEM);
        assert!(resource.is_none());

        let (code, resource) = init(&engine, &Setup::Sem { value: 1 });
        assert_eq!(code, 0);
        assert!(matches!(resource, Some(Resource::Semaphore(_))));
        assert_eq!(engine.calls_for("sem_init").len(), 2);
        crate::test_complete!("fail_next_is_consumed_once");
    }

    #[test]
    fn fail_always_persists_until_cleared() {
        init_test("fail_always_persists_until_cleared");
        let engine = LabEngine::new();
        engine.fail_always("cond_init", -libc::EAGAIN);
        for _ in 0..3 {
            assert_eq!(init(&engine, &Setup::Cond).0, -libc::EAGAIN);
        }
        engine.clear_failures();
        assert_eq!(init(&engine, &Setup::Cond).0, 0);
        crate::test_complete!("fail_always_persists_until_cleared");
    }

    #[test]
    fn queued_failures_run_before_always() {
        let engine = LabEngine::new();
        engine.fail_always("rwlock_init", -libc::EBUSY);
        engine.fail_next("rwlock_init", -libc::EINVAL);
        assert_eq!(init(&engine, &Setup::RwLock).0, -libc::EINVAL);
        assert_eq!(init(&engine, &Setup::RwLock).0, -libc::EBUSY);
    }

    #[test]
    fn loop_creation_honors_loop_init_failures() {
        init_test("loop_creation_honors_loop_init_failures");
        let engine = LabEngine::new();
        engine.fail_next("loop_init", -libc::EMFILE);

        let err = engine
            .create_loop(&AioConfig::default())
            .expect_err("injected");
        assert_eq!(err.raw_os_error(), Some(libc::EMFILE));
        assert!(engine.loops_created().is_empty());

        let lp = engine.create_loop(&AioConfig::default()).expect("retry");
        assert_eq!(engine.loops_created(), vec![lp.id()]);
        crate::test_complete!("loop_creation_honors_loop_init_failures");
    }

    #[test]
    fn injected_failure_leaves_storage_untouched() {
        let engine = LabEngine::new();
        engine.fail_next("barrier_init", -libc::EINVAL);
        let mut storage = Storage::zeroed(32);
        let mut resource = None;
        let code = engine.init(
            InitTarget {
                storage: &mut storage,
                resource: &mut resource,
            },
            &Setup::Barrier { count: 2 },
        );
        assert_eq!(code, -libc::EINVAL);
        assert!(storage.is_zeroed());
        assert!(resource.is_none());
    }
}
