//! The aio context: construction and initialization protocols.
//!
//! An [`AioContext`] ties together a frozen [`KindRegistry`], an [`Engine`],
//! a [`HostAllocator`] and the process default loop. Every kind goes through
//! the same two generic entry points:
//!
//! - [`AioContext::construct`] allocates a zeroed block of exactly the kind's
//!   declared size and stamps it with the kind's descriptor.
//! - [`AioContext::initialize`] validates arguments against the kind's
//!   signature, resolves the loop, performs the engine setup call and
//!   translates its status code.
//!
//! # Loop resolution
//!
//! Whether a kind binds to a loop is decided by its registered signature, not
//! at the call site. An unspecified loop resolves to the context's default
//! loop, created once on first use under a one-time guard; an explicit loop is
//! used exactly as given, even when it is the default loop itself. Kinds with
//! no loop parameter never touch the default loop.
//!
//! ```
//! use aiobind::engine::LabEngine;
//! use aiobind::{AioContext, Kind, LoopSource};
//! use std::sync::Arc;
//!
//! let cx = AioContext::builder().engine(Arc::new(LabEngine::new())).build();
//! let mut timer = cx.construct(Kind::Timer).unwrap();
//! cx.initialize(&mut timer, &[]).unwrap();
//!
//! assert!(timer.is_ready());
//! assert_eq!(timer.loop_source(), Some(LoopSource::Default));
//! assert!(Arc::ptr_eq(timer.event_loop().unwrap(), &cx.default_loop().unwrap()));
//! ```

use crate::config::AioConfig;
use crate::engine::{Engine, InitTarget, NativeEngine, Setup};
use crate::error::{self, AioError, IoError, Result};
use crate::event_loop::{LoopArg, LoopRef, LoopSource};
use crate::kind::{Kind, KindDescriptor, KindRegistry, Value};
use crate::object::{AioObject, LoopBinding, ObjectState};
use crate::storage::{HostAllocator, SystemAllocator};
use crate::tracing_compat::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Construction and initialization entry points over one engine.
pub struct AioContext {
    registry: Arc<KindRegistry>,
    engine: Arc<dyn Engine>,
    allocator: Arc<dyn HostAllocator>,
    config: AioConfig,
    default_loop: OnceLock<LoopRef>,
    default_loop_guard: Mutex<()>,
}

impl AioContext {
    /// Creates a context over the native engine with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a context.
    #[must_use]
    pub fn builder() -> AioContextBuilder {
        AioContextBuilder::new()
    }

    /// The process-wide context used by host bindings.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<AioContext> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// The kind registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<KindRegistry> {
        &self.registry
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// The storage allocator.
    #[must_use]
    pub fn allocator(&self) -> &Arc<dyn HostAllocator> {
        &self.allocator
    }

    /// The configuration this context was built with.
    #[must_use]
    pub fn config(&self) -> &AioConfig {
        &self.config
    }

    /// Constructs a zeroed object of `kind`.
    pub fn construct(&self, kind: Kind) -> Result<AioObject> {
        let descriptor = self
            .registry
            .lookup(kind)
            .ok_or_else(|| AioError::KindNotFound {
                name: kind.name().to_owned(),
            })?;
        Ok(self.allocate(descriptor))
    }

    /// Constructs an object by short name (`"tcp"`) or host type name
    /// (`"aio_tcp"`). Nothing is allocated for an unknown name.
    pub fn construct_by_name(&self, name: &str) -> Result<AioObject> {
        let descriptor = self
            .registry
            .lookup_by_name(name)
            .or_else(|| self.registry.lookup_by_type_name(name))
            .ok_or_else(|| AioError::KindNotFound {
                name: name.to_owned(),
            })?;
        Ok(self.allocate(descriptor))
    }

    fn allocate(&self, descriptor: &KindDescriptor) -> AioObject {
        let storage = self.allocator.allocate(descriptor);
        debug_assert_eq!(storage.len(), descriptor.size);
        debug_assert!(storage.is_zeroed());
        trace!(kind = %descriptor.kind, size = descriptor.size, "constructed aio object");
        AioObject::new(*descriptor, storage)
    }

    /// Initializes a constructed object with positional host arguments.
    ///
    /// On an engine failure the object stays allocated, is marked unusable,
    /// and the returned [`IoError`] names the failed operation. That includes
    /// a failure to create the default loop (`loop_init`). A signature error
    /// leaves the object untouched.
    pub fn initialize(&self, object: &mut AioObject, args: &[Value]) -> Result<()> {
        let kind = object.kind();
        object.expect_state(ObjectState::Constructed)?;
        let signature = object
            .descriptor()
            .signature
            .ok_or(AioError::UnsupportedKind { kind })?;
        let bound = signature.bind(kind, args)?;

        let binding = match bound.loop_arg() {
            None => None,
            Some(LoopArg::Explicit(lp)) => {
                Some(LoopBinding::new(Arc::clone(lp), LoopSource::Explicit))
            }
            Some(LoopArg::Unspecified) => match self.default_loop() {
                Ok(lp) => Some(LoopBinding::new(lp, LoopSource::Default)),
                Err(AioError::Io(err)) => return Err(Self::fail(object, err)),
                Err(err) => return Err(err),
            },
        };
        let setup = Setup::build(kind, &bound, binding.as_ref().map(|b| Arc::clone(b.event_loop())))?;

        let (storage, resource) = object.parts_mut();
        let code = self.engine.init(InitTarget { storage, resource }, &setup);
        match error::translate(setup.operation(), code) {
            Ok(()) => {
                debug!(
                    kind = %kind,
                    engine = self.engine.name(),
                    loop_id = ?binding.as_ref().map(|b| b.event_loop().id()),
                    "initialized aio object"
                );
                object.mark_ready(binding);
                Ok(())
            }
            Err(err) => Err(Self::fail(object, err)),
        }
    }

    fn fail(object: &mut AioObject, err: IoError) -> AioError {
        warn!(kind = %object.kind(), error = %err, "aio initialization failed");
        object.mark_unusable(err.clone());
        err.into()
    }

    /// The default loop, created on first use. Every call returns the same
    /// loop.
    pub fn default_loop(&self) -> Result<LoopRef> {
        if let Some(lp) = self.default_loop.get() {
            return Ok(Arc::clone(lp));
        }
        let _guard = self.default_loop_guard.lock();
        if let Some(lp) = self.default_loop.get() {
            return Ok(Arc::clone(lp));
        }
        let lp = self.new_loop()?;
        info!(loop_id = %lp.id(), engine = self.engine.name(), "created default loop");
        Ok(Arc::clone(self.default_loop.get_or_init(|| lp)))
    }

    /// Returns `true` once the default loop exists.
    #[must_use]
    pub fn has_default_loop(&self) -> bool {
        self.default_loop.get().is_some()
    }

    /// Creates a new, non-default loop.
    pub fn new_loop(&self) -> Result<LoopRef> {
        self.engine
            .create_loop(&self.config)
            .map_err(|err| IoError::from_io("loop_init", &err).into())
    }
}

impl Default for AioContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AioContext")
            .field("engine", &self.engine.name())
            .field("kinds", &self.registry.len())
            .field("default_loop", &self.default_loop.get().map(|lp| lp.id()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AioContext`].
#[derive(Debug, Default)]
pub struct AioContextBuilder {
    registry: Option<Arc<KindRegistry>>,
    engine: Option<Arc<dyn Engine>>,
    allocator: Option<Arc<dyn HostAllocator>>,
    config: AioConfig,
}

impl AioContextBuilder {
    /// Creates a builder with the standard registry, the native engine and
    /// the system allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom kind registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<KindRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses a custom engine.
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Uses a custom storage allocator.
    #[must_use]
    pub fn allocator(mut self, allocator: Arc<dyn HostAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Uses `config`.
    #[must_use]
    pub fn config(mut self, config: AioConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads the configuration from a TOML file.
    #[cfg(feature = "config-file")]
    pub fn config_file(
        self,
        path: impl AsRef<std::path::Path>,
    ) -> std::result::Result<Self, crate::config::ConfigError> {
        let config = AioConfig::from_toml_file(path)?;
        Ok(self.config(config))
    }

    /// Builds the context.
    ///
    /// With `eager_default_loop` set, the default loop is created here. If
    /// that fails the failure is logged and creation is retried on first use,
    /// where the error is returned to the caller.
    #[must_use]
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    pub fn build(self) -> AioContext {
        let config = self.config;
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(NativeEngine::from_config(&config)));
        let cx = AioContext {
            registry: self.registry.unwrap_or_else(KindRegistry::standard),
            engine,
            allocator: self.allocator.unwrap_or_else(|| Arc::new(SystemAllocator)),
            config,
            default_loop: OnceLock::new(),
            default_loop_guard: Mutex::new(()),
        };
        if cx.config.eager_default_loop {
            if let Err(err) = cx.default_loop() {
                warn!(error = %err, "eager default loop creation failed");
            }
        }
        cx
    }
}
