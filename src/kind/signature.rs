//! Initializer signatures and host argument values.
//!
//! Every kind that can be initialized declares a fixed, ordered parameter list
//! at registration time. Host calls pass positional [`Value`]s; [`Signature::bind`]
//! checks them against the declared list and produces typed [`BoundArgs`].
//!
//! Only `Loop` parameters may be omitted: an absent or `Nil` loop argument
//! binds to [`LoopArg::Unspecified`], which the initialization protocol
//! resolves to the default loop. Every other parameter is required.
//!
//! Signatures render in the compact host notation used for method
//! registration (`loop=o,filename=S,cb=o,flags=N`).

use super::Kind;
use crate::event_loop::{Callback, LoopArg, LoopRef};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// Type of one initializer parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Event loop reference; may be left unspecified.
    Loop,
    /// String (paths).
    Str,
    /// Non-negative count or bit set that fits in 32 bits.
    Count,
    /// Integer interpreted as a boolean (non-zero is true).
    Flag,
    /// File descriptor given as a number.
    Fd,
    /// File descriptor given as a host file object.
    File,
    /// Host callback reference.
    Callback,
}

impl ParamType {
    /// Host notation code: `o` object, `S` string, `N` number.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Loop | Self::File | Self::Callback => 'o',
            Self::Str => 'S',
            Self::Count | Self::Flag | Self::Fd => 'N',
        }
    }

    /// Human-readable description for error messages.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Loop => "a loop",
            Self::Str => "a string",
            Self::Count => "a non-negative integer",
            Self::Flag => "an integer flag",
            Self::Fd => "a file descriptor",
            Self::File => "a file",
            Self::Callback => "a callback",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// One named initializer parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Param {
    /// Parameter name.
    pub name: &'static str,
    /// Parameter type.
    pub ty: ParamType,
}

impl Param {
    /// Creates a parameter.
    #[must_use]
    pub const fn new(name: &'static str, ty: ParamType) -> Self {
        Self { name, ty }
    }

    /// Returns `true` if the parameter may be omitted.
    #[must_use]
    pub const fn is_defaultable(self) -> bool {
        matches!(self.ty, ParamType::Loop)
    }
}

/// Fixed, ordered initializer parameter list for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Signature {
    params: &'static [Param],
}

/// `loop=o`
pub const LOOP_ONLY: Signature = Signature::new(&[Param::new("loop", ParamType::Loop)]);
/// No parameters.
pub const EMPTY: Signature = Signature::new(&[]);

impl Signature {
    /// Creates a signature from a static parameter list.
    #[must_use]
    pub const fn new(params: &'static [Param]) -> Self {
        Self { params }
    }

    /// Declared parameters, in order.
    #[must_use]
    pub const fn params(&self) -> &'static [Param] {
        self.params
    }

    /// Number of declared parameters.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the kind binds to an event loop.
    #[must_use]
    pub fn takes_loop(&self) -> bool {
        self.params.iter().any(|p| p.ty == ParamType::Loop)
    }

    /// Checks `args` against this signature for `kind`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] if an argument is missing, has the wrong
    /// shape, is out of range, or if too many arguments were given.
    pub fn bind(&self, kind: Kind, args: &[Value]) -> Result<BoundArgs, SignatureError> {
        if args.len() > self.params.len() {
            return Err(SignatureError::TooMany {
                kind,
                max: self.params.len(),
                given: args.len(),
            });
        }

        let nil = Value::Nil;
        let mut bound = SmallVec::new();
        for (i, param) in self.params.iter().enumerate() {
            let value = args.get(i).unwrap_or(&nil);
            bound.push((param.name, bind_one(kind, *param, value)?));
        }
        Ok(BoundArgs { kind, args: bound })
    }
}

fn bind_one(kind: Kind, param: Param, value: &Value) -> Result<BoundArg, SignatureError> {
    let mismatch = || SignatureError::Mismatch {
        kind,
        param: param.name,
        expected: param.ty,
        found: value.shape(),
    };
    let out_of_range = |value: i64| SignatureError::OutOfRange {
        kind,
        param: param.name,
        value,
    };

    match (param.ty, value) {
        (ParamType::Loop, Value::Nil) => Ok(BoundArg::Loop(LoopArg::Unspecified)),
        (ParamType::Loop, Value::Loop(lp)) => Ok(BoundArg::Loop(LoopArg::Explicit(lp.clone()))),
        (_, Value::Nil) => Err(SignatureError::Missing {
            kind,
            param: param.name,
        }),
        (ParamType::Str, Value::Str(s)) => Ok(BoundArg::Str(s.clone())),
        (ParamType::Count, Value::Int(n)) => u32::try_from(*n)
            .map(BoundArg::Count)
            .map_err(|_| out_of_range(*n)),
        (ParamType::Flag, Value::Int(n)) => Ok(BoundArg::Flag(*n != 0)),
        (ParamType::Fd | ParamType::File, Value::Int(n)) => i32::try_from(*n)
            .ok()
            .filter(|fd| *fd >= 0)
            .map(BoundArg::Fd)
            .ok_or_else(|| out_of_range(*n)),
        (ParamType::Callback, Value::Callback(cb)) => Ok(BoundArg::Callback(cb.clone())),
        _ => Err(mismatch()),
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", param.name, param.ty.code())?;
        }
        Ok(())
    }
}

/// A positional host argument.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent / unspecified.
    #[default]
    Nil,
    /// Event loop reference.
    Loop(LoopRef),
    /// String.
    Str(String),
    /// Integer.
    Int(i64),
    /// Callback reference.
    Callback(Callback),
}

impl Value {
    /// Shape name used in error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Loop(_) => "loop",
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Callback(_) => "callback",
        }
    }
}

impl From<LoopRef> for Value {
    fn from(lp: LoopRef) -> Self {
        Self::Loop(lp)
    }
}

impl From<LoopArg> for Value {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::Unspecified => Self::Nil,
            LoopArg::Explicit(lp) => Self::Loop(lp),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Int(i64::from(b))
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Self::Callback(cb)
    }
}

/// Builds a positional argument list from anything convertible to [`Value`].
///
/// ```
/// use aiobind::{args, Value};
///
/// let argv: Vec<Value> = args![Value::Nil, "/tmp", 0];
/// assert_eq!(argv.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($arg)),+]
    };
}

/// A validated argument.
#[derive(Debug, Clone)]
pub enum BoundArg {
    /// Loop argument (possibly unspecified).
    Loop(LoopArg),
    /// String argument.
    Str(String),
    /// Count or bit set.
    Count(u32),
    /// Boolean flag.
    Flag(bool),
    /// File descriptor.
    Fd(i32),
    /// Callback.
    Callback(Callback),
}

/// Arguments validated against a kind's signature.
#[derive(Debug, Clone)]
pub struct BoundArgs {
    kind: Kind,
    args: SmallVec<[(&'static str, BoundArg); 4]>,
}

impl BoundArgs {
    /// The kind these arguments were bound for.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` if the signature had no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn get(&self, name: &'static str) -> Result<&BoundArg, SignatureError> {
        self.args
            .iter()
            .find(|(param, _)| *param == name)
            .map(|(_, arg)| arg)
            .ok_or(SignatureError::Missing {
                kind: self.kind,
                param: name,
            })
    }

    fn wrong(&self, name: &'static str, expected: ParamType, arg: &BoundArg) -> SignatureError {
        let found = match arg {
            BoundArg::Loop(_) => "loop",
            BoundArg::Str(_) => "string",
            BoundArg::Count(_) | BoundArg::Flag(_) | BoundArg::Fd(_) => "integer",
            BoundArg::Callback(_) => "callback",
        };
        SignatureError::Mismatch {
            kind: self.kind,
            param: name,
            expected,
            found,
        }
    }

    /// The loop argument, if the signature declared one.
    #[must_use]
    pub fn loop_arg(&self) -> Option<&LoopArg> {
        self.args.iter().find_map(|(_, arg)| match arg {
            BoundArg::Loop(lp) => Some(lp),
            _ => None,
        })
    }

    /// String parameter `name`.
    pub fn string(&self, name: &'static str) -> Result<&str, SignatureError> {
        match self.get(name)? {
            BoundArg::Str(s) => Ok(s),
            other => Err(self.wrong(name, ParamType::Str, other)),
        }
    }

    /// Count parameter `name`.
    pub fn count(&self, name: &'static str) -> Result<u32, SignatureError> {
        match self.get(name)? {
            BoundArg::Count(n) => Ok(*n),
            other => Err(self.wrong(name, ParamType::Count, other)),
        }
    }

    /// Flag parameter `name`.
    pub fn flag(&self, name: &'static str) -> Result<bool, SignatureError> {
        match self.get(name)? {
            BoundArg::Flag(b) => Ok(*b),
            other => Err(self.wrong(name, ParamType::Flag, other)),
        }
    }

    /// File descriptor parameter `name`.
    pub fn fd(&self, name: &'static str) -> Result<i32, SignatureError> {
        match self.get(name)? {
            BoundArg::Fd(fd) => Ok(*fd),
            other => Err(self.wrong(name, ParamType::Fd, other)),
        }
    }

    /// Callback parameter `name`.
    pub fn callback(&self, name: &'static str) -> Result<Callback, SignatureError> {
        match self.get(name)? {
            BoundArg::Callback(cb) => Ok(cb.clone()),
            other => Err(self.wrong(name, ParamType::Callback, other)),
        }
    }
}

/// Argument list does not match a kind's initializer signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// A required parameter was not supplied.
    #[error("{kind}.init: missing required argument `{param}`")]
    Missing {
        /// Kind being initialized.
        kind: Kind,
        /// Parameter name.
        param: &'static str,
    },
    /// An argument has the wrong shape.
    #[error("{kind}.init: argument `{param}` expects {expected}, got {found}")]
    Mismatch {
        /// Kind being initialized.
        kind: Kind,
        /// Parameter name.
        param: &'static str,
        /// Declared parameter type.
        expected: ParamType,
        /// Shape of the supplied value.
        found: &'static str,
    },
    /// An integer argument is outside its parameter's range.
    #[error("{kind}.init: argument `{param}` out of range: {value}")]
    OutOfRange {
        /// Kind being initialized.
        kind: Kind,
        /// Parameter name.
        param: &'static str,
        /// Supplied value.
        value: i64,
    },
    /// More arguments than declared parameters.
    #[error("{kind}.init takes at most {max} arguments, got {given}")]
    TooMany {
        /// Kind being initialized.
        kind: Kind,
        /// Declared arity.
        max: usize,
        /// Supplied count.
        given: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::Loop;
    use std::sync::Arc;

    const FS_EVENT: Signature = Signature::new(&[
        Param::new("loop", ParamType::Loop),
        Param::new("filename", ParamType::Str),
        Param::new("cb", ParamType::Callback),
        Param::new("flags", ParamType::Count),
    ]);

    const BARRIER: Signature = Signature::new(&[Param::new("count", ParamType::Count)]);

    #[test]
    fn renders_compact_notation() {
        assert_eq!(FS_EVENT.to_string(), "loop=o,filename=S,cb=o,flags=N");
        assert_eq!(LOOP_ONLY.to_string(), "loop=o");
        assert_eq!(EMPTY.to_string(), "");
        assert!(FS_EVENT.takes_loop());
        assert!(!BARRIER.takes_loop());
        assert_eq!(FS_EVENT.arity(), 4);
    }

    #[test]
    fn omitted_loop_binds_unspecified() {
        let bound = LOOP_ONLY.bind(Kind::Tcp, &[]).expect("bind");
        assert!(matches!(bound.loop_arg(), Some(LoopArg::Unspecified)));

        let bound = LOOP_ONLY.bind(Kind::Tcp, &[Value::Nil]).expect("bind nil");
        assert!(matches!(bound.loop_arg(), Some(LoopArg::Unspecified)));
    }

    #[test]
    fn explicit_loop_is_kept_by_reference() {
        let lp = Loop::virtual_loop();
        let bound = LOOP_ONLY
            .bind(Kind::Timer, &[Value::Loop(Arc::clone(&lp))])
            .expect("bind");
        match bound.loop_arg() {
            Some(LoopArg::Explicit(got)) => assert!(Arc::ptr_eq(got, &lp)),
            other => panic!("expected explicit loop, got {other:?}"),
        }
    }

    #[test]
    fn missing_count_is_an_error_not_zero() {
        let err = BARRIER.bind(Kind::Barrier, &[]).expect_err("missing count");
        assert_eq!(
            err,
            SignatureError::Missing {
                kind: Kind::Barrier,
                param: "count"
            }
        );
        assert!(err.to_string().contains("`count`"));
    }

    #[test]
    fn shape_mismatch_reports_expected_and_found() {
        let err = BARRIER
            .bind(Kind::Barrier, &[Value::from("three")])
            .expect_err("mismatch");
        assert_eq!(
            err,
            SignatureError::Mismatch {
                kind: Kind::Barrier,
                param: "count",
                expected: ParamType::Count,
                found: "string",
            }
        );
    }

    #[test]
    fn negative_count_is_out_of_range() {
        let err = BARRIER
            .bind(Kind::Barrier, &[Value::Int(-1)])
            .expect_err("negative");
        assert!(matches!(err, SignatureError::OutOfRange { value: -1, .. }));
    }

    #[test]
    fn too_many_arguments() {
        let err = EMPTY
            .bind(Kind::Mutex, &[Value::Int(1)])
            .expect_err("too many");
        assert_eq!(
            err,
            SignatureError::TooMany {
                kind: Kind::Mutex,
                max: 0,
                given: 1
            }
        );
    }

    #[test]
    fn full_fs_event_bind() {
        let cb = Callback::new(|_| {});
        let bound = FS_EVENT
            .bind(
                Kind::FsEvent,
                &crate::args![Value::Nil, "/tmp/watched", cb.clone(), 4],
            )
            .expect("bind");
        assert_eq!(bound.len(), 4);
        assert_eq!(bound.string("filename").expect("filename"), "/tmp/watched");
        assert_eq!(bound.count("flags").expect("flags"), 4);
        assert!(bound.callback("cb").expect("cb").same_as(&cb));
        assert!(matches!(
            bound.count("filename"),
            Err(SignatureError::Mismatch { .. })
        ));
        assert!(matches!(
            bound.fd("fd"),
            Err(SignatureError::Missing { param: "fd", .. })
        ));
    }

    #[test]
    fn flag_accepts_any_integer() {
        const PIPE: Signature = Signature::new(&[
            Param::new("loop", ParamType::Loop),
            Param::new("ipc", ParamType::Flag),
        ]);
        let on = PIPE.bind(Kind::Pipe, &crate::args![Value::Nil, 7]).expect("bind");
        assert!(on.flag("ipc").expect("ipc"));
        let off = PIPE.bind(Kind::Pipe, &crate::args![Value::Nil, false]).expect("bind");
        assert!(!off.flag("ipc").expect("ipc"));
    }

    #[test]
    fn fd_rejects_negative_and_oversized() {
        const POLL: Signature = Signature::new(&[
            Param::new("loop", ParamType::Loop),
            Param::new("fd", ParamType::Fd),
        ]);
        for bad in [-1_i64, i64::from(i32::MAX) + 1] {
            let err = POLL
                .bind(Kind::Poll, &[Value::Nil, Value::Int(bad)])
                .expect_err("bad fd");
            assert!(matches!(err, SignatureError::OutOfRange { .. }), "{bad}");
        }
    }

    #[test]
    fn signature_serializes_as_param_list() {
        let json = serde_json::to_string(&BARRIER).expect("serialize");
        assert_eq!(json, r#"[{"name":"count","ty":"count"}]"#);
    }
}
