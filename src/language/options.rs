use inkwell::OptimizationLevel;
use std::env;

/// Status the entry point returns when `main` completes, whatever `main`
/// produced.
pub const DEFAULT_EXIT_STATUS: i8 = 42;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptLevel {
    None,
    Less,
    #[default]
    Default,
    Aggressive,
}

impl OptLevel {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(OptLevel::None),
            1 => Some(OptLevel::Less),
            2 => Some(OptLevel::Default),
            3 => Some(OptLevel::Aggressive),
            _ => None,
        }
    }

    /// New pass manager pipeline, or `None` when optimization is off.
    pub fn pipeline(self) -> Option<&'static str> {
        match self {
            OptLevel::None => None,
            OptLevel::Less => Some("default<O1>"),
            OptLevel::Default => Some("default<O2>"),
            OptLevel::Aggressive => Some("default<O3>"),
        }
    }

    pub fn codegen_level(self) -> OptimizationLevel {
        match self {
            OptLevel::None => OptimizationLevel::None,
            OptLevel::Less => OptimizationLevel::Less,
            OptLevel::Default => OptimizationLevel::Default,
            OptLevel::Aggressive => OptimizationLevel::Aggressive,
        }
    }
}

/// What happens when a call names a function nobody has defined yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnresolvedCallPolicy {
    /// Fail compilation with `CodegenError::UnknownFunction`.
    #[default]
    Error,
    /// Record a warning and call through a null callable, which crashes if
    /// the call is ever executed.
    Warn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatusPolicy {
    Fixed(i8),
    /// Truncate an INT result of `main` to the status; anything else is 0.
    Propagate,
}

impl Default for ExitStatusPolicy {
    fn default() -> Self {
        ExitStatusPolicy::Fixed(DEFAULT_EXIT_STATUS)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub opt_level: OptLevel,
    pub unresolved_calls: UnresolvedCallPolicy,
    pub exit_status: ExitStatusPolicy,
    pub dump_ir: bool,
}

impl CompileOptions {
    /// Defaults overridden by `PLSM_OPT_LEVEL`, `PLSM_LENIENT_CALLS`,
    /// `PLSM_EXIT_STATUS` and `PLSM_DUMP_IR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(raw) = lookup("PLSM_OPT_LEVEL") {
            match raw.trim().parse().ok().and_then(OptLevel::from_level) {
                Some(level) => options.opt_level = level,
                None => log::warn!("ignoring PLSM_OPT_LEVEL={raw}: expected 0-3"),
            }
        }
        if lookup("PLSM_LENIENT_CALLS").as_deref() == Some("1") {
            options.unresolved_calls = UnresolvedCallPolicy::Warn;
        }
        if let Some(raw) = lookup("PLSM_EXIT_STATUS") {
            match raw.trim() {
                "propagate" => options.exit_status = ExitStatusPolicy::Propagate,
                other => match other.parse() {
                    Ok(code) => options.exit_status = ExitStatusPolicy::Fixed(code),
                    Err(_) => log::warn!(
                        "ignoring PLSM_EXIT_STATUS={raw}: expected `propagate` or an i8"
                    ),
                },
            }
        }
        options.dump_ir = lookup("PLSM_DUMP_IR").as_deref() == Some("1");
        options
    }
}
