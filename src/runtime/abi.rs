#![allow(unsafe_op_in_unsafe_fn)]

// Host side of the calling convention shared with generated code.
// Layouts here must stay in lockstep with `language::compiler::ValueTypes`.

use super::{
    error::{RuntimeError, RuntimeResult},
    session,
    value::Value,
};
use std::{fmt::Write as _, ptr, slice};

pub const TYPE_NULL: u8 = 0;
pub const TYPE_INT: u8 = 1;
pub const TYPE_FLOAT: u8 = 2;
pub const TYPE_STRING: u8 = 3;

/// Symbols the execution engine may bind. Nothing else resolves.
pub const ALLOCATE_SYMBOL: &str = "allocate";
pub const PRINT_SYMBOL: &str = "print";
pub const PRINTLN_SYMBOL: &str = "println";
pub const NATIVE_SYMBOLS: [&str; 3] = [ALLOCATE_SYMBOL, PRINT_SYMBOL, PRINTLN_SYMBOL];

/// Type discriminator stored in the first field of every runtime value.
///
/// The discriminant doubles as the index into the logical dispatch table, so
/// the order of variants is part of the ABI.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Null = TYPE_NULL,
    Int = TYPE_INT,
    Float = TYPE_FLOAT,
    String = TYPE_STRING,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Null, Tag::Int, Tag::Float, Tag::String];

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            TYPE_NULL => Some(Tag::Null),
            TYPE_INT => Some(Tag::Int),
            TYPE_FLOAT => Some(Tag::Float),
            TYPE_STRING => Some(Tag::String),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Null => "null",
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::String => "string",
        }
    }
}

/// `{ i8 tag, ptr payload }` as generated code sees it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawValue {
    pub tag: u8,
    pub payload: *mut u8,
}

impl RawValue {
    pub const fn null() -> Self {
        Self {
            tag: TYPE_NULL,
            payload: ptr::null_mut(),
        }
    }

    pub fn tag(&self) -> Option<Tag> {
        Tag::from_u8(self.tag)
    }

    /// # Safety
    /// `payload` must point at a live payload block for `tag`.
    pub unsafe fn read_int(&self) -> Option<i64> {
        if self.tag != TYPE_INT || self.payload.is_null() {
            return None;
        }
        Some(self.payload.cast::<i64>().read())
    }

    /// # Safety
    /// `payload` must point at a live payload block for `tag`.
    pub unsafe fn read_float(&self) -> Option<f64> {
        if self.tag != TYPE_FLOAT || self.payload.is_null() {
            return None;
        }
        Some(self.payload.cast::<f64>().read())
    }

    /// Code points up to (not including) the zero terminator.
    ///
    /// # Safety
    /// `payload` must point at a live, zero-terminated code point block.
    pub unsafe fn read_code_points(&self) -> Option<Vec<u32>> {
        if self.tag != TYPE_STRING || self.payload.is_null() {
            return None;
        }
        let base = self.payload.cast::<u32>();
        let mut len = 0;
        while base.add(len).read() != 0 {
            len += 1;
        }
        Some(slice::from_raw_parts(base, len).to_vec())
    }

    /// # Safety
    /// See [`RawValue::read_code_points`].
    pub unsafe fn read_string(&self) -> Option<String> {
        self.read_code_points().map(|points| {
            points
                .into_iter()
                .map(|cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        })
    }

    /// Decode into an owned host value.
    ///
    /// # Safety
    /// `payload` must point at a live payload block for `tag`.
    pub unsafe fn to_value(&self) -> RuntimeResult<Value> {
        let tag = self
            .tag()
            .ok_or(RuntimeError::UnknownTag { tag: self.tag })?;
        let missing = || RuntimeError::MissingPayload { tag: tag.name() };
        match tag {
            Tag::Null => Ok(Value::Null),
            Tag::Int => self.read_int().map(Value::Int).ok_or_else(missing),
            Tag::Float => self.read_float().map(Value::Float).ok_or_else(missing),
            Tag::String => self.read_string().map(Value::String).ok_or_else(missing),
        }
    }
}

/// Bound to the `allocate` declaration of every module.
pub extern "C" fn plsm_allocate(size: u64) -> *mut u8 {
    session::allocate(size)
}

/// # Safety
/// `args` must be null or point at `argc` initialized values.
pub unsafe extern "C" fn plsm_print(argc: i32, args: *const RawValue) {
    session::write(&render_args(argc, args));
}

/// # Safety
/// `args` must be null or point at `argc` initialized values.
pub unsafe extern "C" fn plsm_println(argc: i32, args: *const RawValue) {
    let mut line = render_args(argc, args);
    line.push('\n');
    session::write(&line);
}

unsafe fn render_args(argc: i32, args: *const RawValue) -> String {
    let mut out = String::new();
    let count = usize::try_from(argc).unwrap_or(0);
    if args.is_null() || count == 0 {
        return out;
    }
    for (idx, raw) in slice::from_raw_parts(args, count).iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        let _ = match raw.to_value() {
            Ok(value) => write!(out, "{value}"),
            Err(err) => write!(out, "<{err}>"),
        };
    }
    out
}
