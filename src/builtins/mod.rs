//! # Built-in Functions
//!
//! The host-implemented callables bound into the engine's root frame,
//! organized by category:
//!
//! - **[arithmetic]**: +, -, *, /, mod - 64-bit checked integer operations
//! - **[comparison]**: =, <, >, <=, >= - chained comparisons
//! - **[lists]**: cons, car, cdr, list, list*, length, reverse, append, list-copy
//! - **[types]**: null?, pair?, symbol?, number?, string?, callable?, undefined?, not
//! - **[strings]**: string-length, string-append, string->symbol, symbol->string
//! - **[vectors]**: vector, vector-length, vector-ref, vector-set!
//! - **[console]**: print, println
//! - **[control]**: apply, identity
//!
//! Each category module exposes a `register` function binding its
//! builtins; `register_all` runs every one of them.

use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::Object;
use crate::symbol::core_symbol;
use std::rc::Rc;

pub mod arithmetic;
pub mod comparison;
pub mod console;
pub mod control;
pub mod lists;
pub mod strings;
pub mod types;
pub mod vectors;

/// Binds a builtin in `frame` under its own name.
pub fn bind_builtin(frame: &Rc<Frame>, builtin: Builtin) -> Result<(), EvalError> {
    let sym = core_symbol(builtin.name);
    frame.bind(sym, Object::Builtin(Rc::new(builtin)))
}

/// Registers every builtin category in `frame`.
pub fn register_all(frame: &Rc<Frame>) -> Result<(), EvalError> {
    arithmetic::register(frame)?;
    comparison::register(frame)?;
    lists::register(frame)?;
    types::register(frame)?;
    strings::register(frame)?;
    vectors::register(frame)?;
    console::register(frame)?;
    control::register(frame)?;
    Ok(())
}

/// Extracts an integer argument, reporting the 1-based position on
/// mismatch.
pub(crate) fn int_arg(function: &'static str, args: &[Object], pos: usize) -> Result<i64, Control> {
    args[pos].as_int().ok_or_else(|| {
        Control::Fail(EvalError::type_mismatch(
            function,
            "integer",
            args[pos].type_name(),
            pos + 1,
        ))
    })
}

/// Extracts a string argument.
pub(crate) fn str_arg<'a>(
    function: &'static str,
    args: &'a [Object],
    pos: usize,
) -> Result<&'a str, Control> {
    match &args[pos] {
        Object::Str(s) => Ok(s.as_ref()),
        other => Err(Control::Fail(EvalError::type_mismatch(
            function,
            "string",
            other.type_name(),
            pos + 1,
        ))),
    }
}
