//! Type predicates: null?, pair?, symbol?, number?, string?, callable?,
//! undefined?, not

use super::bind_builtin;
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::{make_boolean, Object};
use std::rc::Rc;

pub fn builtin_null_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(arg.is_nil()))
}

pub fn builtin_pair_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(arg.as_pair().is_some()))
}

pub fn builtin_symbol_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(arg.as_sym().is_some()))
}

pub fn builtin_number_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(arg.as_int().is_some()))
}

pub fn builtin_string_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(matches!(arg, Object::Str(_))))
}

pub fn builtin_callable_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(matches!(
        arg,
        Object::Builtin(_) | Object::Procedure(_)
    )))
}

pub fn builtin_undefined_p(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(matches!(arg, Object::Undefined)))
}

/// `(not x)` - logical negation under the uniform truth predicate.
pub fn builtin_not(arg: &Object) -> Result<Object, Control> {
    Ok(make_boolean(!arg.is_true()))
}

// Arity 1 is enforced before dispatch, so every call routes through fn1
// and the fnn slot never runs.
fn unary_fallback(_args: &[Object]) -> Result<Object, Control> {
    Err(Control::Fail(EvalError::runtime(
        "builtin",
        "unary dispatch missed",
    )))
}

fn unary(name: &'static str, f: fn(&Object) -> Result<Object, Control>) -> Builtin {
    Builtin::new(name, 1, Some(1), unary_fallback).pure().with1(f)
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(frame, unary("null?", builtin_null_p))?;
    bind_builtin(frame, unary("pair?", builtin_pair_p))?;
    bind_builtin(frame, unary("symbol?", builtin_symbol_p))?;
    bind_builtin(frame, unary("number?", builtin_number_p))?;
    bind_builtin(frame, unary("string?", builtin_string_p))?;
    bind_builtin(frame, unary("callable?", builtin_callable_p))?;
    bind_builtin(frame, unary("undefined?", builtin_undefined_p))?;
    bind_builtin(frame, unary("not", builtin_not))?;
    Ok(())
}
