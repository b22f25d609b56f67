//! Comparison operations: =, <, >, <=, >=
//!
//! `=` is deep structural equality over any values; the orderings chain
//! over integers. All return the canonical booleans `T` and `()`.

use super::{bind_builtin, int_arg};
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::{make_boolean, Object};
use std::rc::Rc;

/// `(= a b ...)` - deep equality of all arguments.
pub fn builtin_eq(args: &[Object]) -> Result<Object, Control> {
    let equal = args.windows(2).all(|w| w[0].is_equal(&w[1]));
    Ok(make_boolean(equal))
}

fn chain(
    function: &'static str,
    args: &[Object],
    ok: fn(i64, i64) -> bool,
) -> Result<Object, Control> {
    for pos in 1..args.len() {
        let a = int_arg(function, args, pos - 1)?;
        let b = int_arg(function, args, pos)?;
        if !ok(a, b) {
            return Ok(make_boolean(false));
        }
    }
    // Single arguments still type-check.
    if args.len() == 1 {
        int_arg(function, args, 0)?;
    }
    Ok(make_boolean(true))
}

pub fn builtin_lt(args: &[Object]) -> Result<Object, Control> {
    chain("<", args, |a, b| a < b)
}

pub fn builtin_gt(args: &[Object]) -> Result<Object, Control> {
    chain(">", args, |a, b| a > b)
}

pub fn builtin_le(args: &[Object]) -> Result<Object, Control> {
    chain("<=", args, |a, b| a <= b)
}

pub fn builtin_ge(args: &[Object]) -> Result<Object, Control> {
    chain(">=", args, |a, b| a >= b)
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(frame, Builtin::new("=", 1, None, builtin_eq).pure())?;
    bind_builtin(frame, Builtin::new("<", 1, None, builtin_lt).pure())?;
    bind_builtin(frame, Builtin::new(">", 1, None, builtin_gt).pure())?;
    bind_builtin(frame, Builtin::new("<=", 1, None, builtin_le).pure())?;
    bind_builtin(frame, Builtin::new(">=", 1, None, builtin_ge).pure())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Vec<Object> {
        ns.iter().map(|n| Object::Int(*n)).collect()
    }

    #[test]
    fn test_eq_deep() {
        let a = Object::from_vec(ints(&[1, 2]));
        let b = Object::from_vec(ints(&[1, 2]));
        assert!(builtin_eq(&[a, b]).unwrap().is_true());
        assert!(!builtin_eq(&ints(&[1, 2])).unwrap().is_true());
    }

    #[test]
    fn test_orderings_chain() {
        assert!(builtin_lt(&ints(&[1, 2, 3])).unwrap().is_true());
        assert!(!builtin_lt(&ints(&[1, 3, 2])).unwrap().is_true());
        assert!(builtin_le(&ints(&[1, 1, 2])).unwrap().is_true());
        assert!(builtin_gt(&ints(&[3, 2, 1])).unwrap().is_true());
        assert!(builtin_ge(&ints(&[3, 3])).unwrap().is_true());
    }

    #[test]
    fn test_single_argument_is_true_but_typechecked() {
        assert!(builtin_lt(&ints(&[1])).unwrap().is_true());
        assert!(builtin_lt(&[Object::string("x")]).is_err());
    }
}
