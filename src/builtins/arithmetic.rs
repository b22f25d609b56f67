//! Arithmetic operations: +, -, *, /, mod
//!
//! 64-bit integer arithmetic with overflow checking. All five are pure
//! and fold during improvement when every argument is constant.

use super::{bind_builtin, int_arg};
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::Object;
use std::rc::Rc;

fn overflow(function: &'static str) -> Control {
    Control::Fail(EvalError::runtime(function, "integer overflow"))
}

fn div_by_zero(function: &'static str) -> Control {
    Control::Fail(EvalError::runtime(function, "division by zero"))
}

/// `(+ ...)` - sum of all arguments; `(+)` is 0.
pub fn builtin_add(args: &[Object]) -> Result<Object, Control> {
    let mut sum: i64 = 0;
    for pos in 0..args.len() {
        let n = int_arg("+", args, pos)?;
        sum = sum.checked_add(n).ok_or_else(|| overflow("+"))?;
    }
    Ok(Object::Int(sum))
}

fn add2(a: &Object, b: &Object) -> Result<Object, Control> {
    builtin_add(&[a.clone(), b.clone()])
}

/// `(- n ...)` - subtract subsequent arguments from the first; with one
/// argument, its negation.
pub fn builtin_sub(args: &[Object]) -> Result<Object, Control> {
    let first = int_arg("-", args, 0)?;
    if args.len() == 1 {
        return first
            .checked_neg()
            .map(Object::Int)
            .ok_or_else(|| overflow("-"));
    }
    let mut result = first;
    for pos in 1..args.len() {
        let n = int_arg("-", args, pos)?;
        result = result.checked_sub(n).ok_or_else(|| overflow("-"))?;
    }
    Ok(Object::Int(result))
}

fn sub2(a: &Object, b: &Object) -> Result<Object, Control> {
    builtin_sub(&[a.clone(), b.clone()])
}

/// `(* ...)` - product of all arguments; `(*)` is 1.
pub fn builtin_mul(args: &[Object]) -> Result<Object, Control> {
    let mut product: i64 = 1;
    for pos in 0..args.len() {
        let n = int_arg("*", args, pos)?;
        product = product.checked_mul(n).ok_or_else(|| overflow("*"))?;
    }
    Ok(Object::Int(product))
}

/// `(/ n ...)` - truncating division of the first argument by the rest;
/// with one argument, the integer reciprocal.
pub fn builtin_div(args: &[Object]) -> Result<Object, Control> {
    let first = int_arg("/", args, 0)?;
    if args.len() == 1 {
        if first == 0 {
            return Err(div_by_zero("/"));
        }
        return Ok(Object::Int(1 / first));
    }
    let mut result = first;
    for pos in 1..args.len() {
        let n = int_arg("/", args, pos)?;
        if n == 0 {
            return Err(div_by_zero("/"));
        }
        result = result.checked_div(n).ok_or_else(|| overflow("/"))?;
    }
    Ok(Object::Int(result))
}

/// `(mod a b)` - remainder of truncating division.
pub fn builtin_mod(args: &[Object]) -> Result<Object, Control> {
    let a = int_arg("mod", args, 0)?;
    let b = int_arg("mod", args, 1)?;
    if b == 0 {
        return Err(div_by_zero("mod"));
    }
    a.checked_rem(b)
        .map(Object::Int)
        .ok_or_else(|| overflow("mod"))
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(
        frame,
        Builtin::new("+", 0, None, builtin_add)
            .pure()
            .with0(|| Ok(Object::Int(0)))
            .with2(add2),
    )?;
    bind_builtin(
        frame,
        Builtin::new("-", 1, None, builtin_sub).pure().with2(sub2),
    )?;
    bind_builtin(frame, Builtin::new("*", 0, None, builtin_mul).pure())?;
    bind_builtin(frame, Builtin::new("/", 1, None, builtin_div).pure())?;
    bind_builtin(frame, Builtin::new("mod", 2, Some(2), builtin_mod).pure())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Vec<Object> {
        ns.iter().map(|n| Object::Int(*n)).collect()
    }

    #[test]
    fn test_add() {
        assert_eq!(builtin_add(&ints(&[1, 2, 3])).unwrap(), Object::Int(6));
        assert_eq!(builtin_add(&[]).unwrap(), Object::Int(0));
    }

    #[test]
    fn test_add_overflow() {
        let res = builtin_add(&ints(&[i64::MAX, 1]));
        assert!(matches!(
            res,
            Err(Control::Fail(EvalError::RuntimeError { .. }))
        ));
    }

    #[test]
    fn test_add_type_mismatch_positions() {
        let res = builtin_add(&[Object::Int(1), Object::string("x")]);
        match res {
            Err(Control::Fail(EvalError::TypeMismatch { position, .. })) => {
                assert_eq!(position, 2);
            }
            other => panic!("expected type mismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_sub_and_negation() {
        assert_eq!(builtin_sub(&ints(&[10, 3, 2])).unwrap(), Object::Int(5));
        assert_eq!(builtin_sub(&ints(&[5])).unwrap(), Object::Int(-5));
    }

    #[test]
    fn test_mul() {
        assert_eq!(builtin_mul(&ints(&[2, 3, 4])).unwrap(), Object::Int(24));
        assert_eq!(builtin_mul(&[]).unwrap(), Object::Int(1));
    }

    #[test]
    fn test_div() {
        assert_eq!(builtin_div(&ints(&[20, 4])).unwrap(), Object::Int(5));
        assert_eq!(builtin_div(&ints(&[7, 2])).unwrap(), Object::Int(3));
        assert_eq!(builtin_div(&ints(&[1])).unwrap(), Object::Int(1));
        assert_eq!(builtin_div(&ints(&[5])).unwrap(), Object::Int(0));
        assert!(builtin_div(&ints(&[1, 0])).is_err());
    }

    #[test]
    fn test_mod() {
        assert_eq!(builtin_mod(&ints(&[17, 5])).unwrap(), Object::Int(2));
        assert!(builtin_mod(&ints(&[17, 0])).is_err());
    }
}
