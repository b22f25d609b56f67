//! Vector operations: vector, vector-length, vector-ref, vector-set!
//!
//! Vectors are the only mutable compound value, so none of these fold.

use super::{bind_builtin, int_arg};
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::Object;
use std::cell::RefCell;
use std::rc::Rc;

fn vector_arg<'a>(
    function: &'static str,
    args: &'a [Object],
) -> Result<&'a Rc<RefCell<Vec<Object>>>, Control> {
    match &args[0] {
        Object::Vector(v) => Ok(v),
        other => Err(Control::Fail(EvalError::type_mismatch(
            function,
            "vector",
            other.type_name(),
            1,
        ))),
    }
}

fn index_arg(function: &'static str, args: &[Object], len: usize) -> Result<usize, Control> {
    let idx = int_arg(function, args, 1)?;
    if idx < 0 || idx as usize >= len {
        return Err(Control::Fail(EvalError::runtime(
            function,
            format!("index {} out of range for length {}", idx, len),
        )));
    }
    Ok(idx as usize)
}

/// `(vector ...)` - a fresh mutable vector of the arguments.
pub fn builtin_vector(args: &[Object]) -> Result<Object, Control> {
    Ok(Object::Vector(Rc::new(RefCell::new(args.to_vec()))))
}

/// `(vector-length v)`
pub fn builtin_vector_length(args: &[Object]) -> Result<Object, Control> {
    let v = vector_arg("vector-length", args)?;
    Ok(Object::Int(v.borrow().len() as i64))
}

/// `(vector-ref v i)` - zero-based element access.
pub fn builtin_vector_ref(args: &[Object]) -> Result<Object, Control> {
    let v = vector_arg("vector-ref", args)?;
    let idx = index_arg("vector-ref", args, v.borrow().len())?;
    let val = v.borrow()[idx].clone();
    Ok(val)
}

/// `(vector-set! v i x)` - in-place element update; returns the vector.
pub fn builtin_vector_set(args: &[Object]) -> Result<Object, Control> {
    let v = vector_arg("vector-set!", args)?;
    let idx = index_arg("vector-set!", args, v.borrow().len())?;
    v.borrow_mut()[idx] = args[2].clone();
    Ok(args[0].clone())
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(frame, Builtin::new("vector", 0, None, builtin_vector))?;
    bind_builtin(
        frame,
        Builtin::new("vector-length", 1, Some(1), builtin_vector_length).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("vector-ref", 2, Some(2), builtin_vector_ref),
    )?;
    bind_builtin(
        frame,
        Builtin::new("vector-set!", 3, Some(3), builtin_vector_set),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_roundtrip() {
        let v = builtin_vector(&[Object::Int(1), Object::Int(2)]).unwrap();
        assert_eq!(
            builtin_vector_length(&[v.clone()]).unwrap(),
            Object::Int(2)
        );
        assert_eq!(
            builtin_vector_ref(&[v.clone(), Object::Int(1)]).unwrap(),
            Object::Int(2)
        );
        assert_eq!(v.to_string(), "#(1 2)");
    }

    #[test]
    fn test_vector_set_mutates_in_place() {
        let v = builtin_vector(&[Object::Int(1)]).unwrap();
        builtin_vector_set(&[v.clone(), Object::Int(0), Object::Int(9)]).unwrap();
        assert_eq!(
            builtin_vector_ref(&[v, Object::Int(0)]).unwrap(),
            Object::Int(9)
        );
    }

    #[test]
    fn test_vector_ref_bounds() {
        let v = builtin_vector(&[Object::Int(1)]).unwrap();
        assert!(builtin_vector_ref(&[v.clone(), Object::Int(1)]).is_err());
        assert!(builtin_vector_ref(&[v, Object::Int(-1)]).is_err());
    }
}
