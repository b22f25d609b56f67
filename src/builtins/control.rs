//! Application helpers: apply, identity
//!
//! `apply` is the builtin that exercises builtin-initiated
//! tail-continuation: applying a procedure hands an `execute_again`
//! signal back to the executor loop instead of recursing.

use super::bind_builtin;
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::{invoke, Builtin};
use crate::frame::Frame;
use crate::object::Object;
use std::rc::Rc;

/// `(apply f a ... lst)` - applies `f` to the leading arguments followed
/// by the elements of the final list.
pub fn builtin_apply(args: &[Object]) -> Result<Object, Control> {
    let callee = &args[0];
    let mut argv: Vec<Object> = Vec::new();
    if let Some((last, mid)) = args[1..].split_last() {
        argv.extend_from_slice(mid);
        argv.extend(last.list_to_vec().map_err(Control::Fail)?);
    }
    invoke(callee, &argv)
}

/// `(identity x)`
pub fn builtin_identity(arg: &Object) -> Result<Object, Control> {
    Ok(arg.clone())
}

fn identity_fallback(args: &[Object]) -> Result<Object, Control> {
    match args.first() {
        Some(arg) => Ok(arg.clone()),
        None => Err(Control::Fail(EvalError::arity("identity", "1", 0))),
    }
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(frame, Builtin::new("apply", 1, None, builtin_apply))?;
    bind_builtin(
        frame,
        Builtin::new("identity", 1, Some(1), identity_fallback)
            .pure()
            .with1(builtin_identity),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_spreads_final_list() {
        let engine = crate::engine::Engine::new();
        assert_eq!(
            engine.eval_str("(apply + 1 2 (list 3 4))").unwrap(),
            Object::Int(10)
        );
        assert_eq!(engine.eval_str("(apply + ())").unwrap(), Object::Int(0));
    }

    #[test]
    fn test_apply_requires_a_proper_list() {
        let engine = crate::engine::Engine::new();
        match engine.eval_str("(apply + 1)").unwrap_err() {
            EvalError::CallError { name, inner } => {
                assert_eq!(name, "apply");
                assert!(matches!(*inner, EvalError::ImproperList));
            }
            other => panic!("expected call error, got {}", other),
        }
    }

    #[test]
    fn test_apply_tail_calls_procedures() {
        let engine = crate::engine::Engine::new();
        engine.load_prelude().unwrap();
        // The tail-continuation from apply must reach the executor loop:
        // deep recursion through apply stays in constant host stack.
        assert_eq!(
            engine.eval_str("(apply even? (list 100000))").unwrap().to_string(),
            "T"
        );
    }

    #[test]
    fn test_identity() {
        assert_eq!(builtin_identity(&Object::Int(3)).unwrap(), Object::Int(3));
    }
}
