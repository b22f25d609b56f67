//! List operations: cons, car, cdr, list, list*, length, reverse, append,
//! list-copy
//!
//! Traversing operations reject improper lists with `ImproperList`.

use super::bind_builtin;
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::Object;
use std::rc::Rc;

fn pair_arg<'a>(
    function: &'static str,
    args: &'a [Object],
) -> Result<&'a Rc<crate::object::Pair>, Control> {
    args[0].as_pair().ok_or_else(|| {
        Control::Fail(EvalError::type_mismatch(
            function,
            "pair",
            args[0].type_name(),
            1,
        ))
    })
}

/// `(cons a d)` - a fresh pair.
pub fn builtin_cons(a: &Object, d: &Object) -> Result<Object, Control> {
    Ok(Object::cons(a.clone(), d.clone()))
}

/// `(car p)` - the head of a pair.
pub fn builtin_car(args: &[Object]) -> Result<Object, Control> {
    Ok(pair_arg("car", args)?.car.clone())
}

/// `(cdr p)` - the tail of a pair.
pub fn builtin_cdr(args: &[Object]) -> Result<Object, Control> {
    Ok(pair_arg("cdr", args)?.cdr.clone())
}

/// `(list ...)` - a fresh proper list of the arguments.
pub fn builtin_list(args: &[Object]) -> Result<Object, Control> {
    Ok(Object::from_vec(args.to_vec()))
}

/// `(list* a ... tail)` - like `list` but the final argument becomes the
/// tail of the chain.
pub fn builtin_list_star(args: &[Object]) -> Result<Object, Control> {
    let Some((tail, front)) = args.split_last() else {
        return Ok(Object::Nil);
    };
    Ok(Object::from_vec_dotted(front.to_vec(), tail.clone()))
}

/// `(length lst)` - element count of a proper list.
pub fn builtin_length(args: &[Object]) -> Result<Object, Control> {
    let n = args[0].list_length().map_err(Control::Fail)?;
    Ok(Object::Int(n as i64))
}

/// `(reverse lst)` - a fresh reversed copy of a proper list.
pub fn builtin_reverse(args: &[Object]) -> Result<Object, Control> {
    args[0].list_reverse().map_err(Control::Fail)
}

/// `(append lst ... tail)` - concatenation; every argument but the last
/// must be a proper list, the last becomes the tail unchanged.
pub fn builtin_append(args: &[Object]) -> Result<Object, Control> {
    let Some((tail, front)) = args.split_last() else {
        return Ok(Object::Nil);
    };
    let mut elements = Vec::new();
    for list in front {
        elements.extend(list.list_to_vec().map_err(Control::Fail)?);
    }
    Ok(Object::from_vec_dotted(elements, tail.clone()))
}

/// `(list-copy lst)` - fresh pairs, shared elements.
pub fn builtin_list_copy(args: &[Object]) -> Result<Object, Control> {
    args[0].list_copy().map_err(Control::Fail)
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(
        frame,
        Builtin::new("cons", 2, Some(2), |args| {
            builtin_cons(&args[0], &args[1])
        })
        .pure()
        .with2(builtin_cons),
    )?;
    bind_builtin(
        frame,
        Builtin::new("car", 1, Some(1), builtin_car).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("cdr", 1, Some(1), builtin_cdr).pure(),
    )?;
    bind_builtin(frame, Builtin::new("list", 0, None, builtin_list).pure())?;
    bind_builtin(
        frame,
        Builtin::new("list*", 1, None, builtin_list_star).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("length", 1, Some(1), builtin_length).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("reverse", 1, Some(1), builtin_reverse).pure(),
    )?;
    bind_builtin(frame, Builtin::new("append", 0, None, builtin_append).pure())?;
    bind_builtin(
        frame,
        Builtin::new("list-copy", 1, Some(1), builtin_list_copy).pure(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Vec<Object> {
        ns.iter().map(|n| Object::Int(*n)).collect()
    }

    fn list(ns: &[i64]) -> Object {
        Object::from_vec(ints(ns))
    }

    #[test]
    fn test_cons_car_cdr() {
        let p = builtin_cons(&Object::Int(1), &Object::Int(2)).unwrap();
        assert_eq!(builtin_car(&[p.clone()]).unwrap(), Object::Int(1));
        assert_eq!(builtin_cdr(&[p]).unwrap(), Object::Int(2));
    }

    #[test]
    fn test_car_of_non_pair_fails() {
        assert!(builtin_car(&[Object::Nil]).is_err());
        assert!(builtin_car(&[Object::Int(1)]).is_err());
    }

    #[test]
    fn test_list_and_list_star() {
        assert_eq!(builtin_list(&ints(&[1, 2])).unwrap().to_string(), "(1 2)");
        assert_eq!(
            builtin_list_star(&ints(&[1, 2, 3])).unwrap().to_string(),
            "(1 2 . 3)"
        );
        let spread = builtin_list_star(&[Object::Int(1), list(&[2, 3])]).unwrap();
        assert_eq!(spread.to_string(), "(1 2 3)");
    }

    #[test]
    fn test_length_laws() {
        assert_eq!(builtin_length(&[Object::Nil]).unwrap(), Object::Int(0));
        let l = list(&[1, 2, 3]);
        assert_eq!(builtin_length(&[l.clone()]).unwrap(), Object::Int(3));
        let consed = Object::cons(Object::Int(0), l);
        assert_eq!(builtin_length(&[consed]).unwrap(), Object::Int(4));
    }

    #[test]
    fn test_reverse_improper_fails() {
        let dotted = Object::cons(Object::Int(1), Object::Int(2));
        assert!(matches!(
            builtin_reverse(&[dotted]),
            Err(Control::Fail(EvalError::ImproperList))
        ));
    }

    #[test]
    fn test_append() {
        assert_eq!(builtin_append(&[]).unwrap(), Object::Nil);
        assert_eq!(builtin_append(&[list(&[1, 2])]).unwrap().to_string(), "(1 2)");
        let joined = builtin_append(&[list(&[1]), list(&[2, 3])]).unwrap();
        assert_eq!(joined.to_string(), "(1 2 3)");
        // The final argument may be any tail.
        let dotted = builtin_append(&[list(&[1]), Object::Int(2)]).unwrap();
        assert_eq!(dotted.to_string(), "(1 . 2)");
    }

    #[test]
    fn test_list_copy_is_fresh() {
        let l = list(&[1, 2]);
        let copy = builtin_list_copy(&[l.clone()]).unwrap();
        assert_eq!(copy, l);
        assert!(!Rc::ptr_eq(l.as_pair().unwrap(), copy.as_pair().unwrap()));
    }
}
