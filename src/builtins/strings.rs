//! String operations: string-length, string-append, string->symbol,
//! symbol->string

use super::{bind_builtin, str_arg};
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::Object;
use crate::symbol::core_package;
use std::rc::Rc;

/// `(string-length s)` - number of characters.
pub fn builtin_string_length(args: &[Object]) -> Result<Object, Control> {
    let s = str_arg("string-length", args, 0)?;
    Ok(Object::Int(s.chars().count() as i64))
}

/// `(string-append ...)` - concatenation of all arguments.
pub fn builtin_string_append(args: &[Object]) -> Result<Object, Control> {
    let mut out = String::new();
    for pos in 0..args.len() {
        out.push_str(str_arg("string-append", args, pos)?);
    }
    Ok(Object::string(out))
}

/// `(string->symbol s)` - interns the name; the empty string has no
/// symbol and yields nil.
pub fn builtin_string_to_symbol(args: &[Object]) -> Result<Object, Control> {
    let s = str_arg("string->symbol", args, 0)?;
    Ok(match core_package().make_symbol(s) {
        Some(sym) => Object::Sym(sym),
        None => Object::Nil,
    })
}

/// `(symbol->string sym)` - the symbol's name.
pub fn builtin_symbol_to_string(args: &[Object]) -> Result<Object, Control> {
    match &args[0] {
        Object::Sym(sym) => Ok(Object::string(sym.name())),
        other => Err(Control::Fail(EvalError::type_mismatch(
            "symbol->string",
            "symbol",
            other.type_name(),
            1,
        ))),
    }
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(
        frame,
        Builtin::new("string-length", 1, Some(1), builtin_string_length).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("string-append", 0, None, builtin_string_append).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("string->symbol", 1, Some(1), builtin_string_to_symbol).pure(),
    )?;
    bind_builtin(
        frame,
        Builtin::new("symbol->string", 1, Some(1), builtin_symbol_to_string).pure(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_length_counts_chars() {
        assert_eq!(
            builtin_string_length(&[Object::string("héllo")]).unwrap(),
            Object::Int(5)
        );
        assert_eq!(
            builtin_string_length(&[Object::string("")]).unwrap(),
            Object::Int(0)
        );
    }

    #[test]
    fn test_string_append() {
        let joined =
            builtin_string_append(&[Object::string("foo"), Object::string("bar")]).unwrap();
        assert_eq!(joined, Object::string("foobar"));
        assert_eq!(builtin_string_append(&[]).unwrap(), Object::string(""));
    }

    #[test]
    fn test_symbol_conversions() {
        let sym = builtin_string_to_symbol(&[Object::string("str-conv")]).unwrap();
        assert_eq!(sym.to_string(), "str-conv");
        assert_eq!(
            builtin_symbol_to_string(&[sym]).unwrap(),
            Object::string("str-conv")
        );
        // Empty names have no symbol.
        assert_eq!(
            builtin_string_to_symbol(&[Object::string("")]).unwrap(),
            Object::Nil
        );
    }
}
