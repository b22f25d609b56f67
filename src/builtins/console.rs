//! Console output: print, println

use super::bind_builtin;
use crate::engine::Control;
use crate::error::EvalError;
use crate::expr::Builtin;
use crate::frame::Frame;
use crate::object::Object;
use std::rc::Rc;

fn render(args: &[Object]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(print ...)` - writes the printed forms separated by spaces.
pub fn builtin_print(args: &[Object]) -> Result<Object, Control> {
    print!("{}", render(args));
    Ok(Object::Nil)
}

/// `(println ...)` - as `print`, with a trailing newline.
pub fn builtin_println(args: &[Object]) -> Result<Object, Control> {
    println!("{}", render(args));
    Ok(Object::Nil)
}

pub fn register(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_builtin(frame, Builtin::new("print", 0, None, builtin_print))?;
    bind_builtin(frame, Builtin::new("println", 0, None, builtin_println))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_spaces_values() {
        assert_eq!(
            render(&[Object::Int(1), Object::string("x"), Object::Nil]),
            "1 \"x\" ()"
        );
        assert_eq!(render(&[]), "");
    }
}
