// ABOUTME: The improver: rewrites expressions using current binding
// knowledge, folding constants and annotating symbol references

use crate::error::EvalError;
use crate::expr::{Builtin, Expression, LambdaSpec};
use crate::frame::Frame;
use crate::object::Object;
use crate::symbol::Symbol;
use std::rc::Rc;

/// A bottom-up rewriting pass over an expression tree. `height` counts the
/// binding frames opened since the pass entered; symbol references below
/// that height resolve to positions the runtime chain will mirror exactly.
pub struct Improver {
    frame: Rc<Frame>,
    height: usize,
}

fn constant(obj: Object) -> Rc<Expression> {
    if obj.is_nil() {
        Rc::new(Expression::Nil)
    } else {
        Rc::new(Expression::Const(obj))
    }
}

/// The literal value of an already-improved expression, if it has one.
fn const_value(expr: &Expression) -> Option<Object> {
    match expr {
        Expression::Nil => Some(Object::Nil),
        Expression::Const(obj) => Some(obj.clone()),
        _ => None,
    }
}

fn const_values(exprs: &[Rc<Expression>]) -> Option<Vec<Object>> {
    exprs.iter().map(|e| const_value(e)).collect()
}

impl Improver {
    pub fn new(frame: Rc<Frame>) -> Self {
        Improver { frame, height: 0 }
    }

    fn nested(&self, frame: Rc<Frame>, height: usize) -> Improver {
        Improver { frame, height }
    }

    /// Opens a child frame binding `syms` as unknowns, for improving code
    /// that will run under a matching runtime frame.
    fn scope<'s>(
        &self,
        name: &str,
        syms: impl Iterator<Item = &'s Symbol>,
    ) -> Result<Rc<Frame>, EvalError> {
        let child = self.frame.child(name);
        for sym in syms {
            child.bind(sym.clone(), Object::Undefined)?;
        }
        Ok(child)
    }

    pub fn improve(&self, expr: &Rc<Expression>) -> Result<Rc<Expression>, EvalError> {
        match &**expr {
            Expression::Nil
            | Expression::LookupSym(_, _)
            | Expression::ResolveSym(_, _)
            | Expression::Program(_) => Ok(expr.clone()),

            Expression::Const(obj) if obj.is_nil() => Ok(Rc::new(Expression::Nil)),
            Expression::Const(_) => Ok(expr.clone()),

            Expression::UnboundSym(sym) => match self.frame.resolve_full(sym) {
                None => Ok(expr.clone()),
                Some((obj, def, _)) if def.is_constant(sym) => Ok(constant(obj)),
                Some((_, _, depth)) if depth < self.height => {
                    Ok(Rc::new(Expression::LookupSym(sym.clone(), depth)))
                }
                Some(_) => Ok(Rc::new(Expression::ResolveSym(sym.clone(), self.height))),
            },

            Expression::Call(proc, args) => {
                let proc = self.improve(proc)?;
                let args = args
                    .iter()
                    .map(|a| self.improve(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Expression::Const(Object::Builtin(b)) = &*proc {
                    return self.improve_builtin_call(b, args);
                }
                Ok(Rc::new(Expression::Call(proc, args)))
            }

            Expression::BuiltinCall0(b) => self.improve_builtin_call(b, Vec::new()),
            Expression::BuiltinCall1(b, a) => {
                let a = self.improve(a)?;
                self.improve_builtin_call(b, vec![a])
            }
            Expression::BuiltinCall2(b, a1, a2) => {
                let a1 = self.improve(a1)?;
                let a2 = self.improve(a2)?;
                self.improve_builtin_call(b, vec![a1, a2])
            }
            Expression::BuiltinCallN(b, args) => {
                let args = args
                    .iter()
                    .map(|a| self.improve(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.improve_builtin_call(b, args)
            }

            Expression::If2(test, then) => {
                let test = self.improve(test)?;
                match const_value(&test) {
                    Some(val) if val.is_true() => self.improve(then),
                    Some(_) => Ok(Rc::new(Expression::Nil)),
                    None => Ok(Rc::new(Expression::If2(test, self.improve(then)?))),
                }
            }

            Expression::If3(test, then, els) => {
                let test = self.improve(test)?;
                match const_value(&test) {
                    Some(val) if val.is_true() => self.improve(then),
                    Some(_) => self.improve(els),
                    None => {
                        let then = self.improve(then)?;
                        let els = self.improve(els)?;
                        if matches!(&*els, Expression::Nil) {
                            Ok(Rc::new(Expression::If2(test, then)))
                        } else {
                            Ok(Rc::new(Expression::If3(test, then, els)))
                        }
                    }
                }
            }

            Expression::Seq(exprs) => {
                let mut improved = exprs
                    .iter()
                    .map(|e| self.improve(e))
                    .collect::<Result<Vec<_>, _>>()?;
                match improved.len() {
                    0 => Ok(Rc::new(Expression::Nil)),
                    1 => Ok(improved.remove(0)),
                    _ => Ok(Rc::new(Expression::Seq(improved))),
                }
            }

            // Bindings are kept even when unused: their value expressions
            // may have observable effects.
            Expression::Let(syms, vals, body) => {
                let vals = vals
                    .iter()
                    .map(|v| self.improve(v))
                    .collect::<Result<Vec<_>, _>>()?;
                let child = self.scope("let", syms.iter())?;
                let body = self.nested(child, self.height + 1).improve(body)?;
                Ok(Rc::new(Expression::Let(syms.clone(), vals, body)))
            }

            // The body sees exactly one runtime frame (the call frame)
            // before the captured chain, so height restarts there.
            Expression::Lambda(spec) => {
                let name = if spec.name.is_empty() {
                    "lambda"
                } else {
                    spec.name.as_str()
                };
                let child = self.scope(name, spec.params.iter().chain(spec.rest.iter()))?;
                let body = self.nested(child, 1).improve(&spec.body)?;
                Ok(Rc::new(Expression::Lambda(Rc::new(LambdaSpec {
                    name: spec.name.clone(),
                    params: spec.params.clone(),
                    rest: spec.rest.clone(),
                    body,
                }))))
            }

            Expression::Define(sym, val) => Ok(Rc::new(Expression::Define(
                sym.clone(),
                self.improve(val)?,
            ))),

            Expression::SetX(sym, val) => Ok(Rc::new(Expression::SetX(
                sym.clone(),
                self.improve(val)?,
            ))),

            Expression::MakeList(e) => {
                let e = self.improve(e)?;
                match const_value(&e) {
                    Some(val) => Ok(constant(Object::cons(val, Object::Nil))),
                    None => Ok(Rc::new(Expression::MakeList(e))),
                }
            }
        }
    }

    /// Folds a builtin call of constant arguments when the builtin admits
    /// it, otherwise specialises the node by argument count. Arity is
    /// validated here; a folding error keeps the call for compute time.
    fn improve_builtin_call(
        &self,
        b: &Rc<Builtin>,
        args: Vec<Rc<Expression>>,
    ) -> Result<Rc<Expression>, EvalError> {
        if !b.accepts(args.len()) {
            return Err(EvalError::arity(b.name, b.expected_arity(), args.len()));
        }
        if let Some(vals) = const_values(&args) {
            if b.is_pure(&vals) {
                if let Ok(folded) = b.execute_call(&vals) {
                    return Ok(constant(folded));
                }
            }
        }
        Ok(Rc::new(match args.len() {
            0 => Expression::BuiltinCall0(b.clone()),
            1 => {
                let mut args = args;
                Expression::BuiltinCall1(b.clone(), args.remove(0))
            }
            2 => {
                let mut args = args;
                let a2 = args.remove(1);
                Expression::BuiltinCall2(b.clone(), args.remove(0), a2)
            }
            _ => Expression::BuiltinCallN(b.clone(), args),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::reader::Reader;

    fn improved(engine: &Engine, src: &str) -> Rc<Expression> {
        let datum = Reader::default().read_one(src).unwrap();
        let top = engine.top_level();
        let expr = engine.parse(&datum, &top).unwrap();
        engine.improve(&expr, &top).unwrap()
    }

    #[test]
    fn test_fold_pure_call_of_constants() {
        let engine = Engine::new();
        assert!(matches!(
            &*improved(&engine, "(+ 1 2 3)"),
            Expression::Const(Object::Int(6))
        ));
        assert!(matches!(
            &*improved(&engine, "(* (+ 1 2) 3)"),
            Expression::Const(Object::Int(9))
        ));
    }

    #[test]
    fn test_fold_aborts_on_error() {
        let engine = Engine::new();
        // Division by zero is left for compute time.
        assert!(matches!(
            &*improved(&engine, "(/ 1 0)"),
            Expression::BuiltinCall2(_, _, _)
        ));
    }

    #[test]
    fn test_specialisation_by_argument_count() {
        let engine = Engine::new();
        engine.bind("iv-a", Object::Int(1)).unwrap();
        assert!(matches!(
            &*improved(&engine, "(+ iv-a 1)"),
            Expression::BuiltinCall2(_, _, _)
        ));
        assert!(matches!(
            &*improved(&engine, "(+ iv-a)"),
            Expression::BuiltinCall1(_, _)
        ));
        assert!(matches!(
            &*improved(&engine, "(+ iv-a 1 2 3)"),
            Expression::BuiltinCallN(_, _)
        ));
    }

    #[test]
    fn test_improve_arity_error() {
        let engine = Engine::new();
        let datum = Reader::default().read_one("(car 1 2)").unwrap();
        let top = engine.top_level();
        let expr = engine.parse(&datum, &top).unwrap();
        assert!(matches!(
            engine.improve(&expr, &top),
            Err(EvalError::ArityError { .. })
        ));
    }

    #[test]
    fn test_frozen_binding_becomes_const() {
        let engine = Engine::new();
        match &*improved(&engine, "car") {
            Expression::Const(Object::Builtin(b)) => assert_eq!(b.name, "car"),
            other => panic!("expected const builtin, got {}", other),
        }
    }

    #[test]
    fn test_mutable_binding_becomes_resolve() {
        let engine = Engine::new();
        engine.bind("iv-m", Object::Int(5)).unwrap();
        assert!(matches!(
            &*improved(&engine, "iv-m"),
            Expression::ResolveSym(_, 0)
        ));
    }

    #[test]
    fn test_unresolved_symbol_is_kept() {
        let engine = Engine::new();
        assert!(matches!(
            &*improved(&engine, "iv-missing"),
            Expression::UnboundSym(_)
        ));
    }

    #[test]
    fn test_let_body_gets_lookup_at_depth() {
        let engine = Engine::new();
        match &*improved(&engine, "(let (x 1) x)") {
            Expression::Let(_, _, body) => {
                assert!(matches!(&**body, Expression::LookupSym(_, 0)));
            }
            other => panic!("expected let, got {}", other),
        }
    }

    #[test]
    fn test_nested_let_depths() {
        let engine = Engine::new();
        match &*improved(&engine, "(let (x 1) (let (y 2) (+ x y)))") {
            Expression::Let(_, _, outer_body) => match &**outer_body {
                Expression::Let(_, _, inner_body) => match &**inner_body {
                    Expression::BuiltinCall2(_, a1, a2) => {
                        assert!(matches!(&**a1, Expression::LookupSym(_, 1)));
                        assert!(matches!(&**a2, Expression::LookupSym(_, 0)));
                    }
                    other => panic!("expected builtin call, got {}", other),
                },
                other => panic!("expected inner let, got {}", other),
            },
            other => panic!("expected let, got {}", other),
        }
    }

    #[test]
    fn test_lambda_params_get_lookup_and_outer_gets_resolve() {
        let engine = Engine::new();
        engine.bind("iv-free", Object::Int(1)).unwrap();
        match &*improved(&engine, "(lambda (n) (+ n iv-free))") {
            Expression::Lambda(spec) => match &*spec.body {
                Expression::BuiltinCall2(_, a1, a2) => {
                    assert!(matches!(&**a1, Expression::LookupSym(_, 0)));
                    // Free references skip the call frame and search the
                    // captured chain.
                    assert!(matches!(&**a2, Expression::ResolveSym(_, 1)));
                }
                other => panic!("expected builtin call, got {}", other),
            },
            other => panic!("expected lambda, got {}", other),
        }
    }

    #[test]
    fn test_if_constant_test_selects_branch() {
        let engine = Engine::new();
        match &*improved(&engine, "(if 1 'a 'b)") {
            Expression::Const(Object::Sym(s)) => assert_eq!(s.name(), "a"),
            other => panic!("expected const, got {}", other),
        }
        match &*improved(&engine, "(if () 'a 'b)") {
            Expression::Const(Object::Sym(s)) => assert_eq!(s.name(), "b"),
            other => panic!("expected const, got {}", other),
        }
        // 0 is truthy.
        match &*improved(&engine, "(if 0 'a 'b)") {
            Expression::Const(Object::Sym(s)) => assert_eq!(s.name(), "a"),
            other => panic!("expected const, got {}", other),
        }
    }

    #[test]
    fn test_if3_with_nil_else_collapses() {
        let engine = Engine::new();
        engine.bind("iv-t", Object::Int(1)).unwrap();
        assert!(matches!(
            &*improved(&engine, "(if iv-t 'a ())"),
            Expression::If2(_, _)
        ));
    }

    #[test]
    fn test_makelist_folds_constants() {
        let engine = Engine::new();
        match &*improved(&engine, "`(,1)") {
            Expression::Const(obj) => assert_eq!(obj.to_string(), "(1)"),
            other => panic!("expected const list, got {}", other),
        }
    }
}
