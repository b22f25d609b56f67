// ABOUTME: Compiler: lowers improved expressions to a flat instruction
// stream over the environment's evaluation stack, plus its interpreter

use crate::engine::{Control, Environment};
use crate::error::EvalError;
use crate::expr::{invoke, Builtin, Expression, LambdaSpec, Procedure};
use crate::frame::Frame;
use crate::object::Object;
use crate::symbol::Symbol;
use std::rc::Rc;

/// Placeholder target installed by `emit_jump`; `patch_jump` replaces it
/// once the destination is known.
const UNPATCHED: usize = usize::MAX;

#[derive(Debug)]
pub enum Instr {
    PushConst(Object),
    /// Push the value of a symbol bound exactly `depth` frames up.
    Lookup(usize, Symbol),
    /// Skip `skip` frames, then resolve along the parent chain.
    Resolve(usize, Symbol),
    BCall0(Rc<Builtin>),
    BCall1(Rc<Builtin>),
    BCall2(Rc<Builtin>),
    BCallN(Rc<Builtin>, usize),
    /// Pop `argc` arguments and a callable beneath them; push the result.
    /// In tail position a procedure callee unwinds to the executor loop.
    Call { argc: usize, tail: bool },
    Jump(usize),
    /// Pop; jump when the popped value is falsy.
    JumpIfNil(usize),
    Kill(usize),
    Kill1,
    Define(Symbol),
    SetX(Symbol),
    MakeLambda(Rc<LambdaSpec>),
    /// Pop a value, push the one-element list holding it.
    MakeList,
    Return,
}

/// A compiled expression: instructions plus the stack headroom they need.
/// The source tree is retained for printing.
#[derive(Debug)]
pub struct Program {
    pub code: Vec<Instr>,
    pub max_stack: usize,
    pub source: Rc<Expression>,
}

/// Lowers `expr` into a `Program` expression. Fails `MissingCompile`
/// when some subexpression has no instruction form; the caller then
/// falls back to tree-walking compute.
pub fn compile(expr: &Rc<Expression>) -> Result<Rc<Expression>, EvalError> {
    let mut compiler = Compiler::default();
    compiler.compile_expr(expr, true)?;
    compiler.emit(Instr::Return, 0);
    Ok(Rc::new(Expression::Program(Rc::new(Program {
        code: compiler.code,
        max_stack: compiler.max,
        source: expr.clone(),
    }))))
}

#[derive(Default)]
struct Compiler {
    code: Vec<Instr>,
    cur: usize,
    max: usize,
}

impl Compiler {
    fn emit(&mut self, instr: Instr, delta: isize) {
        self.code.push(instr);
        self.cur = (self.cur as isize + delta) as usize;
        self.max = self.max.max(self.cur);
    }

    fn emit_jump(&mut self) -> usize {
        self.emit(Instr::Jump(UNPATCHED), 0);
        self.code.len() - 1
    }

    fn emit_jump_if_nil(&mut self) -> usize {
        self.emit(Instr::JumpIfNil(UNPATCHED), -1);
        self.code.len() - 1
    }

    /// Installs the current position as the target of a pending jump.
    fn patch_jump(&mut self, at: usize) {
        let target = self.code.len();
        match &mut self.code[at] {
            Instr::Jump(t) | Instr::JumpIfNil(t) => *t = target,
            _ => debug_assert!(false, "patching a non-jump instruction"),
        }
    }

    fn compile_expr(&mut self, expr: &Rc<Expression>, tail: bool) -> Result<(), EvalError> {
        match &**expr {
            Expression::Nil => self.emit(Instr::PushConst(Object::Nil), 1),
            Expression::Const(obj) => self.emit(Instr::PushConst(obj.clone()), 1),
            Expression::UnboundSym(sym) => self.emit(Instr::Resolve(0, sym.clone()), 1),
            Expression::LookupSym(sym, depth) => {
                self.emit(Instr::Lookup(*depth, sym.clone()), 1)
            }
            Expression::ResolveSym(sym, skip) => {
                self.emit(Instr::Resolve(*skip, sym.clone()), 1)
            }

            Expression::BuiltinCall0(b) => self.emit(Instr::BCall0(b.clone()), 1),
            Expression::BuiltinCall1(b, a) => {
                self.compile_expr(a, false)?;
                self.emit(Instr::BCall1(b.clone()), 0);
            }
            Expression::BuiltinCall2(b, a1, a2) => {
                self.compile_expr(a1, false)?;
                self.compile_expr(a2, false)?;
                self.emit(Instr::BCall2(b.clone()), -1);
            }
            Expression::BuiltinCallN(b, args) => {
                for arg in args {
                    self.compile_expr(arg, false)?;
                }
                self.emit(Instr::BCallN(b.clone(), args.len()), 1 - args.len() as isize);
            }

            Expression::Call(proc, args) => {
                self.compile_expr(proc, false)?;
                for arg in args {
                    self.compile_expr(arg, false)?;
                }
                self.emit(
                    Instr::Call {
                        argc: args.len(),
                        tail,
                    },
                    -(args.len() as isize),
                );
            }

            Expression::If2(test, then) => {
                self.compile_expr(test, false)?;
                let to_else = self.emit_jump_if_nil();
                let entry = self.cur;
                self.compile_expr(then, tail)?;
                let to_end = self.emit_jump();
                self.patch_jump(to_else);
                self.cur = entry;
                self.emit(Instr::PushConst(Object::Nil), 1);
                self.patch_jump(to_end);
            }

            Expression::If3(test, then, els) => {
                self.compile_expr(test, false)?;
                let to_else = self.emit_jump_if_nil();
                let entry = self.cur;
                self.compile_expr(then, tail)?;
                let to_end = self.emit_jump();
                self.patch_jump(to_else);
                self.cur = entry;
                self.compile_expr(els, tail)?;
                self.patch_jump(to_end);
            }

            Expression::Seq(exprs) => match exprs.split_last() {
                None => self.emit(Instr::PushConst(Object::Nil), 1),
                Some((last, init)) => {
                    for e in init {
                        self.compile_expr(e, false)?;
                    }
                    match init.len() {
                        0 => {}
                        1 => self.emit(Instr::Kill1, -1),
                        n => self.emit(Instr::Kill(n), -(n as isize)),
                    }
                    self.compile_expr(last, tail)?;
                }
            },

            Expression::Lambda(spec) => self.emit(Instr::MakeLambda(spec.clone()), 1),

            Expression::Define(sym, val) => {
                self.compile_expr(val, false)?;
                self.emit(Instr::Define(sym.clone()), -1);
                self.emit(Instr::PushConst(Object::Sym(sym.clone())), 1);
            }

            Expression::SetX(sym, val) => {
                self.compile_expr(val, false)?;
                self.emit(Instr::SetX(sym.clone()), -1);
                self.emit(Instr::PushConst(Object::Sym(sym.clone())), 1);
            }

            Expression::MakeList(e) => {
                self.compile_expr(e, false)?;
                self.emit(Instr::MakeList, 0);
            }

            Expression::Let(_, _, _) | Expression::Program(_) => {
                return Err(EvalError::MissingCompile)
            }
        }
        Ok(())
    }
}

/// Resolves a builtin's tail-continuation request inline; the instruction
/// stream needs the value on the stack.
fn builtin_result(env: &Environment, res: Result<Object, Control>) -> Result<Object, Control> {
    match res {
        Err(Control::TailCall { frame, expr }) => {
            env.execute(expr, frame).map_err(Control::Fail)
        }
        other => other,
    }
}

impl Program {
    /// Executes the instruction stream. Jumps are handled as program
    /// counter overrides inside this loop and never escape it.
    pub fn run(&self, env: &Environment, frame: &Rc<Frame>) -> Result<Object, Control> {
        let base = env.stack_len();
        env.reserve_stack(self.max_stack);
        let result = self.exec(env, frame, base);
        env.truncate_stack(base);
        result
    }

    fn exec(&self, env: &Environment, frame: &Rc<Frame>, base: usize) -> Result<Object, Control> {
        let mut pc = 0usize;
        loop {
            let instr = self.code.get(pc).ok_or_else(|| {
                Control::Fail(EvalError::runtime("program", "counter out of range"))
            })?;
            pc += 1;
            match instr {
                Instr::PushConst(obj) => env.push(obj.clone()),

                Instr::Lookup(depth, sym) => {
                    let val = frame
                        .nth_parent(*depth)
                        .and_then(|fr| fr.lookup(sym))
                        .ok_or_else(|| {
                            Control::Fail(EvalError::not_bound(frame.name(), sym.name()))
                        })?;
                    env.push(val);
                }

                Instr::Resolve(skip, sym) => {
                    let val = frame
                        .nth_parent(*skip)
                        .and_then(|fr| fr.resolve(sym))
                        .ok_or_else(|| {
                            Control::Fail(EvalError::not_bound(frame.name(), sym.name()))
                        })?;
                    env.push(val);
                }

                Instr::BCall0(b) => {
                    let val = builtin_result(env, b.execute_call(&[]))?;
                    env.push(val);
                }
                Instr::BCall1(b) => {
                    let arg = env.pop()?;
                    let val = builtin_result(env, b.execute_call(&[arg]))?;
                    env.push(val);
                }
                Instr::BCall2(b) => {
                    let args = env.split_off(2)?;
                    let val = builtin_result(env, b.execute_call(&args))?;
                    env.push(val);
                }
                Instr::BCallN(b, argc) => {
                    let args = env.split_off(*argc)?;
                    let val = builtin_result(env, b.execute_call(&args))?;
                    env.push(val);
                }

                Instr::Call { argc, tail } => {
                    let args = env.split_off(*argc)?;
                    let callee = env.pop()?;
                    if let Object::Procedure(p) = &callee {
                        env.note_call(p.frame_name());
                    }
                    match invoke(&callee, &args) {
                        Ok(val) => env.push(val),
                        Err(Control::TailCall { frame: f, expr: e }) if *tail => {
                            return Err(Control::TailCall { frame: f, expr: e });
                        }
                        Err(Control::TailCall { frame: f, expr: e }) => {
                            let val = env.execute(e, f).map_err(Control::Fail)?;
                            env.push(val);
                        }
                        Err(fail) => return Err(fail),
                    }
                }

                Instr::Jump(target) => pc = *target,
                Instr::JumpIfNil(target) => {
                    if !env.pop()?.is_true() {
                        pc = *target;
                    }
                }

                Instr::Kill(n) => env.discard(*n)?,
                Instr::Kill1 => env.discard(1)?,

                Instr::Define(sym) => {
                    let val = env.pop()?;
                    frame.bind(sym.clone(), val)?;
                }
                Instr::SetX(sym) => {
                    let val = env.pop()?;
                    frame.set(sym, val)?;
                }

                Instr::MakeLambda(spec) => env.push(Object::Procedure(Rc::new(Procedure {
                    frame: frame.clone(),
                    spec: spec.clone(),
                }))),

                Instr::MakeList => {
                    let val = env.pop()?;
                    env.push(Object::cons(val, Object::Nil));
                }

                Instr::Return => return env.pop(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::reader::Reader;

    fn compiled(engine: &Engine, src: &str) -> Rc<Expression> {
        let datum = Reader::default().read_one(src).unwrap();
        let top = engine.top_level();
        let expr = engine.parse(&datum, &top).unwrap();
        let expr = engine.improve(&expr, &top).unwrap();
        engine.compile(&expr).unwrap()
    }

    fn run_compiled(engine: &Engine, src: &str) -> Object {
        let program = compiled(engine, src);
        let top = engine.top_level();
        engine.run(&program, &top).unwrap()
    }

    #[test]
    fn test_compile_constant() {
        let engine = Engine::new();
        assert_eq!(run_compiled(&engine, "42"), Object::Int(42));
        assert_eq!(run_compiled(&engine, "()"), Object::Nil);
    }

    #[test]
    fn test_compile_builtin_calls() {
        let engine = Engine::new();
        engine.bind("cp-a", Object::Int(10)).unwrap();
        engine.bind("cp-b", Object::Int(4)).unwrap();
        assert_eq!(run_compiled(&engine, "(- cp-a cp-b)"), Object::Int(6));
        assert_eq!(run_compiled(&engine, "(+ cp-a cp-b 1 2)"), Object::Int(17));
    }

    #[test]
    fn test_compile_if_branches() {
        let engine = Engine::new();
        engine.bind("cp-t", Object::Int(1)).unwrap();
        engine.bind("cp-nil", Object::Nil).unwrap();
        assert_eq!(run_compiled(&engine, "(if cp-t 1 2)"), Object::Int(1));
        assert_eq!(run_compiled(&engine, "(if cp-nil 1 2)"), Object::Int(2));
        assert_eq!(run_compiled(&engine, "(if cp-nil 1)"), Object::Nil);
    }

    #[test]
    fn test_compile_seq_discards_intermediates() {
        let engine = Engine::new();
        assert_eq!(
            run_compiled(&engine, "(begin (define cp-x 5) (define cp-y 6) cp-y)"),
            Object::Int(6)
        );
        assert_eq!(engine.eval_str("cp-x").unwrap(), Object::Int(5));
    }

    #[test]
    fn test_compile_define_yields_symbol() {
        let engine = Engine::new();
        let val = run_compiled(&engine, "(define cp-d 3)");
        assert_eq!(val.to_string(), "cp-d");
        assert_eq!(engine.eval_str("cp-d").unwrap(), Object::Int(3));
    }

    #[test]
    fn test_compile_lambda_and_call() {
        let engine = Engine::new();
        engine.eval_str("(defun cp-inc (n) (+ n 1))").unwrap();
        assert_eq!(run_compiled(&engine, "(cp-inc 41)"), Object::Int(42));
    }

    #[test]
    fn test_compiled_tail_call_unwinds() {
        let engine = Engine::new();
        engine.load_prelude().unwrap();
        // The call in tail position leaves the program entirely; the
        // executor loop carries on without growing the host stack.
        assert_eq!(
            run_compiled(&engine, "(even? 10000)").to_string(),
            "T"
        );
    }

    #[test]
    fn test_let_is_not_compilable() {
        let engine = Engine::new();
        let datum = Reader::default().read_one("(let (x 1) x)").unwrap();
        let top = engine.top_level();
        let expr = engine.parse(&datum, &top).unwrap();
        let expr = engine.improve(&expr, &top).unwrap();
        assert!(matches!(
            engine.compile(&expr),
            Err(EvalError::MissingCompile)
        ));
    }

    #[test]
    fn test_max_stack_accounts_arguments() {
        let engine = Engine::new();
        engine.bind("cp-m", Object::Int(1)).unwrap();
        let program = compiled(&engine, "(+ cp-m (+ cp-m cp-m 1) 2)");
        match &*program {
            Expression::Program(p) => assert!(p.max_stack >= 4, "max_stack = {}", p.max_stack),
            other => panic!("expected program, got {}", other),
        }
    }

    #[test]
    fn test_program_prints_its_source() {
        let engine = Engine::new();
        engine.bind("cp-p", Object::Int(1)).unwrap();
        let program = compiled(&engine, "(if cp-p 1 2)");
        assert_eq!(program.to_string(), "(if cp-p 1 2)");
    }

    #[test]
    fn test_jumps_are_patched() {
        let engine = Engine::new();
        engine.bind("cp-j", Object::Int(1)).unwrap();
        let program = compiled(&engine, "(if cp-j 1 2)");
        let Expression::Program(p) = &*program else {
            panic!("expected program");
        };
        for instr in &p.code {
            if let Instr::Jump(t) | Instr::JumpIfNil(t) = instr {
                assert_ne!(*t, UNPATCHED);
                assert!(*t <= p.code.len());
            }
        }
    }

    #[test]
    fn test_stack_is_balanced_after_error() {
        let engine = Engine::new();
        engine.bind("cp-z", Object::Int(0)).unwrap();
        let program = compiled(&engine, "(+ 1 (/ 1 cp-z))");
        let top = engine.top_level();
        assert!(engine.run(&program, &top).is_err());
        assert_eq!(engine.env().stack_len(), 0);
    }
}
