// ABOUTME: The executable expression tree and the callables it invokes

use crate::compile::Program;
use crate::engine::{Control, Environment};
use crate::error::EvalError;
use crate::frame::Frame;
use crate::object::Object;
use crate::symbol::{core_symbol, Symbol};
use std::fmt;
use std::rc::Rc;

/// A parsed, executable form. The set of shapes is closed: each variant
/// knows how to compute itself, unparse back to a datum, and (for most
/// variants) how to improve and compile.
#[derive(Debug)]
pub enum Expression {
    /// The empty list as a form; computes to nil.
    Nil,
    /// A literal value.
    Const(Object),
    /// A symbol reference not yet annotated by the improver.
    UnboundSym(Symbol),
    /// A symbol known to live exactly `depth` frames above the current one.
    LookupSym(Symbol, usize),
    /// A symbol resolved by chain walk after skipping `skip` local frames.
    ResolveSym(Symbol, usize),
    /// Application of a computed callable to computed arguments.
    Call(Rc<Expression>, Vec<Rc<Expression>>),
    /// Builtin application specialised by argument count.
    BuiltinCall0(Rc<Builtin>),
    BuiltinCall1(Rc<Builtin>, Rc<Expression>),
    BuiltinCall2(Rc<Builtin>, Rc<Expression>, Rc<Expression>),
    BuiltinCallN(Rc<Builtin>, Vec<Rc<Expression>>),
    /// Two-armed conditional; nil when the test is false.
    If2(Rc<Expression>, Rc<Expression>),
    If3(Rc<Expression>, Rc<Expression>, Rc<Expression>),
    /// A body sequence; all but the last form are evaluated for effect.
    Seq(Vec<Rc<Expression>>),
    /// Parallel bindings evaluated in the enclosing frame, then a body in
    /// a fresh child frame.
    Let(Vec<Symbol>, Vec<Rc<Expression>>, Rc<Expression>),
    Lambda(Rc<LambdaSpec>),
    Define(Symbol, Rc<Expression>),
    SetX(Symbol, Rc<Expression>),
    /// Single-element list construction, the quasiquote splice unit.
    MakeList(Rc<Expression>),
    /// A compiled instruction stream.
    Program(Rc<Program>),
}

/// The static part of a lambda: everything but the captured frame.
#[derive(Debug)]
pub struct LambdaSpec {
    pub name: String,
    pub params: Vec<Symbol>,
    pub rest: Option<Symbol>,
    pub body: Rc<Expression>,
}

/// A lambda closed over its defining frame.
#[derive(Debug)]
pub struct Procedure {
    pub frame: Rc<Frame>,
    pub spec: Rc<LambdaSpec>,
}

pub type BuiltinFn0 = fn() -> Result<Object, Control>;
pub type BuiltinFn1 = fn(&Object) -> Result<Object, Control>;
pub type BuiltinFn2 = fn(&Object, &Object) -> Result<Object, Control>;
pub type BuiltinFnN = fn(&[Object]) -> Result<Object, Control>;

/// A host-implemented callable receiving evaluated arguments. The
/// specialised entry points are optional; `fnn` always exists.
pub struct Builtin {
    pub name: &'static str,
    pub min_arity: usize,
    /// `None` means unlimited.
    pub max_arity: Option<usize>,
    /// Purity test consulted by the improver before folding; `None` means
    /// never fold.
    pub test_pure: Option<fn(&[Object]) -> bool>,
    pub fn0: Option<BuiltinFn0>,
    pub fn1: Option<BuiltinFn1>,
    pub fn2: Option<BuiltinFn2>,
    pub fnn: BuiltinFnN,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("min_arity", &self.min_arity)
            .field("max_arity", &self.max_arity)
            .finish()
    }
}

impl Builtin {
    pub fn new(name: &'static str, min: usize, max: Option<usize>, fnn: BuiltinFnN) -> Self {
        Builtin {
            name,
            min_arity: min,
            max_arity: max,
            test_pure: None,
            fn0: None,
            fn1: None,
            fn2: None,
            fnn,
        }
    }

    pub fn pure(mut self) -> Self {
        self.test_pure = Some(|_| true);
        self
    }

    pub fn pure_if(mut self, test: fn(&[Object]) -> bool) -> Self {
        self.test_pure = Some(test);
        self
    }

    pub fn with0(mut self, f: BuiltinFn0) -> Self {
        self.fn0 = Some(f);
        self
    }

    pub fn with1(mut self, f: BuiltinFn1) -> Self {
        self.fn1 = Some(f);
        self
    }

    pub fn with2(mut self, f: BuiltinFn2) -> Self {
        self.fn2 = Some(f);
        self
    }

    pub fn is_pure(&self, args: &[Object]) -> bool {
        self.test_pure.map_or(false, |t| t(args))
    }

    /// True when `n` arguments satisfy this builtin's declared arity.
    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min_arity && self.max_arity.map_or(true, |max| n <= max)
    }

    /// Renders the declared arity for error messages: "2", "1-3", or
    /// "at least 1".
    pub fn expected_arity(&self) -> String {
        match (self.min_arity, self.max_arity) {
            (min, Some(max)) if min == max => min.to_string(),
            (min, Some(max)) => format!("{}-{}", min, max),
            (min, None) => format!("at least {}", min),
        }
    }

    /// Validates arity, dispatches to the narrowest entry point, and wraps
    /// downstream failures in a `CallError` naming this builtin. A
    /// tail-continuation signal passes through untouched.
    pub fn execute_call(&self, args: &[Object]) -> Result<Object, Control> {
        if !self.accepts(args.len()) {
            return Err(Control::Fail(EvalError::arity(
                self.name,
                self.expected_arity(),
                args.len(),
            )));
        }
        let res = match args.len() {
            0 => match self.fn0 {
                Some(f) => f(),
                None => (self.fnn)(args),
            },
            1 => match self.fn1 {
                Some(f) => f(&args[0]),
                None => (self.fnn)(args),
            },
            2 => match self.fn2 {
                Some(f) => f(&args[0], &args[1]),
                None => (self.fnn)(args),
            },
            _ => (self.fnn)(args),
        };
        res.map_err(|c| c.wrap(self.name))
    }
}

impl Procedure {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn frame_name(&self) -> &str {
        if self.spec.name.is_empty() {
            "lambda"
        } else {
            self.spec.name.as_str()
        }
    }

    /// Builds the call frame: parameters bound positionally, excess
    /// arguments consed into a fresh list for the rest parameter.
    pub fn make_frame(&self, args: &[Object]) -> Result<Rc<Frame>, EvalError> {
        let spec = &self.spec;
        if args.len() < spec.params.len() {
            return Err(EvalError::arity(
                self.frame_name(),
                match (&spec.rest, spec.params.len()) {
                    (Some(_), n) => format!("at least {}", n),
                    (None, n) => n.to_string(),
                },
                args.len(),
            ));
        }
        let frame = self.frame.child(self.frame_name());
        for (param, arg) in spec.params.iter().zip(args.iter()) {
            frame.bind(param.clone(), arg.clone())?;
        }
        let excess = &args[spec.params.len()..];
        match &spec.rest {
            Some(rest) => {
                frame.bind(rest.clone(), Object::from_vec(excess.to_vec()))?;
            }
            None if !excess.is_empty() => {
                let name = self.frame_name();
                return Err(EvalError::runtime(name, "excess arguments").wrap(name));
            }
            None => {}
        }
        Ok(frame)
    }

    /// Requests tail-continuation into the procedure body. This is the
    /// in-band `execute_again` signal the executor loop intercepts.
    pub fn tail_call(&self, args: &[Object]) -> Result<Object, Control> {
        let frame = self.make_frame(args)?;
        Err(Control::TailCall {
            frame,
            expr: self.spec.body.clone(),
        })
    }
}

/// Applies a callable to already-evaluated arguments. Procedures answer
/// with a tail-continuation signal rather than recursing.
pub fn invoke(callee: &Object, args: &[Object]) -> Result<Object, Control> {
    match callee {
        Object::Builtin(b) => b.execute_call(args),
        Object::Procedure(p) => p.tail_call(args),
        other => Err(Control::Fail(EvalError::NotCallable(other.to_string()))),
    }
}

impl Expression {
    /// True when computing this expression can neither fail nor observe or
    /// mutate state.
    pub fn is_pure(&self) -> bool {
        match self {
            Expression::Nil | Expression::Const(_) | Expression::Lambda(_) => true,
            Expression::MakeList(e) => e.is_pure(),
            Expression::If2(t, a) => t.is_pure() && a.is_pure(),
            Expression::If3(t, a, b) => t.is_pure() && a.is_pure() && b.is_pure(),
            Expression::Seq(es) => es.iter().all(|e| e.is_pure()),
            _ => false,
        }
    }

    /// Evaluates this expression one step. Tail positions are not entered;
    /// they are reported as `Control::TailCall` for the executor loop.
    pub fn compute(&self, env: &Environment, frame: &Rc<Frame>) -> Result<Object, Control> {
        match self {
            Expression::Nil => Ok(Object::Nil),
            Expression::Const(obj) => Ok(obj.clone()),
            Expression::UnboundSym(sym) => frame
                .resolve(sym)
                .ok_or_else(|| Control::Fail(EvalError::not_bound(frame.name(), sym.name()))),
            Expression::LookupSym(sym, depth) => frame
                .nth_parent(*depth)
                .and_then(|fr| fr.lookup(sym))
                .ok_or_else(|| Control::Fail(EvalError::not_bound(frame.name(), sym.name()))),
            Expression::ResolveSym(sym, skip) => frame
                .nth_parent(*skip)
                .and_then(|fr| fr.resolve(sym))
                .ok_or_else(|| Control::Fail(EvalError::not_bound(frame.name(), sym.name()))),
            Expression::Call(proc, args) => {
                let callee = env.eval(proc, frame)?;
                if let Object::Procedure(p) = &callee {
                    env.note_call(p.frame_name());
                }
                let base = env.stack_len();
                let res = (|| {
                    for arg in args {
                        let val = env.eval(arg, frame)?;
                        env.push(val);
                    }
                    let argv = env.stack_tail(base);
                    invoke(&callee, &argv)
                })();
                env.truncate_stack(base);
                res
            }
            Expression::BuiltinCall0(b) => b.execute_call(&[]),
            Expression::BuiltinCall1(b, a) => {
                let v = env.eval(a, frame)?;
                b.execute_call(&[v])
            }
            Expression::BuiltinCall2(b, a1, a2) => {
                let v1 = env.eval(a1, frame)?;
                let v2 = env.eval(a2, frame)?;
                b.execute_call(&[v1, v2])
            }
            Expression::BuiltinCallN(b, args) => {
                let base = env.stack_len();
                let res = (|| {
                    for arg in args {
                        let val = env.eval(arg, frame)?;
                        env.push(val);
                    }
                    let argv = env.stack_tail(base);
                    b.execute_call(&argv)
                })();
                env.truncate_stack(base);
                res
            }
            Expression::If2(test, then) => {
                if env.eval(test, frame)?.is_true() {
                    Err(Control::TailCall {
                        frame: frame.clone(),
                        expr: then.clone(),
                    })
                } else {
                    Ok(Object::Nil)
                }
            }
            Expression::If3(test, then, els) => {
                let branch = if env.eval(test, frame)?.is_true() {
                    then
                } else {
                    els
                };
                Err(Control::TailCall {
                    frame: frame.clone(),
                    expr: branch.clone(),
                })
            }
            Expression::Seq(exprs) => match exprs.split_last() {
                None => Ok(Object::Nil),
                Some((last, init)) => {
                    for expr in init {
                        env.eval(expr, frame)?;
                    }
                    Err(Control::TailCall {
                        frame: frame.clone(),
                        expr: last.clone(),
                    })
                }
            },
            Expression::Let(syms, vals, body) => {
                let child = frame.child("let");
                for (sym, val) in syms.iter().zip(vals.iter()) {
                    let v = env.eval(val, frame)?;
                    child.bind(sym.clone(), v)?;
                }
                Err(Control::TailCall {
                    frame: child,
                    expr: body.clone(),
                })
            }
            Expression::Lambda(spec) => Ok(Object::Procedure(Rc::new(Procedure {
                frame: frame.clone(),
                spec: spec.clone(),
            }))),
            Expression::Define(sym, val) => {
                let v = env.eval(val, frame)?;
                frame.bind(sym.clone(), v)?;
                Ok(Object::Sym(sym.clone()))
            }
            Expression::SetX(sym, val) => {
                let v = env.eval(val, frame)?;
                frame.set(sym, v)?;
                Ok(Object::Sym(sym.clone()))
            }
            Expression::MakeList(e) => {
                let v = env.eval(e, frame)?;
                Ok(Object::cons(v, Object::Nil))
            }
            Expression::Program(p) => p.run(env, frame),
        }
    }

    /// Converts back to a datum, suitable for printing or re-parsing.
    pub fn unparse(&self) -> Object {
        match self {
            Expression::Nil => Object::Nil,
            Expression::Const(obj) => match obj {
                Object::Sym(_) | Object::Pair(_) => Object::from_vec(vec![
                    Object::Sym(core_symbol("quote")),
                    obj.clone(),
                ]),
                _ => obj.clone(),
            },
            Expression::UnboundSym(s)
            | Expression::LookupSym(s, _)
            | Expression::ResolveSym(s, _) => Object::Sym(s.clone()),
            Expression::Call(proc, args) => {
                let mut items = vec![proc.unparse()];
                items.extend(args.iter().map(|a| a.unparse()));
                Object::from_vec(items)
            }
            Expression::BuiltinCall0(b) => Object::from_vec(vec![Object::Builtin(b.clone())]),
            Expression::BuiltinCall1(b, a) => {
                Object::from_vec(vec![Object::Builtin(b.clone()), a.unparse()])
            }
            Expression::BuiltinCall2(b, a1, a2) => Object::from_vec(vec![
                Object::Builtin(b.clone()),
                a1.unparse(),
                a2.unparse(),
            ]),
            Expression::BuiltinCallN(b, args) => {
                let mut items = vec![Object::Builtin(b.clone())];
                items.extend(args.iter().map(|a| a.unparse()));
                Object::from_vec(items)
            }
            Expression::If2(t, a) => Object::from_vec(vec![
                Object::Sym(core_symbol("if")),
                t.unparse(),
                a.unparse(),
            ]),
            Expression::If3(t, a, b) => Object::from_vec(vec![
                Object::Sym(core_symbol("if")),
                t.unparse(),
                a.unparse(),
                b.unparse(),
            ]),
            Expression::Seq(exprs) => {
                let mut items = vec![Object::Sym(core_symbol("begin"))];
                items.extend(exprs.iter().map(|e| e.unparse()));
                Object::from_vec(items)
            }
            Expression::Let(syms, vals, body) => {
                let mut bindings = Vec::new();
                for (sym, val) in syms.iter().zip(vals.iter()) {
                    bindings.push(Object::Sym(sym.clone()));
                    bindings.push(val.unparse());
                }
                Object::from_vec(vec![
                    Object::Sym(core_symbol("let")),
                    Object::from_vec(bindings),
                    body.unparse(),
                ])
            }
            Expression::Lambda(spec) => {
                let params: Vec<Object> =
                    spec.params.iter().map(|p| Object::Sym(p.clone())).collect();
                let param_list = match &spec.rest {
                    Some(rest) => Object::from_vec_dotted(params, Object::Sym(rest.clone())),
                    None => Object::from_vec(params),
                };
                Object::from_vec(vec![
                    Object::Sym(core_symbol("lambda")),
                    param_list,
                    spec.body.unparse(),
                ])
            }
            Expression::Define(sym, val) => Object::from_vec(vec![
                Object::Sym(core_symbol("define")),
                Object::Sym(sym.clone()),
                val.unparse(),
            ]),
            Expression::SetX(sym, val) => Object::from_vec(vec![
                Object::Sym(core_symbol("set!")),
                Object::Sym(sym.clone()),
                val.unparse(),
            ]),
            Expression::MakeList(e) => Object::from_vec(vec![
                Object::Sym(core_symbol("list")),
                e.unparse(),
            ]),
            Expression::Program(p) => p.source.unparse(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unparse())
    }
}
