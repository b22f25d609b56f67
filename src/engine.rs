// ABOUTME: The executor: evaluation environment, tail-call loop, limits,
// observers, and the engine control surface

use crate::builtins;
use crate::compile;
use crate::config::{Limits, ReaderConfig};
use crate::error::EvalError;
use crate::expr::Expression;
use crate::frame::Frame;
use crate::improve::Improver;
use crate::object::Object;
use crate::parse::{self, Parser};
use crate::reader::Reader;
use crate::symbol::{core_package, symbol_t, Symbol};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// The non-value outcome of a compute step. `TailCall` is the in-band
/// `execute_again` signal: not an error, intercepted by the executor loop
/// before anything user-visible happens. A leaked `TailCall` is a host bug.
#[derive(Debug)]
pub enum Control {
    Fail(EvalError),
    TailCall {
        frame: Rc<Frame>,
        expr: Rc<Expression>,
    },
}

impl Control {
    /// Applies the `CallError` wrapping rule to failures; tail signals
    /// pass through untouched.
    pub fn wrap(self, name: &str) -> Control {
        match self {
            Control::Fail(err) => Control::Fail(err.wrap(name)),
            tail => tail,
        }
    }
}

impl From<EvalError> for Control {
    fn from(err: EvalError) -> Self {
        Control::Fail(err)
    }
}

pub type ParseObserver = Rc<dyn Fn(&Object, &Rc<Expression>)>;
pub type ImproveObserver = Rc<dyn Fn(&Rc<Expression>, &Rc<Expression>)>;
pub type CompileObserver = Rc<dyn Fn(&Rc<Expression>)>;
pub type ComputeObserver = Rc<dyn Fn(&Rc<Expression>)>;

/// Optional event hooks, read once per event and free when unset.
#[derive(Default)]
pub struct Observers {
    pub parse: Option<ParseObserver>,
    pub improve: Option<ImproveObserver>,
    pub compile: Option<CompileObserver>,
    pub compute: Option<ComputeObserver>,
}

/// Dynamic execution state: the evaluation stack, limit counters, and
/// observer slots. Distinct from the lexical `Frame` chain.
pub struct Environment {
    stack: RefCell<Vec<Object>>,
    limits: Limits,
    steps: Cell<u64>,
    nesting: Cell<usize>,
    deadline: Cell<Option<Instant>>,
    observers: RefCell<Observers>,
    call_trace: RefCell<Vec<String>>,
}

/// Callables remembered for error rendering; older entries age out.
const CALL_TRACE_LIMIT: usize = 64;

impl Default for Environment {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Environment {
    pub fn new(limits: Limits) -> Self {
        Environment {
            stack: RefCell::new(Vec::new()),
            limits,
            steps: Cell::new(0),
            nesting: Cell::new(0),
            deadline: Cell::new(None),
            observers: RefCell::new(Observers::default()),
            call_trace: RefCell::new(Vec::new()),
        }
    }

    /// Records a callable entry so a host can render a call chain after
    /// an error. Tail calls replace frames, so this is a recency list,
    /// bounded at `CALL_TRACE_LIMIT`.
    pub fn note_call(&self, name: &str) {
        let mut trace = self.call_trace.borrow_mut();
        if trace.len() >= CALL_TRACE_LIMIT {
            trace.drain(..CALL_TRACE_LIMIT / 2);
        }
        trace.push(name.to_string());
    }

    /// The most recent callables entered, oldest first.
    pub fn call_trace(&self) -> Vec<String> {
        self.call_trace.borrow().clone()
    }

    // ---- evaluation stack ----

    pub fn stack_len(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn push(&self, val: Object) {
        self.stack.borrow_mut().push(val);
    }

    pub fn pop(&self) -> Result<Object, Control> {
        self.stack
            .borrow_mut()
            .pop()
            .ok_or_else(|| Control::Fail(EvalError::runtime("stack", "underflow")))
    }

    /// Removes and returns the top `n` values, oldest first.
    pub fn split_off(&self, n: usize) -> Result<Vec<Object>, Control> {
        let mut stack = self.stack.borrow_mut();
        if stack.len() < n {
            return Err(Control::Fail(EvalError::runtime("stack", "underflow")));
        }
        let at = stack.len() - n;
        Ok(stack.split_off(at))
    }

    /// Discards the top `n` values.
    pub fn discard(&self, n: usize) -> Result<(), Control> {
        self.split_off(n).map(|_| ())
    }

    /// Clones the values above `base`, oldest first.
    pub fn stack_tail(&self, base: usize) -> Vec<Object> {
        self.stack.borrow()[base..].to_vec()
    }

    pub fn truncate_stack(&self, len: usize) {
        self.stack.borrow_mut().truncate(len);
    }

    pub fn reserve_stack(&self, extra: usize) {
        self.stack.borrow_mut().reserve(extra);
    }

    // ---- limits ----

    pub fn steps_taken(&self) -> u64 {
        self.steps.get()
    }

    /// Accounts one compute step; fails when the step or time limit is hit.
    pub fn tick(&self) -> Result<(), Control> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        if let Some(max) = self.limits.max_steps {
            if steps > max {
                return Err(Control::Fail(EvalError::StepsLimit(max)));
            }
        }
        if let Some(deadline) = self.deadline.get() {
            if Instant::now() > deadline {
                return Err(Control::Fail(EvalError::TimeLimit));
            }
        }
        Ok(())
    }

    fn enter_nesting(&self) -> Result<(), EvalError> {
        let depth = self.nesting.get() + 1;
        if let Some(max) = self.limits.max_nesting {
            if depth > max {
                return Err(EvalError::NestingLimit(max));
            }
        }
        self.nesting.set(depth);
        Ok(())
    }

    fn leave_nesting(&self) {
        self.nesting.set(self.nesting.get() - 1);
    }

    // ---- execution ----

    /// Runs `expr` to completion. This is the tail-call loop: a
    /// `TailCall` signal replaces the current frame and expression and
    /// iterates, so chained tail calls use constant host stack.
    pub fn execute(
        &self,
        mut expr: Rc<Expression>,
        mut frame: Rc<Frame>,
    ) -> Result<Object, EvalError> {
        self.enter_nesting()?;
        let result = loop {
            match self.step(&expr, &frame) {
                Ok(val) => break Ok(val),
                Err(Control::TailCall { frame: f, expr: e }) => {
                    frame = f;
                    expr = e;
                }
                Err(Control::Fail(err)) => break Err(err),
            }
        };
        self.leave_nesting();
        result
    }

    fn step(&self, expr: &Rc<Expression>, frame: &Rc<Frame>) -> Result<Object, Control> {
        self.tick()?;
        let observer = self.observers.borrow().compute.clone();
        if let Some(obs) = observer {
            obs(expr);
        }
        expr.compute(self, frame)
    }

    /// Nested evaluation of a subexpression, for use inside `compute`.
    pub fn eval(&self, expr: &Rc<Expression>, frame: &Rc<Frame>) -> Result<Object, Control> {
        self.execute(expr.clone(), frame.clone()).map_err(Control::Fail)
    }

    /// Top-level entry: resets the step counter, arms the deadline, and
    /// executes.
    pub fn run(&self, expr: Rc<Expression>, frame: Rc<Frame>) -> Result<Object, EvalError> {
        self.steps.set(0);
        self.call_trace.borrow_mut().clear();
        self.deadline
            .set(self.limits.time_limit.map(|d| Instant::now() + d));
        self.execute(expr, frame)
    }

    pub(crate) fn observers(&self) -> &RefCell<Observers> {
        &self.observers
    }
}

/// A complete interpreter: a frozen root frame of builtins and syntax, a
/// mutable top-level frame, and an evaluation environment.
pub struct Engine {
    root: Rc<Frame>,
    top: RefCell<Rc<Frame>>,
    env: Environment,
    reader_cfg: ReaderConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// A fully populated engine: `T`, builtins, and syntax forms bound in
    /// a frozen root, with a fresh top-level frame above it.
    pub fn new() -> Engine {
        let engine = Engine::with_root(Frame::new("root"));
        engine
            .bootstrap()
            .expect("bootstrap binds into a fresh unfrozen root");
        engine
    }

    /// An engine over a caller-supplied root frame. Nothing is bound and
    /// the root is left unfrozen; the caller decides what goes in.
    pub fn with_root(root: Rc<Frame>) -> Engine {
        let top = root.child("user");
        Engine {
            root,
            top: RefCell::new(top),
            env: Environment::default(),
            reader_cfg: ReaderConfig::default(),
        }
    }

    fn bootstrap(&self) -> Result<(), EvalError> {
        let t = symbol_t();
        self.root.bind_const(t.clone(), Object::Sym(t))?;
        builtins::register_all(&self.root)?;
        parse::register_specials(&self.root)?;
        self.root.freeze();
        Ok(())
    }

    pub fn root_frame(&self) -> Rc<Frame> {
        self.root.clone()
    }

    pub fn top_level(&self) -> Rc<Frame> {
        self.top.borrow().clone()
    }

    pub fn set_top_level(&self, frame: Rc<Frame>) {
        *self.top.borrow_mut() = frame;
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.env = Environment::new(limits);
    }

    pub fn set_reader_config(&mut self, cfg: ReaderConfig) {
        self.reader_cfg = cfg;
    }

    /// Interns `name` in the engine's package.
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        core_package().make_symbol(name)
    }

    // ---- binding surface ----

    /// Binds `name` in the top-level frame.
    pub fn bind(&self, name: &str, obj: Object) -> Result<(), EvalError> {
        let sym = self
            .symbol(name)
            .ok_or_else(|| EvalError::syntax("bind", "empty name"))?;
        self.top_level().bind(sym, obj)
    }

    /// Binds `name` in the top-level frame and marks it const.
    pub fn bind_const(&self, name: &str, obj: Object) -> Result<(), EvalError> {
        let sym = self
            .symbol(name)
            .ok_or_else(|| EvalError::syntax("bind", "empty name"))?;
        self.top_level().bind_const(sym, obj)
    }

    /// Binds a builtin in the root frame. Fails `Frozen` after bootstrap;
    /// use an engine built with `with_root` to extend the builtin set.
    pub fn bind_builtin(&self, builtin: crate::expr::Builtin) -> Result<(), EvalError> {
        builtins::bind_builtin(&self.root, builtin)
    }

    /// Binds a syntax form in the root frame, with the same freezing
    /// caveat as `bind_builtin`.
    pub fn bind_special(&self, special: parse::SpecialForm) -> Result<(), EvalError> {
        parse::bind_special(&self.root, special)
    }

    // ---- pipeline ----

    pub fn parse(&self, datum: &Object, frame: &Rc<Frame>) -> Result<Rc<Expression>, EvalError> {
        let parser = Parser::new(&self.env, frame.clone());
        let expr = parser.parse(datum)?;
        let observer = self.env.observers().borrow().parse.clone();
        if let Some(obs) = observer {
            obs(datum, &expr);
        }
        Ok(expr)
    }

    pub fn improve(
        &self,
        expr: &Rc<Expression>,
        frame: &Rc<Frame>,
    ) -> Result<Rc<Expression>, EvalError> {
        let improved = Improver::new(frame.clone()).improve(expr)?;
        let observer = self.env.observers().borrow().improve.clone();
        if let Some(obs) = observer {
            obs(expr, &improved);
        }
        Ok(improved)
    }

    /// Lowers to a `Program` expression; `MissingCompile` when some
    /// subexpression has no instruction form.
    pub fn compile(&self, expr: &Rc<Expression>) -> Result<Rc<Expression>, EvalError> {
        let program = compile::compile(expr)?;
        let observer = self.env.observers().borrow().compile.clone();
        if let Some(obs) = observer {
            obs(&program);
        }
        Ok(program)
    }

    pub fn run(&self, expr: &Rc<Expression>, frame: &Rc<Frame>) -> Result<Object, EvalError> {
        self.env.run(expr.clone(), frame.clone())
    }

    /// Reads, parses, improves, and runs every form in `src` against the
    /// top-level frame, returning the last result.
    pub fn eval_str(&self, src: &str) -> Result<Object, EvalError> {
        let reader = Reader::new(self.reader_cfg.clone());
        let mut result = Object::Nil;
        for datum in reader.read_all(src)? {
            let top = self.top_level();
            let expr = self.parse(&datum, &top)?;
            let expr = self.improve(&expr, &top)?;
            result = self.run(&expr, &top)?;
        }
        Ok(result)
    }

    /// Loads the guest-language prelude into the top-level frame.
    pub fn load_prelude(&self) -> Result<(), EvalError> {
        self.eval_str(include_str!("prelude.lisp")).map(|_| ())
    }

    // ---- observers ----

    pub fn set_parse_observer(&self, obs: Option<ParseObserver>) {
        self.env.observers().borrow_mut().parse = obs;
    }

    pub fn set_improve_observer(&self, obs: Option<ImproveObserver>) {
        self.env.observers().borrow_mut().improve = obs;
    }

    pub fn set_compile_observer(&self, obs: Option<CompileObserver>) {
        self.env.observers().borrow_mut().compile = obs;
    }

    pub fn set_compute_observer(&self, obs: Option<ComputeObserver>) {
        self.env.observers().borrow_mut().compute = obs;
    }
}
