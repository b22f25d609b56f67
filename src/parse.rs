// ABOUTME: Parser: turns data-mode S-expressions into executable
// expressions, expanding syntax forms bound in the parse-time frame

use crate::config::MAX_EXPANSIONS;
use crate::engine::Environment;
use crate::error::EvalError;
use crate::expr::{Expression, LambdaSpec, Procedure};
use crate::frame::Frame;
use crate::object::Object;
use crate::symbol::{core_symbol, Symbol};
use std::rc::Rc;

/// Outcome of one parse step. `Again` is the `parse_again` signal: a
/// syntax handler produced a new datum to parse in place of the old one.
pub enum Parsed {
    Expr(Rc<Expression>),
    Again(Object),
}

pub type SpecialFn = fn(&Parser, &Object) -> Result<Parsed, EvalError>;

pub enum SpecialKind {
    /// Host-implemented syntax, e.g. `if` or `quote`.
    Native(SpecialFn),
    /// Guest-defined macro: the body runs at parse time over unevaluated
    /// argument data and the result is re-parsed.
    Macro(Rc<Procedure>),
}

/// A syntax handler bound in a frame. The parser dispatches on the head
/// symbol of a form when it resolves to one of these.
pub struct SpecialForm {
    pub name: String,
    pub kind: SpecialKind,
}

impl std::fmt::Debug for SpecialForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialForm").field("name", &self.name).finish()
    }
}

/// Binds a syntax form under its own name.
pub fn bind_special(frame: &Rc<Frame>, special: SpecialForm) -> Result<(), EvalError> {
    let sym = core_symbol(&special.name);
    frame.bind(sym, Object::Special(Rc::new(special)))
}

fn native(name: &str, f: SpecialFn) -> SpecialForm {
    SpecialForm {
        name: name.to_string(),
        kind: SpecialKind::Native(f),
    }
}

/// Installs the native syntax forms into `frame`.
pub fn register_specials(frame: &Rc<Frame>) -> Result<(), EvalError> {
    bind_special(frame, native("quote", parse_quote))?;
    bind_special(frame, native("quasiquote", parse_quasiquote))?;
    bind_special(frame, native("unquote", parse_unquote))?;
    bind_special(frame, native("unquote-splicing", parse_unquote))?;
    bind_special(frame, native("if", parse_if))?;
    bind_special(frame, native("let", parse_let))?;
    bind_special(frame, native("lambda", parse_lambda))?;
    bind_special(frame, native("define", parse_define))?;
    bind_special(frame, native("defvar", parse_define))?;
    bind_special(frame, native("set!", parse_set))?;
    bind_special(frame, native("defun", parse_defun))?;
    bind_special(frame, native("begin", parse_begin))?;
    bind_special(frame, native("defmacro", parse_defmacro))?;
    Ok(())
}

/// Parse-time state: the frame syntax dispatch resolves against, plus the
/// environment macros execute in.
pub struct Parser<'a> {
    env: &'a Environment,
    frame: Rc<Frame>,
}

impl<'a> Parser<'a> {
    pub fn new(env: &'a Environment, frame: Rc<Frame>) -> Self {
        Parser { env, frame }
    }

    pub fn frame(&self) -> &Rc<Frame> {
        &self.frame
    }

    fn with_frame(&self, frame: Rc<Frame>) -> Parser<'a> {
        Parser {
            env: self.env,
            frame,
        }
    }

    /// Parses one datum, re-entering for `parse_again` signals.
    pub fn parse(&self, datum: &Object) -> Result<Rc<Expression>, EvalError> {
        let mut form = datum.clone();
        for _ in 0..MAX_EXPANSIONS {
            match self.parse_once(&form)? {
                Parsed::Expr(expr) => return Ok(expr),
                Parsed::Again(next) => form = next,
            }
        }
        Err(EvalError::syntax("macro", "expansion too deep"))
    }

    fn parse_once(&self, datum: &Object) -> Result<Parsed, EvalError> {
        match datum {
            Object::Nil => Ok(Parsed::Expr(Rc::new(Expression::Nil))),
            // Keywords are self-evaluating; ordinary symbols are references.
            Object::Sym(sym) if sym.is_keyword() => {
                Ok(Parsed::Expr(Rc::new(Expression::Const(datum.clone()))))
            }
            Object::Sym(sym) => Ok(Parsed::Expr(Rc::new(Expression::UnboundSym(sym.clone())))),
            Object::Expr(expr) => Ok(Parsed::Expr(expr.clone())),
            Object::Pair(pair) => {
                if let Object::Sym(head) = &pair.car {
                    if let Some(Object::Special(special)) = self.frame.resolve(head) {
                        return match &special.kind {
                            SpecialKind::Native(f) => {
                                f(self, &pair.cdr).map_err(|e| e.wrap(&special.name))
                            }
                            SpecialKind::Macro(m) => self
                                .expand_macro(m, &pair.cdr)
                                .map(Parsed::Again)
                                .map_err(|e| e.wrap(&special.name)),
                        };
                    }
                }
                let proc = self.parse(&pair.car)?;
                let args = self.parse_args(&pair.cdr)?;
                Ok(Parsed::Expr(Rc::new(Expression::Call(proc, args))))
            }
            other => Ok(Parsed::Expr(Rc::new(Expression::Const(other.clone())))),
        }
    }

    /// Parses the spine of a call form's argument list.
    fn parse_args(&self, tail: &Object) -> Result<Vec<Rc<Expression>>, EvalError> {
        let mut args = Vec::new();
        let mut cur = tail.clone();
        loop {
            match cur {
                Object::Nil => return Ok(args),
                Object::Pair(p) => {
                    args.push(self.parse(&p.car)?);
                    cur = p.cdr.clone();
                }
                _ => return Err(EvalError::ImproperList),
            }
        }
    }

    /// Runs a macro body over unevaluated argument data and hands back the
    /// resulting datum for re-parsing.
    fn expand_macro(&self, def: &Rc<Procedure>, tail: &Object) -> Result<Object, EvalError> {
        let args = tail.list_to_vec()?;
        let frame = def.make_frame(&args)?;
        self.env.execute(def.spec.body.clone(), frame)
    }

    /// Parses the forms of a body; several forms become a sequence whose
    /// last form is in tail position.
    fn parse_body(&self, forms: &[Object]) -> Result<Rc<Expression>, EvalError> {
        match forms {
            [] => Ok(Rc::new(Expression::Nil)),
            [only] => self.parse(only),
            many => {
                let exprs = many
                    .iter()
                    .map(|form| self.parse(form))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Rc::new(Expression::Seq(exprs)))
            }
        }
    }
}

// ---- parameter lists ----

/// Parses a parameter datum: a proper list of symbols, optionally dotted
/// with a rest symbol; a bare symbol collects every argument.
fn parse_params(form: &str, datum: &Object) -> Result<(Vec<Symbol>, Option<Symbol>), EvalError> {
    match datum {
        Object::Nil => Ok((Vec::new(), None)),
        Object::Sym(rest) => Ok((Vec::new(), Some(rest.clone()))),
        Object::Pair(_) => {
            let mut params = Vec::new();
            let mut cur = datum.clone();
            loop {
                match cur {
                    Object::Nil => return Ok((params, None)),
                    Object::Sym(rest) => return Ok((params, Some(rest))),
                    Object::Pair(p) => {
                        match &p.car {
                            Object::Sym(s) => params.push(s.clone()),
                            other => {
                                return Err(EvalError::syntax(
                                    form,
                                    format!("parameter is not a symbol: {}", other),
                                ))
                            }
                        }
                        cur = p.cdr.clone();
                    }
                    other => {
                        return Err(EvalError::syntax(
                            form,
                            format!("parameter is not a symbol: {}", other),
                        ))
                    }
                }
            }
        }
        other => Err(EvalError::syntax(
            form,
            format!("expected a parameter list, got {}", other),
        )),
    }
}

fn expect_symbol(form: &str, datum: &Object) -> Result<Symbol, EvalError> {
    datum.as_sym().cloned().ok_or_else(|| {
        EvalError::syntax(form, format!("expected a symbol, got {}", datum))
    })
}

fn lambda_expr(
    parser: &Parser,
    name: &str,
    params_datum: &Object,
    body_forms: &[Object],
) -> Result<Rc<Expression>, EvalError> {
    let (params, rest) = parse_params(if name.is_empty() { "lambda" } else { name }, params_datum)?;
    let child = parser.frame().child(if name.is_empty() { "lambda" } else { name });
    for param in params.iter().chain(rest.iter()) {
        child.bind(param.clone(), Object::Undefined)?;
    }
    let body = parser.with_frame(child).parse_body(body_forms)?;
    Ok(Rc::new(Expression::Lambda(Rc::new(LambdaSpec {
        name: name.to_string(),
        params,
        rest,
        body,
    }))))
}

// ---- native syntax handlers ----

fn parse_quote(_parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let args = tail.list_to_vec()?;
    match args.as_slice() {
        [datum] if datum.is_nil() => Ok(Parsed::Expr(Rc::new(Expression::Nil))),
        [datum] => Ok(Parsed::Expr(Rc::new(Expression::Const(datum.clone())))),
        _ => Err(EvalError::arity("quote", "1", args.len())),
    }
}

fn parse_unquote(_parser: &Parser, _tail: &Object) -> Result<Parsed, EvalError> {
    Err(EvalError::syntax("unquote", "only valid inside quasiquote"))
}

fn parse_if(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let args = tail.list_to_vec()?;
    match args.as_slice() {
        [test, then] => Ok(Parsed::Expr(Rc::new(Expression::If2(
            parser.parse(test)?,
            parser.parse(then)?,
        )))),
        [test, then, els] => Ok(Parsed::Expr(Rc::new(Expression::If3(
            parser.parse(test)?,
            parser.parse(then)?,
            parser.parse(els)?,
        )))),
        _ => Err(EvalError::arity("if", "2-3", args.len())),
    }
}

fn parse_let(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    let (bindings, body_forms) = forms
        .split_first()
        .ok_or_else(|| EvalError::syntax("let", "expected a binding list"))?;

    let entries = bindings.list_to_vec()?;
    let mut syms = Vec::new();
    let mut vals = Vec::new();
    match entries.first() {
        // Flat form: (let (x 1 y 2) ...)
        Some(Object::Sym(_)) => {
            if entries.len() % 2 != 0 {
                return Err(EvalError::syntax("let", "odd-length binding list"));
            }
            for chunk in entries.chunks(2) {
                syms.push(expect_symbol("let", &chunk[0])?);
                vals.push(parser.parse(&chunk[1])?);
            }
        }
        // Paired form: (let ((x 1) (y 2)) ...)
        Some(Object::Pair(_)) => {
            for entry in &entries {
                let pair = entry.list_to_vec()?;
                match pair.as_slice() {
                    [sym, val] => {
                        syms.push(expect_symbol("let", sym)?);
                        vals.push(parser.parse(val)?);
                    }
                    _ => {
                        return Err(EvalError::syntax(
                            "let",
                            format!("binding is not a (symbol value) pair: {}", entry),
                        ))
                    }
                }
            }
        }
        Some(other) => {
            return Err(EvalError::syntax(
                "let",
                format!("bad binding list head: {}", other),
            ))
        }
        None => {}
    }

    let child = parser.frame().child("let");
    for sym in &syms {
        child.bind(sym.clone(), Object::Undefined)?;
    }
    let body = parser.with_frame(child).parse_body(body_forms)?;
    Ok(Parsed::Expr(Rc::new(Expression::Let(syms, vals, body))))
}

fn parse_lambda(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    let (params, body) = forms
        .split_first()
        .ok_or_else(|| EvalError::syntax("lambda", "expected a parameter list"))?;
    Ok(Parsed::Expr(lambda_expr(parser, "", params, body)?))
}

fn parse_define(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    match forms.as_slice() {
        [Object::Sym(sym), val] => Ok(Parsed::Expr(Rc::new(Expression::Define(
            sym.clone(),
            parser.parse(val)?,
        )))),
        // Function sugar: (define (f x) body...)
        [Object::Pair(sig), body @ ..] if !body.is_empty() => {
            let name = expect_symbol("define", &sig.car)?;
            let lambda = lambda_expr(parser, name.name(), &sig.cdr, body)?;
            Ok(Parsed::Expr(Rc::new(Expression::Define(name, lambda))))
        }
        _ => Err(EvalError::syntax(
            "define",
            "expected (define symbol value) or (define (name params) body)",
        )),
    }
}

fn parse_set(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    match forms.as_slice() {
        [sym, val] => Ok(Parsed::Expr(Rc::new(Expression::SetX(
            expect_symbol("set!", sym)?,
            parser.parse(val)?,
        )))),
        _ => Err(EvalError::arity("set!", "2", forms.len())),
    }
}

fn parse_defun(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    match forms.as_slice() {
        [name, params, body @ ..] if !body.is_empty() => {
            let name = expect_symbol("defun", name)?;
            let lambda = lambda_expr(parser, name.name(), params, body)?;
            Ok(Parsed::Expr(Rc::new(Expression::Define(name, lambda))))
        }
        _ => Err(EvalError::syntax(
            "defun",
            "expected (defun name (params) body)",
        )),
    }
}

fn parse_begin(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    Ok(Parsed::Expr(parser.parse_body(&forms)?))
}

fn parse_defmacro(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let forms = tail.list_to_vec()?;
    match forms.as_slice() {
        [name, params, body @ ..] if !body.is_empty() => {
            let name = expect_symbol("defmacro", name)?;
            let lambda = lambda_expr(parser, name.name(), params, body)?;
            let Expression::Lambda(spec) = &*lambda else {
                return Err(EvalError::syntax("defmacro", "malformed macro body"));
            };
            let def = Rc::new(Procedure {
                frame: parser.frame().clone(),
                spec: spec.clone(),
            });
            parser.frame().bind(
                name.clone(),
                Object::Special(Rc::new(SpecialForm {
                    name: name.name().to_string(),
                    kind: SpecialKind::Macro(def),
                })),
            )?;
            Ok(Parsed::Expr(Rc::new(Expression::Const(Object::Sym(name)))))
        }
        _ => Err(EvalError::syntax(
            "defmacro",
            "expected (defmacro name (params) body)",
        )),
    }
}

// ---- quasiquote expansion ----

enum Seg {
    One(Rc<Expression>),
    Many(Rc<Expression>),
}

/// Is `datum` a `(name payload)` form for the given reader-macro symbol?
fn marker_payload(datum: &Object, name: &str) -> Option<Object> {
    let pair = datum.as_pair()?;
    let head = pair.car.as_sym()?;
    if *head != core_symbol(name) {
        return None;
    }
    let inner = pair.cdr.as_pair()?;
    inner.cdr.is_nil().then(|| inner.car.clone())
}

/// True when the tree holds an unquote that this expansion must act on.
/// Anything under a nested quasiquote belongs to that inner expansion.
/// The spine is walked iteratively; only element nesting recurses.
fn contains_active(datum: &Object) -> bool {
    let mut cur = datum.clone();
    while let Object::Pair(pair) = cur {
        if let Some(head) = pair.car.as_sym() {
            if *head == core_symbol("unquote") || *head == core_symbol("unquote-splicing") {
                return true;
            }
            if *head == core_symbol("quasiquote") {
                return false;
            }
        }
        if contains_active(&pair.car) {
            return true;
        }
        cur = pair.cdr.clone();
    }
    false
}

fn parse_quasiquote(parser: &Parser, tail: &Object) -> Result<Parsed, EvalError> {
    let args = tail.list_to_vec()?;
    match args.as_slice() {
        [datum] => Ok(Parsed::Expr(expand_quasiquote(parser, datum)?)),
        _ => Err(EvalError::arity("quasiquote", "1", args.len())),
    }
}

fn expand_quasiquote(parser: &Parser, datum: &Object) -> Result<Rc<Expression>, EvalError> {
    if let Some(payload) = marker_payload(datum, "unquote") {
        return parser.parse(&payload);
    }
    if marker_payload(datum, "unquote-splicing").is_some() {
        return Err(EvalError::syntax(
            "unquote-splicing",
            "only valid inside a quasiquoted list",
        ));
    }
    if datum.is_nil() {
        return Ok(Rc::new(Expression::Nil));
    }
    if datum.as_pair().is_none() || !contains_active(datum) {
        return Ok(Rc::new(Expression::Const(datum.clone())));
    }

    // An active list: split into single-element and spliced segments.
    let mut segs = Vec::new();
    let mut cur = datum.clone();
    loop {
        // `(a . ,e)` is spelled `(a unquote e)` in cons structure; an
        // unquote form in tail position is the dotted-tail case.
        if let Some(payload) = marker_payload(&cur, "unquote") {
            segs.push(Seg::Many(parser.parse(&payload)?));
            break;
        }
        match cur {
            Object::Nil => break,
            Object::Pair(pair) => {
                let elem = pair.car.clone();
                if let Some(payload) = marker_payload(&elem, "unquote") {
                    segs.push(Seg::One(parser.parse(&payload)?));
                } else if let Some(payload) = marker_payload(&elem, "unquote-splicing") {
                    segs.push(Seg::Many(parser.parse(&payload)?));
                } else if contains_active(&elem) {
                    segs.push(Seg::One(expand_quasiquote(parser, &elem)?));
                } else {
                    segs.push(Seg::One(Rc::new(Expression::Const(elem))));
                }
                cur = pair.cdr.clone();
            }
            other => {
                // Literal improper tail.
                segs.push(Seg::Many(Rc::new(Expression::Const(other))));
                break;
            }
        }
    }
    Ok(combine_segments(segs))
}

fn call_named(name: &str, args: Vec<Rc<Expression>>) -> Rc<Expression> {
    Rc::new(Expression::Call(
        Rc::new(Expression::UnboundSym(core_symbol(name))),
        args,
    ))
}

/// Flattens quasiquote segments: `(append)` becomes nil, `(append x)`
/// becomes `x`, and runs of single elements collapse into one `list` (or
/// `list*` when the final segment is spliced or dotted).
fn combine_segments(segs: Vec<Seg>) -> Rc<Expression> {
    if segs.is_empty() {
        return Rc::new(Expression::Nil);
    }
    let all_single_prefix = segs[..segs.len() - 1]
        .iter()
        .all(|s| matches!(s, Seg::One(_)));
    if all_single_prefix {
        let mut exprs: Vec<Rc<Expression>> = Vec::with_capacity(segs.len());
        let spliced_tail = matches!(segs.last(), Some(Seg::Many(_)));
        for seg in segs {
            match seg {
                Seg::One(e) | Seg::Many(e) => exprs.push(e),
            }
        }
        return if spliced_tail {
            if exprs.len() == 1 {
                exprs.pop().expect("len checked")
            } else {
                call_named("list*", exprs)
            }
        } else {
            call_named("list", exprs)
        };
    }

    // Splices in the middle: append groups of singles around them.
    let mut append_args: Vec<Rc<Expression>> = Vec::new();
    let mut run: Vec<Rc<Expression>> = Vec::new();
    for seg in segs {
        match seg {
            Seg::One(e) => run.push(e),
            Seg::Many(e) => {
                flush_run(&mut append_args, &mut run);
                append_args.push(e);
            }
        }
    }
    flush_run(&mut append_args, &mut run);
    match append_args.len() {
        0 => Rc::new(Expression::Nil),
        1 => append_args.pop().expect("len checked"),
        _ => call_named("append", append_args),
    }
}

fn flush_run(append_args: &mut Vec<Rc<Expression>>, run: &mut Vec<Rc<Expression>>) {
    match run.len() {
        0 => {}
        1 => append_args.push(Rc::new(Expression::MakeList(
            run.pop().expect("len checked"),
        ))),
        _ => append_args.push(call_named("list", std::mem::take(run))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::reader::Reader;

    fn parse_str(engine: &Engine, src: &str) -> Result<Rc<Expression>, EvalError> {
        let datum = Reader::default().read_one(src).unwrap();
        let top = engine.top_level();
        engine.parse(&datum, &top)
    }

    #[test]
    fn test_parse_atoms() {
        let engine = Engine::new();
        assert!(matches!(
            &*parse_str(&engine, "42").unwrap(),
            Expression::Const(Object::Int(42))
        ));
        assert!(matches!(&*parse_str(&engine, "()").unwrap(), Expression::Nil));
        assert!(matches!(
            &*parse_str(&engine, "x").unwrap(),
            Expression::UnboundSym(_)
        ));
    }

    #[test]
    fn test_expression_as_value_is_unwrapped() {
        let engine = Engine::new();
        let inner = Rc::new(Expression::Const(Object::Int(9)));
        let datum = Object::Expr(inner.clone());
        let top = engine.top_level();
        let parsed = engine.parse(&datum, &top).unwrap();
        assert!(Rc::ptr_eq(&parsed, &inner));
    }

    #[test]
    fn test_parse_call() {
        let engine = Engine::new();
        match &*parse_str(&engine, "(f 1 2)").unwrap() {
            Expression::Call(proc, args) => {
                assert!(matches!(&**proc, Expression::UnboundSym(_)));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected call, got {}", other),
        }
    }

    #[test]
    fn test_parse_improper_call_fails() {
        let engine = Engine::new();
        assert!(matches!(
            parse_str(&engine, "(f 1 . 2)"),
            Err(EvalError::ImproperList)
        ));
    }

    #[test]
    fn test_parse_if_arities() {
        let engine = Engine::new();
        assert!(matches!(
            &*parse_str(&engine, "(if 1 2)").unwrap(),
            Expression::If2(_, _)
        ));
        assert!(matches!(
            &*parse_str(&engine, "(if 1 2 3)").unwrap(),
            Expression::If3(_, _, _)
        ));
        assert!(parse_str(&engine, "(if 1)").is_err());
    }

    #[test]
    fn test_parse_quote() {
        let engine = Engine::new();
        match &*parse_str(&engine, "'(1 2)").unwrap() {
            Expression::Const(obj) => assert_eq!(obj.to_string(), "(1 2)"),
            other => panic!("expected const, got {}", other),
        }
        assert!(matches!(&*parse_str(&engine, "'()").unwrap(), Expression::Nil));
    }

    #[test]
    fn test_parse_let_both_forms() {
        let engine = Engine::new();
        for src in ["(let ((x 1) (y 2)) x)", "(let (x 1 y 2) x)"] {
            match &*parse_str(&engine, src).unwrap() {
                Expression::Let(syms, vals, _) => {
                    assert_eq!(syms.len(), 2);
                    assert_eq!(vals.len(), 2);
                }
                other => panic!("expected let, got {}", other),
            }
        }
        assert!(parse_str(&engine, "(let (x) x)").is_err());
    }

    #[test]
    fn test_parse_lambda_rest() {
        let engine = Engine::new();
        match &*parse_str(&engine, "(lambda (a b . rest) a)").unwrap() {
            Expression::Lambda(spec) => {
                assert_eq!(spec.params.len(), 2);
                assert!(spec.rest.is_some());
            }
            other => panic!("expected lambda, got {}", other),
        }
        match &*parse_str(&engine, "(lambda args args)").unwrap() {
            Expression::Lambda(spec) => {
                assert!(spec.params.is_empty());
                assert!(spec.rest.is_some());
            }
            other => panic!("expected lambda, got {}", other),
        }
    }

    #[test]
    fn test_parse_define_and_sugar() {
        let engine = Engine::new();
        assert!(matches!(
            &*parse_str(&engine, "(define x 1)").unwrap(),
            Expression::Define(_, _)
        ));
        match &*parse_str(&engine, "(define (f x) x)").unwrap() {
            Expression::Define(sym, val) => {
                assert_eq!(sym.name(), "f");
                assert!(matches!(&**val, Expression::Lambda(_)));
            }
            other => panic!("expected define, got {}", other),
        }
    }

    #[test]
    fn test_parse_defun_names_the_lambda() {
        let engine = Engine::new();
        match &*parse_str(&engine, "(defun inc (n) (+ n 1))").unwrap() {
            Expression::Define(sym, val) => {
                assert_eq!(sym.name(), "inc");
                match &**val {
                    Expression::Lambda(spec) => assert_eq!(spec.name, "inc"),
                    other => panic!("expected lambda, got {}", other),
                }
            }
            other => panic!("expected define, got {}", other),
        }
    }

    #[test]
    fn test_parse_begin() {
        let engine = Engine::new();
        assert!(matches!(
            &*parse_str(&engine, "(begin)").unwrap(),
            Expression::Nil
        ));
        assert!(matches!(
            &*parse_str(&engine, "(begin 1 2 3)").unwrap(),
            Expression::Seq(_)
        ));
    }

    #[test]
    fn test_unquote_outside_quasiquote_fails() {
        let engine = Engine::new();
        assert!(parse_str(&engine, ",x").is_err());
    }

    #[test]
    fn test_quasiquote_atom_is_const() {
        let engine = Engine::new();
        match &*parse_str(&engine, "`x").unwrap() {
            Expression::Const(Object::Sym(s)) => assert_eq!(s.name(), "x"),
            other => panic!("expected const symbol, got {}", other),
        }
    }

    #[test]
    fn test_quasiquote_literal_list_is_const() {
        let engine = Engine::new();
        match &*parse_str(&engine, "`(1 2 3)").unwrap() {
            Expression::Const(obj) => assert_eq!(obj.to_string(), "(1 2 3)"),
            other => panic!("expected const, got {}", other),
        }
    }

    #[test]
    fn test_quasiquote_unquote_builds_list_call() {
        let engine = Engine::new();
        let expr = parse_str(&engine, "`(1 ,x 3)").unwrap();
        assert_eq!(expr.to_string(), "(list 1 x 3)");
    }

    #[test]
    fn test_quasiquote_splice_tail_builds_list_star() {
        let engine = Engine::new();
        let expr = parse_str(&engine, "`(1 2 ,@xs)").unwrap();
        assert_eq!(expr.to_string(), "(list* 1 2 xs)");
    }

    #[test]
    fn test_quasiquote_dotted_unquote_tail() {
        let engine = Engine::new();
        let expr = parse_str(&engine, "`(1 . ,x)").unwrap();
        assert_eq!(expr.to_string(), "(list* 1 x)");
    }

    #[test]
    fn test_quasiquote_middle_splice_appends() {
        let engine = Engine::new();
        let expr = parse_str(&engine, "`(,@xs ,y ,@zs)").unwrap();
        assert_eq!(expr.to_string(), "(append xs (list y) zs)");
    }

    #[test]
    fn test_quasiquote_splice_alone_is_identity() {
        let engine = Engine::new();
        let expr = parse_str(&engine, "`(,@xs)").unwrap();
        assert_eq!(expr.to_string(), "xs");
    }

    #[test]
    fn test_quasiquote_nested_list() {
        let engine = Engine::new();
        let expr = parse_str(&engine, "`(a (b ,x))").unwrap();
        assert_eq!(expr.to_string(), "(list (quote a) (list (quote b) x))");
    }

    #[test]
    fn test_defmacro_binds_and_expands() {
        let engine = Engine::new();
        engine
            .eval_str("(defmacro twice (e) `(+ ,e ,e))")
            .unwrap();
        assert_eq!(engine.eval_str("(twice 21)").unwrap(), Object::Int(42));
    }

    #[test]
    fn test_macro_sees_unevaluated_args() {
        let engine = Engine::new();
        engine
            .eval_str("(defmacro second-form (a b) b)")
            .unwrap();
        // `a` is never evaluated, so an unbound symbol there is harmless.
        assert_eq!(
            engine.eval_str("(second-form nonexistent 7)").unwrap(),
            Object::Int(7)
        );
    }
}
