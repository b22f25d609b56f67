// ABOUTME: The guest value domain: atoms, pairs, vectors, and callables

use crate::error::EvalError;
use crate::expr::{Builtin, Expression, Procedure};
use crate::frame::Frame;
use crate::parse::SpecialForm;
use crate::symbol::{symbol_t, Symbol};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One cons cell. Lists are chains of pairs terminated by nil (proper) or
/// by any other value (improper).
#[derive(Debug)]
pub struct Pair {
    pub car: Object,
    pub cdr: Object,
}

/// A guest-language value. Cloning is cheap: compound values are shared
/// through `Rc`, and mutation exists only inside vectors.
#[derive(Debug, Clone)]
pub enum Object {
    Nil,
    Int(i64),
    Str(Rc<str>),
    Sym(Symbol),
    Pair(Rc<Pair>),
    Vector(Rc<RefCell<Vec<Object>>>),
    Undefined,
    Builtin(Rc<Builtin>),
    Special(Rc<SpecialForm>),
    Procedure(Rc<Procedure>),
    Expr(Rc<Expression>),
    Frame(Rc<Frame>),
}

impl Object {
    pub fn string(s: impl Into<Rc<str>>) -> Object {
        Object::Str(s.into())
    }

    pub fn cons(car: Object, cdr: Object) -> Object {
        Object::Pair(Rc::new(Pair { car, cdr }))
    }

    /// Builds a proper list from the items, in order.
    pub fn from_vec(items: Vec<Object>) -> Object {
        let mut list = Object::Nil;
        for item in items.into_iter().rev() {
            list = Object::cons(item, list);
        }
        list
    }

    /// Builds an improper list: the items followed by a dotted tail.
    /// An empty item list yields the tail itself.
    pub fn from_vec_dotted(items: Vec<Object>, tail: Object) -> Object {
        let mut list = tail;
        for item in items.into_iter().rev() {
            list = Object::cons(item, list);
        }
        list
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Object::Nil)
    }

    pub fn is_atom(&self) -> bool {
        !matches!(self, Object::Pair(_))
    }

    /// Uniform truth: nil, the empty string, and undefined are falsy;
    /// every other value is truthy. Never faults.
    pub fn is_true(&self) -> bool {
        !matches!(self, Object::Nil | Object::Undefined)
            && !matches!(self, Object::Str(s) if s.is_empty())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<&Symbol> {
        match self {
            Object::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Object::Pair(p) => Some(p),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Nil => "nil",
            Object::Int(_) => "integer",
            Object::Str(_) => "string",
            Object::Sym(_) => "symbol",
            Object::Pair(_) => "pair",
            Object::Vector(_) => "vector",
            Object::Undefined => "undefined",
            Object::Builtin(_) => "builtin",
            Object::Special(_) => "special",
            Object::Procedure(_) => "procedure",
            Object::Expr(_) => "expression",
            Object::Frame(_) => "binding",
        }
    }

    /// Structural equality: deep over pairs and vectors, identity over
    /// symbols and callables.
    pub fn is_equal(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Nil, Object::Nil) => true,
            (Object::Int(a), Object::Int(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Sym(a), Object::Sym(b)) => a == b,
            (Object::Undefined, Object::Undefined) => true,
            // Spines are walked iteratively so long lists do not recurse.
            (Object::Pair(a), Object::Pair(b)) => {
                let (mut a, mut b) = (a.clone(), b.clone());
                loop {
                    if Rc::ptr_eq(&a, &b) {
                        return true;
                    }
                    if !a.car.is_equal(&b.car) {
                        return false;
                    }
                    match (&a.cdr, &b.cdr) {
                        (Object::Pair(na), Object::Pair(nb)) => {
                            let (na, nb) = (na.clone(), nb.clone());
                            a = na;
                            b = nb;
                        }
                        (ta, tb) => return ta.is_equal(tb),
                    }
                }
            }
            (Object::Vector(a), Object::Vector(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_equal(y))
            }
            (Object::Builtin(a), Object::Builtin(b)) => Rc::ptr_eq(a, b),
            (Object::Special(a), Object::Special(b)) => Rc::ptr_eq(a, b),
            (Object::Procedure(a), Object::Procedure(b)) => Rc::ptr_eq(a, b),
            (Object::Expr(a), Object::Expr(b)) => Rc::ptr_eq(a, b),
            (Object::Frame(a), Object::Frame(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Iterates the elements of a cons chain. The final item is an
    /// `ImproperList` error when the chain does not end in nil.
    pub fn list_iter(&self) -> ListIter {
        ListIter {
            cur: self.clone(),
        }
    }

    /// Length of a proper list.
    pub fn list_length(&self) -> Result<usize, EvalError> {
        let mut n = 0;
        for item in self.list_iter() {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Collects a proper list into a vector.
    pub fn list_to_vec(&self) -> Result<Vec<Object>, EvalError> {
        self.list_iter().collect()
    }

    /// Fresh reversed copy of a proper list.
    pub fn list_reverse(&self) -> Result<Object, EvalError> {
        let mut out = Object::Nil;
        for item in self.list_iter() {
            out = Object::cons(item?, out);
        }
        Ok(out)
    }

    /// Fresh copy of a proper list: equal to the original, sharing the
    /// elements but none of the pairs.
    pub fn list_copy(&self) -> Result<Object, EvalError> {
        Ok(Object::from_vec(self.list_to_vec()?))
    }
}

/// Truth as a value: `T` for true, `()` for false. Idempotent on the two
/// canonical booleans.
pub fn make_boolean(b: bool) -> Object {
    if b {
        Object::Sym(symbol_t())
    } else {
        Object::Nil
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

pub struct ListIter {
    cur: Object,
}

impl Iterator for ListIter {
    type Item = Result<Object, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.cur, Object::Nil) {
            Object::Nil => None,
            Object::Pair(p) => {
                self.cur = p.cdr.clone();
                Some(Ok(p.car.clone()))
            }
            _ => Some(Err(EvalError::ImproperList)),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Nil => write!(f, "()"),
            Object::Int(n) => write!(f, "{}", n),
            Object::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '\n' => write!(f, "\\n")?,
                        '\r' => write!(f, "\\r")?,
                        '\t' => write!(f, "\\t")?,
                        '\\' => write!(f, "\\\\")?,
                        '"' => write!(f, "\\\"")?,
                        c if (c as u32) < 0x20 => write!(f, "\\x{:02X}", c as u32)?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Object::Sym(s) => write!(f, "{}", s),
            Object::Pair(p) => {
                write!(f, "({}", p.car)?;
                let mut tail = p.cdr.clone();
                loop {
                    match tail {
                        Object::Nil => break,
                        Object::Pair(next) => {
                            write!(f, " {}", next.car)?;
                            tail = next.cdr.clone();
                        }
                        other => {
                            write!(f, " . {}", other)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Object::Vector(v) => {
                write!(f, "#(")?;
                for (i, item) in v.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Object::Undefined => write!(f, "#<undefined>"),
            Object::Builtin(b) => write!(f, "#<builtin:{}>", b.name),
            Object::Special(s) => write!(f, "#<special:{}>", s.name),
            Object::Procedure(p) => {
                if p.name().is_empty() {
                    write!(f, "#<lambda>")
                } else {
                    write!(f, "#<lambda:{}>", p.name())
                }
            }
            Object::Expr(e) => write!(f, "#<expr:{}>", e),
            Object::Frame(fr) => write!(f, "#<binding:{}/{}>", fr.name(), fr.binding_count()),
        }
    }
}
