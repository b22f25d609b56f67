// ABOUTME: Lexical binding frames: a chain of symbol->value maps with
// freezing and per-symbol constancy

use crate::error::EvalError;
use crate::object::Object;
use crate::symbol::Symbol;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// One scope in the lexical chain. A frozen frame rejects all mutation;
/// a symbol marked const cannot be re-bound for the lifetime of its frame.
#[derive(Debug)]
pub struct Frame {
    name: String,
    parent: Option<Rc<Frame>>,
    vars: RefCell<HashMap<Symbol, Object>>,
    consts: RefCell<HashSet<Symbol>>,
    frozen: Cell<bool>,
}

impl Frame {
    /// Creates a new root frame with no parent.
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Frame {
            name: name.to_string(),
            parent: None,
            vars: RefCell::new(HashMap::new()),
            consts: RefCell::new(HashSet::new()),
            frozen: Cell::new(false),
        })
    }

    /// Creates a child frame parented at `self`.
    pub fn child(self: &Rc<Self>, name: &str) -> Rc<Self> {
        Rc::new(Frame {
            name: name.to_string(),
            parent: Some(self.clone()),
            vars: RefCell::new(HashMap::new()),
            consts: RefCell::new(HashSet::new()),
            frozen: Cell::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Frame>> {
        self.parent.as_ref()
    }

    /// The outermost ancestor of this frame.
    pub fn root(self: &Rc<Self>) -> Rc<Frame> {
        let mut cur = self.clone();
        while let Some(p) = cur.parent.clone() {
            cur = p;
        }
        cur
    }

    /// Number of symbols bound directly in this frame.
    pub fn binding_count(&self) -> usize {
        self.vars.borrow().len()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Marks this frame read-only. Every symbol currently bound here is
    /// constant from now on.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    /// True when `sym` is bound in this frame and cannot be re-bound.
    pub fn is_constant(&self, sym: &Symbol) -> bool {
        self.vars.borrow().contains_key(sym)
            && (self.frozen.get() || self.consts.borrow().contains(sym))
    }

    /// True when binding `sym` from this frame would collide with a
    /// constant: the nearest frame in the chain that binds `sym` marks it
    /// const (a non-const shadowing binding in between clears the way).
    pub fn is_constant_bind(&self, sym: &Symbol) -> bool {
        let mut cur = Some(self);
        while let Some(frame) = cur {
            if frame.vars.borrow().contains_key(sym) {
                return frame.is_constant(sym);
            }
            cur = frame.parent.as_deref();
        }
        false
    }

    /// Inserts or overwrites `sym` in this frame.
    pub fn bind(&self, sym: Symbol, val: Object) -> Result<(), EvalError> {
        if self.frozen.get() {
            return Err(EvalError::Frozen(self.name.clone()));
        }
        if self.is_constant_bind(&sym) {
            return Err(EvalError::ConstBinding(sym.name().to_string()));
        }
        self.vars.borrow_mut().insert(sym, val);
        Ok(())
    }

    /// As `bind`, additionally marking the symbol const in this frame.
    pub fn bind_const(&self, sym: Symbol, val: Object) -> Result<(), EvalError> {
        self.bind(sym.clone(), val)?;
        self.consts.borrow_mut().insert(sym);
        Ok(())
    }

    /// Removes `sym` from this frame only. Constants stay bound: constancy
    /// is monotonic for the lifetime of the frame.
    pub fn unbind(&self, sym: &Symbol) -> Result<(), EvalError> {
        if self.frozen.get() {
            return Err(EvalError::Frozen(self.name.clone()));
        }
        if self.is_constant(sym) {
            return Err(EvalError::ConstBinding(sym.name().to_string()));
        }
        self.vars.borrow_mut().remove(sym);
        Ok(())
    }

    /// Looks `sym` up in this frame only.
    pub fn lookup(&self, sym: &Symbol) -> Option<Object> {
        self.vars.borrow().get(sym).cloned()
    }

    /// Walks the parent chain; the nearest binding wins.
    pub fn resolve(&self, sym: &Symbol) -> Option<Object> {
        if let Some(val) = self.lookup(sym) {
            return Some(val);
        }
        self.parent.as_ref().and_then(|p| p.resolve(sym))
    }

    /// Resolution with provenance: the value, its defining frame, and the
    /// number of parent hops to reach it. Used by the improver.
    pub fn resolve_full(self: &Rc<Self>, sym: &Symbol) -> Option<(Object, Rc<Frame>, usize)> {
        let mut cur = self.clone();
        let mut depth = 0;
        loop {
            if let Some(val) = cur.lookup(sym) {
                return Some((val, cur, depth));
            }
            let next = cur.parent.clone()?;
            cur = next;
            depth += 1;
        }
    }

    /// The frame `hops` parents above this one.
    pub fn nth_parent(self: &Rc<Self>, hops: usize) -> Option<Rc<Frame>> {
        let mut cur = self.clone();
        for _ in 0..hops {
            let next = cur.parent.clone()?;
            cur = next;
        }
        Some(cur)
    }

    /// Re-binds `sym` in the frame that currently defines it. Fails
    /// `NotBound` when no ancestor binds it.
    pub fn set(self: &Rc<Self>, sym: &Symbol, val: Object) -> Result<(), EvalError> {
        let mut cur = self.clone();
        loop {
            if cur.vars.borrow().contains_key(sym) {
                if cur.frozen.get() {
                    return Err(EvalError::Frozen(cur.name.clone()));
                }
                if cur.is_constant(sym) {
                    return Err(EvalError::ConstBinding(sym.name().to_string()));
                }
                cur.vars.borrow_mut().insert(sym.clone(), val);
                return Ok(());
            }
            match cur.parent.clone() {
                Some(p) => cur = p,
                None => return Err(EvalError::not_bound(&self.name, sym.name())),
            }
        }
    }
}
