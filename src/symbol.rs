// ABOUTME: Symbol interning packages; symbol equality is pointer identity

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug)]
struct SymbolData {
    name: String,
    keyword: bool,
}

/// An interned symbol. Two symbols compare equal iff they are the same
/// interned object, so frames can key on them directly.
#[derive(Debug, Clone)]
pub struct Symbol(Rc<SymbolData>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_keyword(&self) -> bool {
        self.0.keyword
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.keyword {
            write!(f, ":{}", self.0.name)
        } else {
            write!(f, "{}", self.0.name)
        }
    }
}

/// A name -> symbol intern table. Packages may be chained: a child package
/// inherits lookups from its parent until `move_symbols` promotes its
/// entries upward.
#[derive(Debug)]
pub struct Package {
    name: String,
    keyword: bool,
    parent: Option<Rc<Package>>,
    symbols: RefCell<HashMap<String, Symbol>>,
}

impl Package {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Package {
            name: name.to_string(),
            keyword: false,
            parent: None,
            symbols: RefCell::new(HashMap::new()),
        })
    }

    /// A package whose symbols print with a leading `:`.
    pub fn keyword(name: &str) -> Rc<Self> {
        Rc::new(Package {
            name: name.to_string(),
            keyword: true,
            parent: None,
            symbols: RefCell::new(HashMap::new()),
        })
    }

    pub fn child(self: &Rc<Self>, name: &str) -> Rc<Self> {
        Rc::new(Package {
            name: name.to_string(),
            keyword: self.keyword,
            parent: Some(self.clone()),
            symbols: RefCell::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the canonical symbol for `name`, creating it in this package
    /// on first use. The empty name has no symbol and yields `None`.
    pub fn make_symbol(&self, name: &str) -> Option<Symbol> {
        if name.is_empty() {
            return None;
        }
        if let Some(sym) = self.find_symbol(name) {
            return Some(sym);
        }
        let sym = Symbol(Rc::new(SymbolData {
            name: name.to_string(),
            keyword: self.keyword,
        }));
        self.symbols
            .borrow_mut()
            .insert(name.to_string(), sym.clone());
        Some(sym)
    }

    /// Non-creating lookup, consulting the parent chain.
    pub fn find_symbol(&self, name: &str) -> Option<Symbol> {
        if let Some(sym) = self.symbols.borrow().get(name) {
            return Some(sym.clone());
        }
        self.parent.as_ref().and_then(|p| p.find_symbol(name))
    }

    /// Promote every symbol interned here into the parent package. Entries
    /// already present in the parent win, so identities held by callers of
    /// the parent stay stable. A root package is left untouched.
    pub fn move_symbols(&self) {
        let Some(parent) = self.parent.as_ref() else {
            return;
        };
        let mut own = self.symbols.borrow_mut();
        let mut up = parent.symbols.borrow_mut();
        for (name, sym) in own.drain() {
            up.entry(name).or_insert(sym);
        }
    }
}

thread_local! {
    static CORE: Rc<Package> = Package::new("symlisp");
    static KEYWORDS: Rc<Package> = Package::keyword("keyword");
}

/// The default package shared by every engine on this thread.
pub fn core_package() -> Rc<Package> {
    CORE.with(Rc::clone)
}

/// The keyword package (`:name` symbols).
pub fn keyword_package() -> Rc<Package> {
    KEYWORDS.with(Rc::clone)
}

/// Interns `name` in the core package. Panics only on the empty name,
/// which never occurs for the literal names the engine feeds it.
pub(crate) fn core_symbol(name: &str) -> Symbol {
    core_package()
        .make_symbol(name)
        .expect("core symbol names are non-empty")
}

/// The canonical truth symbol `T`.
pub fn symbol_t() -> Symbol {
    core_symbol("T")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_symbol_is_canonical() {
        let pkg = Package::new("test");
        let a = pkg.make_symbol("foo").unwrap();
        let b = pkg.make_symbol("foo").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn test_distinct_names_are_distinct() {
        let pkg = Package::new("test");
        let a = pkg.make_symbol("foo").unwrap();
        let b = pkg.make_symbol("bar").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_name_has_no_symbol() {
        let pkg = Package::new("test");
        assert!(pkg.make_symbol("").is_none());
    }

    #[test]
    fn test_find_symbol_does_not_create() {
        let pkg = Package::new("test");
        assert!(pkg.find_symbol("missing").is_none());
        pkg.make_symbol("present").unwrap();
        assert!(pkg.find_symbol("present").is_some());
    }

    #[test]
    fn test_keyword_display() {
        let pkg = Package::keyword("kw");
        let sym = pkg.make_symbol("key").unwrap();
        assert_eq!(sym.to_string(), ":key");

        let plain = Package::new("p").make_symbol("key").unwrap();
        assert_eq!(plain.to_string(), "key");
    }

    #[test]
    fn test_child_inherits_parent_lookups() {
        let parent = Package::new("parent");
        let inherited = parent.make_symbol("shared").unwrap();

        let child = parent.child("child");
        assert_eq!(child.make_symbol("shared").unwrap(), inherited);

        // Symbols created in the child are invisible to the parent.
        child.make_symbol("local").unwrap();
        assert!(parent.find_symbol("local").is_none());
    }

    #[test]
    fn test_move_symbols_promotes_entries() {
        let parent = Package::new("parent");
        let child = parent.child("child");
        let local = child.make_symbol("promoted").unwrap();

        child.move_symbols();
        assert_eq!(parent.find_symbol("promoted").unwrap(), local);
    }

    #[test]
    fn test_move_symbols_keeps_parent_identity() {
        let parent = Package::new("parent");
        let original = parent.make_symbol("clash").unwrap();

        let child = parent.child("child");
        // Inherited lookup means the child never shadows, but force the
        // scenario by interning directly after the parent drops its map view.
        child
            .symbols
            .borrow_mut()
            .insert("clash".to_string(), original.clone());
        child.move_symbols();
        assert_eq!(parent.make_symbol("clash").unwrap(), original);
    }
}
