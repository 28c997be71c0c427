//! Name binding for HLB files.
//!
//! HLB has exactly two binding levels. The file scope holds every
//! top-level function, import alias, and `as` alias (aliases declared
//! anywhere in the file bind at file level so sibling functions can see
//! them). A function scope holds that function's parameters. Lookup
//! checks parameters first, then the file scope; first hit wins.
//!
//! Scope objects refer back into the CST by declaration index and call
//! id, never by pointer, so the scope table can live alongside the tree
//! it describes.

use std::collections::{BTreeSet, HashMap};

use crate::types::ObjType;

/// What a file-scope name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {
    /// A top-level function; `decl` indexes `File::decls`.
    Func { decl: usize },
    /// An import alias; `decl` indexes `File::decls`.
    Import { decl: usize },
    /// An `as` alias. `decl` is the enclosing function's declaration
    /// index, `call` the aliased call statement.
    Alias { decl: usize, call: crate::ast::CallId },
}

/// The file-level symbol table, filled in by the checker.
#[derive(Debug, Clone, Default)]
pub struct FileScope {
    bindings: HashMap<String, Object>,
    exports: BTreeSet<String>,
}

impl FileScope {
    pub fn insert(&mut self, name: &str, object: Object) -> Option<Object> {
        self.bindings.insert(name.to_string(), object)
    }

    pub fn lookup(&self, name: &str) -> Option<Object> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn add_export(&mut self, name: &str) {
        self.exports.insert(name.to_string());
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exports.contains(name)
    }

    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.exports.is_empty()
    }
}

/// A parameter binding in a function scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamBinding {
    pub ty: ObjType,
    pub variadic: bool,
}

/// The lexical scope used while checking or evaluating one function:
/// its parameters layered over the file scope.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    file: &'a FileScope,
    params: HashMap<String, ParamBinding>,
}

/// Result of a scope lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Param(ParamBinding),
    Object(Object),
}

impl<'a> Scope<'a> {
    pub fn new(file: &'a FileScope) -> Self {
        Self { file, params: HashMap::new() }
    }

    pub fn bind_param(&mut self, name: &str, binding: ParamBinding) -> bool {
        self.params.insert(name.to_string(), binding).is_none()
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        if let Some(binding) = self.params.get(name) {
            return Some(Resolved::Param(*binding));
        }
        self.file.lookup(name).map(Resolved::Object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_scope_insert_and_lookup() {
        let mut scope = FileScope::default();
        assert!(scope.insert("default", Object::Func { decl: 0 }).is_none());
        assert_eq!(scope.lookup("default"), Some(Object::Func { decl: 0 }));
        assert_eq!(scope.lookup("missing"), None);
    }

    #[test]
    fn file_scope_insert_reports_duplicates() {
        let mut scope = FileScope::default();
        scope.insert("x", Object::Func { decl: 0 });
        let prev = scope.insert("x", Object::Import { decl: 1 });
        assert_eq!(prev, Some(Object::Func { decl: 0 }));
    }

    #[test]
    fn exports_are_tracked_separately() {
        let mut scope = FileScope::default();
        scope.insert("build", Object::Func { decl: 0 });
        scope.add_export("build");
        assert!(scope.is_exported("build"));
        assert!(!scope.is_exported("other"));
        assert_eq!(scope.exports().collect::<Vec<_>>(), vec!["build"]);
    }

    #[test]
    fn params_shadow_file_scope() {
        let mut file = FileScope::default();
        file.insert("base", Object::Func { decl: 0 });

        let mut scope = Scope::new(&file);
        scope.bind_param("base", ParamBinding { ty: ObjType::Fs, variadic: false });

        match scope.resolve("base") {
            Some(Resolved::Param(binding)) => assert_eq!(binding.ty, ObjType::Fs),
            other => panic!("expected param binding, got {:?}", other),
        }
    }

    #[test]
    fn unbound_param_falls_through_to_file() {
        let mut file = FileScope::default();
        file.insert("build", Object::Func { decl: 2 });
        let scope = Scope::new(&file);
        assert_eq!(
            scope.resolve("build"),
            Some(Resolved::Object(Object::Func { decl: 2 }))
        );
    }
}
