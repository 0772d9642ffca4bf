//! Lexical scopes
//!
//! Scopes form a parent chain of reference-counted frames. Closures keep
//! their defining frame alive; the global frame is the root of every chain.

use super::value::Value;
use crate::ast::VariableKind;
use crate::error::{messages, Error, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a scope frame
pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// One frame of variable bindings
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
    /// `var` declarations land in the nearest function (or program) frame
    function_frame: bool,
}

impl Scope {
    /// Create the root frame
    pub fn global() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            function_frame: true,
            ..Scope::default()
        }))
    }

    /// Create a block frame nested in `parent`
    pub fn block(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(Rc::clone(parent)),
            ..Scope::default()
        }))
    }

    /// Create a function (or isolated program) frame nested in `parent`
    pub fn function(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(Rc::clone(parent)),
            function_frame: true,
            ..Scope::default()
        }))
    }

    /// Declare a binding in this frame, shadowing any outer one
    pub fn declare(&mut self, name: &str, value: Value, kind: VariableKind) {
        self.bindings.insert(
            name.to_string(),
            Binding {
                value,
                mutable: kind != VariableKind::Const,
            },
        );
    }

    /// Remove a binding from this frame
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name).map(|b| b.value)
    }

    /// Read a binding declared directly in this frame
    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).map(|b| b.value.clone())
    }

    /// Whether this frame declares `name`
    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// Declare a `var` binding in the nearest function frame of `scope`
pub fn declare_var(scope: &ScopeRef, name: &str, value: Option<Value>) {
    let mut frame = Rc::clone(scope);
    loop {
        let next = {
            let current = frame.borrow();
            if current.function_frame {
                None
            } else {
                current.parent.clone()
            }
        };
        match next {
            Some(parent) => frame = parent,
            None => break,
        }
    }

    let mut frame = frame.borrow_mut();
    // Redeclaring a var keeps its value unless a new one is given
    match (frame.bindings.get_mut(name), value) {
        (Some(binding), Some(value)) => binding.value = value,
        (Some(_), None) => {}
        (None, value) => frame.declare(name, value.unwrap_or_default(), VariableKind::Var),
    }
}

/// Resolve `name` through the scope chain
pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut frame = Rc::clone(scope);
    loop {
        let parent = {
            let current = frame.borrow();
            if let Some(binding) = current.bindings.get(name) {
                return Some(binding.value.clone());
            }
            current.parent.clone()
        };
        frame = parent?;
    }
}

/// Assign to an existing binding through the scope chain
pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<()> {
    let mut frame = Rc::clone(scope);
    loop {
        let parent = {
            let mut current = frame.borrow_mut();
            if let Some(binding) = current.bindings.get_mut(name) {
                if !binding.mutable {
                    return Err(Error::type_error(messages::ASSIGNMENT_TO_CONSTANT));
                }
                binding.value = value;
                return Ok(());
            }
            current.parent.clone()
        };
        match parent {
            Some(parent) => frame = parent,
            None => return Err(Error::reference_error(messages::not_defined(name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let global = Scope::global();
        global
            .borrow_mut()
            .declare("x", Value::Number(1.0), VariableKind::Let);
        let inner = Scope::block(&global);
        assert_eq!(lookup(&inner, "x").unwrap().to_number(), 1.0);
        assert!(lookup(&inner, "y").is_none());
    }

    #[test]
    fn test_assign_to_const_fails() {
        let global = Scope::global();
        global
            .borrow_mut()
            .declare("c", Value::Number(1.0), VariableKind::Const);
        let err = assign(&global, "c", Value::Number(2.0)).unwrap_err();
        assert_eq!(err.exception_text(), "TypeError: Assignment to constant variable.");
    }

    #[test]
    fn test_assign_undeclared_is_reference_error() {
        let global = Scope::global();
        let err = assign(&global, "nope", Value::Null).unwrap_err();
        assert_eq!(err.exception_text(), "ReferenceError: nope is not defined");
    }

    #[test]
    fn test_var_hoists_to_function_frame() {
        let global = Scope::global();
        let func = Scope::function(&global);
        let block = Scope::block(&func);
        declare_var(&block, "v", Some(Value::Number(3.0)));
        assert!(func.borrow().has_own("v"));
        assert!(!block.borrow().has_own("v"));
        assert!(!global.borrow().has_own("v"));
    }
}
