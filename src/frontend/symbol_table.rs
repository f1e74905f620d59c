use koopa::ir::{Function, Type, Value};
use std::collections::HashMap;

use crate::frontend::error::{LowerError, Result};

/// Information about a name in the symbol table.
///
/// Constants are evaluated at compile time, so we store their values
/// directly. Variables and arrays store the pointer to their memory, i.e. the
/// Value returned by `alloc` or `global alloc`. Functions store their handle
/// and signature.
#[derive(Debug, Clone)]
pub enum Symbol {
    Constant(i32),
    Variable(Value),
    Array(ArraySymbol),
    Function(FunctionSig),
}

#[derive(Debug, Clone)]
pub struct ArraySymbol {
    /// `alloc`/`global alloc` of the array, or for array parameters the
    /// `alloc` holding the incoming pointer.
    pub base: Value,
    /// Known dimensions. Array parameters omit their first dimension.
    pub dims: Vec<usize>,
    /// Set for array parameters: `base` must be loaded before indexing.
    pub decayed: bool,
    /// Row-major values of a `const` array.
    pub constant: Option<Vec<i32>>,
}

impl ArraySymbol {
    /// Number of indices that select a single element.
    pub fn rank(&self) -> usize {
        self.dims.len() + usize::from(self.decayed)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub func: Function,
    pub params: Vec<Type>,
    pub returns_value: bool,
}

impl Symbol {
    pub fn describe(&self) -> &'static str {
        match self {
            Symbol::Constant(_) => "constant",
            Symbol::Variable(_) => "variable",
            Symbol::Array(_) => "array",
            Symbol::Function(_) => "function",
        }
    }
}

/// Symbol table for Koopa IR generation.
///
/// The innermost scope is the last element of `scopes`; the first element is
/// the global scope and is never popped.
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>, // Symbol names DO NOT start with `@` or `%`!
}

impl SymbolTable {
    /// Creates a table holding only the empty global scope
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn lookup(&self, name: &str) -> Result<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .ok_or_else(|| LowerError::UndefinedSymbol(name.to_string()))
    }

    /// Declares `name` in the innermost scope. Shadowing an outer
    /// declaration is allowed, declaring twice in one scope is not.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<()> {
        let scope = self
            .scopes
            .last_mut()
            .expect("the global scope is never popped");
        if scope.contains_key(name) {
            return Err(LowerError::Redeclaration(name.to_string()));
        }
        scope.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        assert!(self.scopes.len() > 1, "No outer scope to exit to");
        self.scopes.pop();
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
