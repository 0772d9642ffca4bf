//! Abstract Syntax Tree (AST) types for the exercise scripting language
//!
//! The node shapes follow ESTree, trimmed to the subset the engine
//! evaluates. Function nodes are reference-counted so closures created at
//! run time can keep their body alive after the [`Program`] is dropped.

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;

use crate::error::SourceLocation;
use std::rc::Rc;

/// A span in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start location
    pub start: SourceLocation,
    /// End location
    pub end: SourceLocation,
}

impl Span {
    /// Create a new span
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }
}

/// A complete script
#[derive(Debug, Clone)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
    /// Span in source
    pub span: Span,
}

/// An identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
    /// Span in source
    pub span: Span,
}

impl Identifier {
    /// Create a new identifier
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A single variable declarator (id = init)
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    /// The bound name
    pub id: Identifier,
    /// Optional initializer expression
    pub init: Option<Expression>,
    /// Span in source
    pub span: Span,
}

/// A variable declaration (let x = 1, y = 2)
#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    /// The kind of variable declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
    /// Span in source
    pub span: Span,
}

/// A function (declaration, expression, or arrow)
#[derive(Debug, Clone)]
pub struct Function {
    /// Optional function name
    pub id: Option<Identifier>,
    /// Parameter names
    pub params: Vec<Identifier>,
    /// Function body
    pub body: FunctionBody,
    /// Whether this is an arrow function
    pub is_arrow: bool,
    /// Verbatim source text of the whole function
    pub source: String,
    /// Span in source
    pub span: Span,
}

impl Function {
    /// Name used when inspecting the function value
    pub fn display_name(&self) -> &str {
        self.id.as_ref().map(|id| id.name.as_str()).unwrap_or("")
    }
}

/// Shared handle to a function node
pub type FunctionRef = Rc<Function>;

/// Function body - either a block or a single expression (for arrows)
#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Block statement body
    Block(BlockStatement),
    /// Expression body (arrow functions only)
    Expression(Box<Expression>),
}

/// Property key in object literals
#[derive(Debug, Clone)]
pub enum PropertyKey {
    /// Identifier key
    Identifier(Identifier),
    /// String literal key
    String(String),
    /// Number literal key
    Number(f64),
    /// Computed key [expr]
    Computed(Box<Expression>),
}

/// Catch clause
#[derive(Debug, Clone)]
pub struct CatchClause {
    /// Catch parameter (optional in ES2019+)
    pub param: Option<Identifier>,
    /// Catch body
    pub body: BlockStatement,
    /// Span in source
    pub span: Span,
}
