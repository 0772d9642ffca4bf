//! Statement AST node types

use super::*;

/// A script statement
#[derive(Debug, Clone)]
pub enum Statement {
    /// Block statement { ... }
    Block(BlockStatement),

    /// Empty statement ;
    Empty(Span),

    /// Expression statement
    Expression(ExpressionStatement),

    /// If statement
    If(Box<IfStatement>),

    /// While statement
    While(Box<WhileStatement>),

    /// Do-while statement
    DoWhile(Box<WhileStatement>),

    /// For statement
    For(Box<ForStatement>),

    /// For-of statement
    ForOf(Box<ForOfStatement>),

    /// Break statement
    Break(Span),

    /// Continue statement
    Continue(Span),

    /// Return statement
    Return(ReturnStatement),

    /// Throw statement
    Throw(Box<ThrowStatement>),

    /// Try statement
    Try(Box<TryStatement>),

    /// Variable declaration
    VariableDeclaration(VariableDeclaration),

    /// Function declaration
    FunctionDeclaration(FunctionRef),
}

impl Statement {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Statement::Block(b) => b.span,
            Statement::Empty(span) => *span,
            Statement::Expression(e) => e.span,
            Statement::If(i) => i.span,
            Statement::While(w) => w.span,
            Statement::DoWhile(d) => d.span,
            Statement::For(f) => f.span,
            Statement::ForOf(f) => f.span,
            Statement::Break(span) => *span,
            Statement::Continue(span) => *span,
            Statement::Return(r) => r.span,
            Statement::Throw(t) => t.span,
            Statement::Try(t) => t.span,
            Statement::VariableDeclaration(v) => v.span,
            Statement::FunctionDeclaration(f) => f.span,
        }
    }
}

/// Block statement
#[derive(Debug, Clone)]
pub struct BlockStatement {
    /// Statements in the block
    pub body: Vec<Statement>,
    /// Span in source
    pub span: Span,
}

/// Expression statement
#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
    /// Span in source
    pub span: Span,
}

/// If statement
#[derive(Debug, Clone)]
pub struct IfStatement {
    /// Condition
    pub test: Expression,
    /// Then branch
    pub consequent: Statement,
    /// Else branch
    pub alternate: Option<Statement>,
    /// Span in source
    pub span: Span,
}

/// While and do-while statement
#[derive(Debug, Clone)]
pub struct WhileStatement {
    /// Loop condition
    pub test: Expression,
    /// Loop body
    pub body: Statement,
    /// Span in source
    pub span: Span,
}

/// Initializer of a classic for statement
#[derive(Debug, Clone)]
pub enum ForInit {
    /// for (let i = 0; ...)
    Variable(VariableDeclaration),
    /// for (i = 0; ...)
    Expression(Expression),
}

/// For statement
#[derive(Debug, Clone)]
pub struct ForStatement {
    /// Initializer
    pub init: Option<ForInit>,
    /// Condition
    pub test: Option<Expression>,
    /// Update
    pub update: Option<Expression>,
    /// Loop body
    pub body: Statement,
    /// Span in source
    pub span: Span,
}

/// For-of statement
#[derive(Debug, Clone)]
pub struct ForOfStatement {
    /// Declaration kind of the loop variable
    pub kind: VariableKind,
    /// Loop variable
    pub binding: Identifier,
    /// Iterated value
    pub right: Expression,
    /// Loop body
    pub body: Statement,
    /// Span in source
    pub span: Span,
}

/// Return statement
#[derive(Debug, Clone)]
pub struct ReturnStatement {
    /// Returned value
    pub argument: Option<Expression>,
    /// Span in source
    pub span: Span,
}

/// Throw statement
#[derive(Debug, Clone)]
pub struct ThrowStatement {
    /// Thrown value
    pub argument: Expression,
    /// Span in source
    pub span: Span,
}

/// Try statement
#[derive(Debug, Clone)]
pub struct TryStatement {
    /// Protected block
    pub block: BlockStatement,
    /// Catch clause
    pub handler: Option<CatchClause>,
    /// Finally block
    pub finalizer: Option<BlockStatement>,
    /// Span in source
    pub span: Span,
}
