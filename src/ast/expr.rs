//! Expression AST node types

use super::*;

/// A script expression
#[derive(Debug, Clone)]
pub enum Expression {
    /// Identifier reference
    Identifier(Identifier),

    /// Literal value
    Literal(Literal),

    /// Array literal [1, 2, 3]
    Array(ArrayExpression),

    /// Object literal {a: 1, b: 2}
    Object(ObjectExpression),

    /// Function expression
    Function(FunctionRef),

    /// Arrow function expression
    Arrow(FunctionRef),

    /// Member expression obj.prop or obj[prop]
    Member(Box<MemberExpression>),

    /// Call expression func(args)
    Call(Box<CallExpression>),

    /// new expression new Foo(args)
    New(Box<CallExpression>),

    /// Unary expression !x, -x, typeof x
    Unary(Box<UnaryExpression>),

    /// Update expression ++x, x++
    Update(Box<UpdateExpression>),

    /// Binary expression x + y, x === y
    Binary(Box<BinaryExpression>),

    /// Logical expression x && y, x || y, x ?? y
    Logical(Box<LogicalExpression>),

    /// Assignment expression x = y, x += y
    Assignment(Box<AssignmentExpression>),

    /// Conditional expression x ? y : z
    Conditional(Box<ConditionalExpression>),

    /// Sequence expression x, y, z
    Sequence(Box<SequenceExpression>),

    /// Parenthesized expression (for preserving parens)
    Parenthesized(Box<Expression>),
}

impl Expression {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expression::Identifier(id) => id.span,
            Expression::Literal(lit) => lit.span,
            Expression::Array(a) => a.span,
            Expression::Object(o) => o.span,
            Expression::Function(f) => f.span,
            Expression::Arrow(f) => f.span,
            Expression::Member(m) => m.span,
            Expression::Call(c) => c.span,
            Expression::New(n) => n.span,
            Expression::Unary(u) => u.span,
            Expression::Update(u) => u.span,
            Expression::Binary(b) => b.span,
            Expression::Logical(l) => l.span,
            Expression::Assignment(a) => a.span,
            Expression::Conditional(c) => c.span,
            Expression::Sequence(s) => s.span,
            Expression::Parenthesized(e) => e.span(),
        }
    }

    /// Check if this expression is a valid assignment target
    pub fn is_valid_assignment_target(&self) -> bool {
        match self {
            Expression::Identifier(_) | Expression::Member(_) => true,
            Expression::Parenthesized(e) => e.is_valid_assignment_target(),
            _ => false,
        }
    }
}

/// A literal value
#[derive(Debug, Clone)]
pub struct Literal {
    /// The literal value
    pub value: LiteralValue,
    /// Span in source
    pub span: Span,
}

/// Literal value types
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// null
    Null,
    /// true or false
    Boolean(bool),
    /// Number (integer or float)
    Number(f64),
    /// String
    String(String),
}

/// Array expression
#[derive(Debug, Clone)]
pub struct ArrayExpression {
    /// Array elements
    pub elements: Vec<Expression>,
    /// Span in source
    pub span: Span,
}

/// Object expression
#[derive(Debug, Clone)]
pub struct ObjectExpression {
    /// Object properties in source order
    pub properties: Vec<ObjectProperty>,
    /// Span in source
    pub span: Span,
}

/// Object property {a: 1} or shorthand {a}
#[derive(Debug, Clone)]
pub struct ObjectProperty {
    /// Property key
    pub key: PropertyKey,
    /// Property value
    pub value: Expression,
    /// Span in source
    pub span: Span,
}

/// Member expression
#[derive(Debug, Clone)]
pub struct MemberExpression {
    /// Object being accessed
    pub object: Expression,
    /// Property being accessed
    pub property: MemberProperty,
    /// Span in source
    pub span: Span,
}

/// Member property (can be identifier or computed)
#[derive(Debug, Clone)]
pub enum MemberProperty {
    /// obj.prop
    Identifier(Identifier),
    /// obj[expr]
    Expression(Box<Expression>),
}

/// Call or `new` expression
#[derive(Debug, Clone)]
pub struct CallExpression {
    /// Callee expression
    pub callee: Expression,
    /// Arguments
    pub arguments: Vec<Expression>,
    /// Verbatim source text between the parentheses
    pub arguments_text: String,
    /// Span in source
    pub span: Span,
}

/// Unary expression
#[derive(Debug, Clone)]
pub struct UnaryExpression {
    /// Operator
    pub operator: UnaryOperator,
    /// Argument
    pub argument: Expression,
    /// Span in source
    pub span: Span,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    Not,
    /// typeof
    Typeof,
}

/// Update expression (++x, x--)
#[derive(Debug, Clone)]
pub struct UpdateExpression {
    /// Increment or decrement
    pub operator: UpdateOperator,
    /// Target
    pub argument: Expression,
    /// Prefix (++x) or postfix (x++)
    pub prefix: bool,
    /// Span in source
    pub span: Span,
}

/// Update operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// Binary expression
#[derive(Debug, Clone)]
pub struct BinaryExpression {
    /// Operator
    pub operator: BinaryOperator,
    /// Left operand
    pub left: Expression,
    /// Right operand
    pub right: Expression,
    /// Span in source
    pub span: Span,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Logical expression
#[derive(Debug, Clone)]
pub struct LogicalExpression {
    /// Operator
    pub operator: LogicalOperator,
    /// Left operand
    pub left: Expression,
    /// Right operand
    pub right: Expression,
    /// Span in source
    pub span: Span,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
    /// ??
    NullishCoalescing,
}

/// Assignment expression
#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    /// Operator
    pub operator: AssignmentOperator,
    /// Target (identifier or member expression)
    pub left: Expression,
    /// Value
    pub right: Expression,
    /// Span in source
    pub span: Span,
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// =
    Assign,
    /// +=
    AddAssign,
    /// -=
    SubAssign,
    /// *=
    MulAssign,
    /// /=
    DivAssign,
    /// %=
    ModAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies, if any
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubAssign => Some(BinaryOperator::Sub),
            AssignmentOperator::MulAssign => Some(BinaryOperator::Mul),
            AssignmentOperator::DivAssign => Some(BinaryOperator::Div),
            AssignmentOperator::ModAssign => Some(BinaryOperator::Mod),
        }
    }
}

/// Conditional (ternary) expression
#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    /// Test
    pub test: Expression,
    /// Value when truthy
    pub consequent: Expression,
    /// Value when falsy
    pub alternate: Expression,
    /// Span in source
    pub span: Span,
}

/// Sequence expression
#[derive(Debug, Clone)]
pub struct SequenceExpression {
    /// Expressions evaluated left to right
    pub expressions: Vec<Expression>,
    /// Span in source
    pub span: Span,
}
