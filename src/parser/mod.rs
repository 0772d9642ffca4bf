//! Script parser
//!
//! A recursive descent parser producing the AST in [`crate::ast`]. Besides
//! the tree, it records verbatim source slices the harness reports back to
//! learners: the text of every call's argument list and the full text of
//! every function.

use crate::ast::*;
use crate::error::{Error, Result, SourceLocation};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use std::rc::Rc;

/// Maximum syntactic nesting, counted over statements, expressions and unary operators
pub const MAX_NESTING: usize = 256;

/// Parser state flags
#[derive(Debug, Clone, Copy, Default)]
struct ParserFlags {
    /// Inside a function
    in_function: bool,
    /// Inside a loop (for, while, etc.)
    in_loop: bool,
}

/// A recursive descent parser for the script subset
pub struct Parser<'src> {
    /// Source code, sliced for error context and recorded source text
    source: &'src str,
    /// Tokens to parse
    tokens: Vec<Token<'src>>,
    /// Current position in tokens
    pos: usize,
    /// Parser state flags
    flags: ParserFlags,
    /// Current syntactic nesting
    depth: usize,
}

impl<'src> Parser<'src> {
    /// Create a new parser from source code
    pub fn new(source: &'src str) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            flags: ParserFlags::default(),
            depth: 0,
        })
    }

    /// Parse the source as a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let start = self.location();
        let mut body = Vec::new();

        while !self.is_eof() {
            body.push(self.parse_statement()?);
        }

        let end = self.location();
        Ok(Program {
            body,
            span: Span::new(start, end),
        })
    }

    /// Parse a single expression
    pub fn parse_expression(&mut self) -> Result<Expression> {
        let start = self.location();
        let mut expr = self.parse_assignment_expression()?;

        if self.peek() == TokenKind::Comma {
            let mut expressions = vec![expr];
            while self.consume(TokenKind::Comma) {
                expressions.push(self.parse_assignment_expression()?);
            }
            expr = Expression::Sequence(Box::new(SequenceExpression {
                expressions,
                span: Span::new(start, self.location()),
            }));
        }

        Ok(expr)
    }

    // ========== Token Access ==========

    fn current(&self) -> &Token<'src> {
        &self.tokens[self.pos]
    }

    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn is_eof(&self) -> bool {
        self.peek() == TokenKind::Eof
    }

    fn location(&self) -> SourceLocation {
        self.current().location
    }

    /// Byte offset just past the last consumed token
    fn previous_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end_offset()
        }
    }

    /// Create a parse error with source context
    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Error {
        Error::parse_error_with_context(message, location, self.source)
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("Too much nesting", self.location()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn unexpected(&self) -> Error {
        let token = self.current();
        let message = if token.kind == TokenKind::Eof {
            "Unexpected end of input".to_string()
        } else {
            format!("Unexpected token '{}'", token.text)
        };
        self.error(message, token.location)
    }

    fn advance(&mut self) -> &Token<'src> {
        let token = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token<'src>> {
        if self.peek() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<&Token<'src>> {
        if self.peek() == TokenKind::Keyword(keyword) {
            Ok(self.advance())
        } else {
            let loc = self.location();
            Err(self.error(
                format!("Expected '{}', found '{}'", keyword, self.current().text),
                loc,
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_semicolon(&mut self) -> bool {
        // Automatic semicolon insertion (ASI)
        if self.consume(TokenKind::Semicolon) {
            return true;
        }

        if self.peek() == TokenKind::RightBrace || self.peek() == TokenKind::Eof {
            return true;
        }

        if self.pos > 0 {
            let prev = &self.tokens[self.pos - 1];
            let curr = self.current();
            if prev.location.line < curr.location.line {
                return true;
            }
        }

        false
    }

    fn expect_semicolon(&mut self) -> Result<()> {
        if self.consume_semicolon() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Whether a line break separates the previous token from the current one
    fn newline_before_current(&self) -> bool {
        self.pos > 0 && self.tokens[self.pos - 1].location.line < self.current().location.line
    }

    // ========== Statements ==========

    fn parse_statement(&mut self) -> Result<Statement> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Statement> {
        match self.peek() {
            TokenKind::LeftBrace => self.parse_block_statement().map(Statement::Block),
            TokenKind::Semicolon => {
                let loc = self.location();
                self.advance();
                Ok(Statement::Empty(Span::new(loc, self.location())))
            }
            TokenKind::Keyword(Keyword::Var) => self.parse_declaration_statement(VariableKind::Var),
            TokenKind::Keyword(Keyword::Let) => self.parse_declaration_statement(VariableKind::Let),
            TokenKind::Keyword(Keyword::Const) => {
                self.parse_declaration_statement(VariableKind::Const)
            }
            TokenKind::Keyword(Keyword::Function) => {
                let function = self.parse_function(true)?;
                Ok(Statement::FunctionDeclaration(Rc::new(function)))
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::Break) => self.parse_jump_statement(true),
            TokenKind::Keyword(Keyword::Continue) => self.parse_jump_statement(false),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw_statement(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement> {
        let start = self.location();
        self.expect(TokenKind::LeftBrace)?;

        let mut body = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            if self.is_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }

        Ok(BlockStatement {
            body,
            span: Span::new(start, self.location()),
        })
    }

    fn parse_declaration_statement(&mut self, kind: VariableKind) -> Result<Statement> {
        let declaration = self.parse_variable_declaration(kind)?;
        self.expect_semicolon()?;
        Ok(Statement::VariableDeclaration(declaration))
    }

    fn parse_variable_declaration(&mut self, kind: VariableKind) -> Result<VariableDeclaration> {
        let start = self.location();
        self.advance(); // var / let / const

        let mut declarations = Vec::new();
        loop {
            let decl_start = self.location();
            let id = self.parse_identifier()?;
            let init = if self.consume(TokenKind::Equals) {
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            if kind == VariableKind::Const
                && init.is_none()
                && self.peek() != TokenKind::Keyword(Keyword::Of)
            {
                return Err(self.error("Missing initializer in const declaration", decl_start));
            }
            declarations.push(VariableDeclarator {
                id,
                init,
                span: Span::new(decl_start, self.location()),
            });
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }

        Ok(VariableDeclaration {
            kind,
            declarations,
            span: Span::new(start, self.location()),
        })
    }

    fn parse_function(&mut self, require_name: bool) -> Result<Function> {
        let start = self.location();
        self.expect_keyword(Keyword::Function)?;

        let id = if self.peek() == TokenKind::Identifier {
            Some(self.parse_identifier()?)
        } else if require_name {
            return Err(self.error("Function statements require a function name", start));
        } else {
            None
        };

        self.expect(TokenKind::LeftParen)?;
        let params = self.parse_function_params()?;

        let old_flags = self.flags;
        self.flags.in_function = true;
        self.flags.in_loop = false;
        let body = self.parse_block_statement();
        self.flags = old_flags;
        let body = body?;

        Ok(Function {
            id,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            source: self.source[start.offset..self.previous_end()].to_string(),
            span: Span::new(start, self.location()),
        })
    }

    /// Parse a parameter list after the opening parenthesis
    fn parse_function_params(&mut self) -> Result<Vec<Identifier>> {
        let mut params: Vec<Identifier> = Vec::new();

        while !self.consume(TokenKind::RightParen) {
            let param = self.parse_identifier()?;
            if params.iter().any(|p| p.name == param.name) {
                return Err(self.error(
                    "Duplicate parameter name not allowed in this context",
                    param.span.start,
                ));
            }
            params.push(param);

            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RightParen)?;
                break;
            }
        }

        Ok(params)
    }

    fn parse_if_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // if
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;

        let consequent = self.parse_statement()?;
        let alternate = if self.consume(TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_statement()?)
        } else {
            None
        };

        Ok(Statement::If(Box::new(IfStatement {
            test,
            consequent,
            alternate,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_loop_body(&mut self) -> Result<Statement> {
        let old_flags = self.flags;
        self.flags.in_loop = true;
        let body = self.parse_statement();
        self.flags = old_flags;
        body
    }

    fn parse_while_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // while
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;

        Ok(Statement::While(Box::new(WhileStatement {
            test,
            body,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // do
        let body = self.parse_loop_body()?;
        self.expect_keyword(Keyword::While)?;
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        self.consume(TokenKind::Semicolon);

        Ok(Statement::DoWhile(Box::new(WhileStatement {
            test,
            body,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_for_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // for
        self.expect(TokenKind::LeftParen)?;

        let declaration_kind = match self.peek() {
            TokenKind::Keyword(Keyword::Var) => Some(VariableKind::Var),
            TokenKind::Keyword(Keyword::Let) => Some(VariableKind::Let),
            TokenKind::Keyword(Keyword::Const) => Some(VariableKind::Const),
            _ => None,
        };

        let init = match declaration_kind {
            Some(kind) => {
                // for (const x of xs)
                if self.peek_at(1) == TokenKind::Identifier
                    && self.peek_at(2) == TokenKind::Keyword(Keyword::Of)
                {
                    self.advance();
                    let binding = self.parse_identifier()?;
                    self.advance(); // of
                    let right = self.parse_assignment_expression()?;
                    self.expect(TokenKind::RightParen)?;
                    let body = self.parse_loop_body()?;
                    return Ok(Statement::ForOf(Box::new(ForOfStatement {
                        kind,
                        binding,
                        right,
                        body,
                        span: Span::new(start, self.location()),
                    })));
                }
                Some(ForInit::Variable(self.parse_variable_declaration(kind)?))
            }
            None if self.peek() == TokenKind::Semicolon => None,
            None => Some(ForInit::Expression(self.parse_expression()?)),
        };

        self.expect(TokenKind::Semicolon)?;
        let test = if self.peek() == TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let update = if self.peek() == TokenKind::RightParen {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;

        Ok(Statement::For(Box::new(ForStatement {
            init,
            test,
            update,
            body,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_jump_statement(&mut self, is_break: bool) -> Result<Statement> {
        let start = self.location();
        self.advance(); // break / continue
        if !self.flags.in_loop {
            let message = if is_break {
                "Illegal break statement"
            } else {
                "Illegal continue statement: no surrounding iteration statement"
            };
            return Err(self.error(message, start));
        }
        self.expect_semicolon()?;

        let span = Span::new(start, self.location());
        Ok(if is_break {
            Statement::Break(span)
        } else {
            Statement::Continue(span)
        })
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // return
        if !self.flags.in_function {
            return Err(self.error("Illegal return statement", start));
        }

        let argument = if self.consume_semicolon() {
            None
        } else {
            let argument = self.parse_expression()?;
            self.expect_semicolon()?;
            Some(argument)
        };

        Ok(Statement::Return(ReturnStatement {
            argument,
            span: Span::new(start, self.location()),
        }))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // throw
        if self.newline_before_current() {
            return Err(self.error("Illegal newline after throw", start));
        }
        let argument = self.parse_expression()?;
        self.expect_semicolon()?;

        Ok(Statement::Throw(Box::new(ThrowStatement {
            argument,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_try_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        self.advance(); // try
        let block = self.parse_block_statement()?;

        let handler = if self.peek() == TokenKind::Keyword(Keyword::Catch) {
            let catch_start = self.location();
            self.advance();
            let param = if self.consume(TokenKind::LeftParen) {
                let param = self.parse_identifier()?;
                self.expect(TokenKind::RightParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block_statement()?;
            Some(CatchClause {
                param,
                body,
                span: Span::new(catch_start, self.location()),
            })
        } else {
            None
        };

        let finalizer = if self.consume(TokenKind::Keyword(Keyword::Finally)) {
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try", start));
        }

        Ok(Statement::Try(Box::new(TryStatement {
            block,
            handler,
            finalizer,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let start = self.location();
        let expression = self.parse_expression()?;
        self.expect_semicolon()?;

        Ok(Statement::Expression(ExpressionStatement {
            expression,
            span: Span::new(start, self.location()),
        }))
    }

    // ========== Expressions ==========

    fn parse_assignment_expression(&mut self) -> Result<Expression> {
        self.nested(Self::parse_assignment_expression_inner)
    }

    fn parse_assignment_expression_inner(&mut self) -> Result<Expression> {
        if self.at_arrow_function() {
            return self.parse_arrow_function();
        }

        let start = self.location();
        let left = self.parse_conditional_expression()?;

        if self.peek().is_assignment_operator() {
            let operator = self.parse_assignment_operator()?;
            if !left.is_valid_assignment_target() {
                return Err(self.error("Invalid left-hand side in assignment", start));
            }
            let right = self.parse_assignment_expression()?;

            return Ok(Expression::Assignment(Box::new(AssignmentExpression {
                operator,
                left,
                right,
                span: Span::new(start, self.location()),
            })));
        }

        Ok(left)
    }

    /// Look ahead for `x =>` or `(a, b) =>` without consuming anything
    fn at_arrow_function(&self) -> bool {
        match self.peek() {
            TokenKind::Identifier => self.peek_at(1) == TokenKind::Arrow,
            TokenKind::LeftParen => {
                let mut offset = 1;
                if self.peek_at(offset) == TokenKind::RightParen {
                    return self.peek_at(offset + 1) == TokenKind::Arrow;
                }
                loop {
                    if self.peek_at(offset) != TokenKind::Identifier {
                        return false;
                    }
                    offset += 1;
                    match self.peek_at(offset) {
                        TokenKind::Comma => offset += 1,
                        TokenKind::RightParen => return self.peek_at(offset + 1) == TokenKind::Arrow,
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<Expression> {
        let start = self.location();

        let params = if self.peek() == TokenKind::Identifier {
            vec![self.parse_identifier()?]
        } else {
            self.expect(TokenKind::LeftParen)?;
            self.parse_function_params()?
        };

        if self.newline_before_current() {
            return Err(self.unexpected());
        }
        self.expect(TokenKind::Arrow)?;

        let old_flags = self.flags;
        self.flags.in_function = true;
        self.flags.in_loop = false;
        let body = if self.peek() == TokenKind::LeftBrace {
            self.parse_block_statement().map(FunctionBody::Block)
        } else {
            self.parse_assignment_expression()
                .map(|e| FunctionBody::Expression(Box::new(e)))
        };
        self.flags = old_flags;
        let body = body?;

        Ok(Expression::Arrow(Rc::new(Function {
            id: None,
            params,
            body,
            is_arrow: true,
            source: self.source[start.offset..self.previous_end()].to_string(),
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_assignment_operator(&mut self) -> Result<AssignmentOperator> {
        let op = match self.peek() {
            TokenKind::Equals => AssignmentOperator::Assign,
            TokenKind::PlusEquals => AssignmentOperator::AddAssign,
            TokenKind::MinusEquals => AssignmentOperator::SubAssign,
            TokenKind::StarEquals => AssignmentOperator::MulAssign,
            TokenKind::SlashEquals => AssignmentOperator::DivAssign,
            TokenKind::PercentEquals => AssignmentOperator::ModAssign,
            _ => {
                let loc = self.location();
                return Err(self.error("Expected assignment operator", loc));
            }
        };
        self.advance();
        Ok(op)
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression> {
        let start = self.location();
        let test = self.parse_binary_expression(0)?;

        if self.consume(TokenKind::Question) {
            let consequent = self.parse_assignment_expression()?;
            self.expect(TokenKind::Colon)?;
            let alternate = self.parse_assignment_expression()?;

            return Ok(Expression::Conditional(Box::new(ConditionalExpression {
                test,
                consequent,
                alternate,
                span: Span::new(start, self.location()),
            })));
        }

        Ok(test)
    }

    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression> {
        let start = self.location();
        let mut left = self.parse_unary_expression()?;

        loop {
            let prec = self.binary_precedence();
            if prec == 0 || prec < min_prec {
                break;
            }

            if let Some(operator) = self.logical_operator() {
                self.advance();
                let right = self.parse_binary_expression(prec + 1)?;
                left = Expression::Logical(Box::new(LogicalExpression {
                    operator,
                    left,
                    right,
                    span: Span::new(start, self.location()),
                }));
            } else {
                let operator = self.parse_binary_operator()?;
                // Exponentiation is right-associative
                let next_prec = if operator == BinaryOperator::Pow {
                    prec
                } else {
                    prec + 1
                };
                let right = self.parse_binary_expression(next_prec)?;
                left = Expression::Binary(Box::new(BinaryExpression {
                    operator,
                    left,
                    right,
                    span: Span::new(start, self.location()),
                }));
            }
        }

        Ok(left)
    }

    fn binary_precedence(&self) -> u8 {
        match self.peek() {
            TokenKind::PipePipe | TokenKind::QuestionQuestion => 4,
            TokenKind::AmpersandAmpersand => 5,
            TokenKind::EqualsEquals
            | TokenKind::BangEquals
            | TokenKind::EqualsEqualsEquals
            | TokenKind::BangEqualsEquals => 9,
            TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEquals
            | TokenKind::GreaterEquals => 10,
            TokenKind::Plus | TokenKind::Minus => 12,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 13,
            TokenKind::StarStar => 14,
            _ => 0,
        }
    }

    fn logical_operator(&self) -> Option<LogicalOperator> {
        match self.peek() {
            TokenKind::AmpersandAmpersand => Some(LogicalOperator::And),
            TokenKind::PipePipe => Some(LogicalOperator::Or),
            TokenKind::QuestionQuestion => Some(LogicalOperator::NullishCoalescing),
            _ => None,
        }
    }

    fn parse_binary_operator(&mut self) -> Result<BinaryOperator> {
        let op = match self.peek() {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Mod,
            TokenKind::StarStar => BinaryOperator::Pow,
            TokenKind::EqualsEquals => BinaryOperator::Eq,
            TokenKind::BangEquals => BinaryOperator::Ne,
            TokenKind::EqualsEqualsEquals => BinaryOperator::StrictEq,
            TokenKind::BangEqualsEquals => BinaryOperator::StrictNe,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::LessEquals => BinaryOperator::Le,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::GreaterEquals => BinaryOperator::Ge,
            _ => {
                let loc = self.location();
                return Err(self.error("Expected binary operator", loc));
            }
        };
        self.advance();
        Ok(op)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression> {
        self.nested(Self::parse_unary_expression_inner)
    }

    fn parse_unary_expression_inner(&mut self) -> Result<Expression> {
        let start = self.location();

        // Prefix increment/decrement
        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let operator = if self.peek() == TokenKind::PlusPlus {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            self.advance();
            let argument = self.parse_unary_expression()?;
            if !argument.is_valid_assignment_target() {
                return Err(self.error(
                    "Invalid left-hand side expression in prefix operation",
                    start,
                ));
            }
            return Ok(Expression::Update(Box::new(UpdateExpression {
                operator,
                argument,
                prefix: true,
                span: Span::new(start, self.location()),
            })));
        }

        let operator = match self.peek() {
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Bang => Some(UnaryOperator::Not),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOperator::Typeof),
            _ => None,
        };

        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary_expression()?;
            return Ok(Expression::Unary(Box::new(UnaryExpression {
                operator,
                argument,
                span: Span::new(start, self.location()),
            })));
        }

        self.parse_update_expression()
    }

    fn parse_update_expression(&mut self) -> Result<Expression> {
        let start = self.location();
        let argument = self.parse_left_hand_side_expression()?;

        // Postfix increment/decrement; a line break ends the expression
        if matches!(self.peek(), TokenKind::PlusPlus | TokenKind::MinusMinus)
            && !self.newline_before_current()
        {
            let operator = if self.peek() == TokenKind::PlusPlus {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            if !argument.is_valid_assignment_target() {
                return Err(self.error(
                    "Invalid left-hand side expression in postfix operation",
                    start,
                ));
            }
            self.advance();

            return Ok(Expression::Update(Box::new(UpdateExpression {
                operator,
                argument,
                prefix: false,
                span: Span::new(start, self.location()),
            })));
        }

        Ok(argument)
    }

    fn parse_left_hand_side_expression(&mut self) -> Result<Expression> {
        let start = self.location();

        let mut expr = if self.consume(TokenKind::Keyword(Keyword::New)) {
            let callee = self.parse_member_expression()?;
            let (arguments, arguments_text) = if self.peek() == TokenKind::LeftParen {
                self.parse_arguments()?
            } else {
                (Vec::new(), String::new())
            };

            Expression::New(Box::new(CallExpression {
                callee,
                arguments,
                arguments_text,
                span: Span::new(start, self.location()),
            }))
        } else {
            self.parse_member_expression()?
        };

        // Call expressions and member accesses
        loop {
            match self.peek() {
                TokenKind::LeftParen => {
                    let (arguments, arguments_text) = self.parse_arguments()?;
                    expr = Expression::Call(Box::new(CallExpression {
                        callee: expr,
                        arguments,
                        arguments_text,
                        span: Span::new(start, self.location()),
                    }));
                }
                TokenKind::Dot | TokenKind::LeftBracket => {
                    expr = self.parse_member_suffix(expr, start)?;
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_member_expression(&mut self) -> Result<Expression> {
        let start = self.location();
        let mut expr = self.parse_primary_expression()?;

        while matches!(self.peek(), TokenKind::Dot | TokenKind::LeftBracket) {
            expr = self.parse_member_suffix(expr, start)?;
        }

        Ok(expr)
    }

    fn parse_member_suffix(&mut self, object: Expression, start: SourceLocation) -> Result<Expression> {
        let property = if self.consume(TokenKind::Dot) {
            MemberProperty::Identifier(self.parse_identifier_name()?)
        } else {
            self.expect(TokenKind::LeftBracket)?;
            let property = self.parse_expression()?;
            self.expect(TokenKind::RightBracket)?;
            MemberProperty::Expression(Box::new(property))
        };

        Ok(Expression::Member(Box::new(MemberExpression {
            object,
            property,
            span: Span::new(start, self.location()),
        })))
    }

    fn parse_primary_expression(&mut self) -> Result<Expression> {
        let start = self.location();

        match self.peek() {
            TokenKind::Identifier | TokenKind::Keyword(Keyword::Of) => {
                let id = self.parse_identifier()?;
                Ok(Expression::Identifier(id))
            }
            TokenKind::NumberLiteral => {
                let raw = self.advance().text;
                let value = self.parse_number_value(raw)?;
                Ok(self.literal(LiteralValue::Number(value), start))
            }
            TokenKind::StringLiteral => {
                let raw = self.advance().text;
                let value = self.parse_string_value(raw);
                Ok(self.literal(LiteralValue::String(value), start))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(self.literal(LiteralValue::Boolean(true), start))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(self.literal(LiteralValue::Boolean(false), start))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(self.literal(LiteralValue::Null, start))
            }
            TokenKind::Keyword(Keyword::Function) => {
                let function = self.parse_function(false)?;
                Ok(Expression::Function(Rc::new(function)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(Expression::Parenthesized(Box::new(expr)))
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            _ => Err(self.unexpected()),
        }
    }

    fn literal(&self, value: LiteralValue, start: SourceLocation) -> Expression {
        Expression::Literal(Literal {
            value,
            span: Span::new(start, self.location()),
        })
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        let start = self.location();
        self.expect(TokenKind::LeftBracket)?;

        let mut elements = Vec::new();
        while !self.consume(TokenKind::RightBracket) {
            elements.push(self.parse_assignment_expression()?);
            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RightBracket)?;
                break;
            }
        }

        Ok(Expression::Array(ArrayExpression {
            elements,
            span: Span::new(start, self.location()),
        }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression> {
        let start = self.location();
        self.expect(TokenKind::LeftBrace)?;

        let mut properties = Vec::new();
        while !self.consume(TokenKind::RightBrace) {
            properties.push(self.parse_object_property()?);
            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RightBrace)?;
                break;
            }
        }

        Ok(Expression::Object(ObjectExpression {
            properties,
            span: Span::new(start, self.location()),
        }))
    }

    fn parse_object_property(&mut self) -> Result<ObjectProperty> {
        let start = self.location();

        let key = match self.peek() {
            TokenKind::StringLiteral => {
                let raw = self.advance().text;
                PropertyKey::String(self.parse_string_value(raw))
            }
            TokenKind::NumberLiteral => {
                let raw = self.advance().text;
                PropertyKey::Number(self.parse_number_value(raw)?)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let key = self.parse_assignment_expression()?;
                self.expect(TokenKind::RightBracket)?;
                PropertyKey::Computed(Box::new(key))
            }
            _ => PropertyKey::Identifier(self.parse_identifier_name()?),
        };

        let value = if self.consume(TokenKind::Colon) {
            self.parse_assignment_expression()?
        } else if self.peek() == TokenKind::LeftParen {
            // Method shorthand: { name(a) { ... } }
            self.parse_method(&key, start)?
        } else {
            // Shorthand: { name }
            match &key {
                PropertyKey::Identifier(id) if !Self::is_reserved_word(&id.name) => {
                    Expression::Identifier(id.clone())
                }
                _ => return Err(self.unexpected()),
            }
        };

        Ok(ObjectProperty {
            key,
            value,
            span: Span::new(start, self.location()),
        })
    }

    fn parse_method(&mut self, key: &PropertyKey, start: SourceLocation) -> Result<Expression> {
        let id = match key {
            PropertyKey::Identifier(id) => Some(id.clone()),
            _ => None,
        };
        self.expect(TokenKind::LeftParen)?;
        let params = self.parse_function_params()?;

        let old_flags = self.flags;
        self.flags.in_function = true;
        self.flags.in_loop = false;
        let body = self.parse_block_statement();
        self.flags = old_flags;
        let body = body?;

        Ok(Expression::Function(Rc::new(Function {
            id,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            source: self.source[start.offset..self.previous_end()].to_string(),
            span: Span::new(start, self.location()),
        })))
    }

    /// Parse `( args )`, returning the arguments and their verbatim source text
    fn parse_arguments(&mut self) -> Result<(Vec<Expression>, String)> {
        let open_end = self.expect(TokenKind::LeftParen)?.end_offset();
        let mut args = Vec::new();

        loop {
            if self.peek() == TokenKind::RightParen {
                break;
            }
            args.push(self.parse_assignment_expression()?);
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }

        let close_start = self.location().offset;
        self.expect(TokenKind::RightParen)?;
        let text = self.source[open_end..close_start].trim().to_string();

        Ok((args, text))
    }

    // ========== Helpers ==========

    fn is_reserved_word(name: &str) -> bool {
        Keyword::lookup(name).is_some_and(|k| k.is_reserved())
    }

    fn parse_identifier(&mut self) -> Result<Identifier> {
        match self.peek() {
            TokenKind::Identifier | TokenKind::Keyword(Keyword::Of) => {
                let token = self.advance();
                let (name, location) = (token.text.to_string(), token.location);
                Ok(Identifier {
                    name,
                    span: Span::new(location, self.location()),
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_identifier_name(&mut self) -> Result<Identifier> {
        // Allow keywords as property names
        match self.peek() {
            TokenKind::Identifier | TokenKind::Keyword(_) => {
                let token = self.advance();
                let (name, location) = (token.text.to_string(), token.location);
                Ok(Identifier {
                    name,
                    span: Span::new(location, self.location()),
                })
            }
            _ => {
                let loc = self.location();
                Err(self.error("Expected identifier", loc))
            }
        }
    }

    fn parse_string_value(&self, text: &str) -> String {
        // Remove quotes and process escapes
        let inner = &text[1..text.len() - 1];
        let mut result = String::new();
        let mut chars = inner.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '\\' {
                result.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('b') => result.push('\u{8}'),
                Some('f') => result.push('\u{c}'),
                Some('v') => result.push('\u{b}'),
                Some('0') => result.push('\0'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    if let Ok(code) = u8::from_str_radix(&hex, 16) {
                        result.push(code as char);
                    }
                }
                Some('u') => {
                    let code = if chars.peek() == Some(&'{') {
                        chars.next();
                        let hex: String = chars.by_ref().take_while(|&c| c != '}').collect();
                        u32::from_str_radix(&hex, 16).ok()
                    } else {
                        let hex: String = chars.by_ref().take(4).collect();
                        u32::from_str_radix(&hex, 16).ok()
                    };
                    if let Some(c) = code.and_then(char::from_u32) {
                        result.push(c);
                    }
                }
                // Line continuation
                Some('\n') => {}
                Some(other) => result.push(other),
                None => {}
            }
        }

        result
    }

    fn parse_number_value(&self, text: &str) -> Result<f64> {
        // Remove numeric separators
        let clean: String = text.chars().filter(|&c| c != '_').collect();
        let radix = match clean.get(..2) {
            Some("0x") | Some("0X") => Some(16),
            Some("0b") | Some("0B") => Some(2),
            Some("0o") | Some("0O") => Some(8),
            _ => None,
        };

        let loc = self.tokens[self.pos.saturating_sub(1)].location;
        match radix {
            Some(radix) => i64::from_str_radix(&clean[2..], radix)
                .map(|n| n as f64)
                .map_err(|_| self.error(format!("Invalid number: {}", text), loc)),
            None => clean
                .parse::<f64>()
                .map_err(|_| self.error(format!("Invalid number: {}", text), loc)),
        }
    }
}

/// Parse source code into an AST
pub fn parse(source: &str) -> Result<Program> {
    let mut parser = Parser::new(source)?;
    parser.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_expression(source: &str) -> Expression {
        let program = parse(source).unwrap();
        match program.body.into_iter().next() {
            Some(Statement::Expression(stmt)) => stmt.expression,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_literals() {
        let program = parse("42; 'hello'; true; null;").unwrap();
        assert_eq!(program.body.len(), 4);
    }

    #[test]
    fn test_parse_binary_precedence() {
        match first_expression("1 + 2 * 3;") {
            Expression::Binary(bin) => {
                assert_eq!(bin.operator, BinaryOperator::Add);
                assert!(matches!(bin.right, Expression::Binary(_)));
            }
            other => panic!("expected binary expression, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_variable_declaration() {
        let program = parse("let x = 1, y;").unwrap();
        match &program.body[0] {
            Statement::VariableDeclaration(decl) => {
                assert_eq!(decl.kind, VariableKind::Let);
                assert_eq!(decl.declarations.len(), 2);
                assert!(decl.declarations[1].init.is_none());
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_keeps_source_text() {
        let source = "function add(a, b) { return a + b; }";
        let program = parse(source).unwrap();
        match &program.body[0] {
            Statement::FunctionDeclaration(f) => {
                assert_eq!(f.display_name(), "add");
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.source, source);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_arrow_functions() {
        assert!(matches!(first_expression("x => x * 2;"), Expression::Arrow(_)));
        assert!(matches!(first_expression("(a, b) => { return a; };"), Expression::Arrow(_)));
        assert!(matches!(first_expression("() => 1;"), Expression::Arrow(_)));
        // A parenthesized expression is not an arrow
        assert!(matches!(first_expression("(a, b);"), Expression::Parenthesized(_)));
    }

    #[test]
    fn test_call_records_argument_text() {
        match first_expression("expect( fact(3) ).toBe(6);") {
            Expression::Call(outer) => {
                assert_eq!(outer.arguments_text, "6");
                match &outer.callee {
                    Expression::Member(member) => match &member.object {
                        Expression::Call(inner) => assert_eq!(inner.arguments_text, "fact(3)"),
                        other => panic!("expected inner call, got {:?}", other),
                    },
                    other => panic!("expected member, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for_of_and_classic_for() {
        let program = parse("for (const x of xs) {} for (let i = 0; i < 3; i++) {}").unwrap();
        assert!(matches!(program.body[0], Statement::ForOf(_)));
        assert!(matches!(program.body[1], Statement::For(_)));
    }

    #[test]
    fn test_parse_try_catch_finally() {
        let program = parse("try { f(); } catch (e) { g(e); } finally { h(); }").unwrap();
        match &program.body[0] {
            Statement::Try(t) => {
                assert!(t.handler.is_some());
                assert!(t.finalizer.is_some());
            }
            other => panic!("expected try, got {:?}", other),
        }
    }

    #[test]
    fn test_asi_on_newline() {
        let program = parse("let a = 1\nlet b = 2\na + b").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("let = 3;").unwrap_err().is_syntax_error());
        assert!(parse("function (").is_err());
        assert!(parse("return 1;").is_err());
        assert!(parse("break;").is_err());
        assert!(parse("1 = 2;").is_err());
        assert!(parse("const c;").is_err());
    }

    #[test]
    fn test_object_literal_forms() {
        match first_expression("({ a: 1, 'b': 2, c, m(x) { return x; } });") {
            Expression::Parenthesized(inner) => match *inner {
                Expression::Object(obj) => assert_eq!(obj.properties.len(), 4),
                other => panic!("expected object, got {:?}", other),
            },
            other => panic!("expected parenthesized, got {:?}", other),
        }
    }

    #[test]
    fn test_nesting_is_bounded() {
        let handle = std::thread::Builder::new()
            .stack_size(crate::runtime::STACK_SIZE)
            .spawn(|| {
                let deep = format!("var x = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
                let err = parse(&deep).unwrap_err();
                let shallow = format!("var x = {}1{};", "(".repeat(50), ")".repeat(50));
                let negations = format!("x = {}1;", "!".repeat(MAX_NESTING + 1));
                (err.exception_text(), parse(&shallow).is_ok() && parse(&negations).is_err())
            })
            .unwrap();
        let (text, shallow_ok) = handle.join().unwrap();
        assert!(text.starts_with("SyntaxError: Too much nesting"), "{}", text);
        assert!(shallow_ok);
    }
}
