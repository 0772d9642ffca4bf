//! Runtime environment for gradx scripts
//!
//! A tree-walking evaluator over [`crate::ast`]. Besides plain evaluation it
//! offers the isolation primitives the marker relies on: running a program
//! in a fresh child frame of the globals and reading selected bindings back,
//! running a program with pre-seeded bindings, and installing or removing
//! named globals.

mod builtins;
mod scope;
mod value;

pub use scope::{Scope, ScopeRef};
pub use value::{
    number_to_string, CallArgs, Closure, NativeFn, Object, ObjectKind, ObjectRef, PropertyMap,
    Value,
};

use crate::ast::*;
use crate::error::{messages, Error, ErrorKind, Result};
use crate::parser;
use rustc_hash::FxHashMap as HashMap;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Maximum nesting of script function calls
pub const MAX_CALL_DEPTH: usize = 1024;

/// Stack size for threads that evaluate scripts, enough for [`MAX_CALL_DEPTH`]
/// nested calls and the deepest programs the parser accepts
pub const STACK_SIZE: usize = 256 * 1024 * 1024;

/// Bindings read back from, or seeded into, an isolated evaluation
pub type Bindings = BTreeMap<String, Value>;

/// How a statement finished
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// A resolved assignment target
enum Reference {
    Binding(String),
    Property(Value, String),
}

/// The gradx script runtime
pub struct Runtime {
    /// Root frame holding the built-ins and installed globals
    global: ScopeRef,
    /// Modules `require` may resolve
    modules: HashMap<String, Value>,
    /// Captured `console` output, one entry per call
    console: Vec<String>,
    /// Current script call depth
    depth: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a new runtime with the built-in globals and module registry
    pub fn new() -> Self {
        let mut runtime = Self {
            global: Scope::global(),
            modules: HashMap::default(),
            console: Vec::new(),
            depth: 0,
        };
        builtins::register_globals(&mut runtime);
        runtime
    }

    /// Evaluate source code in the global frame, returning the completion value
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse(source)?;
        let scope = Rc::clone(&self.global);
        self.run_program(&program, &scope)
    }

    /// Evaluate source code in a fresh child frame of the globals.
    ///
    /// Top-level declarations stay in that frame; the requested `names` that
    /// it declares are returned. Nothing is installed as a global.
    pub fn eval_isolated(&mut self, source: &str, names: &[String]) -> Result<Bindings> {
        let program = parser::parse(source)?;
        let scope = Scope::function(&self.global);
        self.run_program(&program, &scope)?;

        let frame = scope.borrow();
        Ok(names
            .iter()
            .filter_map(|name| frame.get_own(name).map(|value| (name.clone(), value)))
            .collect())
    }

    /// Evaluate source code in a fresh child frame pre-seeded with `bindings`
    pub fn eval_with_bindings(&mut self, source: &str, bindings: &Bindings) -> Result<Value> {
        let program = parser::parse(source)?;
        let scope = Scope::function(&self.global);
        {
            let mut frame = scope.borrow_mut();
            for (name, value) in bindings {
                frame.declare(name, value.clone(), VariableKind::Let);
            }
        }
        self.run_program(&program, &scope)
    }

    /// Install (or replace) a global binding
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.global
            .borrow_mut()
            .declare(name, value, VariableKind::Var);
    }

    /// Reinstall every built-in global and module, undoing script reassignments
    pub fn restore_builtins(&mut self) {
        builtins::register_globals(self);
    }

    /// Remove a global binding, returning its value
    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        self.global.borrow_mut().remove(name)
    }

    /// Read a global binding
    pub fn global(&self, name: &str) -> Option<Value> {
        self.global.borrow().get_own(name)
    }

    /// Make `value` resolvable through `require(name)`
    pub fn register_module(&mut self, name: &str, value: Value) {
        self.modules.insert(name.to_string(), value);
    }

    /// Resolve a registered module
    pub fn module(&self, name: &str) -> Option<Value> {
        self.modules.get(name).cloned()
    }

    /// Record one line of console output
    pub fn log(&mut self, line: String) {
        tracing::debug!(target: "gradx::console", "{}", line);
        self.console.push(line);
    }

    /// Console output captured so far
    pub fn console_output(&self) -> &[String] {
        &self.console
    }

    /// Drain the captured console output
    pub fn take_console_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.console)
    }

    /// Call a function value with plain arguments and no receiver
    pub fn call(&mut self, callee: &Value, values: Vec<Value>) -> Result<Value> {
        self.call_function(callee, CallArgs::new(values))
    }

    /// Call a function value
    pub fn call_function(&mut self, callee: &Value, args: CallArgs) -> Result<Value> {
        enum Target {
            Native(NativeFn),
            Script(Closure),
        }

        let target = match callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Native { func, .. } => Some(Target::Native(Rc::clone(func))),
                ObjectKind::Function(closure) => Some(Target::Script(closure.clone())),
                _ => None,
            },
            _ => None,
        };
        let Some(target) = target else {
            return Err(Error::type_error(messages::not_a_function(
                &callee.inspect(),
            )));
        };

        if self.depth >= MAX_CALL_DEPTH {
            return Err(Error::range_error(messages::MAXIMUM_CALL_STACK));
        }
        self.depth += 1;
        let result = match target {
            Target::Native(func) => func(self, args),
            Target::Script(closure) => self.call_closure(&closure, args),
        };
        self.depth -= 1;
        result
    }

    fn call_closure(&mut self, closure: &Closure, args: CallArgs) -> Result<Value> {
        let function = &closure.function;
        let scope = Scope::function(&closure.scope);
        {
            let mut frame = scope.borrow_mut();
            for (i, param) in function.params.iter().enumerate() {
                let value = args.values.get(i).cloned().unwrap_or_default();
                frame.declare(&param.name, value, VariableKind::Let);
            }
            if !function.is_arrow {
                frame.declare("this", args.this.clone(), VariableKind::Let);
                frame.declare(
                    "arguments",
                    Value::new_array(args.values.clone()),
                    VariableKind::Let,
                );
            }
        }

        match &function.body {
            FunctionBody::Block(block) => match self.execute_statements(&block.body, &scope)? {
                Completion::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
            FunctionBody::Expression(expr) => self.eval_expression(expr, &scope),
        }
    }

    fn construct(&mut self, callee: &Value, args: CallArgs) -> Result<Value> {
        let is_script = match callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Function(closure) => Some(!closure.function.is_arrow),
                ObjectKind::Native { .. } => Some(false),
                _ => None,
            },
            _ => None,
        };

        match is_script {
            Some(true) => {
                let this = Value::new_object();
                let args = CallArgs {
                    this: this.clone(),
                    ..args
                };
                match self.call_function(callee, args)? {
                    result @ Value::Object(_) => Ok(result),
                    _ => Ok(this),
                }
            }
            Some(false) if callee.is_callable() => self.call_function(callee, args),
            _ => Err(Error::type_error(format!(
                "{} is not a constructor",
                callee.inspect()
            ))),
        }
    }

    // ========== Statements ==========

    fn run_program(&mut self, program: &Program, scope: &ScopeRef) -> Result<Value> {
        self.hoist_declarations(&program.body, scope);

        let mut last = Value::Undefined;
        for statement in &program.body {
            if let Statement::Expression(stmt) = statement {
                last = self.eval_expression(&stmt.expression, scope)?;
                continue;
            }
            match self.execute_statement(statement, scope)? {
                Completion::Normal => {}
                // The parser rejects jumps outside functions and loops
                Completion::Return(_) | Completion::Break | Completion::Continue => break,
            }
        }
        Ok(last)
    }

    /// Pre-declare function declarations and `var` names of a statement list
    fn hoist_declarations(&mut self, statements: &[Statement], scope: &ScopeRef) {
        for statement in statements {
            match statement {
                Statement::FunctionDeclaration(function) => {
                    let closure = Value::closure(Rc::clone(function), Rc::clone(scope));
                    scope
                        .borrow_mut()
                        .declare(function.display_name(), closure, VariableKind::Var);
                }
                Statement::VariableDeclaration(decl) if decl.kind == VariableKind::Var => {
                    for declarator in &decl.declarations {
                        scope::declare_var(scope, &declarator.id.name, None);
                    }
                }
                _ => {}
            }
        }
    }

    fn execute_statements(&mut self, statements: &[Statement], scope: &ScopeRef) -> Result<Completion> {
        self.hoist_declarations(statements, scope);
        for statement in statements {
            match self.execute_statement(statement, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_block(&mut self, block: &BlockStatement, scope: &ScopeRef) -> Result<Completion> {
        let inner = Scope::block(scope);
        self.execute_statements(&block.body, &inner)
    }

    fn execute_statement(&mut self, statement: &Statement, scope: &ScopeRef) -> Result<Completion> {
        match statement {
            Statement::Block(block) => self.execute_block(block, scope),
            Statement::Empty(_) | Statement::FunctionDeclaration(_) => Ok(Completion::Normal),
            Statement::Expression(stmt) => {
                self.eval_expression(&stmt.expression, scope)?;
                Ok(Completion::Normal)
            }
            Statement::VariableDeclaration(decl) => {
                self.execute_declaration(decl, scope)?;
                Ok(Completion::Normal)
            }
            Statement::If(stmt) => {
                if self.eval_expression(&stmt.test, scope)?.to_boolean() {
                    self.execute_statement(&stmt.consequent, scope)
                } else if let Some(alternate) = &stmt.alternate {
                    self.execute_statement(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::While(stmt) => {
                while self.eval_expression(&stmt.test, scope)?.to_boolean() {
                    match self.execute_statement(&stmt.body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::DoWhile(stmt) => {
                loop {
                    match self.execute_statement(&stmt.body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.eval_expression(&stmt.test, scope)?.to_boolean() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::For(stmt) => self.execute_for(stmt, scope),
            Statement::ForOf(stmt) => self.execute_for_of(stmt, scope),
            Statement::Break(_) => Ok(Completion::Break),
            Statement::Continue(_) => Ok(Completion::Continue),
            Statement::Return(stmt) => {
                let value = match &stmt.argument {
                    Some(argument) => self.eval_expression(argument, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Throw(stmt) => {
                let value = self.eval_expression(&stmt.argument, scope)?;
                Err(Error::Thrown(value))
            }
            Statement::Try(stmt) => self.execute_try(stmt, scope),
        }
    }

    fn execute_declaration(&mut self, decl: &VariableDeclaration, scope: &ScopeRef) -> Result<()> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => Some(self.eval_expression(init, scope)?),
                None => None,
            };
            let name = &declarator.id.name;
            if decl.kind == VariableKind::Var {
                scope::declare_var(scope, name, value);
                continue;
            }
            if scope.borrow().has_own(name) {
                return Err(Error::RuntimeError {
                    kind: ErrorKind::SyntaxError,
                    message: format!("Identifier '{}' has already been declared", name),
                });
            }
            scope
                .borrow_mut()
                .declare(name, value.unwrap_or_default(), decl.kind);
        }
        Ok(())
    }

    fn execute_for(&mut self, stmt: &ForStatement, scope: &ScopeRef) -> Result<Completion> {
        let loop_scope = Scope::block(scope);
        match &stmt.init {
            Some(ForInit::Variable(decl)) => self.execute_declaration(decl, &loop_scope)?,
            Some(ForInit::Expression(expr)) => {
                self.eval_expression(expr, &loop_scope)?;
            }
            None => {}
        }

        loop {
            if let Some(test) = &stmt.test {
                if !self.eval_expression(test, &loop_scope)?.to_boolean() {
                    break;
                }
            }
            match self.execute_statement(&stmt.body, &loop_scope)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
            if let Some(update) = &stmt.update {
                self.eval_expression(update, &loop_scope)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_for_of(&mut self, stmt: &ForOfStatement, scope: &ScopeRef) -> Result<Completion> {
        let iterable = self.eval_expression(&stmt.right, scope)?;
        let items = match &iterable {
            Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
            other => other.array_elements().ok_or_else(|| {
                Error::type_error(format!("{} is not iterable", other.inspect()))
            })?,
        };

        for item in items {
            let iteration = Scope::block(scope);
            if stmt.kind == VariableKind::Var {
                scope::declare_var(&iteration, &stmt.binding.name, Some(item));
            } else {
                iteration
                    .borrow_mut()
                    .declare(&stmt.binding.name, item, stmt.kind);
            }
            match self.execute_statement(&stmt.body, &iteration)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_try(&mut self, stmt: &TryStatement, scope: &ScopeRef) -> Result<Completion> {
        let result = match (self.execute_block(&stmt.block, scope), &stmt.handler) {
            (Err(error), Some(handler)) => {
                tracing::trace!(error = %error, "caught by script");
                let catch_scope = Scope::block(scope);
                if let Some(param) = &handler.param {
                    catch_scope
                        .borrow_mut()
                        .declare(&param.name, error.into_value(), VariableKind::Let);
                }
                self.execute_block(&handler.body, &catch_scope)
            }
            (result, _) => result,
        };

        if let Some(finalizer) = &stmt.finalizer {
            match self.execute_block(finalizer, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        result
    }

    // ========== Expressions ==========

    fn eval_expression(&mut self, expr: &Expression, scope: &ScopeRef) -> Result<Value> {
        match expr {
            Expression::Identifier(id) => scope::lookup(scope, &id.name)
                .ok_or_else(|| Error::reference_error(messages::not_defined(&id.name))),
            Expression::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Null => Value::Null,
                LiteralValue::Boolean(b) => Value::Boolean(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::String(s.clone()),
            }),
            Expression::Array(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(self.eval_expression(element, scope)?);
                }
                Ok(Value::new_array(elements))
            }
            Expression::Object(object) => {
                let mut properties = Vec::with_capacity(object.properties.len());
                for property in &object.properties {
                    let key = match &property.key {
                        PropertyKey::Identifier(id) => id.name.clone(),
                        PropertyKey::String(s) => s.clone(),
                        PropertyKey::Number(n) => number_to_string(*n),
                        PropertyKey::Computed(expr) => {
                            property_key(&self.eval_expression(expr, scope)?)
                        }
                    };
                    properties.push((key, self.eval_expression(&property.value, scope)?));
                }
                Ok(Value::new_object_with_properties(properties))
            }
            Expression::Function(function) => {
                // A named function expression can refer to itself
                let closure_scope = match &function.id {
                    Some(_) => Scope::block(scope),
                    None => Rc::clone(scope),
                };
                let closure = Value::closure(Rc::clone(function), Rc::clone(&closure_scope));
                if let Some(id) = &function.id {
                    closure_scope
                        .borrow_mut()
                        .declare(&id.name, closure.clone(), VariableKind::Const);
                }
                Ok(closure)
            }
            Expression::Arrow(function) => Ok(Value::closure(Rc::clone(function), Rc::clone(scope))),
            Expression::Member(member) => {
                let object = self.eval_expression(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                self.get_member(&object, &key)
            }
            Expression::Call(call) => self.eval_call(call, scope),
            Expression::New(call) => {
                let callee = self.eval_expression(&call.callee, scope)?;
                let args = self.eval_arguments(call, Value::Undefined, scope)?;
                self.construct(&callee, args)
            }
            Expression::Unary(unary) => self.eval_unary(unary, scope),
            Expression::Update(update) => {
                let reference = self.resolve_reference(&update.argument, scope)?;
                let old = self.get_reference(&reference, scope)?.to_number();
                let new = match update.operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::Number(new), scope)?;
                Ok(Value::Number(if update.prefix { new } else { old }))
            }
            Expression::Binary(binary) => {
                let left = self.eval_expression(&binary.left, scope)?;
                let right = self.eval_expression(&binary.right, scope)?;
                Ok(binary_operation(binary.operator, &left, &right))
            }
            Expression::Logical(logical) => {
                let left = self.eval_expression(&logical.left, scope)?;
                let short_circuit = match logical.operator {
                    LogicalOperator::And => !left.to_boolean(),
                    LogicalOperator::Or => left.to_boolean(),
                    LogicalOperator::NullishCoalescing => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expression(&logical.right, scope)
                }
            }
            Expression::Assignment(assignment) => {
                let reference = self.resolve_reference(&assignment.left, scope)?;
                let value = match assignment.operator.binary_operator() {
                    None => self.eval_expression(&assignment.right, scope)?,
                    Some(operator) => {
                        let current = self.get_reference(&reference, scope)?;
                        let right = self.eval_expression(&assignment.right, scope)?;
                        binary_operation(operator, &current, &right)
                    }
                };
                self.put_reference(&reference, value.clone(), scope)?;
                Ok(value)
            }
            Expression::Conditional(cond) => {
                if self.eval_expression(&cond.test, scope)?.to_boolean() {
                    self.eval_expression(&cond.consequent, scope)
                } else {
                    self.eval_expression(&cond.alternate, scope)
                }
            }
            Expression::Sequence(seq) => {
                let mut last = Value::Undefined;
                for expr in &seq.expressions {
                    last = self.eval_expression(expr, scope)?;
                }
                Ok(last)
            }
            Expression::Parenthesized(inner) => self.eval_expression(inner, scope),
        }
    }

    fn eval_unary(&mut self, unary: &UnaryExpression, scope: &ScopeRef) -> Result<Value> {
        // typeof tolerates undeclared identifiers
        if let (UnaryOperator::Typeof, Expression::Identifier(id)) =
            (unary.operator, &unary.argument)
        {
            let value = scope::lookup(scope, &id.name).unwrap_or_default();
            return Ok(Value::String(value.type_of().to_string()));
        }

        let argument = self.eval_expression(&unary.argument, scope)?;
        Ok(match unary.operator {
            UnaryOperator::Minus => Value::Number(-argument.to_number()),
            UnaryOperator::Plus => Value::Number(argument.to_number()),
            UnaryOperator::Not => Value::Boolean(!argument.to_boolean()),
            UnaryOperator::Typeof => Value::String(argument.type_of().to_string()),
        })
    }

    fn eval_call(&mut self, call: &CallExpression, scope: &ScopeRef) -> Result<Value> {
        let (this, callee) = match unparenthesized(&call.callee) {
            Expression::Member(member) => {
                let object = self.eval_expression(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                let method = self.get_member(&object, &key)?;
                (object, method)
            }
            other => (Value::Undefined, self.eval_expression(other, scope)?),
        };

        if !callee.is_callable() {
            return Err(Error::type_error(messages::not_a_function(&callee_name(
                &call.callee,
            ))));
        }

        let args = self.eval_arguments(call, this, scope)?;
        self.call_function(&callee, args)
    }

    fn eval_arguments(&mut self, call: &CallExpression, this: Value, scope: &ScopeRef) -> Result<CallArgs> {
        let mut values = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            values.push(self.eval_expression(argument, scope)?);
        }
        Ok(CallArgs {
            this,
            values,
            source: Some(call.arguments_text.clone()),
        })
    }

    fn member_key(&mut self, property: &MemberProperty, scope: &ScopeRef) -> Result<String> {
        match property {
            MemberProperty::Identifier(id) => Ok(id.name.clone()),
            MemberProperty::Expression(expr) => {
                Ok(property_key(&self.eval_expression(expr, scope)?))
            }
        }
    }

    /// Read `object[key]`, including built-in methods of primitives and arrays
    pub fn get_member(&mut self, object: &Value, key: &str) -> Result<Value> {
        match object {
            Value::Undefined | Value::Null => Err(Error::type_error(
                messages::cannot_read_property(key, &object.to_js_string()),
            )),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::String(c.to_string()))
                        .unwrap_or_default());
                }
                Ok(builtins::string_method(key).unwrap_or_default())
            }
            Value::Number(_) => Ok(builtins::number_method(key).unwrap_or_default()),
            Value::Boolean(_) => Ok(Value::Undefined),
            Value::Object(_) => {
                if let Some(value) = object.get_property(key) {
                    return Ok(value);
                }
                if object.is_array() {
                    return Ok(builtins::array_method(key).unwrap_or_default());
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn resolve_reference(&mut self, target: &Expression, scope: &ScopeRef) -> Result<Reference> {
        match target {
            Expression::Identifier(id) => Ok(Reference::Binding(id.name.clone())),
            Expression::Member(member) => {
                let object = self.eval_expression(&member.object, scope)?;
                let key = self.member_key(&member.property, scope)?;
                Ok(Reference::Property(object, key))
            }
            Expression::Parenthesized(inner) => self.resolve_reference(inner, scope),
            _ => Err(Error::RuntimeError {
                kind: ErrorKind::SyntaxError,
                message: "Invalid left-hand side in assignment".to_string(),
            }),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> Result<Value> {
        match reference {
            Reference::Binding(name) => scope::lookup(scope, name)
                .ok_or_else(|| Error::reference_error(messages::not_defined(name))),
            Reference::Property(object, key) => self.get_member(object, key),
        }
    }

    fn put_reference(&mut self, reference: &Reference, value: Value, scope: &ScopeRef) -> Result<()> {
        match reference {
            Reference::Binding(name) => scope::assign(scope, name, value),
            Reference::Property(object, key) => {
                if object.is_nullish() {
                    return Err(Error::type_error(messages::cannot_set_property(
                        key,
                        &object.to_js_string(),
                    )));
                }
                // Writes to primitives are silently dropped
                object.set_property(key, value);
                Ok(())
            }
        }
    }
}

fn unparenthesized(expr: &Expression) -> &Expression {
    match expr {
        Expression::Parenthesized(inner) => unparenthesized(inner),
        other => other,
    }
}

/// Name used in "x is not a function" messages
fn callee_name(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(id) => id.name.clone(),
        Expression::Member(member) => {
            let object = callee_name(&member.object);
            match &member.property {
                MemberProperty::Identifier(id) => format!("{}.{}", object, id.name),
                MemberProperty::Expression(_) => format!("{}[...]", object),
            }
        }
        Expression::Call(call) => format!("{}(...)", callee_name(&call.callee)),
        Expression::Parenthesized(inner) => callee_name(inner),
        _ => "expression".to_string(),
    }
}

/// Convert a value used as a property key to its string form
fn property_key(value: &Value) -> String {
    match value {
        Value::Number(n) => number_to_string(*n),
        other => other.to_js_string(),
    }
}

fn binary_operation(operator: BinaryOperator, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOperator::Add => {
            let concatenates = |v: &Value| matches!(v, Value::String(_) | Value::Object(_));
            if concatenates(left) || concatenates(right) {
                Value::String(format!("{}{}", left.to_js_string(), right.to_js_string()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOperator::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOperator::Eq => Value::Boolean(left.equals(right)),
        BinaryOperator::Ne => Value::Boolean(!left.equals(right)),
        BinaryOperator::StrictEq => Value::Boolean(left.strict_equals(right)),
        BinaryOperator::StrictNe => Value::Boolean(!left.strict_equals(right)),
        BinaryOperator::Lt => compare(left, right, |o| o.is_lt()),
        BinaryOperator::Le => compare(left, right, |o| o.is_le()),
        BinaryOperator::Gt => compare(left, right, |o| o.is_gt()),
        BinaryOperator::Ge => compare(left, right, |o| o.is_ge()),
    }
}

fn compare(left: &Value, right: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Boolean(ordering.is_some_and(accept))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Value {
        Runtime::new().eval(source).unwrap()
    }

    fn eval_err(source: &str) -> String {
        Runtime::new().eval(source).unwrap_err().exception_text()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval("1 + 2 * 3").to_number(), 7.0);
        assert_eq!(eval("2 ** 3 ** 2").to_number(), 512.0);
        assert_eq!(eval("'a' + 1").to_js_string(), "a1");
        assert_eq!(eval("7 % 3").to_number(), 1.0);
    }

    #[test]
    fn test_function_declarations_are_hoisted() {
        assert_eq!(eval("const r = twice(4); function twice(x) { return 2 * x; } r").to_number(), 8.0);
    }

    #[test]
    fn test_closures_capture_scope() {
        let source = "function counter() { let n = 0; return () => ++n; }
                      const c = counter(); c(); c(); c()";
        assert_eq!(eval(source).to_number(), 3.0);
    }

    #[test]
    fn test_loops() {
        let source = "let total = 0;
                      for (let i = 0; i < 5; i++) { if (i === 3) continue; total += i; }
                      for (const x of [10, 20]) total += x;
                      let j = 0; while (true) { j++; if (j > 2) break; }
                      total + j";
        assert_eq!(eval(source).to_number(), 40.0);
    }

    #[test]
    fn test_try_catch_binds_error_value() {
        let source = "let m; try { null.x; } catch (e) { m = e.message; } m";
        assert_eq!(
            eval(source).to_js_string(),
            "Cannot read properties of null (reading 'x')"
        );
        assert_eq!(eval("let v = 1; try { throw 'boom'; } catch (e) { v = e; } finally { v += '!'; } v").to_js_string(), "boom!");
    }

    #[test]
    fn test_uncaught_throw_text() {
        assert_eq!(eval_err("throw new Error('nope')"), "Error: nope");
        assert_eq!(eval_err("missing()"), "ReferenceError: missing is not defined");
        assert_eq!(eval_err("const o = {}; o.f()"), "TypeError: o.f is not a function");
        assert_eq!(eval_err("const c = 1; c = 2"), "TypeError: Assignment to constant variable.");
    }

    #[test]
    fn test_call_depth_is_bounded() {
        let handle = std::thread::Builder::new()
            .stack_size(STACK_SIZE)
            .spawn(|| eval_err("function f(n) { return f(n + 1); } f(0)"))
            .unwrap();
        assert_eq!(
            handle.join().unwrap(),
            "RangeError: Maximum call stack size exceeded"
        );
    }

    #[test]
    fn test_deep_recursion_within_bound() {
        let handle = std::thread::Builder::new()
            .stack_size(STACK_SIZE)
            .spawn(|| {
                let source = "function sum(n) { return n === 0 ? 0 : n + sum(n - 1); } sum(1000)";
                Runtime::new().eval(source).map(|v| v.to_number()).map_err(|e| e.to_string())
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), Ok(500500.0));
    }

    #[test]
    fn test_eval_isolated_reads_back_bindings_only() {
        let mut rt = Runtime::new();
        let names = vec!["add".to_string(), "absent".to_string()];
        let bindings = rt
            .eval_isolated("function add(a, b) { return a + b; } var helper = 1;", &names)
            .unwrap();
        assert!(bindings["add"].is_callable());
        assert!(!bindings.contains_key("absent"));
        assert!(rt.global("add").is_none());
        assert!(rt.global("helper").is_none());
    }

    #[test]
    fn test_eval_with_bindings_seeds_scope() {
        let mut rt = Runtime::new();
        let mut bindings = Bindings::new();
        bindings.insert("base".to_string(), Value::Number(40.0));
        let result = rt.eval_with_bindings("base + 2", &bindings).unwrap();
        assert_eq!(result.to_number(), 42.0);
        assert!(rt.eval("base").is_err());
    }

    #[test]
    fn test_define_and_remove_global() {
        let mut rt = Runtime::new();
        rt.define_global("answer", Value::Number(42.0));
        assert_eq!(rt.eval("answer").unwrap().to_number(), 42.0);
        assert!(rt.remove_global("answer").is_some());
        assert!(rt.eval("answer").is_err());
    }

    #[test]
    fn test_new_on_script_function() {
        let source = "function Point(x) { this.x = x; } const p = new Point(3); p.x";
        assert_eq!(eval(source).to_number(), 3.0);
    }

    #[test]
    fn test_typeof_undeclared() {
        assert_eq!(eval("typeof nothingHere").to_js_string(), "undefined");
        assert_eq!(eval("typeof (x => x)").to_js_string(), "function");
    }
}
