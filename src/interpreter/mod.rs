pub mod environment;
pub mod resolver;

use std::{collections::HashMap, rc::Rc};

use environment::{Environment, RcCell};
use tracing::instrument;

use super::{LoxError, Result};
use crate::{
    expr::{self, Expr},
    lox_callable::LoxCallable,
    lox_class::LoxClass,
    lox_instance::LoxInstance,
    lox_function::LoxFunction,
    native::clock::LoxClock,
    object::{self, Object},
    stmt::{self, Stmt},
    token::Token,
    token_type::TokenType,
};

#[derive(Debug)]
pub struct Interpreter {
    environment: RcCell<Environment>,
    pub globals: RcCell<Environment>,
    /// Scope distance per variable-use site, keyed by the parser-assigned
    /// node id. A missing entry means the name resolves against globals.
    locals: HashMap<usize, u32>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let globals = Environment::new();
        globals
            .borrow_mut()
            .define("clock".to_string(), Object::Callable(Rc::new(LoxClock {})));
        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    /// Called by the resolver for every use site it can pin to a local frame.
    pub fn resolve(&mut self, id: usize, depth: u32) {
        self.locals.insert(id, depth);
    }

    #[instrument(skip(self, statements), err, level = "trace")]
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    /// Single-expression entry point for the `evaluate` subcommand.
    pub fn interpret_expression(&mut self, expr: &Expr) -> Result<Object> {
        self.evaluate(expr)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Print(stmt) => self.execute_print_stmt(stmt),
            Stmt::Block(stmt) => {
                let nested = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(&stmt.statements, nested)
            }
            Stmt::Expression(stmt) => self.evaluate(&stmt.expression).map(|_| ()),
            Stmt::Var(stmt) => self.execute_var_stmt(stmt),
            Stmt::If(stmt) => self.execute_if_stmt(stmt),
            Stmt::While(stmt) => self.execute_while_stmt(stmt),
            Stmt::Function(stmt) => self.execute_fn_stmt(stmt),
            Stmt::Return(stmt) => self.execute_return_stmt(stmt),
            Stmt::Class(stmt) => self.execute_class_stmt(stmt),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Object> {
        match expr {
            Expr::Binary(expr) => self.eval_binary(expr),
            Expr::Logical(expr) => self.eval_logical(expr),
            Expr::Grouping(expr) => self.eval_grouping(expr),
            Expr::Literal(expr) => self.eval_literal(expr),
            Expr::Unary(expr) => self.eval_unary(expr),
            Expr::Variable(expr) => self.eval_variable(expr),
            Expr::Assign(expr) => self.eval_assign(expr),
            Expr::Call(expr) => self.eval_call(expr),
            Expr::Get(expr) => self.eval_get(expr),
            Expr::Set(expr) => self.eval_set(expr),
            Expr::This(expr) => self.eval_this(expr),
            Expr::Super(expr) => self.eval_super(expr),
        }
    }

    /// Runs `statements` with `environment` swapped in, restoring the
    /// previous frame on every exit path, including runtime errors and
    /// `return` transfers.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: RcCell<Environment>) -> Result<()> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = statements.iter().try_for_each(|statement| self.execute(statement));
        self.environment = previous;
        result
    }

    fn execute_print_stmt(&mut self, stmt: &stmt::Print) -> Result<()> {
        println!("{}", self.evaluate(&stmt.expression)?);
        Ok(())
    }

    fn execute_var_stmt(&mut self, stmt: &stmt::Var) -> Result<()> {
        let value = match &stmt.initializer {
            Some(init) => self.evaluate(init)?,
            None => Object::nil(),
        };

        self.environment.borrow_mut().define(stmt.name.lexeme.clone(), value);
        Ok(())
    }

    fn execute_if_stmt(&mut self, stmt: &stmt::If) -> Result<()> {
        let res = self.evaluate(&stmt.condition)?;
        if res.is_truthy() {
            self.execute(&stmt.then_branch)?;
        } else if let Some(ref eb) = stmt.else_branch {
            self.execute(eb)?;
        }

        Ok(())
    }

    fn execute_while_stmt(&mut self, stmt: &stmt::While) -> Result<()> {
        let mut res = self.evaluate(&stmt.condition)?;
        while res.is_truthy() {
            self.execute(&stmt.body)?;
            res = self.evaluate(&stmt.condition)?;
        }

        Ok(())
    }

    fn execute_fn_stmt(&mut self, stmt: &stmt::Function) -> Result<()> {
        let function = LoxFunction::new(stmt.clone(), Rc::clone(&self.environment), false);
        self.environment
            .borrow_mut()
            .define(stmt.name.lexeme.clone(), Object::Callable(Rc::new(function)));
        Ok(())
    }

    fn execute_return_stmt(&mut self, stmt: &stmt::Return) -> Result<()> {
        let value = if let Some(ref val) = stmt.value {
            self.evaluate(val)?
        } else {
            Object::nil()
        };
        Err(LoxError::Return { value })
    }

    fn execute_class_stmt(&mut self, stmt: &stmt::Class) -> Result<()> {
        let superclass = match &stmt.superclass {
            Some(variable) => match self.eval_variable(variable)? {
                Object::Class(class) => Some(class),
                _ => {
                    return Err(LoxError::Runtime {
                        message: "Superclass must be a class.".to_string(),
                        line: Some(variable.name.line),
                    });
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(stmt.name.lexeme.clone(), Object::nil());

        // Methods of a subclass close over a frame holding `super`
        let enclosing = superclass.as_ref().map(|class| {
            let environment = Environment::with_enclosing(Rc::clone(&self.environment));
            environment
                .borrow_mut()
                .define("super".to_string(), Object::Class(Rc::clone(class)));
            std::mem::replace(&mut self.environment, environment)
        });

        let mut methods = HashMap::new();
        for method in stmt.methods.iter() {
            let is_initializer = method.name.lexeme == "init";
            let function = LoxFunction::new(method.clone(), Rc::clone(&self.environment), is_initializer);
            methods.insert(method.name.lexeme.clone(), function);
        }

        let class = LoxClass::new(stmt.name.lexeme.clone(), superclass, methods);

        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        self.environment
            .borrow_mut()
            .assign(&stmt.name, Object::Class(Rc::new(class)))?;
        Ok(())
    }

    fn eval_binary(&mut self, expr: &expr::Binary) -> Result<Object> {
        let left = self.evaluate(&expr.left)?;
        let right = self.evaluate(&expr.right)?;

        let obj = match expr.operator.typ {
            TokenType::Greater => {
                let (l, r) = object::number_operands(&left, &right).map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(l > r)
            }
            TokenType::GreaterEqual => {
                let (l, r) = object::number_operands(&left, &right).map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(l >= r)
            }
            TokenType::Less => {
                let (l, r) = object::number_operands(&left, &right).map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(l < r)
            }
            TokenType::LessEqual => {
                let (l, r) = object::number_operands(&left, &right).map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(l <= r)
            }
            TokenType::Minus => (left - right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Plus => (left + right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Slash => (left / right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Star => (left * right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::EqualEqual => Object::from(left == right),
            TokenType::BangEqual => Object::from(left != right),
            _ => Object::nil(),
        };

        Ok(obj)
    }

    fn eval_logical(&mut self, expr: &expr::Logical) -> Result<Object> {
        let left = self.evaluate(&expr.left)?;

        // Short-circuit hands back the operand itself, never a coerced bool
        let truthy_left = left.is_truthy();
        match (&expr.operator.typ, truthy_left) {
            (&TokenType::Or, true) | (&TokenType::And, false) => Ok(left),
            _ => self.evaluate(&expr.right),
        }
    }

    fn eval_grouping(&mut self, expr: &expr::Grouping) -> Result<Object> {
        self.evaluate(&expr.expression)
    }

    fn eval_literal(&mut self, expr: &expr::Literal) -> Result<Object> {
        Ok(expr.value.clone())
    }

    fn eval_unary(&mut self, expr: &expr::Unary) -> Result<Object> {
        let right = self.evaluate(&expr.right)?;
        let obj = match expr.operator.typ {
            TokenType::Minus => {
                let n = right.into_number().map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(-n)
            }
            TokenType::Bang => Object::from(!right.is_truthy()),
            _ => {
                return Err(LoxError::Internal {
                    message: format!("Invalid unary operator '{}'", expr.operator.lexeme),
                });
            }
        };

        Ok(obj)
    }

    fn eval_variable(&mut self, expr: &expr::Variable) -> Result<Object> {
        match self.locals.get(&expr.id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, &expr.name.lexeme),
            None => self.globals.borrow().get(&expr.name),
        }
    }

    fn eval_assign(&mut self, expr: &expr::Assign) -> Result<Object> {
        let value = self.evaluate(&expr.value)?;
        match self.locals.get(&expr.id) {
            Some(distance) => {
                Environment::assign_at(&self.environment, *distance, &expr.name, value.clone());
            }
            None => self.globals.borrow_mut().assign(&expr.name, value.clone())?,
        }
        Ok(value)
    }

    fn eval_call(&mut self, expr: &expr::Call) -> Result<Object> {
        let callee = self.evaluate(&expr.callee)?;
        let mut arguments = Vec::new();
        for argument in expr.arguments.iter() {
            arguments.push(self.evaluate(argument)?);
        }

        match callee {
            Object::Callable(function) => {
                self.check_arity(function.arity(), arguments.len(), &expr.paren)?;
                function.call(self, arguments).map_err(|e| e.add_line(expr.paren.line))
            }
            Object::Class(class) => {
                self.check_arity(class.arity(), arguments.len(), &expr.paren)?;
                LoxClass::instantiate(&class, self, arguments).map_err(|e| e.add_line(expr.paren.line))
            }
            _ => Err(LoxError::Runtime {
                message: "Can only call functions and classes.".to_string(),
                line: Some(expr.paren.line),
            }),
        }
    }

    fn eval_get(&mut self, expr: &expr::Get) -> Result<Object> {
        match self.evaluate(&expr.object)? {
            Object::Instance(instance) => LoxInstance::get(&instance, &expr.name),
            _ => Err(LoxError::Runtime {
                message: "Only instances have properties.".to_string(),
                line: Some(expr.name.line),
            }),
        }
    }

    fn eval_set(&mut self, expr: &expr::Set) -> Result<Object> {
        let Object::Instance(instance) = self.evaluate(&expr.object)? else {
            return Err(LoxError::Runtime {
                message: "Only instances have fields.".to_string(),
                line: Some(expr.name.line),
            });
        };

        let value = self.evaluate(&expr.value)?;
        instance.borrow_mut().set(&expr.name, value.clone());
        Ok(value)
    }

    fn eval_this(&mut self, expr: &expr::This) -> Result<Object> {
        match self.locals.get(&expr.id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, "this"),
            None => self.globals.borrow().get(&expr.keyword),
        }
    }

    /// `super` and the receiver live in adjacent frames: the class frame
    /// holds `super`, the bind frame one hop nearer holds `this`.
    fn eval_super(&mut self, expr: &expr::Super) -> Result<Object> {
        let distance = *self.locals.get(&expr.id).ok_or_else(|| LoxError::Internal {
            message: "Unresolved 'super' expression".to_string(),
        })?;

        let superclass = match Environment::get_at(&self.environment, distance, "super")? {
            Object::Class(class) => class,
            other => {
                return Err(LoxError::Internal {
                    message: format!("'super' resolved to {other}"),
                });
            }
        };
        let instance = match Environment::get_at(&self.environment, distance - 1, "this")? {
            Object::Instance(instance) => instance,
            other => {
                return Err(LoxError::Internal {
                    message: format!("'this' resolved to {other}"),
                });
            }
        };

        match superclass.find_method(&expr.method.lexeme) {
            Some(method) => Ok(Object::Callable(Rc::new(method.bind(instance)))),
            None => Err(LoxError::Runtime {
                message: format!("Undefined property '{}'.", expr.method.lexeme),
                line: Some(expr.method.line),
            }),
        }
    }

    fn check_arity(&self, expected: u8, got: usize, paren: &Token) -> Result<()> {
        if expected as usize != got {
            return Err(LoxError::Runtime {
                message: format!("Expected {expected} arguments but got {got}."),
                line: Some(paren.line),
            });
        }
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{resolver::Resolver, *};
    use crate::{parser::Parser, scanner::Scanner};

    fn run_program(source: &str) -> Result<Interpreter> {
        let (tokens, had_error) = Scanner::new(source.to_string()).scan_tokens();
        assert!(!had_error, "scan error in {source:?}");
        let stmts = Parser::new(tokens).parse()?;
        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter).resolve_all(&stmts)?;
        interpreter.interpret(&stmts)?;
        Ok(interpreter)
    }

    fn global(interpreter: &Interpreter, name: &str) -> Object {
        interpreter
            .globals
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("global '{name}' not defined"))
    }

    fn evaluate_source(source: &str) -> Result<Object> {
        let (tokens, _) = Scanner::new(source.to_string()).scan_tokens();
        let expr = Parser::new(tokens).parse_expression()?;
        Interpreter::new().interpret_expression(&expr)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(evaluate_source("1 + 2 * 3").unwrap(), Object::from(7.0));
        assert_eq!(evaluate_source("(1 + 2) * 3").unwrap(), Object::from(9.0));
    }

    #[test]
    fn string_concatenation() {
        let interpreter = run_program("var a = \"foo\"; var b = \"bar\"; var c = a + b;").unwrap();
        assert_eq!(global(&interpreter, "c"), Object::from("foobar".to_string()));
    }

    #[test]
    fn mixed_plus_is_a_runtime_error() {
        let err = run_program("var a = \"s\" - 1;").unwrap_err();
        assert!(err.to_string().contains("Operands must be numbers."));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = evaluate_source("1 / 0").unwrap_err();
        assert!(err.to_string().contains("Division by zero."));
    }

    #[test]
    fn logical_operators_return_the_operand() {
        let interpreter = run_program("var a = nil or 3; var b = false and 1; var c = 1 and 2;").unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from(3.0));
        assert_eq!(global(&interpreter, "b"), Object::from(false));
        assert_eq!(global(&interpreter, "c"), Object::from(2.0));
    }

    #[test]
    fn assignment_is_an_expression() {
        let interpreter = run_program("var a = 1; var b = (a = 5);").unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from(5.0));
        assert_eq!(global(&interpreter, "b"), Object::from(5.0));
    }

    #[test]
    fn block_scoping_shadows_and_restores() {
        let interpreter = run_program("var x = 1; var seen = 0; { var x = 2; seen = x; }").unwrap();
        assert_eq!(global(&interpreter, "seen"), Object::from(2.0));
        assert_eq!(global(&interpreter, "x"), Object::from(1.0));
    }

    #[test]
    fn environment_is_restored_after_a_runtime_error_in_a_block() {
        let source = "var before = 1; { var shadow = 2; missing; }";
        let (tokens, _) = Scanner::new(source.to_string()).scan_tokens();
        let stmts = Parser::new(tokens).parse().unwrap();
        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter).resolve_all(&stmts).unwrap();
        assert!(interpreter.interpret(&stmts).is_err());

        // The block frame is gone: a fresh define lands in globals
        interpreter
            .environment
            .borrow_mut()
            .define("after".to_string(), Object::from(1.0));
        assert_eq!(global(&interpreter, "after"), Object::from(1.0));
    }

    #[test]
    fn recursive_function() {
        let interpreter =
            run_program("fun f(n) { if (n <= 1) return n; return f(n-1) + f(n-2); } var r = f(10);").unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(55.0));
    }

    #[test]
    fn closures_capture_the_binding_not_the_value() {
        let source = "
            fun makeCounter() {
              var i = 0;
              fun count() { i = i + 1; return i; }
              return count;
            }
            var c = makeCounter();
            var a = c();
            var b = c();
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "a"), Object::from(1.0));
        assert_eq!(global(&interpreter, "b"), Object::from(2.0));
    }

    #[test]
    fn closure_binding_identity_is_fixed_at_declaration() {
        let source = "
            var result = 0;
            {
              var x = 1;
              fun read() { return x; }
              x = 99;
              result = read();
            }
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "result"), Object::from(99.0));
    }

    #[test]
    fn shadowing_resolves_to_the_declaration_scope() {
        let source = "
            var x = \"outer\";
            var seen = nil;
            {
              fun read() { return x; }
              var x = \"inner\";
              seen = read();
            }
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "seen"), Object::from("outer".to_string()));
    }

    #[test]
    fn class_fields_and_this() {
        let source = "
            class Counter {
              init() { this.n = 0; }
              inc() { this.n = this.n + 1; return this; }
            }
            var c = Counter();
            c.inc().inc();
            var n = c.n;
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "n"), Object::from(2.0));
    }

    #[test]
    fn methods_are_inherited() {
        let source = "class A { greet() { return 1; } } class B < A { } var r = B().greet();";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(1.0));
    }

    #[test]
    fn super_calls_the_parent_method() {
        let source = "
            class A { m() { return 1; } }
            class B < A { m() { return super.m() + 1; } }
            var r = B().m();
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(2.0));
    }

    #[test]
    fn initializer_always_yields_the_instance() {
        let source = "
            class F {
              init(n) { this.n = n; if (n > 0) return; this.n = 0; }
            }
            var f = F(5);
            var n = f.n;
            var again = f.init(7);
            var m = again.n;
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "n"), Object::from(5.0));
        // Re-invoking init returns `this`, so `again` is the same instance
        assert_eq!(global(&interpreter, "m"), Object::from(7.0));
        assert_eq!(global(&interpreter, "again"), global(&interpreter, "f"));
    }

    #[test]
    fn fields_shadow_methods() {
        let source = "
            class C { m() { return 1; } }
            var c = C();
            fun two() { return 2; }
            c.m = two;
            var r = c.m();
        ";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(2.0));
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let err = run_program("var x = 1; x();").unwrap_err();
        assert!(err.to_string().contains("Can only call functions and classes."));
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let err = run_program("fun f(a, b) { return a; } f(1);").unwrap_err();
        assert!(err.to_string().contains("Expected 2 arguments but got 1."));
    }

    #[test]
    fn superclass_must_be_a_class() {
        let err = run_program("var A = 1; class B < A { }").unwrap_err();
        assert!(err.to_string().contains("Superclass must be a class."));
    }

    #[test]
    fn undefined_property_is_a_runtime_error() {
        let err = run_program("class C { } var c = C(); c.missing;").unwrap_err();
        assert!(err.to_string().contains("Undefined property 'missing'."));
    }

    #[test]
    fn return_transfer_never_escapes_the_call() {
        // A bare return inside a nested block unwinds only to the call frame
        let source = "fun f() { { return 7; } } var r = f();";
        let interpreter = run_program(source).unwrap();
        assert_eq!(global(&interpreter, "r"), Object::from(7.0));
    }

    #[test]
    fn function_without_return_yields_nil() {
        let interpreter = run_program("fun f() { } var r = f();").unwrap();
        assert_eq!(global(&interpreter, "r"), Object::nil());
    }

    #[test]
    fn clock_is_predefined() {
        let interpreter = run_program("var t = clock();").unwrap();
        assert!(matches!(global(&interpreter, "t"), Object::Literal(_)));
    }
}
