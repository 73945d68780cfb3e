use std::collections::HashMap;

use snafu::whatever;
use tracing::trace;

use super::Interpreter;
use crate::{
    LoxError, Result,
    expr::{self, Expr},
    stmt::{self, Stmt},
    token::Token,
};

/// Static analysis pass: pins every variable-use site to a scope distance
/// and rejects the handful of constructs that are only detectable before
/// execution. Does not mutate the AST; distances land in the interpreter.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    scopes: Vec<HashMap<String, bool>>,
    curr_fn: FunctionType,
    curr_class: ClassType,
}

#[derive(Clone, Copy)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Clone, Copy)]
enum ClassType {
    None,
    Class,
    Subclass,
}

impl<'a> Resolver<'a> {
    pub fn new(interpreter: &'a mut Interpreter) -> Self {
        Self {
            interpreter,
            scopes: vec![],
            curr_fn: FunctionType::None,
            curr_class: ClassType::None,
        }
    }

    /// Top-level entry: each statement's errors are reported as they are
    /// found and analysis keeps going, so one bad statement doesn't hide
    /// the rest.
    pub fn resolve_all(&mut self, statements: &[Stmt]) -> Result<()> {
        let mut had_error = false;
        for statement in statements {
            if let Err(err) = self.resolve_stmt(statement) {
                had_error = true;
                eprintln!("{err}");
            }
        }

        if had_error {
            whatever!("One or more errors during static analysis")
        }
        Ok(())
    }
}

// Expressions
impl Resolver<'_> {
    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        trace!(?expr, "Resolving expression");
        match expr {
            Expr::Variable(var) => self.resolve_variable(var)?,
            Expr::Assign(assign) => {
                self.resolve_expr(&assign.value)?;
                self.resolve_local(assign.id, &assign.name)?;
            }
            Expr::Binary(binary) => {
                self.resolve_expr(&binary.left)?;
                self.resolve_expr(&binary.right)?;
            }
            Expr::Call(call) => {
                self.resolve_expr(&call.callee)?;
                for arg in call.arguments.iter() {
                    self.resolve_expr(arg)?;
                }
            }
            Expr::Get(get) => {
                // Properties are late-bound; only the object resolves
                self.resolve_expr(&get.object)?;
            }
            Expr::Set(set) => {
                self.resolve_expr(&set.value)?;
                self.resolve_expr(&set.object)?;
            }
            Expr::Grouping(group) => {
                self.resolve_expr(&group.expression)?;
            }
            Expr::Literal(_) => (),
            Expr::Logical(logic) => {
                self.resolve_expr(&logic.left)?;
                self.resolve_expr(&logic.right)?;
            }
            Expr::Unary(unary) => self.resolve_expr(&unary.right)?,
            Expr::This(this) => {
                if let ClassType::None = self.curr_class {
                    return Err(LoxError::at(&this.keyword, "Can't use 'this' outside of a class."));
                }
                self.resolve_local(this.id, &this.keyword)?;
            }
            Expr::Super(sup) => match self.curr_class {
                ClassType::None => {
                    return Err(LoxError::at(&sup.keyword, "Can't use 'super' outside of a class."));
                }
                ClassType::Class => {
                    return Err(LoxError::at(
                        &sup.keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                }
                ClassType::Subclass => self.resolve_local(sup.id, &sup.keyword)?,
            },
        }
        Ok(())
    }

    fn resolve_variable(&mut self, var: &expr::Variable) -> Result<()> {
        if let Some(peeked) = self.scopes.last() {
            if peeked.get(&var.name.lexeme) == Some(&false) {
                return Err(LoxError::at(
                    &var.name,
                    "Can't read local variable in its own initializer.",
                ));
            }
        }

        self.resolve_local(var.id, &var.name)
    }
}

// Statements
impl Resolver<'_> {
    fn resolve_stmt(&mut self, statement: &Stmt) -> Result<()> {
        trace!(?statement, "Resolving statement");
        match statement {
            Stmt::Var(var) => {
                self.declare(&var.name)?;
                if let Some(initializer) = &var.initializer {
                    self.resolve_expr(initializer)?;
                }
                self.define(&var.name.lexeme);
            }
            Stmt::Function(func) => {
                self.declare(&func.name)?;
                self.define(&func.name.lexeme);

                self.resolve_func(func, FunctionType::Function)?;
            }
            Stmt::Expression(expr) => self.resolve_expr(&expr.expression)?,
            Stmt::If(stmt) => {
                self.resolve_expr(&stmt.condition)?;
                self.resolve_stmt(&stmt.then_branch)?;
                if let Some(else_branch) = &stmt.else_branch {
                    self.resolve_stmt(else_branch)?;
                }
            }
            Stmt::Print(stmt) => {
                self.resolve_expr(&stmt.expression)?;
            }
            Stmt::Return(stmt) => {
                if let FunctionType::None = self.curr_fn {
                    return Err(LoxError::at(&stmt.keyword, "Can't return from top-level code."));
                }
                if let Some(val) = &stmt.value {
                    if let FunctionType::Initializer = self.curr_fn {
                        return Err(LoxError::at(
                            &stmt.keyword,
                            "Can't return a value from an initializer.",
                        ));
                    }
                    self.resolve_expr(val)?;
                }
            }
            Stmt::While(stmt) => {
                self.resolve_expr(&stmt.condition)?;
                self.resolve_stmt(&stmt.body)?;
            }
            Stmt::Block(block) => {
                self.begin_scope();
                let result = block.statements.iter().try_for_each(|s| self.resolve_stmt(s));
                self.end_scope()?;
                result?;
            }
            Stmt::Class(stmt) => self.resolve_class(stmt)?,
        }
        Ok(())
    }

    fn resolve_class(&mut self, stmt: &stmt::Class) -> Result<()> {
        let enclosing_class = self.curr_class;
        self.curr_class = ClassType::Class;

        self.declare(&stmt.name)?;
        self.define(&stmt.name.lexeme);

        if let Some(superclass) = &stmt.superclass {
            if superclass.name.lexeme == stmt.name.lexeme {
                self.curr_class = enclosing_class;
                return Err(LoxError::at(&superclass.name, "A class can't inherit from itself."));
            }
            self.curr_class = ClassType::Subclass;
            self.resolve_variable(superclass)?;

            self.begin_scope();
            self.define("super");
        }

        self.begin_scope();
        self.define("this");

        let mut result = Ok(());
        for method in stmt.methods.iter() {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            result = self.resolve_func(method, declaration);
            if result.is_err() {
                break;
            }
        }

        self.end_scope()?;
        if stmt.superclass.is_some() {
            self.end_scope()?;
        }
        self.curr_class = enclosing_class;
        result
    }

    fn resolve_func(&mut self, func: &stmt::Function, typ: FunctionType) -> Result<()> {
        let enclosing_fn = self.curr_fn;
        self.curr_fn = typ;
        self.begin_scope();
        let mut result = Ok(());
        for param in func.params.iter() {
            result = self.declare(param);
            if result.is_err() {
                break;
            }
            self.define(&param.lexeme);
        }
        if result.is_ok() {
            result = func.body.iter().try_for_each(|s| self.resolve_stmt(s));
        }
        self.end_scope()?;
        self.curr_fn = enclosing_fn;
        result
    }
}

// Helpers
impl Resolver<'_> {
    fn begin_scope(&mut self) {
        trace!(len = self.scopes.len(), "Beginning scope");
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) -> Result<()> {
        trace!(len = self.scopes.len(), "Ending scope");
        if self.scopes.pop().is_none() {
            whatever!("Ended a scope when there was no stack")
        }
        Ok(())
    }

    /// Marks the name as declared-but-not-ready in the innermost scope. The
    /// global scope stays unchecked; globals are late-bound.
    fn declare(&mut self, name: &Token) -> Result<()> {
        trace!(name = %name.lexeme, len = self.scopes.len(), "Declaring");
        if let Some(peeked) = self.scopes.last_mut() {
            if peeked.contains_key(&name.lexeme) {
                return Err(LoxError::at(
                    name,
                    "Already a variable with this name in this scope.",
                ));
            }
            peeked.insert(name.lexeme.clone(), false);
        }
        Ok(())
    }

    fn define(&mut self, name: &str) {
        trace!(name, len = self.scopes.len(), "Defining");
        if let Some(peeked) = self.scopes.last_mut() {
            peeked.insert(name.to_string(), true);
        }
    }

    /// Walks scopes innermost-out; the first hit fixes the distance for
    /// this use site. No hit means the name is global.
    fn resolve_local(&mut self, id: usize, token: &Token) -> Result<()> {
        trace!(?token, len = self.scopes.len(), "Resolving local");
        let top = self.scopes.len();
        for i in (0..top).rev() {
            if self.scopes[i].contains_key(&token.lexeme) {
                let depth = (top - 1 - i).try_into();
                let depth = whatever!(depth, "Scope depth overflowed");
                self.interpreter.resolve(id, depth);
                return Ok(());
            }
        }

        Ok(())
    }
}
