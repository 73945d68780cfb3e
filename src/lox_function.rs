use std::rc::Rc;

use crate::{
    LoxError, Result,
    interpreter::{
        Interpreter,
        environment::{Environment, RcCell},
    },
    lox_callable::LoxCallable,
    lox_instance::LoxInstance,
    object::Object,
    stmt::Function,
};

#[derive(Clone)]
pub struct LoxFunction {
    declaration: Function,
    closure: RcCell<Environment>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Function, closure: RcCell<Environment>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Produces a copy whose closure is a fresh frame binding `this` to the
    /// receiver, in front of the original closure.
    pub fn bind(&self, instance: RcCell<LoxInstance>) -> LoxFunction {
        let environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment
            .borrow_mut()
            .define("this".to_string(), Object::Instance(instance));
        LoxFunction::new(self.declaration.clone(), environment, self.is_initializer)
    }
}

impl std::fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

impl std::fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

impl LoxCallable for LoxFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object> {
        let environment = Environment::with_enclosing(Rc::clone(&self.closure));
        {
            let mut frame = environment.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                frame.define(param.lexeme.clone(), argument);
            }
        }

        // A `return` anywhere in the body surfaces here and nowhere else
        let value = match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => Object::nil(),
            Err(LoxError::Return { value }) => value,
            Err(other) => return Err(other),
        };

        if self.is_initializer {
            // An initializer always yields the instance, whatever the body
            // returned
            return Environment::get_at(&self.closure, 0, "this");
        }
        Ok(value)
    }

    fn arity(&self) -> u8 {
        self.declaration.params.len() as u8
    }

    fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
}
