use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    LoxError, Result,
    interpreter::environment::RcCell,
    lox_class::LoxClass,
    object::Object,
    token::Token,
};

#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Object>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> RcCell<LoxInstance> {
        Rc::new(RefCell::new(Self {
            class,
            fields: HashMap::new(),
        }))
    }

    /// Property read: fields shadow methods; a method hit is bound to this
    /// instance, which is why the shared handle is the receiver here.
    pub fn get(instance: &RcCell<LoxInstance>, name: &Token) -> Result<Object> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = instance.borrow().class.find_method(&name.lexeme);
        match method {
            Some(method) => Ok(Object::Callable(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(LoxError::Runtime {
                message: format!("Undefined property '{}'.", name.lexeme),
                line: Some(name.line),
            }),
        }
    }

    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }
}

impl std::fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} instance", self.class)
    }
}
