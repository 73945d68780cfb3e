use std::{collections::HashMap, rc::Rc};

use crate::{
    Result,
    interpreter::Interpreter,
    lox_callable::LoxCallable,
    lox_function::LoxFunction,
    lox_instance::LoxInstance,
    object::Object,
};

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    pub fn new(name: String, superclass: Option<Rc<LoxClass>>, methods: HashMap<String, LoxFunction>) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Own methods shadow inherited ones; otherwise the lookup climbs the
    /// superclass chain.
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A class is called like a function: allocate an instance, then run
    /// `init` bound to it with the call's arguments.
    pub fn instantiate(class: &Rc<LoxClass>, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object> {
        let instance = LoxInstance::new(Rc::clone(class));
        if let Some(initializer) = class.find_method("init") {
            initializer.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }
        Ok(Object::Instance(instance))
    }

    pub fn arity(&self) -> u8 {
        self.find_method("init").map_or(0, |initializer| initializer.arity())
    }
}

impl std::fmt::Display for LoxClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
