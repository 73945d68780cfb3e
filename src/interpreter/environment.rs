use std::{
    cell::RefCell,
    collections::{HashMap, hash_map::Entry},
    rc::Rc,
};

use tracing::trace;

use crate::{LoxError, Result, object::Object, token::Token};

pub type RcCell<T> = Rc<RefCell<T>>;

/// One lexical scope frame. Frames are shared: blocks, closures and bound
/// methods all hold `Rc`s into the same chain, so cycles through closures
/// live until the process exits.
#[derive(Debug, Default)]
pub struct Environment {
    pub values: HashMap<String, Object>,
    pub enclosing: Option<RcCell<Environment>>,
}

impl Environment {
    pub fn new() -> RcCell<Environment> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_enclosing(enclosing: RcCell<Environment>) -> RcCell<Environment> {
        trace!(new_top = ?enclosing.borrow().values, "with_enclosing");
        Rc::new(RefCell::new(Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    /// Inserts or overwrites in this frame, shadowing any enclosing binding.
    pub fn define(&mut self, name: String, value: Object) {
        trace!(?name, ?value, "defining");
        self.values.insert(name, value);
    }

    /// Walks up the chain looking for an existing binding to overwrite.
    pub fn assign(&mut self, name: &Token, value: Object) -> Result<()> {
        match self.values.entry(name.lexeme.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                Ok(())
            }
            Entry::Vacant(_) => match &self.enclosing {
                Some(outer) => outer.borrow_mut().assign(name, value),
                None => Err(undefined(name)),
            },
        }
    }

    pub fn get(&self, name: &Token) -> Result<Object> {
        match self.values.get(&name.lexeme) {
            Some(val) => Ok(val.clone()),
            None => match &self.enclosing {
                Some(outer) => outer.borrow().get(name),
                None => Err(undefined(name)),
            },
        }
    }

    /// Looks up strictly in the frame `distance` hops up the chain; the
    /// resolver has already proven the binding is there.
    pub fn get_at(env: &RcCell<Environment>, distance: u32, key: &str) -> Result<Object> {
        trace!(distance, key, "get_at");
        let frame = Self::ancestor(env, distance);
        let value = frame.borrow().values.get(key).cloned();
        value.ok_or_else(|| LoxError::Internal {
            message: format!("Expected variable '{key}' at distance {distance}"),
        })
    }

    pub fn assign_at(env: &RcCell<Environment>, distance: u32, name: &Token, value: Object) {
        trace!(distance, name = %name.lexeme, ?value, "assign_at");
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.lexeme.clone(), value);
    }

    fn ancestor(env: &RcCell<Environment>, distance: u32) -> RcCell<Environment> {
        let mut env = Rc::clone(env);
        for _ in 0..distance {
            let next = env
                .borrow()
                .enclosing
                .as_ref()
                .map(Rc::clone)
                .expect("Should have had an enclosing scope");
            env = next;
        }
        env
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::Runtime {
        message: format!("Undefined variable '{}'.", name.lexeme),
        line: Some(name.line),
    }
}
