use std::time::SystemTime;

use crate::{Result, interpreter::Interpreter, lox_callable::LoxCallable, object::Object};

/// Wall clock in whole seconds since the Unix epoch.
pub struct LoxClock {}

impl std::fmt::Display for LoxClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native fn>")
    }
}

impl LoxCallable for LoxClock {
    fn call(&self, _interpreter: &mut Interpreter, _arguments: Vec<Object>) -> Result<Object> {
        Ok(Object::from(
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .expect("Unix Epoch was a long damn time ago")
                .as_secs() as f64,
        ))
    }

    fn arity(&self) -> u8 {
        0
    }

    fn name(&self) -> &str {
        "clock"
    }
}
