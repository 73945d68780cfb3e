use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::{
    LoxError,
    interpreter::environment::RcCell,
    lox_callable::LoxCallable,
    lox_class::LoxClass,
    lox_instance::LoxInstance,
    token::Token,
};

/// Compile-time constant attached to a token (`NUMBER` and `STRING` tokens)
/// or spelled directly in the source (`true`, `false`, `nil`).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "nil"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A runtime value. Literals are value-typed; callables, classes and
/// instances are shared behind `Rc` so closures and fields can alias them.
#[derive(Clone)]
pub enum Object {
    Literal(Literal),
    Callable(Rc<dyn LoxCallable>),
    Class(Rc<LoxClass>),
    Instance(RcCell<LoxInstance>),
}

impl Object {
    pub fn nil() -> Object {
        Object::Literal(Literal::Null)
    }

    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Literal(Literal::Null) => false,
            Object::Literal(Literal::Boolean(b)) => *b,
            _ => true,
        }
    }

    pub fn into_number(self) -> Result<f64, ObjectRuntimeError> {
        match self {
            Object::Literal(Literal::Number(n)) => Ok(n.into_inner()),
            _ => Err(ObjectRuntimeError {
                message: "Operand must be a number.".to_string(),
            }),
        }
    }
}

/// Both operands of a comparison must be numbers.
pub fn number_operands(left: &Object, right: &Object) -> Result<(f64, f64), ObjectRuntimeError> {
    match (left, right) {
        (Object::Literal(Literal::Number(l)), Object::Literal(Literal::Number(r))) => {
            Ok((l.into_inner(), r.into_inner()))
        }
        _ => Err(ObjectRuntimeError {
            message: "Operands must be numbers.".to_string(),
        }),
    }
}

/// Renders `n` with at least one fractional digit, as the `tokenize` and
/// `parse` subcommands show number literals.
pub fn decimal(n: f64) -> String {
    if n.fract() == 0.0 { format!("{n:.1}") } else { format!("{n}") }
}

/// A type error raised by a value operation, before it has a source line
/// attached. The evaluator converts it with the operator token in hand.
#[derive(Debug)]
pub struct ObjectRuntimeError {
    pub message: String,
}

impl ObjectRuntimeError {
    pub fn into_lox(self, token: &Token) -> LoxError {
        LoxError::Runtime {
            message: self.message,
            line: Some(token.line),
        }
    }
}

impl std::ops::Add for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn add(self, rhs: Object) -> Self::Output {
        match (self, rhs) {
            (Object::Literal(Literal::Number(l)), Object::Literal(Literal::Number(r))) => {
                Ok(Object::Literal(Literal::Number(l + r)))
            }
            (Object::Literal(Literal::String(l)), Object::Literal(Literal::String(r))) => {
                Ok(Object::Literal(Literal::String(format!("{l}{r}"))))
            }
            _ => Err(ObjectRuntimeError {
                message: "Operands must be two numbers or two strings.".to_string(),
            }),
        }
    }
}

impl std::ops::Sub for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn sub(self, rhs: Object) -> Self::Output {
        let (l, r) = number_operands(&self, &rhs)?;
        Ok(Object::from(l - r))
    }
}

impl std::ops::Mul for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn mul(self, rhs: Object) -> Self::Output {
        let (l, r) = number_operands(&self, &rhs)?;
        Ok(Object::from(l * r))
    }
}

impl std::ops::Div for Object {
    type Output = Result<Object, ObjectRuntimeError>;

    fn div(self, rhs: Object) -> Self::Output {
        let (l, r) = number_operands(&self, &rhs)?;
        if r == 0.0 {
            return Err(ObjectRuntimeError {
                message: "Division by zero.".to_string(),
            });
        }
        Ok(Object::from(l / r))
    }
}

/// Lox equality: `nil` only equals `nil`, otherwise same type with equal
/// value. Callables, classes and instances compare by identity.
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Literal(l), Object::Literal(r)) => l == r,
            (Object::Callable(l), Object::Callable(r)) => Rc::ptr_eq(l, r),
            (Object::Class(l), Object::Class(r)) => Rc::ptr_eq(l, r),
            (Object::Instance(l), Object::Instance(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::Literal(Literal::String(value))
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Literal(Literal::Number(OrderedFloat(value)))
    }
}

impl From<()> for Object {
    fn from(_value: ()) -> Self {
        Object::Literal(Literal::Null)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Literal(Literal::Boolean(value))
    }
}

impl From<Literal> for Object {
    fn from(value: Literal) -> Self {
        Object::Literal(value)
    }
}

impl From<()> for Literal {
    fn from(_value: ()) -> Self {
        Literal::Null
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Callable(callable) => write!(f, "{callable}"),
            Self::Class(class) => write!(f, "{class}"),
            Self::Instance(instance) => write!(f, "{}", instance.borrow()),
        }
    }
}

// Hand-written so a cyclic closure capture can't send Debug into the
// environment graph and recurse forever.
impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{literal:?}"),
            Self::Callable(callable) => write!(f, "<fn {}>", callable.name()),
            Self::Class(class) => write!(f, "<class {}>", class.name),
            Self::Instance(instance) => write!(f, "<{} instance>", instance.borrow().class_name()),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn addition_concatenates_strings() {
        let sum = (Object::from("foo".to_string()) + Object::from("bar".to_string())).unwrap();
        assert_eq!(sum, Object::from("foobar".to_string()));
    }

    #[test]
    fn addition_rejects_mixed_operands() {
        let err = (Object::from("s".to_string()) + Object::from(1.0)).unwrap_err();
        assert_eq!(err.message, "Operands must be two numbers or two strings.");
    }

    #[test]
    fn subtraction_requires_numbers() {
        let err = (Object::from("s".to_string()) - Object::from(1.0)).unwrap_err();
        assert_eq!(err.message, "Operands must be numbers.");
        assert_eq!((Object::from(3.0) - Object::from(1.0)).unwrap(), Object::from(2.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = (Object::from(1.0) / Object::from(0.0)).unwrap_err();
        assert_eq!(err.message, "Division by zero.");
    }

    #[test]
    fn equality_never_crosses_types() {
        assert_eq!(Object::nil(), Object::nil());
        assert_ne!(Object::from(0.0), Object::from(false));
        assert_ne!(Object::from("1".to_string()), Object::from(1.0));
        assert_eq!(Object::from(2.0), Object::from(2.0));
    }

    #[test]
    fn truthiness() {
        assert!(!Object::nil().is_truthy());
        assert!(!Object::from(false).is_truthy());
        assert!(Object::from(0.0).is_truthy());
        assert!(Object::from(String::new()).is_truthy());
    }

    #[test]
    fn decimal_repr_keeps_a_fractional_digit() {
        assert_eq!(decimal(1.0), "1.0");
        assert_eq!(decimal(45.67), "45.67");
        assert_eq!(decimal(0.0), "0.0");
    }

    #[test]
    fn display_drops_trailing_zero() {
        assert_eq!(Object::from(7.0).to_string(), "7");
        assert_eq!(Object::from(2.5).to_string(), "2.5");
        assert_eq!(Object::nil().to_string(), "nil");
    }
}
