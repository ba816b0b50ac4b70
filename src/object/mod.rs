use std::cell::RefCell;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

use fnv::FnvHasher;
use indexmap::IndexMap;

use crate::ast::{BlockStatement, Identifier, InfixOperator, PrefixOperator};
use crate::number::Number;
pub use crate::object::environment::Environment;

pub mod builtins;
pub mod environment;

pub type BuiltinFn = fn(Vec<Object>) -> EvalResult;

#[derive(Clone, Debug)]
pub enum Object {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Array(Vec<Object>),
    Hash(IndexMap<HashKey, HashPair>),
    Function(Vec<Identifier>, BlockStatement, Rc<RefCell<Environment>>),
    Builtin(BuiltinFn),
    /// Wrapper that carries a `fero` result out of nested blocks; unwrapped
    /// at program and call boundaries only.
    Return(Box<Object>),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Boolean(true) => write!(f, "sotto"),
            Object::Boolean(false) => write!(f, "mittha"),
            Object::Number(n) => write!(f, "{}", n),
            Object::String(s) => write!(f, "{}", s),
            Object::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Object::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Object::Function(parameters, _, _) => {
                let params: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
                write!(f, "ekti kaj({})", params.join(", "))
            }
            Object::Builtin(_) => write!(f, "builtin function"),
            Object::Return(obj) => write!(f, "{}", obj),
        }
    }
}

impl Object {
    /// Everything except `null` and `mittha` counts as true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Null => false,
            Object::Boolean(b) => *b,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "NULL",
            Object::Boolean(_) => "BOOLEAN",
            Object::Number(_) => "NUMBER",
            Object::String(_) => "STRING",
            Object::Array(_) => "ARRAY",
            Object::Hash(_) => "HASH",
            Object::Function(_, _, _) => "FUNCTION",
            Object::Builtin(_) => "BUILTIN",
            Object::Return(_) => "RETURN_VALUE",
        }
    }
}

/// Functions compare unequal: their identity does not survive cloning, and
/// the language only promises identity semantics for the boolean and null
/// singletons.
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Boolean(l), Object::Boolean(r)) => l == r,
            (Object::Number(l), Object::Number(r)) => l == r,
            (Object::String(l), Object::String(r)) => l == r,
            (Object::Array(l), Object::Array(r)) => l == r,
            (Object::Hash(l), Object::Hash(r)) => l == r,
            (Object::Builtin(l), Object::Builtin(r)) => l == r,
            (Object::Return(l), Object::Return(r)) => l == r,
            _ => false,
        }
    }
}

/// A hashable value collapsed to its type tag plus a 64-bit digest:
/// booleans hash to 1/0, integers to the low 64 bits of their
/// two's-complement value, floats to their IEEE-754 double bit pattern,
/// strings to FNV-1a 64.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum HashKey {
    Boolean(u64),
    Number(u64),
    String(u64),
}

impl HashKey {
    /// `None` for the non-hashable kinds; callers turn that into the
    /// positioned error.
    pub fn from_object(obj: &Object) -> Option<HashKey> {
        match obj {
            Object::Boolean(b) => Some(HashKey::Boolean(u64::from(*b))),
            Object::Number(n) => Some(HashKey::Number(n.hash_digest())),
            Object::String(s) => Some(HashKey::String(fnv1a_64(s))),
            _ => None,
        }
    }
}

fn fnv1a_64(s: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(s.as_bytes());
    hasher.finish()
}

/// The original key object is kept alongside the value so hashes render
/// with what the program wrote, not the digest.
#[derive(Clone, Debug, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

pub type EvalResult = std::result::Result<Object, EvalError>;

/// A runtime failure: the human description plus, when a source token was
/// available, the formatted source line it points at.
#[derive(Debug)]
pub struct EvalError {
    hint: String,
    pub kind: EvalErrorKind,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, hint: String) -> EvalError {
        EvalError { hint, kind }
    }

    pub fn bare(kind: EvalErrorKind) -> EvalError {
        EvalError {
            hint: String::new(),
            kind,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.hint.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}\n{}", self.hint, self.kind)
        }
    }
}

#[derive(Debug)]
pub enum EvalErrorKind {
    IdentifierNotFound(String),
    TypeMismatch(InfixOperator, &'static str, &'static str),
    UnknownInfixOperator(InfixOperator, &'static str, &'static str),
    UnknownPrefixOperator(PrefixOperator, &'static str),
    UnsupportedIndexOperator(&'static str),
    UnusableHashKey(&'static str),
    InvalidArrayIndex,
    WrongArgumentCount { expected: usize, given: usize },
    NotCallable(&'static str),
    DivisionByZero,
    UnsupportedArguments(&'static str, String),
    InvalidIncludeFilename(String),
    IncludeNotFound(String),
    IncludeUnreadable(String),
    IncludeParseErrors,
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalErrorKind::IdentifierNotFound(name) => write!(f, "id not found: {}", name),
            EvalErrorKind::TypeMismatch(op, left, right) => {
                write!(f, "Type mismatch: {} {} {}", left, op, right)
            }
            EvalErrorKind::UnknownInfixOperator(op, left, right) => {
                write!(f, "unknown Operator: {} {} {}", left, op, right)
            }
            EvalErrorKind::UnknownPrefixOperator(op, right) => {
                write!(f, "unknown Operator: {}{}", op, right)
            }
            EvalErrorKind::UnsupportedIndexOperator(left) => {
                write!(f, "Unsupported Index Operator {}", left)
            }
            EvalErrorKind::UnusableHashKey(key) => {
                write!(f, "object cannot be used as hash key {}", key)
            }
            EvalErrorKind::InvalidArrayIndex => write!(f, "array index is not a valid integer"),
            EvalErrorKind::WrongArgumentCount { expected, given } => write!(
                f,
                "Function call doesn't have required arguments provided; wanted = {} but got {}",
                expected, given
            ),
            EvalErrorKind::NotCallable(callee) => write!(f, "{} is not a function", callee),
            EvalErrorKind::DivisionByZero => write!(f, "Division by zero"),
            EvalErrorKind::UnsupportedArguments(function, args) => {
                write!(f, "argument to `{}` not supported, got {}", function, args)
            }
            EvalErrorKind::InvalidIncludeFilename(value) => {
                write!(f, "include filename is invalid {}", value)
            }
            EvalErrorKind::IncludeNotFound(path) => {
                write!(f, "{} include file does not exist", path)
            }
            EvalErrorKind::IncludeUnreadable(path) => {
                write!(f, "Failed to read include file {}", path)
            }
            EvalErrorKind::IncludeParseErrors => write!(f, "Include file contains parsing errors"),
        }
    }
}

pub fn assert_argument_count(expected: usize, arguments: &[Object]) -> Result<(), EvalError> {
    if arguments.len() != expected {
        return Err(EvalError::bare(EvalErrorKind::WrongArgumentCount {
            expected,
            given: arguments.len(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(literal: &str) -> Object {
        Object::Number(Number::from_literal(literal).unwrap())
    }

    #[test]
    fn equality() {
        assert_eq!(num("1"), num("1"));
        assert_eq!(num("5"), num("5.0"));
        assert_eq!(
            Object::String("hello".to_string()),
            Object::String("hello".to_string())
        );
        assert_ne!(num("1"), num("2"));
        assert_ne!(Object::String("1".to_string()), num("1"));
        assert_ne!(Object::Null, Object::Boolean(false));
    }

    #[test]
    fn inspect_rendering() {
        assert_eq!("null", Object::Null.to_string());
        assert_eq!("sotto", Object::Boolean(true).to_string());
        assert_eq!("mittha", Object::Boolean(false).to_string());
        assert_eq!("3.14", num("3.14").to_string());
        assert_eq!("khela", Object::String("khela".to_string()).to_string());
        assert_eq!(
            "[1, 2]",
            Object::Array(vec![num("1"), num("2")]).to_string()
        );
    }

    #[test]
    fn hash_inspect_preserves_insertion_order() {
        let mut pairs = IndexMap::new();
        for (k, v) in [("ek", "1"), ("dui", "2")] {
            let key = Object::String(k.to_string());
            pairs.insert(
                HashKey::from_object(&key).unwrap(),
                HashPair {
                    key,
                    value: num(v),
                },
            );
        }
        assert_eq!("{ek: 1, dui: 2}", Object::Hash(pairs).to_string());
    }

    #[test]
    fn equal_objects_share_hash_keys() {
        let pairs = vec![
            (num("5"), num("5")),
            (Object::Boolean(true), Object::Boolean(true)),
            (
                Object::String("chabi".to_string()),
                Object::String("chabi".to_string()),
            ),
        ];
        for (a, b) in pairs {
            assert_eq!(a, b);
            assert_eq!(HashKey::from_object(&a), HashKey::from_object(&b));
        }
    }

    #[test]
    fn hash_key_kinds_do_not_collide() {
        let one = HashKey::from_object(&num("1")).unwrap();
        let yes = HashKey::from_object(&Object::Boolean(true)).unwrap();
        assert_ne!(one, yes);
    }

    #[test]
    fn only_scalars_are_hashable() {
        assert!(HashKey::from_object(&Object::Array(vec![])).is_none());
        assert!(HashKey::from_object(&Object::Null).is_none());
        assert!(HashKey::from_object(&num("7")).is_some());
    }

    #[test]
    fn string_digest_is_fnv1a() {
        // FNV-1a 64 offset basis: digest of the empty string.
        assert_eq!(
            Some(HashKey::String(0xcbf2_9ce4_8422_2325)),
            HashKey::from_object(&Object::String(String::new()))
        );
    }

    #[test]
    fn error_message_shapes() {
        let bare = EvalError::bare(EvalErrorKind::DivisionByZero);
        assert_eq!("Division by zero", bare.to_string());

        let positioned = EvalError::new(
            EvalErrorKind::IdentifierNotFound("phol".to_string()),
            "1|  --> phol <-- ;".to_string(),
        );
        assert_eq!("1|  --> phol <-- ;\nid not found: phol", positioned.to_string());
    }
}
