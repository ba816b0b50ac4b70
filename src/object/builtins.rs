use std::collections::HashMap;

use num_bigint::BigInt;

use crate::number::Number;
use crate::object::{assert_argument_count, BuiltinFn, EvalError, EvalErrorKind, EvalResult, Object};

/// Name → native function mapping, installed before evaluation and
/// immutable while it runs. Builtins validate their own arguments and
/// surface misuse as error values.
pub struct BuiltinRegistry {
    entries: HashMap<String, BuiltinFn>,
}

impl BuiltinRegistry {
    pub fn empty() -> BuiltinRegistry {
        BuiltinRegistry {
            entries: HashMap::new(),
        }
    }

    /// The stock set shipped with the interpreter.
    pub fn standard() -> BuiltinRegistry {
        let mut registry = BuiltinRegistry::empty();
        registry.register("len", len);
        registry.register("first", first);
        registry.register("last", last);
        registry.register("rest", rest);
        registry.register("push", push);
        registry
    }

    pub fn register(&mut self, name: &str, function: BuiltinFn) {
        self.entries.insert(name.to_string(), function);
    }

    pub fn lookup(&self, name: &str) -> Option<Object> {
        self.entries.get(name).map(|f| Object::Builtin(*f))
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        BuiltinRegistry::standard()
    }
}

fn unsupported(name: &'static str, args: &[Object]) -> EvalError {
    let types: Vec<&str> = args.iter().map(|a| a.type_name()).collect();
    EvalError::bare(EvalErrorKind::UnsupportedArguments(name, types.join(", ")))
}

fn int(value: usize) -> Object {
    Object::Number(Number::Int(BigInt::from(value)))
}

fn len(args: Vec<Object>) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::String(s) => Ok(int(s.chars().count())),
        Object::Array(elements) => Ok(int(elements.len())),
        Object::Hash(pairs) => Ok(int(pairs.len())),
        _ => Err(unsupported("len", &args)),
    }
}

fn first(args: Vec<Object>) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::Array(elements) => Ok(elements.first().cloned().unwrap_or(Object::Null)),
        _ => Err(unsupported("first", &args)),
    }
}

fn last(args: Vec<Object>) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::Array(elements) => Ok(elements.last().cloned().unwrap_or(Object::Null)),
        _ => Err(unsupported("last", &args)),
    }
}

fn rest(args: Vec<Object>) -> EvalResult {
    assert_argument_count(1, &args)?;

    match &args[0] {
        Object::Array(elements) => Ok(if elements.is_empty() {
            Object::Null
        } else {
            Object::Array(elements[1..].to_vec())
        }),
        _ => Err(unsupported("rest", &args)),
    }
}

fn push(args: Vec<Object>) -> EvalResult {
    assert_argument_count(2, &args)?;

    match &args[0] {
        Object::Array(elements) => {
            let mut new_elements = elements.clone();
            new_elements.push(args[1].clone());
            Ok(Object::Array(new_elements))
        }
        _ => Err(unsupported("push", &args)),
    }
}
