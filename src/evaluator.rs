use std::cell::RefCell;
use std::fs;
use std::io;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::ast::{
    BlockStatement, Expression, Identifier, InfixOperator, PrefixOperator, Program, Statement,
};
use crate::lexer::Lexer;
use crate::number::Number;
use crate::object::builtins::BuiltinRegistry;
use crate::object::{
    Environment, EvalError, EvalErrorKind, EvalResult, HashKey, HashPair, Object,
};
use crate::parser::Parser;
use crate::token::{make_error_line, Token};

/// A lexical frame shared between the evaluator and every closure that
/// captured it.
pub type Env = Rc<RefCell<Environment>>;

pub fn new_env() -> Env {
    Rc::new(RefCell::new(Environment::new()))
}

/// Formats source-position hints for runtime errors. Built once per source
/// text; included files get their own so hints index the right lines.
pub struct ErrorHelper {
    lines: Vec<String>,
}

impl ErrorHelper {
    pub fn new(source: &str) -> ErrorHelper {
        ErrorHelper {
            lines: source.lines().map(str::to_owned).collect(),
        }
    }

    pub fn get_line(&self, n: usize) -> &str {
        n.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map_or("", String::as_str)
    }

    pub fn make_error_line(&self, token: &Token, show_hint: bool) -> String {
        make_error_line(token, self.get_line(token.line), show_hint)
    }
}

#[derive(Debug)]
pub enum LoadError {
    NotFound,
    Io(io::Error),
}

/// Resolves `anoo` paths to source text. The evaluator never touches the
/// filesystem directly, so hosts (and tests) can substitute their own.
pub trait SourceLoader {
    fn load(&self, path: &str) -> Result<String, LoadError>;
}

pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        fs::read_to_string(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                LoadError::NotFound
            } else {
                LoadError::Io(err)
            }
        })
    }
}

/// Everything an evaluation run needs besides the environment and the
/// print buffer: position formatting, include loading, builtin lookup.
pub struct EvalContext<'a> {
    pub helper: ErrorHelper,
    pub loader: &'a dyn SourceLoader,
    pub builtins: &'a BuiltinRegistry,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        source: &str,
        loader: &'a dyn SourceLoader,
        builtins: &'a BuiltinRegistry,
    ) -> EvalContext<'a> {
        EvalContext {
            helper: ErrorHelper::new(source),
            loader,
            builtins,
        }
    }

    /// Error with the offending span marked in the quoted line.
    fn hinted(&self, token: &Token, kind: EvalErrorKind) -> EvalError {
        EvalError::new(kind, self.helper.make_error_line(token, true))
    }

    /// Error quoting the line without span markers.
    fn positioned(&self, token: &Token, kind: EvalErrorKind) -> EvalError {
        EvalError::new(kind, self.helper.make_error_line(token, false))
    }
}

pub fn eval(program: &Program, env: &Env, ctx: &EvalContext, out: &mut String) -> EvalResult {
    let mut result = Object::Null;

    for statement in &program.statements {
        result = eval_statement(statement, env, ctx, out)?;

        if let Object::Return(value) = result {
            return Ok(*value);
        }
    }

    Ok(result)
}

fn eval_block_statement(
    block: &BlockStatement,
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    let mut res = Object::Null;

    for statement in &block.statements {
        res = eval_statement(statement, env, ctx, out)?;

        if let Object::Return(_) = res {
            // Don't unwrap it here - want to propagate it back up the call stack
            return Ok(res);
        }
    }

    Ok(res)
}

fn eval_statement(
    statement: &Statement,
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    match statement {
        Statement::Expression(expr) => eval_expression(expr, env, ctx, out),
        Statement::Return { value, .. } => {
            let result = eval_expression(value, env, ctx, out)?;
            Ok(Object::Return(Box::new(result)))
        }
        Statement::Let { name, value, .. } => {
            let result = eval_expression(value, env, ctx, out)?;
            env.borrow_mut().set(&name.value, result);
            Ok(Object::Null)
        }
        Statement::Show { values, .. } => eval_show_statement(values, env, ctx, out),
        Statement::Include { token, filename } => {
            eval_include_statement(token, filename, env, ctx, out)
        }
        Statement::Comment { .. } => Ok(Object::Null),
    }
}

/// Each `dekhao` appends one `\n`-terminated line: the arguments'
/// renderings joined with no separator.
fn eval_show_statement(
    values: &[Expression],
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    let args = eval_expressions(values, env, ctx, out)?;

    for arg in &args {
        out.push_str(&arg.to_string());
    }
    out.push('\n');

    Ok(Object::Null)
}

fn eval_include_statement(
    token: &Token,
    filename: &Expression,
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    let raw = eval_expression(filename, env, ctx, out)?;

    let path = match &raw {
        Object::String(path) => path.clone(),
        _ => {
            return Err(ctx.hinted(
                filename.token(),
                EvalErrorKind::InvalidIncludeFilename(raw.to_string()),
            ))
        }
    };

    debug!("including source file {}", path);

    let source = match ctx.loader.load(&path) {
        Ok(source) => source,
        Err(LoadError::NotFound) => {
            return Err(ctx.hinted(token, EvalErrorKind::IncludeNotFound(path)))
        }
        Err(LoadError::Io(_)) => {
            return Err(ctx.hinted(filename.token(), EvalErrorKind::IncludeUnreadable(path)))
        }
    };

    let lexer = Lexer::new(&source);
    let mut parser = Parser::new(lexer);
    let program = parser.parse_program();

    if !parser.errors().is_empty() {
        return Err(ctx.hinted(filename.token(), EvalErrorKind::IncludeParseErrors));
    }

    let included_env = new_env();
    let included_ctx = EvalContext::new(&source, ctx.loader, ctx.builtins);
    eval(&program, &included_env, &included_ctx, out)?;

    // Splice: the current frame becomes a fresh one enclosed by the
    // included file's top level. Closures holding this frame observe the
    // swap, and bindings made before the include are gone with it.
    *env.borrow_mut() = Environment::extend(included_env);

    Ok(Object::Null)
}

fn eval_expression(
    expression: &Expression,
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    match expression {
        Expression::NumberLiteral { value, .. } => Ok(Object::Number(value.clone())),
        Expression::StringLiteral { value, .. } => Ok(Object::String(value.clone())),
        Expression::Boolean { value, .. } => Ok(Object::Boolean(*value)),
        Expression::Identifier(id) => eval_identifier(id, env, ctx),
        Expression::Prefix {
            operator, right, ..
        } => {
            let obj = eval_expression(right, env, ctx, out)?;
            eval_prefix_expression(*operator, obj)
        }
        Expression::Infix {
            operator,
            left,
            right,
            ..
        } => {
            let left_obj = eval_expression(left, env, ctx, out)?;
            let right_obj = eval_expression(right, env, ctx, out)?;
            eval_infix_expression(*operator, left_obj, right_obj, left.token(), ctx)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
            ..
        } => eval_if_expression(condition, consequence, alternative, env, ctx, out),
        Expression::While {
            condition, body, ..
        } => eval_while_expression(condition, body, env, ctx, out),
        Expression::FunctionLiteral {
            parameters, body, ..
        } => Ok(Object::Function(
            parameters.clone(),
            body.clone(),
            Rc::clone(env),
        )),
        Expression::Call {
            token,
            function,
            arguments,
        } => {
            let callee = eval_expression(function, env, ctx, out)?;
            let args = eval_expressions(arguments, env, ctx, out)?;
            apply_function(callee, token, args, ctx, out)
        }
        Expression::ArrayLiteral { elements, .. } => {
            let values = eval_expressions(elements, env, ctx, out)?;
            Ok(Object::Array(values))
        }
        Expression::HashLiteral { pairs, .. } => eval_hash_literal(pairs, env, ctx, out),
        Expression::Index { left, index, .. } => {
            let left_obj = eval_expression(left, env, ctx, out)?;
            let index_obj = eval_expression(index, env, ctx, out)?;
            eval_index_expression(left_obj, index_obj, left.token(), index.token(), ctx)
        }
    }
}

fn eval_expressions(
    exps: &[Expression],
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> Result<Vec<Object>, EvalError> {
    let mut results = vec![];

    for exp in exps {
        results.push(eval_expression(exp, env, ctx, out)?);
    }

    Ok(results)
}

fn eval_identifier(id: &Identifier, env: &Env, ctx: &EvalContext) -> EvalResult {
    if let Some(value) = env.borrow().get(&id.value) {
        return Ok(value);
    }

    if let Some(builtin) = ctx.builtins.lookup(&id.value) {
        return Ok(builtin);
    }

    Err(ctx.hinted(
        &id.token,
        EvalErrorKind::IdentifierNotFound(id.value.clone()),
    ))
}

fn apply_function(
    function: Object,
    caller: &Token,
    arguments: Vec<Object>,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    match function {
        Object::Function(params, body, captured_env) => {
            if params.len() != arguments.len() {
                return Err(ctx.positioned(
                    caller,
                    EvalErrorKind::WrongArgumentCount {
                        expected: params.len(),
                        given: arguments.len(),
                    },
                ));
            }

            let call_env = extend_function_env(&params, arguments, &captured_env);
            let evaluated = eval_block_statement(&body, &call_env, ctx, out)?;
            Ok(unwrap_return_value(evaluated))
        }
        Object::Builtin(f) => f(arguments),
        other => Err(EvalError::bare(EvalErrorKind::NotCallable(
            other.type_name(),
        ))),
    }
}

fn extend_function_env(params: &[Identifier], arguments: Vec<Object>, env: &Env) -> Env {
    let call_env = Rc::new(RefCell::new(Environment::extend(Rc::clone(env))));

    for (param, arg) in params.iter().zip(arguments) {
        call_env.borrow_mut().set(&param.value, arg);
    }

    call_env
}

fn unwrap_return_value(obj: Object) -> Object {
    match obj {
        Object::Return(value) => *value,
        _ => obj,
    }
}

fn eval_prefix_expression(operator: PrefixOperator, obj: Object) -> EvalResult {
    match operator {
        PrefixOperator::Bang => Ok(Object::Boolean(!obj.is_truthy())),
        PrefixOperator::Minus => match obj {
            Object::Number(n) => Ok(Object::Number(-&n)),
            other => Err(EvalError::bare(EvalErrorKind::UnknownPrefixOperator(
                operator,
                other.type_name(),
            ))),
        },
    }
}

fn eval_infix_expression(
    operator: InfixOperator,
    left: Object,
    right: Object,
    left_token: &Token,
    ctx: &EvalContext,
) -> EvalResult {
    match (&left, &right) {
        (Object::Number(l), Object::Number(r)) => eval_number_infix_expression(operator, l, r),
        (Object::String(l), Object::String(r)) => {
            eval_string_infix_expression(operator, l, r, left_token, ctx)
        }
        _ => match operator {
            // Identity semantics: only the boolean and null singletons can
            // ever be the same object, so everything else compares unequal.
            InfixOperator::Eq => Ok(Object::Boolean(singleton_eq(&left, &right))),
            InfixOperator::NotEq => Ok(Object::Boolean(!singleton_eq(&left, &right))),
            _ if left.type_name() != right.type_name() => Err(ctx.positioned(
                left_token,
                EvalErrorKind::TypeMismatch(operator, left.type_name(), right.type_name()),
            )),
            _ => Err(ctx.positioned(
                left_token,
                EvalErrorKind::UnknownInfixOperator(operator, left.type_name(), right.type_name()),
            )),
        },
    }
}

fn singleton_eq(left: &Object, right: &Object) -> bool {
    match (left, right) {
        (Object::Boolean(l), Object::Boolean(r)) => l == r,
        (Object::Null, Object::Null) => true,
        _ => false,
    }
}

fn eval_number_infix_expression(operator: InfixOperator, l: &Number, r: &Number) -> EvalResult {
    match operator {
        InfixOperator::Plus => Ok(Object::Number(l + r)),
        InfixOperator::Minus => Ok(Object::Number(l - r)),
        InfixOperator::Asterisk => Ok(Object::Number(l * r)),
        InfixOperator::Slash => match l.checked_div(r) {
            Some(n) => Ok(Object::Number(n)),
            None => Err(EvalError::bare(EvalErrorKind::DivisionByZero)),
        },
        InfixOperator::Eq => Ok(Object::Boolean(l == r)),
        InfixOperator::NotEq => Ok(Object::Boolean(l != r)),
        InfixOperator::Lt => Ok(Object::Boolean(l < r)),
        InfixOperator::Gt => Ok(Object::Boolean(l > r)),
        InfixOperator::Le => Ok(Object::Boolean(l <= r)),
        InfixOperator::Ge => Ok(Object::Boolean(l >= r)),
    }
}

fn eval_string_infix_expression(
    operator: InfixOperator,
    left: &str,
    right: &str,
    left_token: &Token,
    ctx: &EvalContext,
) -> EvalResult {
    match operator {
        InfixOperator::Plus => Ok(Object::String(format!("{}{}", left, right))),
        InfixOperator::Eq => Ok(Object::Boolean(left == right)),
        InfixOperator::NotEq => Ok(Object::Boolean(left != right)),
        _ => Err(ctx.positioned(
            left_token,
            EvalErrorKind::UnknownInfixOperator(operator, "STRING", "STRING"),
        )),
    }
}

fn eval_if_expression(
    condition: &Expression,
    consequence: &BlockStatement,
    alternative: &Option<BlockStatement>,
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    let test = eval_expression(condition, env, ctx, out)?;

    if test.is_truthy() {
        return eval_block_statement(consequence, env, ctx, out);
    }

    if let Some(alt) = alternative {
        return eval_block_statement(alt, env, ctx, out);
    }

    Ok(Object::Null)
}

/// Value is the last body result, `null` when the loop never ran. A `fero`
/// in the body short-circuits the loop like every other container.
fn eval_while_expression(
    condition: &Expression,
    body: &BlockStatement,
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    let mut result = Object::Null;

    loop {
        let test = eval_expression(condition, env, ctx, out)?;
        if !test.is_truthy() {
            break;
        }

        result = eval_block_statement(body, env, ctx, out)?;
        if let Object::Return(_) = result {
            return Ok(result);
        }
    }

    Ok(result)
}

fn eval_index_expression(
    left: Object,
    index: Object,
    left_token: &Token,
    index_token: &Token,
    ctx: &EvalContext,
) -> EvalResult {
    match (&left, &index) {
        (Object::Array(elements), Object::Number(n)) => {
            let idx = match n.as_index() {
                Some(idx) => idx,
                None => return Err(EvalError::bare(EvalErrorKind::InvalidArrayIndex)),
            };

            if idx < 0 || idx as usize >= elements.len() {
                Ok(Object::Null)
            } else {
                Ok(elements[idx as usize].clone())
            }
        }
        (Object::Hash(pairs), _) => {
            let key = match HashKey::from_object(&index) {
                Some(key) => key,
                None => {
                    return Err(ctx.hinted(
                        index_token,
                        EvalErrorKind::UnusableHashKey(index.type_name()),
                    ))
                }
            };

            Ok(pairs
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Object::Null))
        }
        _ => Err(ctx.hinted(
            left_token,
            EvalErrorKind::UnsupportedIndexOperator(left.type_name()),
        )),
    }
}

fn eval_hash_literal(
    pairs: &[(Expression, Expression)],
    env: &Env,
    ctx: &EvalContext,
    out: &mut String,
) -> EvalResult {
    let mut map = IndexMap::new();

    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env, ctx, out)?;

        let hash_key = match HashKey::from_object(&key) {
            Some(hash_key) => hash_key,
            None => {
                return Err(ctx.hinted(
                    key_expr.token(),
                    EvalErrorKind::UnusableHashKey(key.type_name()),
                ))
            }
        };

        let value = eval_expression(value_expr, env, ctx, out)?;

        map.insert(hash_key, HashPair { key, value });
    }

    Ok(Object::Hash(map))
}
