use std::cell::RefCell;
use std::io::BufRead;

use scheme_lang_core::environment::Environment;
use scheme_lang_core::object::{EvaluationError, Object, Primitive, PrimitiveFn};
use scheme_lang_core::reader::Reader;

use crate::evaluator;

fn unexpected_number_of_arguments_error(
    name: &'static str,
    expected: usize,
    got: usize,
) -> EvaluationError {
    EvaluationError::BuiltinFunctionError {
        name,
        message: format!(
            "unexpected number of arguments. Expected {} got {}",
            expected, got
        )
        .into(),
    }
}

fn unexpected_argument_type_error(
    name: &'static str,
    expected: &str,
    got: &Object,
) -> EvaluationError {
    EvaluationError::BuiltinFunctionError {
        name,
        message: format!(
            "unexpected argument type. Expected {} got {}",
            expected, got
        )
        .into(),
    }
}

fn io_error(error: std::io::Error) -> EvaluationError {
    EvaluationError::Io(error.to_string().into())
}

fn expect_arguments<const N: usize>(
    name: &'static str,
    args: Vec<Object>,
) -> Result<[Object; N], EvaluationError> {
    let got = args.len();
    args.try_into()
        .map_err(|_| unexpected_number_of_arguments_error(name, N, got))
}

fn expect_number(name: &'static str, object: &Object) -> Result<f64, EvaluationError> {
    match object {
        Object::Number(value) => Ok(*value),
        _ => Err(unexpected_argument_type_error(name, "Number", object)),
    }
}

fn expect_numbers(name: &'static str, args: &[Object]) -> Result<Vec<f64>, EvaluationError> {
    args.iter().map(|arg| expect_number(name, arg)).collect()
}

fn builtin_car(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [list] = expect_arguments("car", args)?;
    list.head()
}

fn builtin_cdr(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [list] = expect_arguments("cdr", args)?;
    list.tail()
}

fn builtin_cons(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [head, tail] = expect_arguments("cons", args)?;
    Ok(Object::cons(head, tail))
}

fn builtin_list(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    Ok(Object::list(args))
}

fn builtin_set_car(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [pair, value] = expect_arguments("set-car!", args)?;
    pair.set_head(value)?;
    Ok(Object::ok())
}

fn builtin_set_cdr(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [pair, value] = expect_arguments("set-cdr!", args)?;
    pair.set_tail(value)?;
    Ok(Object::ok())
}

fn builtin_null(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("null?", args)?;
    Ok(Object::boolean(object.is_nil()))
}

fn builtin_pair(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("pair?", args)?;
    Ok(Object::boolean(matches!(object, Object::Pair(_))))
}

fn builtin_symbol(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("symbol?", args)?;
    Ok(Object::boolean(matches!(object, Object::Symbol(_))))
}

fn builtin_number(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("number?", args)?;
    Ok(Object::boolean(matches!(object, Object::Number(_))))
}

fn builtin_string(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("string?", args)?;
    Ok(Object::boolean(matches!(object, Object::String(_))))
}

fn builtin_procedure(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("procedure?", args)?;
    Ok(Object::boolean(matches!(
        object,
        Object::Closure(_) | Object::Primitive(_)
    )))
}

fn builtin_eq(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [left, right] = expect_arguments("eq?", args)?;
    Ok(Object::boolean(left.is_identical(&right)))
}

fn builtin_not(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("not", args)?;
    Ok(Object::boolean(!object.is_truthy()))
}

fn builtin_apply(args: Vec<Object>, environment: &Environment) -> Result<Object, EvaluationError> {
    let [function, arguments] = expect_arguments("apply", args)?;
    evaluator::apply(&function, arguments.to_vec()?, environment)?.force()
}

fn builtin_eval(args: Vec<Object>, environment: &Environment) -> Result<Object, EvaluationError> {
    let [expression] = expect_arguments("eval", args)?;
    evaluator::eval(&expression, &environment.global())
}

fn builtin_display(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [object] = expect_arguments("display", args)?;
    println!("{}", object);
    Ok(Object::ok())
}

fn builtin_error(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    Err(EvaluationError::UserError(args))
}

/// Reads one expression, pulling whole lines from `input` until `pending`
/// holds a complete one. Whatever follows it on the line stays in `pending`
/// for the next call.
fn read_expression(
    pending: &mut String,
    input: &mut impl BufRead,
) -> Result<Object, EvaluationError> {
    loop {
        let mut reader = Reader::new(pending.chars());
        let incomplete = match reader.read() {
            Ok(Some(expression)) => {
                let rest: String = pending.chars().skip(reader.position()).collect();
                *pending = rest;
                return Ok(expression);
            }
            Ok(None) => None,
            Err(error) if error.is_incomplete() => Some(error),
            Err(error) => {
                pending.clear();
                return Err(error.into());
            }
        };

        if input.read_line(pending).map_err(io_error)? == 0 {
            pending.clear();
            return match incomplete {
                Some(error) => Err(error.into()),
                None => Err(EvaluationError::EndOfInput),
            };
        }
    }
}

thread_local! {
    static STDIN_PENDING: RefCell<String> = const { RefCell::new(String::new()) };
}

fn builtin_read(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [] = expect_arguments("read", args)?;
    STDIN_PENDING.with(|pending| {
        read_expression(&mut pending.borrow_mut(), &mut std::io::stdin().lock())
    })
}

fn builtin_load_file(
    args: Vec<Object>,
    environment: &Environment,
) -> Result<Object, EvaluationError> {
    let [path] = expect_arguments("load-file!", args)?;
    let Object::String(path) = &path else {
        return Err(unexpected_argument_type_error(
            "load-file!",
            "String",
            &path,
        ));
    };
    tracing::info!(path = %path, "loading file");
    let source = std::fs::read_to_string(&**path).map_err(io_error)?;
    evaluator::eval_stream(source.chars(), &environment.global())?;
    Ok(Object::ok())
}

fn builtin_debug(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let [] = expect_arguments("debug!", args)?;
    evaluator::set_tracing(true);
    Ok(Object::ok())
}

fn builtin_add(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let numbers = expect_numbers("+", &args)?;
    Ok(Object::number(numbers.iter().sum()))
}

fn builtin_multiply(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let numbers = expect_numbers("*", &args)?;
    Ok(Object::number(numbers.iter().product()))
}

fn builtin_subtract(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let numbers = expect_numbers("-", &args)?;
    match numbers.split_first() {
        None => Err(unexpected_number_of_arguments_error("-", 1, 0)),
        Some((first, [])) => Ok(Object::number(-first)),
        Some((first, rest)) => Ok(Object::number(rest.iter().fold(*first, |acc, n| acc - n))),
    }
}

fn builtin_divide(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    let numbers = expect_numbers("/", &args)?;
    match numbers.split_first() {
        None => Err(unexpected_number_of_arguments_error("/", 1, 0)),
        Some((first, [])) => Ok(Object::number(1.0 / first)),
        Some((first, rest)) => Ok(Object::number(rest.iter().fold(*first, |acc, n| acc / n))),
    }
}

fn compare(
    name: &'static str,
    args: &[Object],
    holds: fn(f64, f64) -> bool,
) -> Result<Object, EvaluationError> {
    let numbers = expect_numbers(name, args)?;
    if numbers.is_empty() {
        return Err(unexpected_number_of_arguments_error(name, 1, 0));
    }
    Ok(Object::boolean(
        numbers.windows(2).all(|pair| holds(pair[0], pair[1])),
    ))
}

fn builtin_equal(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    compare("=", &args, |left, right| left == right)
}

fn builtin_less_than(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    compare("<", &args, |left, right| left < right)
}

fn builtin_greater_than(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    compare(">", &args, |left, right| left > right)
}

fn builtin_less_equal(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    compare("<=", &args, |left, right| left <= right)
}

fn builtin_greater_equal(args: Vec<Object>, _: &Environment) -> Result<Object, EvaluationError> {
    compare(">=", &args, |left, right| left >= right)
}

const BUILTINS: &[(&str, PrimitiveFn)] = &[
    ("car", builtin_car),
    ("cdr", builtin_cdr),
    ("cons", builtin_cons),
    ("list", builtin_list),
    ("set-car!", builtin_set_car),
    ("set-cdr!", builtin_set_cdr),
    ("null?", builtin_null),
    ("pair?", builtin_pair),
    ("symbol?", builtin_symbol),
    ("number?", builtin_number),
    ("string?", builtin_string),
    ("procedure?", builtin_procedure),
    ("eq?", builtin_eq),
    ("not", builtin_not),
    ("apply", builtin_apply),
    ("eval", builtin_eval),
    ("display", builtin_display),
    ("error", builtin_error),
    ("read", builtin_read),
    ("load-file!", builtin_load_file),
    ("debug!", builtin_debug),
    ("+", builtin_add),
    ("-", builtin_subtract),
    ("*", builtin_multiply),
    ("/", builtin_divide),
    ("=", builtin_equal),
    ("<", builtin_less_than),
    (">", builtin_greater_than),
    ("<=", builtin_less_equal),
    (">=", builtin_greater_equal),
];

pub fn primitives() -> impl Iterator<Item = Primitive> {
    BUILTINS
        .iter()
        .map(|&(name, func)| Primitive { name, func })
}
