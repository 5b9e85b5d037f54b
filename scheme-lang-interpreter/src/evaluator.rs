use std::cell::Cell;

use scheme_lang_core::environment::Environment;
use scheme_lang_core::object::{EvaluationError, Object};
use scheme_lang_core::reader::Reader;

thread_local! {
    static TRACING: Cell<bool> = const { Cell::new(false) };
}

/// Promotes the per-step evaluation events from `trace` to `info`.
pub fn set_tracing(enabled: bool) {
    TRACING.with(|tracing| tracing.set(enabled));
}

fn tracing_enabled() -> bool {
    TRACING.with(Cell::get)
}

fn trace_evaluation(expression: &Object) {
    if tracing_enabled() {
        tracing::info!(%expression, "evaluating");
    } else {
        tracing::trace!(%expression, "evaluating");
    }
}

fn trace_application(function: &Object, arguments: &[Object]) {
    if tracing_enabled() {
        let arguments = Object::list(arguments.iter().cloned());
        tracing::info!(%function, %arguments, "applying");
    } else {
        tracing::trace!(%function, "applying");
    }
}

/// Result of one evaluation step. A `TailCall` still has to be evaluated in
/// its environment before the value is known.
#[derive(Debug)]
pub enum Evaluated {
    Value(Object),
    TailCall {
        expression: Object,
        environment: Environment,
    },
}

impl Evaluated {
    pub fn force(self) -> Result<Object, EvaluationError> {
        match self {
            Evaluated::Value(value) => Ok(value),
            Evaluated::TailCall {
                expression,
                environment,
            } => eval(&expression, &environment),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SpecialForm {
    Quote,
    Set,
    Define,
    Lambda,
    Cond,
    If,
    WithErrorHandler,
}

impl SpecialForm {
    fn from_keyword(object: &Object) -> Option<Self> {
        let Object::Symbol(symbol) = object else {
            return None;
        };
        match symbol.name() {
            "quote" => Some(SpecialForm::Quote),
            "set!" => Some(SpecialForm::Set),
            "define" => Some(SpecialForm::Define),
            "lambda" => Some(SpecialForm::Lambda),
            "cond" => Some(SpecialForm::Cond),
            "if" => Some(SpecialForm::If),
            "with-error-handler" => Some(SpecialForm::WithErrorHandler),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::Set => "set!",
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Cond => "cond",
            SpecialForm::If => "if",
            SpecialForm::WithErrorHandler => "with-error-handler",
        }
    }
}

fn malformed(form: SpecialForm, expression: &Object) -> EvaluationError {
    EvaluationError::MalformedSpecialForm {
        keyword: form.keyword(),
        form: expression.clone(),
    }
}

/// Evaluates every expression the stream yields, returning the last value.
/// Stops at the first read or evaluation error.
pub fn eval_stream(
    input: impl Iterator<Item = char>,
    environment: &Environment,
) -> Result<Object, EvaluationError> {
    let mut output = Object::Nil;
    let mut reader = Reader::new(input);
    while let Some(expression) = reader.read()? {
        output = eval(&expression, environment)?;
    }
    Ok(output)
}

pub fn eval_source(source: &str, environment: &Environment) -> Result<Object, EvaluationError> {
    eval_stream(source.chars(), environment)
}

/// Tail positions are not evaluated recursively: they come back as
/// `Evaluated::TailCall` and this loop picks them up, so tail-recursive
/// programs run in constant native stack.
pub fn eval(expression: &Object, environment: &Environment) -> Result<Object, EvaluationError> {
    let mut expression = expression.clone();
    let mut environment = environment.clone();
    loop {
        trace_evaluation(&expression);
        match expression {
            Object::Symbol(ref symbol) => return environment.lookup(symbol),
            Object::Pair(_) => {}
            Object::Number(_)
            | Object::String(_)
            | Object::Nil
            | Object::Closure(_)
            | Object::Primitive(_) => return Ok(expression),
        }

        match eval_pair(&expression, &environment)? {
            Evaluated::Value(value) => return Ok(value),
            Evaluated::TailCall {
                expression: next_expression,
                environment: next_environment,
            } => {
                expression = next_expression;
                environment = next_environment;
            }
        }
    }
}

fn eval_pair(expression: &Object, environment: &Environment) -> Result<Evaluated, EvaluationError> {
    let operator = expression.head()?;
    let operands = expression.tail()?;

    match SpecialForm::from_keyword(&operator) {
        Some(SpecialForm::Quote) => eval_quote(expression, &operands),
        Some(SpecialForm::Set) => eval_set(expression, &operands, environment),
        Some(SpecialForm::Define) => eval_define(expression, &operands, environment),
        Some(SpecialForm::Lambda) => eval_lambda(expression, &operands, environment),
        Some(SpecialForm::Cond) => eval_cond(expression, &operands, environment),
        Some(SpecialForm::If) => eval_if(expression, &operands, environment),
        Some(SpecialForm::WithErrorHandler) => {
            eval_with_error_handler(expression, &operands, environment)
        }
        None => {
            let function = eval(&operator, environment)?;
            let arguments = eval_list(&operands, environment)?;
            apply(&function, arguments, environment)
        }
    }
}

fn eval_quote(expression: &Object, operands: &Object) -> Result<Evaluated, EvaluationError> {
    match operands.to_vec()?.as_slice() {
        [quoted] => Ok(Evaluated::Value(quoted.clone())),
        _ => Err(malformed(SpecialForm::Quote, expression)),
    }
}

fn eval_set(
    expression: &Object,
    operands: &Object,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    match operands.to_vec()?.as_slice() {
        [Object::Symbol(symbol), value] => {
            let value = eval(value, environment)?;
            environment.set(symbol, value)?;
            Ok(Evaluated::Value(Object::ok()))
        }
        _ => Err(malformed(SpecialForm::Set, expression)),
    }
}

fn eval_define(
    expression: &Object,
    operands: &Object,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    let (name, value) = match &operands.head()? {
        Object::Symbol(name) => match operands.to_vec()?.as_slice() {
            [_, value] => (name.clone(), eval(value, environment)?),
            _ => return Err(malformed(SpecialForm::Define, expression)),
        },
        // (define (name . parameters) body...) is (define name (lambda parameters body...))
        signature @ Object::Pair(_) => {
            let name = match &signature.head()? {
                Object::Symbol(name) => name.clone(),
                _ => return Err(malformed(SpecialForm::Define, expression)),
            };
            let lambda = Object::cons(
                Object::symbol("lambda"),
                Object::cons(signature.tail()?, operands.tail()?),
            );
            (name, eval(&lambda, environment)?)
        }
        _ => return Err(malformed(SpecialForm::Define, expression)),
    };
    environment.define(name, value);
    Ok(Evaluated::Value(Object::ok()))
}

fn is_parameter_list(parameters: &Object) -> bool {
    match parameters {
        Object::Nil | Object::Symbol(_) => true,
        Object::Pair(_) => parameters.to_vec().is_ok_and(|parameters| {
            parameters
                .iter()
                .all(|parameter| matches!(parameter, Object::Symbol(_)))
        }),
        _ => false,
    }
}

fn eval_lambda(
    expression: &Object,
    operands: &Object,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    let parameters = operands.head()?;
    let body = operands.tail()?;
    if operands.is_nil() || body.is_nil() || body.to_vec().is_err() {
        return Err(malformed(SpecialForm::Lambda, expression));
    }
    if !is_parameter_list(&parameters) {
        return Err(malformed(SpecialForm::Lambda, expression));
    }
    Ok(Evaluated::Value(Object::closure(
        parameters,
        body,
        environment.clone(),
    )))
}

fn eval_cond(
    expression: &Object,
    operands: &Object,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    for clause in operands.to_vec()? {
        if !matches!(clause, Object::Pair(_)) {
            return Err(malformed(SpecialForm::Cond, expression));
        }
        let test = clause.head()?;
        let actions = clause.tail()?;

        // `else` is recognised by name, never evaluated.
        if test.is_symbol("else") {
            if actions.is_nil() {
                return Err(malformed(SpecialForm::Cond, expression));
            }
            return eval_sequence(&actions, environment);
        }

        let value = eval(&test, environment)?;
        if value.is_truthy() {
            if actions.is_nil() {
                return Ok(Evaluated::Value(value));
            }
            return eval_sequence(&actions, environment);
        }
    }
    Ok(Evaluated::Value(Object::boolean(false)))
}

fn eval_if(
    expression: &Object,
    operands: &Object,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    let (test, consequence, alternative) = match operands.to_vec()?.as_slice() {
        [test, consequence] => (test.clone(), consequence.clone(), None),
        [test, consequence, alternative] => {
            (test.clone(), consequence.clone(), Some(alternative.clone()))
        }
        _ => return Err(malformed(SpecialForm::If, expression)),
    };

    let branch = if eval(&test, environment)?.is_truthy() {
        consequence
    } else if let Some(alternative) = alternative {
        alternative
    } else {
        return Ok(Evaluated::Value(Object::boolean(false)));
    };
    Ok(Evaluated::TailCall {
        expression: branch,
        environment: environment.clone(),
    })
}

/// Always forces its results so no pending tail call escapes the handler
/// boundary; this form therefore keeps a native frame alive while the thunk
/// runs.
fn eval_with_error_handler(
    expression: &Object,
    operands: &Object,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    let (handler, thunk) = match operands.to_vec()?.as_slice() {
        [handler, thunk] => (eval(handler, environment)?, eval(thunk, environment)?),
        _ => return Err(malformed(SpecialForm::WithErrorHandler, expression)),
    };

    match apply(&thunk, Vec::new(), environment).and_then(Evaluated::force) {
        Ok(value) => Ok(Evaluated::Value(value)),
        Err(error) => {
            tracing::debug!(%error, "error caught by handler");
            let payload = Object::string(&error.to_string());
            apply(&handler, vec![payload], environment)?
                .force()
                .map(Evaluated::Value)
        }
    }
}

/// Evaluates all but the last expression for effect; the last one is handed
/// back as a tail call.
fn eval_sequence(body: &Object, environment: &Environment) -> Result<Evaluated, EvaluationError> {
    let mut rest = body.clone();
    loop {
        let expression = rest.head()?;
        let next = rest.tail()?;
        if next.is_nil() {
            return Ok(Evaluated::TailCall {
                expression,
                environment: environment.clone(),
            });
        }
        eval(&expression, environment)?;
        rest = next;
    }
}

fn eval_list(operands: &Object, environment: &Environment) -> Result<Vec<Object>, EvaluationError> {
    let mut result = Vec::new();
    for operand in operands.to_vec()? {
        result.push(eval(&operand, environment)?);
    }
    Ok(result)
}

fn check_arity(
    function: &Object,
    parameters: &Object,
    actual: usize,
) -> Result<(), EvaluationError> {
    if let Object::Symbol(_) = parameters {
        return Ok(());
    }
    let expected = parameters.to_vec()?.len();
    if expected != actual {
        return Err(EvaluationError::WrongArgumentCount {
            procedure: function.clone(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Primitives run to completion; closures come back as a tail call on their
/// last body expression.
pub fn apply(
    function: &Object,
    arguments: Vec<Object>,
    environment: &Environment,
) -> Result<Evaluated, EvaluationError> {
    trace_application(function, &arguments);
    match function {
        Object::Primitive(primitive) => {
            (primitive.func)(arguments, environment).map(Evaluated::Value)
        }
        Object::Closure(closure) => {
            check_arity(function, &closure.parameters, arguments.len())?;
            let environment =
                Environment::extend(&closure.parameters, arguments, &closure.environment)?;
            eval_sequence(&closure.body, &environment)
        }
        _ => Err(EvaluationError::NotApplicable(function.clone())),
    }
}

#[cfg(test)]
mod tests {
    use scheme_lang_core::object::{EvaluationError, Object};
    use scheme_lang_core::reader::ReadError;

    use crate::global_environment;

    fn test_evaluation(inputs: Vec<(&str, Result<Object, EvaluationError>)>) {
        for (input, output) in inputs {
            let result = super::eval_source(input, &global_environment());

            assert_eq!(result, output, "evaluating {}", input);
        }
    }

    fn test_printed(inputs: Vec<(&str, &str)>) {
        for (input, output) in inputs {
            let result = super::eval_source(input, &global_environment())
                .unwrap_or_else(|error| panic!("evaluating {}: {}", input, error));

            assert_eq!(result.to_string(), output, "evaluating {}", input);
        }
    }

    #[test]
    fn test_self_evaluating() {
        let inputs = vec![
            ("5", Ok(Object::number(5.0))),
            ("2.75", Ok(Object::number(2.75))),
            ("\"hello\"", Ok(Object::string("hello"))),
            ("()", Ok(Object::Nil)),
            ("true", Ok(Object::boolean(true))),
            ("false", Ok(Object::boolean(false))),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_quote() {
        test_printed(vec![
            ("(quote (a b c))", "(a b c)"),
            ("'(a b c)", "(a b c)"),
            ("'x", "x"),
            ("''x", "(quote x)"),
        ]);

        let quoted = super::eval_source("'(a b c)", &global_environment()).unwrap();
        let read = scheme_lang_core::reader::read_all("(a b c)").unwrap();
        assert_eq!(quoted, read[0]);
    }

    #[test]
    fn test_define_and_set() {
        let inputs = vec![
            ("(define x 5) x", Ok(Object::number(5.0))),
            ("(define x 5) (set! x 6) x", Ok(Object::number(6.0))),
            ("(define x 5)", Ok(Object::ok())),
            ("(define x 5) (set! x 6)", Ok(Object::ok())),
            (
                "(set! y 1)",
                Err(EvaluationError::UnboundVariable("y".into())),
            ),
            ("y", Err(EvaluationError::UnboundVariable("y".into()))),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_shadowing() {
        let inputs = vec![
            ("(define x 1) ((lambda (x) x) 2)", Ok(Object::number(2.0))),
            ("(define x 1) ((lambda (x) x) 2) x", Ok(Object::number(1.0))),
            (
                "(define x 1) ((lambda () (define x 3) x))",
                Ok(Object::number(3.0)),
            ),
            (
                "(define x 1) ((lambda () (define x 3) x)) x",
                Ok(Object::number(1.0)),
            ),
            (
                "(define x 1) ((lambda () (set! x 3))) x",
                Ok(Object::number(3.0)),
            ),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_function_application() {
        let inputs = vec![
            (
                "(define identity (lambda (x) x)) (identity 5)",
                Ok(Object::number(5.0)),
            ),
            (
                "(define (double x) (* x 2)) (double 5)",
                Ok(Object::number(10.0)),
            ),
            (
                "(define (add x y) (+ x y)) (add (+ 5 5) (add 5 5))",
                Ok(Object::number(20.0)),
            ),
            ("((lambda (x) x) 5)", Ok(Object::number(5.0))),
            (
                "(define (factorial n) (if (< n 2) 1 (* n (factorial (- n 1))))) (factorial 5)",
                Ok(Object::number(120.0)),
            ),
            (
                "(define (adder a) (lambda (b) (+ a b))) ((adder 5) 10)",
                Ok(Object::number(15.0)),
            ),
            (
                "((lambda args args) 1 2 3)",
                Ok(Object::list([
                    Object::number(1.0),
                    Object::number(2.0),
                    Object::number(3.0),
                ])),
            ),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_body_is_a_sequence() {
        let inputs = vec![(
            "(define counter 0)
            (define (bump) (set! counter (+ counter 1)) (set! counter (+ counter 1)) counter)
            (bump)
            (bump)",
            Ok(Object::number(4.0)),
        )];

        test_evaluation(inputs);
    }

    #[test]
    fn test_closure() {
        let inputs = vec![
            (
                "(define (make-counter)
                   (define count 0)
                   (lambda () (set! count (+ count 1)) count))
                 (define c (make-counter))
                 (c) (c) (c)",
                Ok(Object::number(3.0)),
            ),
            (
                "(define (make-counter)
                   (define count 0)
                   (lambda () (set! count (+ count 1)) count))
                 (define a (make-counter))
                 (define b (make-counter))
                 (a) (a) (b)",
                Ok(Object::number(1.0)),
            ),
            (
                "(define (outer)
                   (define (is-even n) (if (= n 0) true (is-odd (- n 1))))
                   (define (is-odd n) (if (= n 0) false (is-even (- n 1))))
                   is-even)
                 ((outer) 7)",
                Ok(Object::boolean(false)),
            ),
        ];

        test_evaluation(inputs)
    }

    #[test]
    fn test_shared_frames_observe_each_other() {
        let inputs = vec![(
            "(define (make-pair)
               (define value 0)
               (define (get) value)
               (define (put v) (set! value v))
               (list get put))
             (define p (make-pair))
             ((car (cdr p)) 42)
             ((car p))",
            Ok(Object::number(42.0)),
        )];

        test_evaluation(inputs)
    }

    #[test]
    fn test_if() {
        let inputs = vec![
            ("(if true 1 2)", Ok(Object::number(1.0))),
            ("(if false 1 2)", Ok(Object::number(2.0))),
            ("(if false 1)", Ok(Object::boolean(false))),
            ("(if '() 1 2)", Ok(Object::number(1.0))),
            ("(if 0 1 2)", Ok(Object::number(1.0))),
            ("(if (eq? 'a 'a) 'yes 'no)", Ok(Object::symbol("yes"))),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_cond() {
        let inputs = vec![
            ("(cond (false 1) (else 2))", Ok(Object::number(2.0))),
            ("(cond (false 1))", Ok(Object::boolean(false))),
            ("(cond (true 1) (else 2))", Ok(Object::number(1.0))),
            (
                "(cond ((eq? 1 2) 'a) ((eq? 2 2) 'b 'c))",
                Ok(Object::symbol("c")),
            ),
            ("(cond (5))", Ok(Object::number(5.0))),
            (
                "(define else false) (cond (false 1) (else 2))",
                Ok(Object::number(2.0)),
            ),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_malformed_special_forms() {
        let inputs = vec![
            ("(quote)", "quote"),
            ("(quote a b)", "quote"),
            ("(set! 1 2)", "set!"),
            ("(define)", "define"),
            ("(define x)", "define"),
            ("(define (1 x) x)", "define"),
            ("(lambda (x))", "lambda"),
            ("(lambda (1) 1)", "lambda"),
            ("(if)", "if"),
            ("(if 1 2 3 4)", "if"),
            ("(cond 5)", "cond"),
            ("(cond (else))", "cond"),
            ("(with-error-handler (lambda (e) e))", "with-error-handler"),
        ];

        for (input, expected) in inputs {
            match super::eval_source(input, &global_environment()) {
                Err(EvaluationError::MalformedSpecialForm { keyword, .. }) => {
                    assert_eq!(keyword, expected, "evaluating {}", input)
                }
                other => panic!("evaluating {}: unexpected {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_application_errors() {
        test_evaluation(vec![
            (
                "(5 1)",
                Err(EvaluationError::NotApplicable(Object::number(5.0))),
            ),
            (
                "('foo)",
                Err(EvaluationError::NotApplicable(Object::symbol("foo"))),
            ),
        ]);

        for input in ["((lambda (x y) x) 1)", "((lambda (x) x) 1 2)"] {
            assert!(
                matches!(
                    super::eval_source(input, &global_environment()),
                    Err(EvaluationError::WrongArgumentCount { .. })
                ),
                "evaluating {}",
                input
            );
        }
    }

    #[test]
    fn test_with_error_handler() {
        let inputs = vec![
            (
                "(with-error-handler (lambda (e) 'caught) (lambda () (error \"boom\")))",
                Ok(Object::symbol("caught")),
            ),
            (
                "(with-error-handler (lambda (e) e) (lambda () (error \"boom\" 42)))",
                Ok(Object::string("boom 42")),
            ),
            (
                "(with-error-handler (lambda (e) e) (lambda () undefined-name))",
                Ok(Object::string("unbound variable: undefined-name")),
            ),
            (
                "(with-error-handler (lambda (e) 'caught) (lambda () 'fine))",
                Ok(Object::symbol("fine")),
            ),
            (
                "(with-error-handler (lambda (e) 'caught) (lambda () (error \"boom\"))) (+ 1 2)",
                Ok(Object::number(3.0)),
            ),
            (
                "(with-error-handler
                   (lambda (outer) (list 'outer outer))
                   (lambda ()
                     (with-error-handler
                       (lambda (inner) (error \"rethrown\"))
                       (lambda () (error \"first\")))))",
                Ok(Object::list([
                    Object::symbol("outer"),
                    Object::string("rethrown"),
                ])),
            ),
            (
                "(with-error-handler (lambda (e) (error \"again\")) (lambda () (error \"first\")))",
                Err(EvaluationError::UserError(vec![Object::string("again")])),
            ),
            (
                "(error \"uncaught\" 'value)",
                Err(EvaluationError::UserError(vec![
                    Object::string("uncaught"),
                    Object::symbol("value"),
                ])),
            ),
        ];

        test_evaluation(inputs);
    }

    #[test]
    fn test_handler_sees_state_changed_before_the_error() {
        let inputs = vec![(
            "(define log '())
             (with-error-handler
               (lambda (e) (set! log (cons e log)))
               (lambda () (set! log (cons 'before log)) (error \"oops\") (set! log (cons 'after log))))
             log",
            Ok(Object::list([
                Object::string("oops"),
                Object::symbol("before"),
            ])),
        )];

        test_evaluation(inputs);
    }

    #[test]
    fn test_tail_calls_run_in_constant_stack() {
        test_evaluation(vec![
            (
                "(define (count-down n) (if (= n 0) 'done (count-down (- n 1))))
                 (count-down 100000)",
                Ok(Object::symbol("done")),
            ),
            (
                "(define (loop n acc) (cond ((= n 0) acc) (else (loop (- n 1) (+ acc 1)))))
                 (loop 100000 0)",
                Ok(Object::number(100000.0)),
            ),
            (
                "(define (ping n) (if (= n 0) 'ping (pong (- n 1))))
                 (define (pong n) (if (= n 0) 'pong (ping (- n 1))))
                 (ping 100001)",
                Ok(Object::symbol("pong")),
            ),
        ]);
    }

    #[test]
    fn test_read_errors_propagate() {
        test_evaluation(vec![
            (
                "(define x 1))",
                Err(EvaluationError::ReadError(ReadError::UnmatchedCloseParen {
                    position: 12,
                })),
            ),
            (
                "(define x",
                Err(EvaluationError::ReadError(ReadError::UnterminatedList {
                    position: 0,
                })),
            ),
        ]);
    }
}
