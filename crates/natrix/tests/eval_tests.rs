//! End-to-end evaluation tests: a program's final expression value and
//! its printed output.

use natrix::{CollectStringIo, ErrorKind, EvalOptions, Object, Runner};
use pretty_assertions::assert_eq;

/// Runs a program and returns the repr of its final expression value.
fn eval(source: &str) -> String {
    let runner = Runner::new(source).expect("program should compile");
    let (result, _) = runner.run_collect().expect("program should run");
    result.to_string()
}

/// Runs a program and returns everything it printed.
fn output_of(source: &str) -> String {
    let runner = Runner::new(source).expect("program should compile");
    let (_, output) = runner.run_collect().expect("program should run");
    output
}

/// Runs a program expecting a runtime failure.
fn runtime_error(source: &str) -> natrix::Error {
    let runner = Runner::new(source).expect("program should compile");
    runner
        .run_with(&mut CollectStringIo::new())
        .expect_err("program should fail at runtime")
}

#[test]
fn addition_of_two_variables() {
    assert_eq!(eval("x = 3\ny = 4\nx + y\n"), "7");
}

#[test]
fn recursive_fibonacci() {
    let source = "def f(n):\n    if n <= 1:\n        return n\n    else:\n        return f(n-1) + f(n-2)\nf(10)\n";
    assert_eq!(eval(source), "55");
}

#[test]
fn complex_multiplication() {
    assert_eq!(eval("(1 + 2j) * (3 - 4j)\n"), "(11+2j)");
}

#[test]
fn floor_division_sign_rule() {
    assert_eq!(eval("10 // -3\n"), "-4");
    assert_eq!(eval("10 % -3\n"), "-2");
}

#[test]
fn closure_reads_enclosing_local() {
    let source = "def outer():\n    x = 1\n    def inner():\n        return x\n    return inner()\nouter()\n";
    assert_eq!(eval(source), "1");
}

#[test]
fn unbound_local_is_distinct_from_name_error() {
    let err = runtime_error("def g():\n    print(x)\n    x = 5\ng()\n");
    assert_eq!(err.kind, ErrorKind::UnboundLocalError);
    assert!(err.message.contains("'x'"), "message should name the variable: {}", err.message);
}

#[test]
fn division_by_zero() {
    let err = runtime_error("1 / 0\n");
    assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
    assert_eq!(err.message, "division by zero");
}

#[test]
fn name_used_before_global_definition_is_a_runtime_name_error() {
    // Hoisting makes this pass resolution; the call runs before `g`'s
    // definition statement executes.
    let source = "def f():\n    return g()\nf()\ndef g():\n    return 1\n";
    assert_eq!(runtime_error(source).kind, ErrorKind::NameError);
}

#[test]
fn true_division_and_float_repr() {
    assert_eq!(eval("10 / 4\n"), "2.5");
    assert_eq!(eval("1 / 3\n"), "0.3333333333333333");
    assert_eq!(eval("7.0 // 2\n"), "3.0");
}

#[test]
fn exponent_rules() {
    assert_eq!(eval("2 ** 10\n"), "1024");
    assert_eq!(eval("2 ** -2\n"), "0.25");
    assert_eq!(
        eval("2 ** 100\n"),
        "1267650600228229401496703205376"
    );
    assert_eq!(runtime_error("0 ** -1\n").kind, ErrorKind::ZeroDivisionError);
}

#[test]
fn bigint_arithmetic_inverse_law() {
    // (a + b) - b == a survives far past machine width.
    assert_eq!(eval("a = 10 ** 40\nb = 3 ** 30\n(a + b) - b == a\n"), "True");
}

#[test]
fn cross_type_comparison_is_exact() {
    assert_eq!(eval("2 ** 53 == 9007199254740992.0\n"), "True");
    assert_eq!(eval("2 ** 53 + 1 == 9007199254740992.0\n"), "False");
    assert_eq!(eval("2 ** 53 + 1 > 9007199254740992.0\n"), "True");
    assert_eq!(eval("10 ** 40 > math_inf\n"), "False");
}

#[test]
fn while_loop_accumulates() {
    let source = "i = 0\ntotal = 0\nwhile i < 5:\n    total = total + i\n    i = i + 1\ntotal\n";
    assert_eq!(eval(source), "10");
}

#[test]
fn break_exits_innermost_loop() {
    let source = "i = 0\nacc = 0\nwhile True:\n    i = i + 1\n    if i > 10:\n        break\n    else:\n        pass\n    acc = acc + i\nacc\n";
    assert_eq!(eval(source), "55");
}

#[test]
fn continue_skips_to_next_iteration() {
    let source = "i = 0\nacc = 0\nwhile i < 10:\n    i = i + 1\n    if i % 2 == 0:\n        continue\n    else:\n        pass\n    acc = acc + i\nacc\n";
    assert_eq!(eval(source), "25");
}

#[test]
fn for_loops_reject_non_iterables() {
    let err = runtime_error("for i in 5:\n    pass\n");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperandTypeError);
    assert!(err.message.contains("not iterable"));
}

#[test]
fn short_circuit_skips_right_operand() {
    // If `or` evaluated its right operand this would divide by zero.
    assert_eq!(eval("True or 1 / 0\n"), "True");
    assert_eq!(eval("False and 1 / 0\n"), "False");
    // The boolean operators return the deciding operand itself.
    assert_eq!(eval("0 or 42\n"), "42");
    assert_eq!(eval("'' and 42\n"), "''");
}

#[test]
fn short_circuit_side_effects_do_not_run() {
    let source = "x = 0\ndef bump():\n    global x\n    x = 1\n    return True\nTrue or bump()\nx\n";
    assert_eq!(eval(source), "0");
}

#[test]
fn ternary_evaluates_single_branch() {
    assert_eq!(eval("x = 5\n'big' if x > 3 else 'small'\n"), "'big'");
    assert_eq!(eval("1 if False else 1 / 0 if False else 3\n"), "3");
}

#[test]
fn lambda_values() {
    assert_eq!(eval("add = lambda a, b: a + b\nadd(2, 3)\n"), "5");
    assert_eq!(eval("(lambda x: x * x)(7)\n"), "49");
}

#[test]
fn chained_calls() {
    let source = "def make_adder(n):\n    return lambda m: m + n\nmake_adder(3)(4)\n";
    assert_eq!(eval(source), "7");
}

#[test]
fn nonlocal_writes_through_to_enclosing_frame() {
    let source = "def counter():\n    count = 0\n    def inc():\n        nonlocal count\n        count = count + 1\n        return count\n    inc()\n    return inc()\ncounter()\n";
    assert_eq!(eval(source), "2");
}

#[test]
fn global_declaration_writes_module_frame() {
    let source = "x = 1\ndef set_x():\n    global x\n    x = 99\nset_x()\nx\n";
    assert_eq!(eval(source), "99");
}

#[test]
fn print_joins_with_spaces() {
    assert_eq!(output_of("print(1, 2.5, 'three', True, None)\n"), "1 2.5 three True None\n");
    assert_eq!(output_of("print()\n"), "\n");
}

#[test]
fn print_renders_function_values() {
    let out = output_of("def f():\n    pass\nprint(f)\nprint(print)\n");
    assert_eq!(out, "<function f>\n<function print>\n");
}

#[test]
fn builtin_conversions() {
    assert_eq!(eval("_int('42')\n"), "42");
    assert_eq!(eval("_int(3.9)\n"), "3");
    assert_eq!(eval("_int(-3.9)\n"), "-3");
    assert_eq!(eval("str(2.5)\n"), "'2.5'");
    assert_eq!(eval("str(None)\n"), "'None'");
}

#[test]
fn builtin_abs_round_min_max() {
    assert_eq!(eval("abs(-7)\n"), "7");
    assert_eq!(eval("abs(3 + 4j)\n"), "5.0");
    assert_eq!(eval("round(2.5)\n"), "2");
    assert_eq!(eval("round(3.5)\n"), "4");
    assert_eq!(eval("max(3, 7.5, 5)\n"), "7.5");
    assert_eq!(eval("min(3, 7.5, 5)\n"), "3");
}

#[test]
fn input_reads_seeded_lines() {
    let runner = Runner::new("name = input('Who? ')\nname\n").unwrap();
    let mut io = CollectStringIo::with_input(vec!["Ada".to_owned()]);
    let result = runner.run_with(&mut io).unwrap();
    assert_eq!(result, Object::String("Ada".to_owned()));
    assert_eq!(io.output(), "Who? ");
}

#[test]
fn math_constants_are_seeded() {
    assert_eq!(eval("math_pi > 3.14 and math_pi < 3.15\n"), "True");
    assert_eq!(eval("math_inf > 10 ** 400\n"), "True");
    assert_eq!(eval("math_nan == math_nan\n"), "False");
}

#[test]
fn random_random_is_in_unit_interval() {
    assert_eq!(eval("r = random_random()\nr >= 0 and r < 1\n"), "True");
}

#[test]
fn identity_comparisons() {
    assert_eq!(eval("None is None\n"), "True");
    assert_eq!(eval("1 is 1.0\n"), "False");
    assert_eq!(eval("1 is not 2\n"), "True");
    assert_eq!(eval("'a' is 'a'\n"), "True");
}

#[test]
fn chained_comparison_is_left_associative_not_python_chained() {
    // `a < b < c` evaluates as `(a < b) < c`: the boolean coerces to an
    // int for the second comparison. This deviates from Python's chained
    // comparison on purpose.
    assert_eq!(eval("1 < 2 < 3\n"), "True");
    assert_eq!(eval("3 > 2 > 1\n"), "False");
}

#[test]
fn assertion_failure() {
    let err = runtime_error("assert 1 == 2\n");
    assert_eq!(err.kind, ErrorKind::AssertionError);
    assert_eq!(eval("assert 1 == 1\n'ok'\n"), "'ok'");
}

#[test]
fn calling_a_non_function_fails() {
    let err = runtime_error("x = 3\nx(1)\n");
    assert_eq!(err.kind, ErrorKind::UnsupportedOperandTypeError);
    assert!(err.message.contains("not callable"));
}

#[test]
fn wrong_arity_fails() {
    let err = runtime_error("def f(a, b):\n    return a\nf(1)\n");
    assert_eq!(err.kind, ErrorKind::UnsupportedArgumentError);
    assert!(err.message.contains("f() takes 2 positional arguments but 1 was given"));
}

#[test]
fn step_limit_is_enforced() {
    let runner = Runner::new("while True:\n    pass\n").unwrap();
    let options = EvalOptions {
        is_prelude: false,
        env_steps: 0,
        step_limit: 500,
    };
    let err = runner
        .run_with_options(&mut CollectStringIo::new(), &options)
        .expect_err("infinite loop must hit the step limit");
    assert_eq!(err.kind, ErrorKind::StepLimitExceededError);
}

#[test]
fn prelude_chunks_are_exempt_from_the_step_limit() {
    let runner = Runner::new("i = 0\nwhile i < 100:\n    i = i + 1\ni\n").unwrap();
    let options = EvalOptions {
        is_prelude: true,
        env_steps: 0,
        step_limit: 5,
    };
    let result = runner.run_with_options(&mut CollectStringIo::new(), &options).unwrap();
    assert_eq!(result, Object::Int(100));
}

#[test]
fn string_operations() {
    assert_eq!(eval("'ab' + 'cd'\n"), "'abcd'");
    assert_eq!(eval("'abc' < 'abd'\n"), "True");
    assert_eq!(eval("'' == ''\n"), "True");
    assert_eq!(runtime_error("'a' + 1\n").kind, ErrorKind::UnsupportedOperandTypeError);
}

#[test]
fn complex_division_and_power() {
    assert_eq!(eval("(1 + 2j) / (3 - 4j)\n"), "(-0.2+0.4j)");
    assert_eq!(runtime_error("1j / (0 + 0j)\n").kind, ErrorKind::ZeroDivisionError);
    assert_eq!(runtime_error("0j ** -1\n").kind, ErrorKind::ZeroDivisionError);
}

#[test]
fn negative_float_to_fractional_power_is_complex() {
    let repr = eval("(-8.0) ** 0.5\n");
    assert!(repr.ends_with("j)"), "expected a complex repr, got {repr}");
}

#[test]
fn mutual_recursion_between_siblings() {
    let source = "def even(n):\n    return n == 0 or odd(n - 1)\ndef odd(n):\n    return n != 0 and even(n - 1)\neven(10)\n";
    assert_eq!(eval(source), "True");
}

#[test]
fn last_statement_value_is_the_program_value() {
    // Only the final expression statement's value survives; earlier ones
    // are popped to keep the stash balanced.
    assert_eq!(eval("1\n2\n3\n"), "3");
    let runner = Runner::new("1\n2\nx = 9\n").unwrap();
    let (result, _) = runner.run_collect().unwrap();
    assert_eq!(result, Object::None);
}
