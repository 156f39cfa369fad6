//! Static diagnostics and the snippet-and-caret rendering.

use natrix::{CollectStringIo, Error, ErrorKind, Runner};
use pretty_assertions::assert_eq;

fn compile_error(source: &str) -> Error {
    Runner::new(source).expect_err("expected a compile-time diagnostic")
}

#[test]
fn forbidden_keywords_are_rejected_with_their_own_kind() {
    assert_eq!(compile_error("yield 1\n").kind, ErrorKind::ForbiddenIdentifierError);
    assert_eq!(compile_error("with f:\n    pass\n").kind, ErrorKind::ForbiddenIdentifierError);
    assert_eq!(compile_error("try:\n    pass\n").kind, ErrorKind::ForbiddenIdentifierError);
}

#[test]
fn forbidden_operators_are_rejected() {
    assert_eq!(compile_error("x = 1\nx += 1\n").kind, ErrorKind::ForbiddenOperatorError);
    assert_eq!(compile_error("1 | 2\n").kind, ErrorKind::ForbiddenOperatorError);
    assert_eq!(compile_error("x @ y\n").kind, ErrorKind::ForbiddenOperatorError);
}

#[test]
fn layout_faults() {
    assert_eq!(compile_error("if x:\n   y = 1\n").kind, ErrorKind::IndentationError);
    assert_eq!(compile_error("x = (1\n").kind, ErrorKind::ExpectedTokenError);
    assert_eq!(compile_error("x = 1)\n").kind, ErrorKind::MatchingBracketError);
}

#[test]
fn missing_else_block() {
    assert_eq!(
        compile_error("if x:\n    pass\n").kind,
        ErrorKind::NoElseBlockError
    );
}

#[test]
fn unknown_name_suggests_the_closest_builtin() {
    let err = compile_error("prin(1)\n");
    assert_eq!(err.kind, ErrorKind::NameNotFoundError);
    assert_eq!(err.suggestion.as_deref(), Some("print"));
    let rendered = err.render("prin(1)\n");
    assert!(rendered.ends_with("Perhaps you meant to type 'print'?"), "got: {rendered}");
}

#[test]
fn reassignment_of_a_function_name() {
    let source = "def f():\n    pass\ndef f():\n    pass\n";
    assert_eq!(compile_error(source).kind, ErrorKind::NameReassignmentError);
}

#[test]
fn runtime_caret_points_at_the_operator() {
    let runner = Runner::new("result = 1 / 0\n").unwrap();
    let err = runner.run_with(&mut CollectStringIo::new()).unwrap_err();
    assert_eq!(
        err.render(runner.source()),
        "ZeroDivisionError at line 1\n\n>>> result = 1 / 0\n    ~~~~~~~~~~~^~~\ndivision by zero"
    );
}

#[test]
fn type_error_caret_on_a_later_line() {
    let runner = Runner::new("x = 'a'\ny = 1\nx * y\n").unwrap();
    let err = runner.run_with(&mut CollectStringIo::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedOperandTypeError);
    let rendered = err.render(runner.source());
    assert!(rendered.starts_with("UnsupportedOperandTypeError at line 3\n"), "got: {rendered}");
    assert!(rendered.contains(">>> x * y"), "got: {rendered}");
    assert!(rendered.contains("~~^~~"), "got: {rendered}");
    assert!(
        rendered.contains("unsupported operand type(s) for *: 'str' and 'int'"),
        "got: {rendered}"
    );
}

#[test]
fn resolver_reports_the_same_error_for_the_same_source() {
    // Determinism: two pipelines over one source agree exactly.
    let first = compile_error("a = 1\nb = 2\nmissing_one + missing_two\n");
    let second = compile_error("a = 1\nb = 2\nmissing_one + missing_two\n");
    assert_eq!(first, second);
    assert!(first.message.contains("missing_one"));
}

#[test]
fn string_faults() {
    assert_eq!(compile_error("x = 'abc\n").kind, ErrorKind::UnterminatedStringError);
    assert_eq!(compile_error("x = 'a\\q'\n").kind, ErrorKind::UnsupportedEscapeError);
}

#[test]
fn number_faults() {
    assert_eq!(compile_error("x = 0x\n").kind, ErrorKind::InvalidNumberError);
    assert_eq!(compile_error("x = 1__0\n").kind, ErrorKind::InvalidNumberError);
}
