mod common;
use basic4::lang::ErrorCode;
use basic4::mach::Config;
use common::*;

#[test]
fn test_precedence() {
    assert_eq!(run("print 2 + 3 * 4"), "14");
    assert_eq!(run("print (2 + 3) * 4"), "20");
    assert_eq!(run("print -2 * 3"), "-6");
    assert_eq!(run("print 10 - 4 - 3"), "3");
}

#[test]
fn test_division_follows_dialect() {
    assert_eq!(run("print 7 / 2"), "3");
    assert_eq!(run("language traditional\nprint 7 / 2"), "3.5\n");
    assert_eq!(run("print 7 / 2\nlanguage traditional\nprint 7 / 2"), "33.5\n");
    assert_eq!(run("language traditional_print\nprint 7 / 2\nprint 1"), "3\n1\n");
}

#[test]
fn test_real_formatting() {
    assert_eq!(run("print 1.0 / 4"), "0.25");
    assert_eq!(run("print 1.5 * 2"), "3");
    assert_eq!(run("print 0.1 + 0.2"), "0.3");
    assert_eq!(run("print 1000000.0"), "1e+06");
    assert_eq!(run("dim a#\nprint 1 / a#"), "inf");
}

#[test]
fn test_booleans_are_minus_one() {
    assert_eq!(run(r#"print 1 < 2; " "; 2 < 1"#), "-1 0");
    assert_eq!(run(r#"print not 0; " "; not 5"#), "-1 0");
    assert_eq!(run(r#"print 6 and 3; " "; 6 or 3; " "; 6 xor 3"#), "2 7 5");
    assert_eq!(run(r#"print "abc" < "abd"; "b" = "b""#), "-1-1");
    assert_eq!(run("print 0.5 < 1"), "-1");
}

#[test]
fn test_string_promotion() {
    assert_eq!(run(r#"print "a" + 1; "b" + 1.5"#), "a1b1.5");
    assert_eq!(run(r#"dim s$: s$ = "n" + 2 * 3: print s$"#), "n6");
}

#[test]
fn test_integer_wraps() {
    assert_eq!(run("dim a\na = 2147483647\nprint a + 1"), "-2147483648");
}

#[test]
fn test_division_by_zero() {
    let err = run_err("dim a\nprint 1 / a");
    assert_eq!(err.code(), ErrorCode::DivisionByZero);
    assert_eq!(err.line_number(), Some(2));
}

#[test]
fn test_type_errors() {
    let err = run_err("dim a\na = \"x\"");
    assert_eq!(err.code(), ErrorCode::TypeMismatch);
    assert_eq!(err.text(), "Types do not match");
    let err = run_err("print b");
    assert_eq!(err.code(), ErrorCode::UndimmedVariable);
    assert_eq!(err.text(), "Unknown variable: b. Must be declared with DIM");
}

#[test]
fn test_constants() {
    assert_eq!(run("const n = 10\nprint n * 2"), "20");
    assert_eq!(run("print true; false"), "-10");
    assert_eq!(run("print int(pi * 100)"), "314");
}

#[test]
fn test_case_sensitivity() {
    assert_eq!(run("DIM A\nA = 3\nprint a"), "3");
    let config = Config {
        case_sensitive: true,
        ..Config::default()
    };
    let mut session = Session::with_config(&config, &[]);
    let err = session.comp.compile("dim A\nprint a").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UndimmedVariable);
}
