mod common;
use basic4::lang::ErrorCode;
use basic4::mach::Config;
use common::*;

#[test]
fn test_for_loop() {
    assert_eq!(run("dim i\nfor i = 1 to 3\nprint i\nnext"), "123");
    assert_eq!(run("dim i\nfor i = 3 to 1 step -1: print i: next"), "321");
    assert_eq!(
        run("dim x#\nfor x# = 0 to 1 step 0.5: print x#; \" \";: next"),
        "0 0.5 1 "
    );
}

#[test]
fn test_for_loop_can_run_zero_times() {
    assert_eq!(run("dim i\nfor i = 5 to 1: print i: next: print \"done\""), "done");
}

#[test]
fn test_for_loop_variable_after_loop() {
    assert_eq!(run("dim i\nfor i = 1 to 3: next\nprint i"), "4");
}

#[test]
fn test_while_and_do() {
    assert_eq!(run("dim i\nwhile i < 3\ni = i + 1\nprint i\nwend"), "123");
    assert_eq!(run("dim i\ndo\ni = i + 1\nloop until i = 3\nprint i"), "3");
    assert_eq!(run("dim i\ndo while i < 2\ni = i + 1\nloop\nprint i"), "2");
}

#[test]
fn test_if_elseif_else() {
    let source = r#"dim a
for a = 1 to 3
if a = 1 then
print "one"
elseif a = 2 then
print "two"
else
print "many"
endif
next"#;
    assert_eq!(run(source), "onetwomany");
}

#[test]
fn test_single_line_if() {
    let source = r#"language traditional
dim a
a = 2
if a = 2 then print "yes"
if a = 3 then print "no" else print "other"
print "end""#;
    assert_eq!(run(source), "yes\nother\nend\n");
}

#[test]
fn test_goto_and_gosub() {
    assert_eq!(run("goto skip\nprint \"no\"\nskip:\nprint \"yes\""), "yes");
    assert_eq!(run("gosub sub\nprint \"b\"\nend\nsub:\nprint \"a\"\nreturn"), "ab");
    assert_eq!(run("print 1\nend\nprint 2"), "1");
}

#[test]
fn test_flow_errors() {
    assert_eq!(run_err("return").code(), ErrorCode::ReturnWithoutGosub);
    assert_eq!(run_err("goto nowhere").code(), ErrorCode::UndefinedLabel);
    assert_eq!(run_err("top:\ndim a\ngoto top").code(), ErrorCode::RedimensionedArray);
}

#[test]
fn test_gosub_depth_is_limited() {
    let config = Config {
        max_calls: 10,
        ..Config::default()
    };
    let mut session = Session::with_config(&config, &[]);
    session.comp.compile("top:\ngosub top").unwrap();
    session.vm().reset();
    let err = exec_n(session.vm(), STEPS).unwrap_err();
    assert_eq!(err.code(), ErrorCode::StackOverflow);
}

#[test]
fn test_arrays() {
    assert_eq!(
        run("dim a(3), i\nfor i = 0 to 3: a(i) = i * i: next\nprint a(3); a(2)"),
        "94"
    );
    assert_eq!(run("dim m(2, 3)\nm(2, 3) = 5\nprint m(2, 3); m(1, 1)"), "50");
    assert_eq!(run_err("dim a(3)\na(4) = 1").code(), ErrorCode::SubscriptOutOfRange);
}

#[test]
fn test_array_copy() {
    assert_eq!(run("dim a(2), b(2)\na(1) = 7\nb = a\nprint b(1)"), "7");
    assert_eq!(run_err("dim a(2), b(3)\nb = a").code(), ErrorCode::ArraySizeMismatch);
}

#[test]
fn test_structures() {
    let source = "struc point\ndim x, y\nendstruc\ndim point p\np.x = 3\np.y = 4\nprint p.x * p.y";
    assert_eq!(run(source), "12");
    let source = r#"struc rec
dim name$, n
endstruc
dim rec a, rec b
a.name$ = "bob"
b = a
a.name$ = "sue"
print b.name$; a.name$"#;
    assert_eq!(run(source), "bobsue");
}

#[test]
fn test_strings() {
    assert_eq!(run("dim s$\ns$ = \"hello\"\nprint s$ + \" world\""), "hello world");
}

#[test]
fn test_pointers() {
    assert_eq!(run("dim a, &p\n&p = &a\np = 7\nprint a"), "7");
    assert_eq!(run("dim &p\nalloc p\np = 5\nprint p"), "5");
    assert_eq!(run("dim &a()\nalloc a, 4\na(4) = 3\nprint a(4)"), "3");
    assert_eq!(run_err("dim &p\np = 1").code(), ErrorCode::UnsetPointer);
}

#[test]
fn test_read_data() {
    assert_eq!(
        run("dim a, b$, c#\nread a, b$, c#\nprint a; b$; c#\ndata 1, hello, 2.5"),
        "1hello2.5"
    );
    assert_eq!(
        run("dim a\nread a\nreset second\nread a\nprint a\ndata 1\nsecond:\ndata 2"),
        "2"
    );
    assert_eq!(run_err("dim a\nread a").code(), ErrorCode::OutOfData);
    assert_eq!(run_err("dim a\nread a\ndata hello").code(), ErrorCode::TypeMismatch);
}

#[test]
fn test_input() {
    assert_eq!(run_input("dim a\ninput a\nprint a * 2", &["42"]), "84");
    assert_eq!(
        run_input("dim n$\ninput \"Name\"; n$\nprint \"hi \" + n$", &["bo"]),
        "Name? hi bo"
    );
    assert_eq!(run_input("dim a#\ninput a#\nprint a#", &["x"]), "0");
}
