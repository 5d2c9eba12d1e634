mod common;
use basic4::lang::ErrorCode;
use basic4::mach::{
    BasicType, Event, Opcode, Overload, Resources, Signature, ValType, Vm,
};
use common::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn test_string_functions() {
    assert_eq!(
        run(r#"print len("hello"); left$("hello", 2); mid$("hello", 2, 3); right$("hello", 2)"#),
        "5heelllo"
    );
    assert_eq!(
        run(r#"print upper$("abc"); lower$("DEF"); chr$(65); asc("B")"#),
        "ABCdefA66"
    );
    assert_eq!(run(r#"print val("12abc") + 1"#), "13");
    assert_eq!(run(r#"print str$(1.5) + "x"; str$(3)"#), "1.5x3");
    assert_eq!(run(r#"print LEN("ab")"#), "2");
}

#[test]
fn test_substring_extremes() {
    assert_eq!(
        run(r#"print mid$("abc", -2147483647 - 1, 2); mid$("abc", 2, 2147483647); left$("abc", -5)"#),
        "abbc"
    );
}

#[test]
fn test_math_functions() {
    assert_eq!(
        run(r#"print int(2.7); " "; int(-2.5); " "; sgn(-4); " "; abs(-1.5); " "; sqr(16)"#),
        "2 -3 -1 1.5 4"
    );
    let err = run_err("print sqr(-1)");
    assert_eq!(err.code(), ErrorCode::IllegalFunctionCall);
    assert_eq!(err.text(), "Function error: sqr");
}

#[test]
fn test_rnd() {
    let source = r#"dim i, ok
ok = true
for i = 1 to 200
if rnd() < 0 or rnd() > 32767 then
ok = false
endif
next
print ok"#;
    assert_eq!(run(source), "-1");
    assert_eq!(
        run("dim a, b\nrandomize 7\na = rnd()\nrandomize(7)\nb = rnd()\nprint a = b"),
        "-1"
    );
    assert_eq!(run("randomize\nprint rnd() >= 0"), "-1");
}

#[test]
fn test_input_function() {
    assert_eq!(run_input("print input$(); input$()", &["abc", "def"]), "abcdef");
    assert_eq!(run_input("print input$()", &[]), "");
}

fn kind_session() -> Session {
    let mut session = Session::new(&[]);
    session.comp.add_function(
        "kind",
        Signature::function(BasicType::String).param(BasicType::Int),
        Rc::new(|vm: &mut Vm| vm.set_reg_string("int")),
    );
    session.comp.add_function(
        "kind",
        Signature::function(BasicType::String).param(BasicType::String),
        Rc::new(|vm: &mut Vm| vm.set_reg_string("string")),
    );
    session.comp.add_function(
        "kind",
        Signature::function(BasicType::String),
        Rc::new(|vm: &mut Vm| vm.set_reg_string("none")),
    );
    session
}

#[test]
fn test_overloads() {
    let mut session = kind_session();
    session
        .comp
        .compile(r#"print kind(1); " "; kind("x"); " "; kind(); " "; kind(1.5)"#)
        .unwrap();
    session.vm().reset();
    assert!(exec_n(session.vm(), STEPS).unwrap());
    assert_eq!(session.output(), "int string none int");

    let err = session.comp.compile("print kind(1, 2)").unwrap_err();
    assert_eq!(err.code(), ErrorCode::SyntaxError);
}

#[test]
fn test_parameter_order() {
    let mut session = Session::new(&[]);
    session.comp.add_function(
        "digits",
        Signature::function(BasicType::Int)
            .param(BasicType::Int)
            .param(BasicType::Int)
            .param(BasicType::Int),
        Rc::new(|vm: &mut Vm| {
            let value = vm.int_param(3) * 100 + vm.int_param(2) * 10 + vm.int_param(1);
            vm.set_reg_int(value);
        }),
    );
    session.comp.compile("print digits(1, 2, 3)").unwrap();
    session.vm().reset();
    assert!(exec_n(session.vm(), STEPS).unwrap());
    assert_eq!(session.output(), "123");
}

#[test]
fn test_statement_function() {
    let count = Rc::new(Cell::new(0));
    let mut session = Session::new(&[]);
    let counter = count.clone();
    session.comp.add_function(
        "beep",
        Signature::statement().no_brackets(),
        Rc::new(move |_: &mut Vm| counter.set(counter.get() + 1)),
    );
    session.comp.compile("beep\nbeep: beep").unwrap();
    session.vm().reset();
    assert!(exec_n(session.vm(), STEPS).unwrap());
    assert_eq!(count.get(), 3);

    let err = session.comp.compile("dim a\na = beep()").unwrap_err();
    assert_eq!(err.text(), "beep does not return a value");
}

#[test]
fn test_host_function_error() {
    let mut session = Session::new(&[]);
    session.comp.add_function(
        "fail",
        Signature::statement().no_brackets(),
        Rc::new(|vm: &mut Vm| vm.function_error("fail")),
    );
    session.comp.compile("print 1\nfail\nprint 2").unwrap();
    session.vm().reset();
    let err = exec_n(session.vm(), STEPS).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalFunctionCall);
    assert_eq!(err.line_number(), Some(2));
    assert_eq!(session.output(), "1");
}

#[test]
fn test_timeshare_yields() {
    let mut session = Session::new(&[]);
    session.comp.add_function(
        "frame",
        Signature::statement().no_brackets().timeshare(),
        Rc::new(|_: &mut Vm| {}),
    );
    session.comp.compile("print 1\nframe\nprint 2").unwrap();
    session.vm().reset();
    assert_eq!(session.vm().execute(STEPS), Event::Yield);
    assert_eq!(session.output(), "1");
    assert_eq!(session.vm().execute(STEPS), Event::End);
    assert_eq!(session.output(), "12");
}

#[derive(Default)]
struct Handles {
    open: Vec<i32>,
}

impl Resources for Handles {
    fn clear(&mut self) {
        self.open.clear();
    }
}

#[test]
fn test_reset_hooks() {
    let mut session = Session::new(&[]);
    let resets = Rc::new(Cell::new(0));
    let counter = resets.clone();
    session
        .vm()
        .add_init_function(Rc::new(move |_: &mut Vm| counter.set(counter.get() + 1)));
    let handles = Rc::new(RefCell::new(Handles::default()));
    session.vm().add_resources(handles.clone());
    let opened = handles.clone();
    session.comp.add_function(
        "open",
        Signature::statement().no_brackets().param(BasicType::Int),
        Rc::new(move |vm: &mut Vm| opened.borrow_mut().open.push(vm.int_param(1))),
    );
    session.comp.compile("open 4\nopen 5").unwrap();
    session.vm().reset();
    assert!(exec_n(session.vm(), STEPS).unwrap());
    assert_eq!(handles.borrow().open, vec![4, 5]);
    session.vm().reset();
    assert!(handles.borrow().open.is_empty());
    assert_eq!(resets.get(), 2);
}

#[test]
fn test_operator_extensions() {
    let mut session = Session::new(&[]);
    let repeat = session.vm().add_operator_function(Rc::new(|vm: &mut Vm| {
        let count = vm.reg().int().max(0) as usize;
        let s = vm.reg2_string().repeat(count);
        vm.set_reg_string(s);
    }));
    let reverse = session.vm().add_operator_function(Rc::new(|vm: &mut Vm| {
        let s: String = vm.reg_string().chars().rev().collect();
        vm.set_reg_string(s);
    }));
    let string = ValType::from(BasicType::String);
    session.comp.add_binary_extension(Rc::new(
        move |reg: &ValType, reg2: &ValType, opcode: Opcode| {
            if opcode == Opcode::Times && reg.is(BasicType::Int) && reg2.is(BasicType::String) {
                Some(Overload {
                    reg: *reg,
                    reg2: *reg2,
                    function: repeat,
                    result: string,
                    free_temp: false,
                })
            } else {
                None
            }
        },
    ));
    session
        .comp
        .add_unary_extension(Rc::new(move |reg: &ValType, opcode: Opcode| {
            if opcode == Opcode::Neg && reg.is(BasicType::String) {
                Some(Overload {
                    reg: *reg,
                    reg2: *reg,
                    function: reverse,
                    result: string,
                    free_temp: false,
                })
            } else {
                None
            }
        }));
    session
        .comp
        .compile(r#"print "ab" * 3; " "; 2 * 3; " "; -"abc""#)
        .unwrap();
    session.vm().reset();
    assert!(exec_n(session.vm(), STEPS).unwrap());
    assert_eq!(session.output(), "ababab 6 cba");
}

fn vec3_session() -> Session {
    let mut session = Session::new(&[]);
    session.comp.add_function(
        "vec3",
        Signature::function(ValType::new(BasicType::Real, 1, 1, true)).free_temp(),
        Rc::new(|vm: &mut Vm| {
            let address = vm.temp_real_array(&[3.0, 2.0, 1.0]);
            vm.set_reg_int(address);
        }),
    );
    session
}

#[test]
fn test_temporary_data_is_released() {
    let mut plain = vec3_session();
    plain.comp.compile("dim a#(2)").unwrap();
    plain.vm().reset();
    assert!(exec_n(plain.vm(), STEPS).unwrap());
    let size = plain.comp.vm().data().len();

    let mut session = vec3_session();
    session
        .comp
        .compile("dim a#(2)\na# = vec3()\nprint a#(0); a#(1); a#(2)")
        .unwrap();
    assert!(opcodes_contain(&session, Opcode::FreeTemp));
    session.vm().reset();
    assert!(exec_n(session.vm(), STEPS).unwrap());
    assert_eq!(session.output(), "321");

    let vm = session.comp.vm();
    assert_eq!(vm.data().len(), size);
    assert_eq!(vm.data().temp_start(), None);
    let index = vm.variables().find("a").unwrap();
    let address = vm.variables().get(index).unwrap().data_index;
    assert_eq!(vm.read_real_array(address as i32), Some(vec![3.0, 2.0, 1.0]));
}

fn opcodes_contain(session: &Session, opcode: Opcode) -> bool {
    session.comp.vm().code().iter().any(|i| i.opcode == opcode)
}
