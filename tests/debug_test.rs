mod common;
use basic4::lang::ErrorCode;
use basic4::mach::{Event, Instruction, Opcode, Vm, MAX_DISPLAY};
use common::*;

const PROGRAM: &str = "dim a\na = 1\na = 2\na = 3";

fn opcodes(vm: &Vm) -> Vec<Opcode> {
    vm.code().iter().map(|i| i.opcode).collect()
}

fn code_bytes(vm: &Vm) -> Vec<u8> {
    vm.code().iter().flat_map(Instruction::to_bytes).collect()
}

fn line(vm: &Vm) -> Option<u32> {
    vm.ip_position().map(|(line, _)| line)
}

fn var(vm: &Vm, name: &str) -> String {
    vm.var_to_string(name, MAX_DISPLAY).unwrap_or_default()
}

#[test]
fn test_breakpoint_stops_and_resumes() {
    let mut session = Session::new(&[]);
    session.comp.compile(PROGRAM).unwrap();
    let vm = session.vm();
    let original = opcodes(vm);
    let original_bytes = code_bytes(vm);

    vm.set_user_breakpoint(3);
    vm.reset();
    vm.patch_in();
    assert!(vm.is_patched());
    assert_ne!(opcodes(vm), original);
    assert_eq!(vm.execute(STEPS), Event::Breakpoint);
    assert!(vm.paused());
    assert_eq!(line(vm), Some(3));
    assert_eq!(var(vm, "a"), "1");

    vm.patch_out();
    assert!(!vm.is_patched());
    assert_eq!(opcodes(vm), original);
    assert_eq!(code_bytes(vm), original_bytes);
    assert_eq!(vm.execute(1), Event::Running);
    vm.patch_in();
    assert!(exec_n(vm, STEPS).unwrap());
    assert_eq!(var(vm, "a"), "3");
}

#[test]
fn test_breakpoint_without_code_is_ignored() {
    let mut session = Session::new(&[]);
    session.comp.compile("dim a\n\na = 1").unwrap();
    let vm = session.vm();
    vm.set_user_breakpoint(2);
    vm.set_user_breakpoint(99);
    vm.reset();
    vm.patch_in();
    assert_eq!(vm.execute(STEPS), Event::End);
    assert_eq!(vm.user_breakpoints(), vec![2, 99]);
    vm.clear_user_breakpoint(99);
    assert!(vm.is_user_breakpoint(2));
    assert!(!vm.is_user_breakpoint(99));
}

#[test]
fn test_step_to_next_line() {
    let mut session = Session::new(&[]);
    session.comp.compile(PROGRAM).unwrap();
    let vm = session.vm();
    vm.set_user_breakpoint(2);
    vm.reset();
    vm.patch_in();
    assert_eq!(vm.execute(STEPS), Event::Breakpoint);
    assert_eq!(line(vm), Some(2));

    vm.clear_user_breakpoints();
    vm.add_step_breakpoints(false);
    vm.patch_in();
    assert_eq!(vm.execute(STEPS), Event::Breakpoint);
    assert_eq!(line(vm), Some(3));
    assert_eq!(var(vm, "a"), "1");

    vm.clear_temp_breakpoints();
    assert!(exec_n(vm, STEPS).unwrap());
}

#[test]
fn test_step_out_of_gosub() {
    let mut session = Session::new(&[]);
    session
        .comp
        .compile("gosub sub\nprint \"x\"\nend\nsub:\nreturn")
        .unwrap();
    let vm = session.vm();
    assert!(!vm.add_step_out_breakpoint());
    vm.set_user_breakpoint(5);
    vm.reset();
    vm.patch_in();
    assert_eq!(vm.execute(STEPS), Event::Breakpoint);
    assert_eq!(line(vm), Some(5));
    let calls = vm.return_addresses();
    assert_eq!(calls.len(), 1);
    assert_eq!(session.comp.describe_call(calls[0]), "sub");
    assert_eq!(session.comp.describe_call(0), "???");

    let vm = session.vm();
    vm.clear_user_breakpoints();
    assert!(vm.add_step_out_breakpoint());
    vm.patch_in();
    assert_eq!(vm.execute(STEPS), Event::Breakpoint);
    assert_eq!(line(vm), Some(2));
    vm.clear_temp_breakpoints();
    assert!(exec_n(vm, STEPS).unwrap());
    assert_eq!(session.output(), "x");
}

#[test]
fn test_watch_expression() {
    let mut session = Session::new(&[]);
    session.comp.compile(PROGRAM).unwrap();
    session.vm().set_user_breakpoint(3);
    session.vm().reset();
    session.vm().patch_in();
    assert_eq!(session.vm().execute(STEPS), Event::Breakpoint);

    assert_eq!(session.comp.evaluate("a * 10").unwrap(), "10");
    assert!(session.comp.evaluate("a +").is_err());
    assert_eq!(line(session.comp.vm()), Some(3));

    let vm = session.vm();
    vm.patch_out();
    assert_eq!(vm.execute(1), Event::Running);
    vm.patch_in();
    assert!(exec_n(vm, STEPS).unwrap());
    assert_eq!(var(vm, "a"), "3");
}

#[test]
fn test_step_zero_loop_never_ends() {
    let mut session = Session::new(&[]);
    session.comp.compile("dim i\nfor i = 1 to 2 step 0\nnext").unwrap();
    session.vm().reset();
    assert_eq!(session.vm().execute(10_000), Event::Running);
    assert!(!exec_n(session.vm(), 10_000).unwrap());
    assert_eq!(var(session.comp.vm(), "i"), "1");
}

#[test]
fn test_variable_display() {
    let source = r#"struc pt
dim x, name$
endstruc
dim pt p, n(2), &q, s$
p.x = 3
p.name$ = "a"
n(1) = 7
s$ = "hi""#;
    let mut session = Session::new(&[]);
    session.comp.compile(source).unwrap();
    let vm = session.vm();
    assert_eq!(var(vm, "p"), "[UNSET]");
    vm.reset();
    assert!(exec_n(vm, STEPS).unwrap());
    assert_eq!(var(vm, "p"), "{x=3, name$=\"a\"}");
    assert_eq!(var(vm, "n"), "{0, 7, 0}");
    assert_eq!(var(vm, "q"), "[UNSET POINTER]");
    assert_eq!(var(vm, "s$"), "\"hi\"");
    assert_eq!(vm.var_to_string("nope", MAX_DISPLAY), None);
    assert_eq!(vm.var_to_string("n", 3).unwrap(), "{0,");
}

#[test]
fn test_snapshot_round_trip() {
    let source = "dim a, s$\nread a, s$\nprint s$; a * 2\ndata 21, answer";
    let mut first = Session::new(&[]);
    first.comp.compile(source).unwrap();
    first.vm().set_user_breakpoint(3);
    first.vm().patch_in();
    let bytes = first.comp.vm().write_snapshot();
    first.vm().patch_out();

    let mut second = Session::new(&[]);
    second.vm().read_snapshot(&bytes).unwrap();
    assert_eq!(opcodes(second.comp.vm()), opcodes(first.comp.vm()));
    assert!(!opcodes(second.comp.vm()).contains(&Opcode::Breakpt));
    assert_eq!(second.comp.vm().listing(), first.comp.vm().listing());
    second.vm().reset();
    assert!(exec_n(second.vm(), STEPS).unwrap());
    assert_eq!(second.output(), "answer42");
}

#[test]
fn test_snapshot_corruption() {
    let mut session = Session::new(&[]);
    session.comp.compile("print 1").unwrap();
    let mut bytes = session.comp.vm().write_snapshot();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let err = session.vm().read_snapshot(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::StreamError);
    assert!(session.vm().read_snapshot(&bytes[..6]).is_err());
}
