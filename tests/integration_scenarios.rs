//! End-to-end scenarios run through the public `Interpreter` API: feed
//! program text line by line, `RUN`, then inspect the resulting variable
//! state. Exercises the tokenizer, evaluator, dispatcher, and control-flow
//! engine together rather than any one module in isolation.

use cbasic::io::{BreakSignal, LineSource, NeverBreak, Output};
use cbasic::value::{VarName, Value};
use cbasic::{Interpreter, InterpreterConfig};

/// `INPUT`/`GET` are unused by these scenarios; always signal end-of-input.
struct NoInput;

impl LineSource for NoInput {
    fn read_line(&mut self) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct Capture {
    bytes: Vec<u8>,
}

impl Output for Capture {
    fn put_byte(&mut self, b: u8) {
        self.bytes.push(b);
    }
}

fn run_program(src: &str) -> Interpreter<Capture, NoInput, NeverBreak> {
    let mut interp = Interpreter::new(InterpreterConfig::default(), Capture::default(), NoInput, NeverBreak);
    for line in src.lines() {
        let line = line.trim();
        if !line.is_empty() {
            interp.execute_line(line).expect("program line should execute cleanly");
        }
    }
    interp.execute_line("RUN").expect("RUN should complete without error");
    interp
}

fn scalar_number(interp: &Interpreter<Capture, NoInput, NeverBreak>, name: &str) -> f64 {
    match interp.variables.get_scalar(VarName::parse(name)) {
        Some(Value::Number(n)) => n,
        Some(Value::Integer(n)) => n as f64,
        other => panic!("expected a number in {name}, got {other:?}"),
    }
}

fn scalar_string(interp: &Interpreter<Capture, NoInput, NeverBreak>, name: &str) -> String {
    match interp.variables.get_scalar(VarName::parse(name)) {
        Some(Value::Str(r)) => interp.strings.get(r).to_string(),
        other => panic!("expected a string in {name}, got {other:?}"),
    }
}

#[test]
fn factorial_via_for_next() {
    let interp = run_program(
        "10 N=5
         20 F=1
         30 FOR I=1 TO N
         40 F=F*I
         50 NEXT I",
    );
    assert_eq!(scalar_number(&interp, "F"), 120.0);
    assert_eq!(scalar_number(&interp, "I"), 6.0);
}

#[test]
fn nested_gosub_accumulates() {
    let interp = run_program(
        "10 A=0
         20 GOSUB 100
         30 END
         100 A=A+1
         110 GOSUB 200
         120 A=A+1
         130 RETURN
         200 A=A+10
         210 RETURN",
    );
    assert_eq!(scalar_number(&interp, "A"), 12.0);
}

#[test]
fn read_data_restore_rereads_from_start() {
    let interp = run_program(
        "10 READ A,B,C
         20 S=A+B+C
         30 RESTORE
         40 READ X
         50 S=S+X
         60 DATA 10,20,30",
    );
    assert_eq!(scalar_number(&interp, "S"), 70.0);
}

#[test]
fn two_dimensional_array_row_major() {
    let interp = run_program(
        "10 DIM A(3,3)
         20 FOR I=0 TO 3: FOR J=0 TO 3: A(I,J)=I*10+J: NEXT J: NEXT I
         30 S=A(2,3)+A(3,2)",
    );
    assert_eq!(scalar_number(&interp, "S"), 55.0);
}

#[test]
fn string_concat_then_val_and_str() {
    let interp = run_program(
        "10 A$=\"12\"+\"34\"
         20 X=VAL(A$)+1",
    );
    assert_eq!(scalar_number(&interp, "X"), 1235.0);
    assert_eq!(scalar_string(&interp, "A$"), "1234");
}

#[test]
fn on_goto_out_of_range_falls_through() {
    let interp = run_program(
        "10 X=4
         20 ON X GOTO 100,200,300
         30 A=99
         40 END
         100 A=1
         200 A=2
         300 A=3",
    );
    assert_eq!(scalar_number(&interp, "A"), 99.0);
}

#[test]
fn unary_minus_binds_looser_than_power() {
    let interp = run_program("10 X=-2^2");
    assert_eq!(scalar_number(&interp, "X"), -4.0);
}

#[test]
fn power_is_right_associative() {
    let interp = run_program("10 X=2^3^2");
    assert_eq!(scalar_number(&interp, "X"), 512.0);
}

#[test]
fn next_without_for_is_caught() {
    let mut interp = Interpreter::new(InterpreterConfig::default(), Capture::default(), NoInput, NeverBreak);
    interp.execute_line("10 NEXT I").unwrap();
    assert!(interp.execute_line("RUN").is_err());
}

#[test]
fn return_without_gosub_is_caught() {
    let mut interp = Interpreter::new(InterpreterConfig::default(), Capture::default(), NoInput, NeverBreak);
    interp.execute_line("10 RETURN").unwrap();
    assert!(interp.execute_line("RUN").is_err());
}

#[test]
fn goto_missing_line_is_undefined_statement() {
    let mut interp = Interpreter::new(InterpreterConfig::default(), Capture::default(), NoInput, NeverBreak);
    interp.execute_line("10 GOTO 999").unwrap();
    assert!(interp.execute_line("RUN").is_err());
}

#[test]
fn auto_dim_then_explicit_dim_is_redimensioned_error() {
    let mut interp = Interpreter::new(InterpreterConfig::default(), Capture::default(), NoInput, NeverBreak);
    interp.execute_line("10 A(5)=1").unwrap();
    interp.execute_line("20 DIM A(10)").unwrap();
    assert!(interp.execute_line("RUN").is_err());
}

#[test]
fn shared_storage_across_truncated_names() {
    let interp = run_program("10 SCORE=1: SC=SC+1: SCOREBOARD=SCOREBOARD+1");
    assert_eq!(scalar_number(&interp, "SCORE"), 3.0);
}

#[test]
fn dollar_suffix_is_a_distinct_identity() {
    let interp = run_program("10 A=5: A$=\"HELLO\"");
    assert_eq!(scalar_number(&interp, "A"), 5.0);
    assert_eq!(scalar_string(&interp, "A$"), "HELLO");
}

#[test]
fn left_right_mid_reconstruct_original_string() {
    let interp = run_program(
        "10 S$=\"HELLOWORLD\"
         20 R$=LEFT$(S$,5)+MID$(S$,6,3)+RIGHT$(S$,2)",
    );
    assert_eq!(scalar_string(&interp, "R$"), "HELLOWORLD");
}

#[test]
fn def_fn_evaluates_with_parameter_shadowing() {
    let interp = run_program(
        "10 X=100
         20 DEF FNA(X)=X*X+1
         30 Y=FNA(3)
         40 Z=X",
    );
    assert_eq!(scalar_number(&interp, "Y"), 10.0);
    assert_eq!(scalar_number(&interp, "Z"), 100.0);
}
