//! Scenario 2 (spec.md §8): `max(a:u16, b:u16) -> (o:u16)`,
//! `jz (a<b) L1; o=a; ret; L1: o=b; ret`.
//!
//! `a < b` is computed the way the register splitter itself derives a
//! borrow: `b0, diff := a - b` with a dedicated 1-bit borrow register;
//! `b0 != 0` means the subtraction underflowed, i.e. `a < b`.

use crate::arith::Int;
use crate::config::FieldConfig;
use crate::interp::{execute, RunOutcome};
use crate::ir::{CondSign, MacroInstr, MacroOp};
use crate::register::{Function, Kind, MacroFunction, Register, RegisterId};

fn max_function() -> MacroFunction {
    Function {
        name: "max".into(),
        registers: vec![
            Register::new(Kind::Input, "a", 16),
            Register::new(Kind::Input, "b", 16),
            Register::new(Kind::Output, "o", 16),
            Register::new(Kind::Temp, "diff", 16),
            Register::new(Kind::Temp, "borrow", 1),
        ],
        code: vec![
            // 0: borrow, diff := a - b
            MacroInstr::Assign {
                targets: vec![RegisterId(3), RegisterId(4)],
                sources: vec![RegisterId(0), RegisterId(1)],
                constant: Int::zero(),
                op: MacroOp::Sub,
            },
            // 1: jnz borrow -> 4 (a < b, take b)
            MacroInstr::CondJump {
                sign: CondSign::IfNotZero,
                source: RegisterId(4),
                target: 4,
            },
            // 2: o = a
            MacroInstr::Assign {
                targets: vec![RegisterId(2)],
                sources: vec![RegisterId(0)],
                constant: Int::zero(),
                op: MacroOp::Add,
            },
            MacroInstr::Return,
            // 4: o = b
            MacroInstr::Assign {
                targets: vec![RegisterId(2)],
                sources: vec![RegisterId(1)],
                constant: Int::zero(),
                op: MacroOp::Add,
            },
            MacroInstr::Return,
        ],
    }
}

fn run(a: u64, b: u64, vectorise: bool) -> Int {
    let config = FieldConfig::validate(32, 32, vectorise).unwrap();
    let micro = crate::assemble(&max_function(), &config).unwrap();
    match execute(std::slice::from_ref(&micro), 0, &[Int::from_u64(a), Int::from_u64(b)], 100).unwrap() {
        RunOutcome::Returned(values) => values[2].clone(),
        other => panic!("expected Returned, got {:?}", other),
    }
}

#[test]
fn picks_the_first_operand_when_larger() {
    assert_eq!(run(100, 42, false), Int::from_u64(100));
}

#[test]
fn picks_the_second_operand_when_larger() {
    assert_eq!(run(42, 100, false), Int::from_u64(100));
}

#[test]
fn vectorised_form_agrees_with_the_unvectorised_one() {
    assert_eq!(run(42, 100, true), Int::from_u64(100));
    assert_eq!(run(100, 42, true), Int::from_u64(100));
}
