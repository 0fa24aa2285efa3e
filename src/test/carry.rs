//! Scenario 4 (spec.md §8): `c, x := y + z` with `x, y, z: u8`, `c: u1`.
//! Widths are within the field, so the splitter passes the instruction
//! through unsplit.

use crate::arith::Int;
use crate::config::FieldConfig;
use crate::interp::{execute, RunOutcome};
use crate::ir::{MacroInstr, MacroOp};
use crate::register::{Function, Kind, MacroFunction, Register, RegisterId};

fn carry_function() -> MacroFunction {
    Function {
        name: "carry".into(),
        registers: vec![
            Register::new(Kind::Input, "y", 8),
            Register::new(Kind::Input, "z", 8),
            Register::new(Kind::Output, "x", 8),
            Register::new(Kind::Output, "c", 1),
        ],
        code: vec![
            MacroInstr::Assign {
                targets: vec![RegisterId(2), RegisterId(3)],
                sources: vec![RegisterId(0), RegisterId(1)],
                constant: Int::zero(),
                op: MacroOp::Add,
            },
            MacroInstr::Return,
        ],
    }
}

#[test]
fn carry_out_and_wrapped_sum_match_the_literal_scenario() {
    let config = FieldConfig::validate(32, 32, false).unwrap();
    let micro = crate::assemble(&carry_function(), &config).unwrap();
    match execute(std::slice::from_ref(&micro), 0, &[Int::from_u64(200), Int::from_u64(100)], 100).unwrap() {
        RunOutcome::Returned(values) => {
            assert_eq!(values[2], Int::from_u64(44));
            assert_eq!(values[3], Int::one());
        }
        other => panic!("expected Returned, got {:?}", other),
    }
}

#[test]
fn no_carry_when_the_sum_fits() {
    let config = FieldConfig::validate(32, 32, false).unwrap();
    let micro = crate::assemble(&carry_function(), &config).unwrap();
    match execute(std::slice::from_ref(&micro), 0, &[Int::from_u64(1), Int::from_u64(2)], 100).unwrap() {
        RunOutcome::Returned(values) => {
            assert_eq!(values[2], Int::from_u64(3));
            assert_eq!(values[3], Int::zero());
        }
        other => panic!("expected Returned, got {:?}", other),
    }
}
