//! Scenario 5 (spec.md §8): `b, x := y - z`, widths as scenario 4.
//! Instance `{y: 5, z: 8}` underflows and wraps two's-complement style
//! within 8 bits, with the borrow bit set.

use crate::arith::Int;
use crate::config::FieldConfig;
use crate::interp::{execute, RunOutcome};
use crate::ir::{MacroInstr, MacroOp};
use crate::register::{Function, Kind, MacroFunction, Register, RegisterId};

fn borrow_function() -> MacroFunction {
    Function {
        name: "borrow".into(),
        registers: vec![
            Register::new(Kind::Input, "y", 8),
            Register::new(Kind::Input, "z", 8),
            Register::new(Kind::Output, "x", 8),
            Register::new(Kind::Output, "b", 1),
        ],
        code: vec![
            MacroInstr::Assign {
                targets: vec![RegisterId(2), RegisterId(3)],
                sources: vec![RegisterId(0), RegisterId(1)],
                constant: Int::zero(),
                op: MacroOp::Sub,
            },
            MacroInstr::Return,
        ],
    }
}

fn run(y: u64, z: u64) -> (Int, Int) {
    let config = FieldConfig::validate(32, 32, false).unwrap();
    let micro = crate::assemble(&borrow_function(), &config).unwrap();
    match execute(std::slice::from_ref(&micro), 0, &[Int::from_u64(y), Int::from_u64(z)], 100).unwrap() {
        RunOutcome::Returned(values) => (values[2].clone(), values[3].clone()),
        other => panic!("expected Returned, got {:?}", other),
    }
}

#[test]
fn underflow_wraps_and_sets_the_borrow_bit() {
    let (x, b) = run(5, 8);
    assert_eq!(x, Int::from_u64(253));
    assert_eq!(b, Int::one());
}

#[test]
fn no_borrow_when_the_difference_is_non_negative() {
    let (x, b) = run(8, 5);
    assert_eq!(x, Int::from_u64(3));
    assert_eq!(b, Int::zero());
}
