//! Assembler core: macro/micro lowering, vectorisation, register splitting
//! and a tracing interpreter for a register-transfer instruction language.
//!
//! Data flows strictly downward: a macro [`register::Function`] is
//! validated, [`lower`]ed into a micro function, optionally
//! [`vectorise`]d, [`split`] to fit a bounded field width, and finally
//! executed by [`interp`]. The lexer/parser producing the macro form, and
//! everything downstream of a built [`trace::Trace`], are external
//! collaborators this crate only exposes thin interfaces for
//! ([`sourcemap`], [`trace`]).

pub mod arith;
pub mod config;
pub mod error;
pub mod interp;
pub mod ir;
pub mod lower;
pub mod register;
pub mod sourcemap;
pub mod split;
pub mod trace;
pub mod validate;
pub mod vectorise;

#[cfg(test)]
mod test;

use crate::config::FieldConfig;
use crate::error::Error;
use crate::register::{MacroFunction, MicroFunction};

/// Runs the full downstream pipeline spec.md §2 describes for a single
/// function: validate, lower, optionally vectorise, split. Returns the
/// executable micro function, or the batched validator diagnostics if the
/// macro function was not well-formed.
pub fn assemble(f: &MacroFunction, config: &FieldConfig) -> Result<MicroFunction, Error> {
    let diags = validate::validate(f);
    if !diags.is_empty() {
        return Err(Error::Diagnostics(diags));
    }
    let micro = lower::lower(f);
    let micro = if config.vectorise { vectorise::vectorise(&micro) } else { micro };
    split::split(&micro, config).map_err(Error::Diagnostics)
}

#[cfg(test)]
mod crate_test {
    use super::*;
    use crate::ir::{CondSign, MacroInstr, MacroOp};
    use crate::register::{Kind, Register, RegisterId};

    fn counter() -> MacroFunction {
        register::Function {
            name: "counter".into(),
            registers: vec![
                Register::new(Kind::Input, "i", 8),
                Register::new(Kind::Output, "o", 8),
            ],
            code: vec![
                MacroInstr::Assign {
                    targets: vec![RegisterId(1)],
                    sources: vec![RegisterId(0)],
                    constant: arith::Int::from_u64(1),
                    op: MacroOp::Add,
                },
                MacroInstr::Return,
            ],
        }
    }

    #[test]
    fn assemble_rejects_ill_formed_functions() {
        let mut f = counter();
        f.code.pop();
        let config = FieldConfig::validate(32, 32, false).unwrap();
        assert!(assemble(&f, &config).is_err());
    }

    #[test]
    fn assemble_produces_an_executable_micro_function() {
        let f = counter();
        let config = FieldConfig::validate(32, 32, false).unwrap();
        let micro = assemble(&f, &config).unwrap();
        let out = interp::execute(std::slice::from_ref(&micro), 0, &[arith::Int::from_u64(7)], 100).unwrap();
        match out {
            interp::RunOutcome::Returned(values) => assert_eq!(values[1], arith::Int::from_u64(8)),
            other => panic!("expected Returned, got {:?}", other),
        }
    }

    #[test]
    fn assemble_with_vectorise_still_returns_the_same_outputs() {
        let max = register::Function {
            name: "max".into(),
            registers: vec![
                Register::new(Kind::Input, "a", 8),
                Register::new(Kind::Input, "b", 8),
                Register::new(Kind::Output, "o", 8),
            ],
            code: vec![
                MacroInstr::CondJump {
                    sign: CondSign::IfZero,
                    source: RegisterId(0),
                    target: 3,
                },
                MacroInstr::Assign {
                    targets: vec![RegisterId(2)],
                    sources: vec![RegisterId(0)],
                    constant: arith::Int::zero(),
                    op: MacroOp::Add,
                },
                MacroInstr::Return,
                MacroInstr::Assign {
                    targets: vec![RegisterId(2)],
                    sources: vec![RegisterId(1)],
                    constant: arith::Int::zero(),
                    op: MacroOp::Add,
                },
                MacroInstr::Return,
            ],
        };
        let config = FieldConfig::validate(32, 32, true).unwrap();
        let micro = assemble(&max, &config).unwrap();
        let out = interp::execute(
            std::slice::from_ref(&micro),
            0,
            &[arith::Int::from_u64(0), arith::Int::from_u64(9)],
            100,
        )
        .unwrap();
        match out {
            interp::RunOutcome::Returned(values) => assert_eq!(values[2], arith::Int::from_u64(9)),
            other => panic!("expected Returned, got {:?}", other),
        }
    }
}
