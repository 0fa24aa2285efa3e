//! Macro-to-micro lowering (spec.md §4.1).
//!
//! One-to-one expansion: every macro instruction at position `pc` becomes
//! exactly one micro packet at the same position, with the same register
//! list carried through unchanged.

use crate::ir::{CondSign, MacroInstr, Microcode, MicroInstr, Source};
use crate::register::{Function, MacroFunction, MicroFunction};

pub fn lower(f: &MacroFunction) -> MicroFunction {
    let code = f.code.iter().map(lower_instr).collect();
    let mut out = Function {
        name: f.name.clone(),
        registers: f.registers.clone(),
        code,
    };
    resolve_fallthroughs(&mut out);
    out
}

fn lower_instr(instr: &MacroInstr) -> MicroInstr {
    match instr {
        MacroInstr::Assign {
            targets,
            sources,
            constant,
            op,
        } => MicroInstr::new(vec![
            Microcode::Arith {
                op: *op,
                targets: targets.clone(),
                sources: sources.clone(),
                constant: constant.clone(),
            },
            // The trailing jump gives the vectoriser a concrete microcode to
            // identify and inline this packet by, at a caller site.
            Microcode::Jmp { target: usize::MAX },
        ]),
        MacroInstr::Jump { target } => MicroInstr::new(vec![Microcode::Jmp { target: *target }]),
        MacroInstr::CondJump { sign, source, target } => {
            let (taken, fallthrough) = (*target, usize::MAX);
            let (zero_branch, nonzero_branch) = match sign {
                CondSign::IfZero => (taken, fallthrough),
                CondSign::IfNotZero => (fallthrough, taken),
            };
            MicroInstr::new(vec![
                Microcode::Skip {
                    left: *source,
                    right: Source::Const(crate::arith::Int::zero()),
                    delta: 1,
                },
                Microcode::Jmp { target: zero_branch },
                Microcode::Jmp { target: nonzero_branch },
            ])
        }
        MacroInstr::Return => MicroInstr::new(vec![Microcode::Ret]),
    }
}

/// Lowering leaves the "fall through to pc+1" jump targets as sentinels
/// (`usize::MAX`); this pass resolves them to the instruction's own
/// successor position now that the whole function's layout is known.
fn resolve_fallthroughs(f: &mut MicroFunction) {
    let len = f.code.len();
    for (pc, packet) in f.code.iter_mut().enumerate() {
        let next = if pc + 1 < len { pc + 1 } else { pc };
        for code in packet.0.iter_mut() {
            if let Microcode::Jmp { target } = code {
                if *target == usize::MAX {
                    *target = next;
                }
            }
        }
    }
}
