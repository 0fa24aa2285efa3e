//! Register splitter (spec.md §4.3).
//!
//! Subdivides every register into fixed-width limbs and rewrites each
//! arithmetic microcode into one or more limb-level sub-instructions,
//! introducing carry/borrow limbs wherever a round's result would not fit
//! in the limbs allocated to it.

use crate::arith::{self, Int};
use crate::config::FieldConfig;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::ir::{MacroOp, Microcode, MicroInstr, Source};
use crate::register::{Function, Kind, MicroFunction, Register, RegisterId};
use std::collections::VecDeque;

/// `reg_id -> limb list` (LSB-first). Spec.md §4.3 calls for a stable map
/// `reg_id -> (first_limb_id, count)`; a direct `Vec<RegisterId>` per
/// register is equivalent and simpler to index.
struct LimbMap {
    limbs: Vec<Vec<RegisterId>>,
}

impl LimbMap {
    fn of(&self, r: RegisterId) -> &[RegisterId] {
        &self.limbs[r.index()]
    }
}

fn decompose_registers(f: &MicroFunction, config: &FieldConfig) -> (Vec<Register>, LimbMap) {
    let mut new_registers = Vec::new();
    let mut limbs = Vec::with_capacity(f.registers.len());
    for reg in &f.registers {
        let w = reg.width;
        let count = w.div_ceil(config.max_register_width);
        let mut reg_limbs = Vec::new();
        let mut remaining = w;
        for k in 0..count {
            let limb_width = remaining.min(config.max_register_width);
            let id = RegisterId(new_registers.len() as u32);
            new_registers.push(Register::new(reg.kind, format!("{}'{}", reg.name, k), limb_width));
            reg_limbs.push(id);
            remaining -= limb_width;
        }
        limbs.push(reg_limbs);
    }
    (new_registers, LimbMap { limbs })
}

pub fn split(f: &MicroFunction, config: &FieldConfig) -> Result<MicroFunction, Vec<Diagnostic>> {
    let (mut registers, limb_map) = decompose_registers(f, config);
    let mut code = Vec::with_capacity(f.code.len());
    for packet in &f.code {
        code.push(MicroInstr::new(split_packet(&packet.0, &limb_map, &mut registers, config)?));
    }
    Ok(Function {
        name: f.name.clone(),
        registers,
        code,
    })
}

fn split_packet(
    codes: &[Microcode],
    limb_map: &LimbMap,
    registers: &mut Vec<Register>,
    config: &FieldConfig,
) -> Result<Vec<Microcode>, Vec<Diagnostic>> {
    let mut groups: Vec<Vec<Microcode>> = Vec::with_capacity(codes.len());
    for code in codes {
        match code {
            Microcode::Arith {
                op,
                targets,
                sources,
                constant,
            } => groups.push(split_arith(*op, targets, sources, constant, limb_map, registers, config)?),
            Microcode::Jmp { target } => groups.push(vec![Microcode::Jmp { target: *target }]),
            Microcode::Ret => groups.push(vec![Microcode::Ret]),
            Microcode::Skip { left, right, delta } => groups.push(vec![Microcode::Skip {
                left: limb_map.of(*left)[0],
                right: match right {
                    Source::Register(r) => Source::Register(limb_map.of(*r)[0]),
                    Source::Const(c) => Source::Const(c.clone()),
                },
                delta: *delta,
            }]),
        }
    }

    let mut new_offsets = Vec::with_capacity(codes.len());
    let mut acc = 0usize;
    for g in &groups {
        new_offsets.push(acc);
        acc += g.len();
    }

    let mut out = Vec::with_capacity(acc);
    for (i, group) in groups.into_iter().enumerate() {
        for code in group {
            if let Microcode::Skip { left, right, delta } = code {
                let old_target = (i as i64 + 1 + delta as i64) as usize;
                let new_target = new_offsets.get(old_target).copied().unwrap_or(acc);
                let new_position = new_offsets[i];
                let new_delta = (new_target as i64 - new_position as i64 - 1) as i32;
                out.push(Microcode::Skip {
                    left,
                    right,
                    delta: new_delta,
                });
            } else {
                out.push(code);
            }
        }
    }
    Ok(out)
}

/// Splits a single `Arith` microcode into one or more limb-level rounds,
/// allocating a fresh carry/borrow limb whenever a round's result overflows
/// the target limbs greedily assigned to it (spec.md §4.3). On the final
/// round, the remaining queued target limbs (e.g. a dedicated carry-out
/// output register) are pulled in to absorb the overflow before a fresh
/// temp limb is allocated.
fn split_arith(
    op: MacroOp,
    targets: &[RegisterId],
    sources: &[RegisterId],
    constant: &Int,
    limb_map: &LimbMap,
    registers: &mut Vec<Register>,
    config: &FieldConfig,
) -> Result<Vec<Microcode>, Vec<Diagnostic>> {
    let target_limbs: Vec<RegisterId> = targets.iter().flat_map(|t| limb_map.of(*t).to_vec()).collect();
    let needed_no_split = target_limbs.len() == targets.len()
        && target_limbs.iter().all(|t| registers[t.index()].width <= config.max_field_width)
        && sources.iter().all(|s| limb_map.of(*s).len() == 1);
    if needed_no_split {
        // No register in this instruction needed splitting; pass through
        // unchanged (scenarios 4/5 in spec.md §8 take this path).
        return Ok(vec![Microcode::Arith {
            op,
            targets: targets.to_vec(),
            sources: sources.to_vec(),
            constant: constant.clone(),
        }]);
    }

    if matches!(op, MacroOp::Sub) {
        pivot_check(targets, sources, limb_map, registers)?;
    }

    let source_limbs: Vec<Vec<RegisterId>> = sources.iter().map(|s| limb_map.of(*s).to_vec()).collect();
    let n_rounds = source_limbs.iter().map(|l| l.len()).max().unwrap_or(1);

    let mut target_queue: VecDeque<RegisterId> = target_limbs.into_iter().collect();
    let mut out = Vec::new();
    let mut carry_in: Option<RegisterId> = None;

    for round in 0..n_rounds {
        let round_source_limbs: Vec<RegisterId> = source_limbs
            .iter()
            .filter_map(|limbs| limbs.get(round).copied())
            .collect();
        let mut round_sources = round_source_limbs.clone();
        if let Some(c) = carry_in {
            round_sources.push(c);
        }
        let round_constant = if round == 0 { constant.clone() } else { Int::zero() };

        let needed = round_rhs_width(op, &round_sources, &round_constant, registers);
        let is_final = round + 1 == n_rounds;

        let mut round_targets = Vec::new();
        let mut accumulated = 0u32;
        while accumulated < config.max_field_width.min(needed) || (is_final && accumulated < needed) {
            match target_queue.pop_front() {
                Some(limb) => {
                    accumulated += registers[limb.index()].width;
                    round_targets.push(limb);
                }
                None => break,
            }
        }
        if round_targets.is_empty() {
            return Err(vec![Diagnostic::new(
                DiagnosticKind::Unbalanced,
                None,
                "splitter ran out of target limbs before covering every source round",
            )]);
        }

        if accumulated < needed {
            let overflow_width = needed - accumulated;
            let temp_id = RegisterId(registers.len() as u32);
            registers.push(Register::new(Kind::Temp, format!("$carry{}", temp_id.0), overflow_width));
            round_targets.push(temp_id);
            carry_in = Some(temp_id);
        } else {
            carry_in = None;
        }

        out.push(Microcode::Arith {
            op,
            targets: round_targets,
            sources: round_sources,
            constant: round_constant,
        });
    }

    Ok(out)
}

fn round_rhs_width(op: MacroOp, sources: &[RegisterId], constant: &Int, registers: &[Register]) -> u32 {
    let widths: Vec<u32> = sources.iter().map(|s| registers[s.index()].width).collect();
    match op {
        MacroOp::Add => {
            let sum: u128 = widths.iter().map(|w| (1u128 << w) - 1).sum::<u128>();
            let total = sum + constant_as_u128(constant);
            arith::bit_length_u128(total).max(1)
        }
        MacroOp::Sub => widths.first().copied().unwrap_or(0) + 1,
        MacroOp::Mul => widths.iter().sum(),
    }
}

fn constant_as_u128(c: &Int) -> u128 {
    let mut v: u128 = 0;
    for i in 0..c.bit_len().min(127) {
        if c.bit(i) {
            v |= 1u128 << i;
        }
    }
    v
}

/// Checks that some split point among `targets`' accumulated limb widths
/// exactly matches the leading source's width, as required to rebalance a
/// subtraction correctly (spec.md §4.3, "pivot check").
fn pivot_check(
    targets: &[RegisterId],
    sources: &[RegisterId],
    limb_map: &LimbMap,
    registers: &[Register],
) -> Result<(), Vec<Diagnostic>> {
    let leading_width: u32 = sources
        .first()
        .map(|s| limb_map.of(*s).iter().map(|l| registers[l.index()].width).sum())
        .unwrap_or(0);
    let mut acc = 0u32;
    for t in targets {
        for limb in limb_map.of(*t) {
            acc += registers[limb.index()].width;
            if acc == leading_width {
                return Ok(());
            }
        }
    }
    Err(vec![Diagnostic::new(
        DiagnosticKind::MisalignedSubtraction,
        None,
        "no split point among targets matches the leading source's width",
    )])
}

/// Post-split sanity check: every produced `Arith` microcode's target width
/// must be able to represent the maximum value its sources can produce
/// (spec.md §8, "Balance"). In normal operation `split` never produces an
/// unbalanced instruction; this exists to catch a logic error rather than
/// an expected user-facing diagnostic.
pub fn balance_check(f: &MicroFunction) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    for (pc, packet) in f.code.iter().enumerate() {
        for code in &packet.0 {
            if let Microcode::Arith { op, targets, sources, constant } = code {
                let lhs: u32 = targets.iter().map(|t| f.register(*t).width).sum();
                let rhs = round_rhs_width(*op, sources, constant, &f.registers);
                if lhs < rhs {
                    diags.push(Diagnostic::new(
                        DiagnosticKind::Unbalanced,
                        Some(crate::sourcemap::InstrId(pc as u32)),
                        format!("split instruction provides {} bits but needs {}", lhs, rhs),
                    ));
                }
            }
        }
    }
    diags
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::register::{Function, Kind, Register};

    fn fanout_function() -> MicroFunction {
        Function {
            name: "fanout".into(),
            registers: vec![
                Register::new(Kind::Input, "y", 16),
                Register::new(Kind::Output, "x", 16),
                Register::new(Kind::Output, "c", 1),
            ],
            code: vec![MicroInstr::new(vec![
                Microcode::Arith {
                    op: MacroOp::Add,
                    targets: vec![RegisterId(1), RegisterId(2)],
                    sources: vec![RegisterId(0)],
                    constant: Int::one(),
                },
                Microcode::Ret,
            ])],
        }
    }

    #[test]
    fn splits_into_two_rounds_with_intermediate_carry() {
        let config = FieldConfig::validate(8, 8, true).unwrap();
        let split_fn = split(&fanout_function(), &config).unwrap();
        let arith_count = split_fn.code[0]
            .0
            .iter()
            .filter(|mc| matches!(mc, Microcode::Arith { .. }))
            .count();
        assert_eq!(arith_count, 2);
        assert!(split_fn.registers.iter().any(|r| r.name.starts_with("$carry")));
    }

    #[test]
    fn unsplit_register_passes_through_as_single_instruction() {
        let config = FieldConfig::validate(8, 8, true).unwrap();
        let f = Function {
            name: "carry".into(),
            registers: vec![
                Register::new(Kind::Input, "y", 8),
                Register::new(Kind::Input, "z", 8),
                Register::new(Kind::Output, "x", 8),
                Register::new(Kind::Output, "c", 1),
            ],
            code: vec![MicroInstr::new(vec![
                Microcode::Arith {
                    op: MacroOp::Add,
                    targets: vec![RegisterId(2), RegisterId(3)],
                    sources: vec![RegisterId(0), RegisterId(1)],
                    constant: Int::zero(),
                },
                Microcode::Ret,
            ])],
        };
        let split_fn = split(&f, &config).unwrap();
        let arith_count = split_fn.code[0].0.iter().filter(|mc| matches!(mc, Microcode::Arith { .. })).count();
        assert_eq!(arith_count, 1);
    }

    #[test]
    fn balance_check_passes_on_freshly_split_function() {
        let config = FieldConfig::validate(8, 8, true).unwrap();
        let split_fn = split(&fanout_function(), &config).unwrap();
        assert!(balance_check(&split_fn).is_empty());
    }
}
