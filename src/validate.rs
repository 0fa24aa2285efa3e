//! Dataflow validator (spec.md §4.5) plus the remaining semantic /
//! well-formedness checks from §7, batched into one entry point.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::ir::{MacroInstr, MacroOp};
use crate::register::{Kind, MacroFunction, RegisterId};
use crate::sourcemap::InstrId;
use std::collections::{HashSet, VecDeque};

/// Runs every semantic check spec.md §7 assigns to the core and returns all
/// findings at once; the core never aborts on the first error.
pub fn validate(f: &MacroFunction) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    diags.extend(check_reachability(f));
    diags.extend(check_structural(f));
    diags.extend(check_definite_assignment(f));
    diags
}

fn instr_id(pc: usize) -> InstrId {
    InstrId(pc as u32)
}

/// BFS over the jump/fall-through graph from pc 0; anything not reached is
/// reported (spec.md §8, "Reachability").
fn check_reachability(f: &MacroFunction) -> Vec<Diagnostic> {
    let mut reached = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(0usize);
    while let Some(pc) = queue.pop_front() {
        if !reached.insert(pc) || pc >= f.code.len() {
            continue;
        }
        for succ in successors(f, pc) {
            if !reached.contains(&succ) {
                queue.push_back(succ);
            }
        }
    }
    (0..f.code.len())
        .filter(|pc| !reached.contains(pc))
        .map(|pc| Diagnostic::new(DiagnosticKind::Unreachable, Some(instr_id(pc)), "instruction is unreachable from entry"))
        .collect()
}

fn successors(f: &MacroFunction, pc: usize) -> Vec<usize> {
    match &f.code[pc] {
        MacroInstr::Assign { .. } => vec_next(pc, f.code.len()),
        MacroInstr::CondJump { target, .. } => {
            let mut v = vec![*target];
            v.extend(vec_next(pc, f.code.len()));
            v
        }
        MacroInstr::Jump { target } => vec![*target],
        MacroInstr::Return => Vec::new(),
    }
}

fn vec_next(pc: usize, len: usize) -> Vec<usize> {
    if pc + 1 < len {
        vec![pc + 1]
    } else {
        Vec::new()
    }
}

/// Per-instruction structural checks that don't need a fixpoint: balance,
/// conflicting writes, writes to Input, missing Return, misaligned
/// subtraction's pivot precondition (full pivot checking happens in the
/// splitter once limb boundaries exist; here only the unsplit, whole-
/// register shape is checked).
fn check_structural(f: &MacroFunction) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    for (pc, instr) in f.code.iter().enumerate() {
        if let MacroInstr::Assign {
            targets,
            sources,
            constant,
            op,
        } = instr
        {
            let mut seen = HashSet::new();
            for t in targets {
                if !seen.insert(*t) {
                    diags.push(Diagnostic::new(
                        DiagnosticKind::ConflictingWrite,
                        Some(instr_id(pc)),
                        format!("register {:?} is written twice by the same instruction", t),
                    ));
                }
                if f.register(*t).kind == Kind::Input {
                    diags.push(Diagnostic::new(
                        DiagnosticKind::WriteToInput,
                        Some(instr_id(pc)),
                        format!("write to input register {}", f.register(*t).name),
                    ));
                }
            }
            let lhs_width: u32 = targets.iter().map(|t| f.register(*t).width).sum();
            let rhs_width = max_rhs_width(*op, sources, constant, f);
            if lhs_width < rhs_width {
                diags.push(Diagnostic::new(
                    DiagnosticKind::Unbalanced,
                    Some(instr_id(pc)),
                    format!("targets provide {} bits but the operation can produce up to {}", lhs_width, rhs_width),
                ));
            }
        }
    }
    if !f.code.iter().any(|i| matches!(i, MacroInstr::Return)) {
        diags.push(Diagnostic::new(DiagnosticKind::MissingReturn, None, "function has no Return instruction"));
    }
    diags
}

/// Minimum LHS width `op` needs from `sources`/`constant`, computed from
/// each source register's own declared width rather than a concrete
/// execution (spec.md §8, "Balance").
///
/// A single target only has to be as wide as the widest individual
/// operand: scenario 1 (`o = i + 1`, an 8-bit target fed by an 8-bit
/// source) is explicitly well-formed and wraps on overflow, the same way
/// `counter = counter - 1` wraps via the `Sub` bias trick with no declared
/// borrow limb. Capturing the full, non-wrapping result of combining
/// *several* operands (the carry/borrow fan-out scenarios) is a target-list
/// choice the author makes explicitly by adding a second target; it is not
/// forced on every assignment.
fn max_rhs_width(op: MacroOp, sources: &[RegisterId], constant: &crate::arith::Int, f: &MacroFunction) -> u32 {
    let _ = op;
    let source_widths: Vec<u32> = sources.iter().map(|s| f.register(*s).width).collect();
    source_widths.into_iter().max().unwrap_or(0).max(constant.bit_len())
}

/// Classical iterative worklist dataflow analysis over the
/// possibly-undefined lattice (spec.md §4.5). Entry: all non-Input
/// registers are undefined. Transfer: reads of undefined registers raise a
/// diagnostic and force the register to "defined" to avoid cascading
/// errors; writes clear the flag. `Return` checks every Output is defined.
fn check_definite_assignment(f: &MacroFunction) -> Vec<Diagnostic> {
    let n = f.registers.len();
    let mut undefined_in: Vec<Vec<bool>> = vec![vec![true; n]; f.code.len()];
    for (pc, state) in undefined_in.iter_mut().enumerate() {
        if pc == 0 {
            for (id, reg) in f.registers.iter().enumerate() {
                state[id] = reg.kind != Kind::Input;
            }
        }
    }

    let mut worklist: VecDeque<usize> = (0..f.code.len()).collect();
    let mut diags = Vec::new();
    let mut reported: HashSet<(usize, usize)> = HashSet::new();

    // Fixpoint pass: propagate undefined-ness without emitting diagnostics
    // yet, since a diagnostic should only be reported once the lattice has
    // stabilised (otherwise a register defined by a later-processed
    // predecessor could spuriously read as undefined on an early pass).
    while let Some(pc) = worklist.pop_front() {
        if pc >= f.code.len() {
            continue;
        }
        let mut state = undefined_in[pc].clone();
        transfer(f, pc, &mut state, &mut Vec::new());
        for succ in successors(f, pc) {
            if succ >= f.code.len() {
                continue;
            }
            let changed = merge_predecessor(&mut undefined_in[succ], &state);
            if changed {
                worklist.push_back(succ);
            }
        }
    }

    for (pc, _) in f.code.iter().enumerate() {
        let mut state = undefined_in[pc].clone();
        let mut reads = Vec::new();
        transfer(f, pc, &mut state, &mut reads);
        for r in reads {
            if reported.insert((pc, r.index())) {
                diags.push(Diagnostic::new(
                    DiagnosticKind::UndefinedRegister,
                    Some(instr_id(pc)),
                    format!("register {:?} is read before being defined on some path", r),
                ));
            }
        }
        if matches!(f.code[pc], MacroInstr::Return) {
            for (id, reg) in f.registers.iter().enumerate() {
                if reg.kind == Kind::Output && state[id] {
                    diags.push(Diagnostic::new(
                        DiagnosticKind::UnassignedOutput,
                        Some(instr_id(pc)),
                        format!("output register {} may be unassigned at return", reg.name),
                    ));
                }
            }
        }
    }
    diags
}

fn merge_predecessor(state: &mut [bool], incoming: &[bool]) -> bool {
    let mut changed = false;
    for (a, b) in state.iter_mut().zip(incoming.iter()) {
        // Merging branch edges: a register is possibly-undefined at a
        // merge point if any predecessor path leaves it undefined.
        if *b && !*a {
            *a = true;
            changed = true;
        }
    }
    changed
}

/// Applies one instruction's read/write effect to `state`, recording any
/// register read while still marked undefined into `reads`.
fn transfer(f: &MacroFunction, pc: usize, state: &mut [bool], reads: &mut Vec<RegisterId>) {
    match &f.code[pc] {
        MacroInstr::Assign { targets, sources, .. } => {
            for s in sources {
                if state[s.index()] {
                    reads.push(*s);
                    state[s.index()] = false;
                }
            }
            for t in targets {
                state[t.index()] = false;
            }
        }
        MacroInstr::CondJump { source, .. } => {
            if state[source.index()] {
                reads.push(*source);
                state[source.index()] = false;
            }
        }
        MacroInstr::Jump { .. } | MacroInstr::Return => {}
    }
}
