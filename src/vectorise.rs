//! Vectoriser: jump inlining, skip-offset rewriting, reachability
//! compaction (spec.md §4.2).

use crate::ir::{Microcode, Source};
use crate::register::{Function, MicroFunction, Register};
use std::collections::{HashMap, HashSet, VecDeque};

/// Rightmost-offset-first, ties broken by ascending target PC (see
/// DESIGN.md, Open Question resolutions — spec.md §9 leaves the exact
/// tie-break to the implementer).
pub fn vectorise(f: &MicroFunction) -> MicroFunction {
    let mut code: Vec<Vec<Microcode>> = f.code.iter().map(|p| p.0.clone()).collect();
    let mut worklist: VecDeque<usize> = VecDeque::new();
    let mut seen: HashSet<usize> = HashSet::new();
    worklist.push_back(0);

    while let Some(j) = worklist.pop_front() {
        if !seen.insert(j) {
            continue;
        }
        if j >= code.len() {
            continue;
        }
        let mut inlined_at: HashMap<usize, usize> = HashMap::new();
        while step_packet(&mut code, j, &f.registers, &mut inlined_at) {}
        for mc in &code[j] {
            if let Microcode::Jmp { target } = mc {
                if *target != j {
                    worklist.push_back(*target);
                }
            }
        }
    }

    let packets: Vec<crate::ir::MicroInstr> = code.into_iter().map(crate::ir::MicroInstr::new).collect();
    let vectorised = Function {
        name: f.name.clone(),
        registers: f.registers.clone(),
        code: packets,
    };
    compact_reachable(vectorised)
}

/// Scans right-to-left for the first `Jmp` whose target is a different
/// packet, either inlining it in place or, when the loop/duplicate guard
/// blocks re-inlining, rewriting it as an always-taken `Skip` to the
/// previously recorded offset (spec.md §4.2). Returns whether `code[j]`
/// changed, so the caller can keep stepping until the packet is quiescent.
fn step_packet(
    code: &mut [Vec<Microcode>],
    j: usize,
    registers: &[Register],
    inlined_at: &mut HashMap<usize, usize>,
) -> bool {
    let packet = code[j].clone();
    for offset in (0..packet.len()).rev() {
        if let Microcode::Jmp { target } = packet[offset] {
            if target == j || target >= code.len() {
                continue;
            }
            if let Some(&prev) = inlined_at.get(&target) {
                if offset <= prev {
                    // Already inlined at this-or-later offset: re-inlining
                    // would not advance the packet and risks looping.
                    // `target`'s codes are already present at `prev`, so
                    // reuse them instead of duplicating.
                    if let Some(rewritten) = always_taken_skip(registers, offset, prev) {
                        code[j][offset] = rewritten;
                        return true;
                    }
                    continue;
                }
            }
            let candidate = inline_at(&packet, offset, &code[target]);
            if !has_conflict(&candidate) {
                code[j] = candidate;
                inlined_at.insert(target, offset);
                return true;
            }
        }
    }
    false
}

/// Builds a `Skip` at packet position `offset` that unconditionally lands
/// the cursor on `prev`. A register's value is always `< 2^width` (every
/// write narrows to it via `bit_slice`), so comparing it against the
/// constant `2^width` can never find them equal: the skip is always taken.
fn always_taken_skip(registers: &[Register], offset: usize, prev: usize) -> Option<Microcode> {
    let anchor = registers.first()?;
    let delta = (prev as i64 - offset as i64 - 1) as i32;
    Some(Microcode::Skip {
        left: crate::register::RegisterId(0),
        right: Source::Const(crate::arith::Int::pow2(anchor.width)),
        delta,
    })
}

/// Splices `target`'s microcodes in place of the `Jmp` at `offset`,
/// adjusting the deltas of any `Skip` in `packet` whose absolute
/// destination lay strictly past `offset` (spec.md §4.2, "offset
/// rewriting for skips").
fn inline_at(packet: &[Microcode], offset: usize, target: &[Microcode]) -> Vec<Microcode> {
    let inserted: i64 = target.len() as i64 - 1;
    let new_position = |old_position: usize| -> i64 {
        if old_position < offset {
            old_position as i64
        } else {
            old_position as i64 + inserted
        }
    };

    let mut out = Vec::with_capacity(packet.len() - 1 + target.len());
    for (old_position, code) in packet.iter().enumerate() {
        if old_position == offset {
            out.extend(target.iter().cloned());
            continue;
        }
        out.push(rewrite_skip(code, old_position, offset, inserted, &new_position));
    }
    out
}

fn rewrite_skip(
    code: &Microcode,
    old_position: usize,
    offset: usize,
    inserted: i64,
    new_position_of: &dyn Fn(usize) -> i64,
) -> Microcode {
    match code {
        Microcode::Skip { left, right, delta } => {
            let old_dest = old_position as i64 + 1 + *delta as i64;
            let adjusted_dest = if old_dest as usize > offset {
                old_dest + inserted
            } else {
                old_dest
            };
            let np = new_position_of(old_position);
            let new_delta = (adjusted_dest - np - 1) as i32;
            Microcode::Skip {
                left: *left,
                right: right.clone(),
                delta: new_delta,
            }
        }
        other => other.clone(),
    }
}

/// Simulates every straight-line path through a packet and reports whether
/// any path writes the same register twice (spec.md §4.2, "conflict
/// prediction").
fn has_conflict(codes: &[Microcode]) -> bool {
    fn walk(codes: &[Microcode], idx: usize, mut writes: Vec<crate::register::RegisterId>, visited: &mut HashSet<usize>) -> bool {
        if idx >= codes.len() {
            return false;
        }
        if !visited.insert(idx) {
            // Already on this path: treat as terminal to guarantee
            // termination (straight-line packets do not legitimately loop).
            return false;
        }
        match &codes[idx] {
            Microcode::Jmp { .. } | Microcode::Ret => false,
            Microcode::Arith { targets, .. } => {
                for t in targets {
                    if writes.contains(t) {
                        return true;
                    }
                    writes.push(*t);
                }
                walk(codes, idx + 1, writes, visited)
            }
            Microcode::Skip { delta, .. } => {
                let taken = (idx as i64 + 1 + *delta as i64).max(0) as usize;
                let mut v1 = visited.clone();
                if walk(codes, idx + 1, writes.clone(), &mut v1) {
                    return true;
                }
                let mut v2 = visited.clone();
                walk(codes, taken, writes, &mut v2)
            }
        }
    }
    walk(codes, 0, Vec::new(), &mut HashSet::new())
}

/// Deletes packets unreachable from pc=0 and renumbers `Jmp` targets
/// accordingly (spec.md §4.2, "reachability & compaction").
fn compact_reachable(f: MicroFunction) -> MicroFunction {
    let mut reachable = HashSet::new();
    let mut stack = vec![0usize];
    while let Some(pc) = stack.pop() {
        if !reachable.insert(pc) || pc >= f.code.len() {
            continue;
        }
        for mc in &f.code[pc].0 {
            if let Microcode::Jmp { target } = mc {
                if !reachable.contains(target) {
                    stack.push(*target);
                }
            }
        }
    }
    let mut old_to_new: HashMap<usize, usize> = HashMap::new();
    let mut new_code = Vec::new();
    for (pc, packet) in f.code.into_iter().enumerate() {
        if reachable.contains(&pc) {
            old_to_new.insert(pc, new_code.len());
            new_code.push(packet);
        }
    }
    for packet in new_code.iter_mut() {
        for mc in packet.0.iter_mut() {
            if let Microcode::Jmp { target } = mc {
                *target = *old_to_new.get(target).unwrap_or(target);
            }
        }
    }
    Function {
        name: f.name,
        registers: f.registers,
        code: new_code,
    }
}
