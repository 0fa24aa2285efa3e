//! Trace builder and padding inference (spec.md §4.6, §6 "Downstream
//! constraint emitter (produced)").

use crate::arith::{ceil_log2, Int};
use crate::error::TraceError;
use crate::interp::{execute_traced, run_traced_from, Frame, RunOutcome};
use crate::register::MicroFunction;
use std::collections::BTreeMap;

/// A column-oriented trace: two synthetic columns (`$stamp`, `$pc`) plus
/// one column per register. Row count equals the total number of executed
/// microcode steps across all instances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    pub stamp: Vec<u32>,
    pub pc: Vec<u32>,
    pub columns: BTreeMap<String, Vec<Int>>,
}

impl Trace {
    pub fn row_count(&self) -> usize {
        self.stamp.len()
    }

    /// `$pc`'s declared bitwidth, `ceil(log2(|code|))` (spec.md §6).
    pub fn pc_width(code_len: usize) -> u32 {
        ceil_log2(code_len.max(1) as u64)
    }
}

/// Executes `function` once per instance in `inputs` (already-memoised
/// `Read`s are the caller's concern; this just drives the tracing
/// interpreter) and assembles the resulting rows into a `Trace`. `$stamp`
/// encodes the 1-based instance ordinal of each row.
pub fn build_trace(
    f: &MicroFunction,
    instances: &[Vec<Int>],
    step_budget: u64,
) -> Result<Trace, TraceError> {
    let mut stamp = Vec::new();
    let mut pc = Vec::new();
    let mut columns: BTreeMap<String, Vec<Int>> = f.registers.iter().map(|r| (r.name.clone(), Vec::new())).collect();

    for (ordinal, inputs) in instances.iter().enumerate() {
        let (outcome, log) = execute_traced(std::slice::from_ref(f), 0, inputs, step_budget)
            .map_err(|_| TraceError::MissingFunctionMapping(f.name.clone()))?;
        if !matches!(outcome, RunOutcome::Returned(_)) {
            return Err(TraceError::MissingFunctionMapping(f.name.clone()));
        }
        for (step_pc, snapshot) in log.steps {
            stamp.push((ordinal + 1) as u32);
            pc.push(step_pc as u32);
            for (reg, col) in columns.iter_mut() {
                let idx = f.registers.iter().position(|r| &r.name == reg).unwrap();
                col.push(snapshot[idx].clone());
            }
        }
    }

    Ok(Trace { stamp, pc, columns })
}

/// Validates a trace against its owning function's register set: every
/// register must have exactly one column, all columns (plus the synthetic
/// ones) must share the same row count, and every value must fit its
/// register's declared width (spec.md §7, "Trace-instance").
pub fn check_trace(f: &MicroFunction, trace: &Trace) -> Vec<TraceError> {
    let mut errs = Vec::new();
    let expected_names: std::collections::BTreeSet<&str> = f.registers.iter().map(|r| r.name.as_str()).collect();
    let actual_names: std::collections::BTreeSet<&str> = trace.columns.keys().map(|s| s.as_str()).collect();

    for missing in expected_names.difference(&actual_names) {
        errs.push(TraceError::MissingRegisterColumn((*missing).to_string()));
    }
    for extra in actual_names.difference(&expected_names) {
        errs.push(TraceError::ExtraRegisterColumn((*extra).to_string()));
    }

    let row_count = trace.row_count();
    if trace.pc.len() != row_count || trace.columns.values().any(|c| c.len() != row_count) {
        errs.push(TraceError::InconsistentColumnHeight);
    }

    for reg in &f.registers {
        if let Some(col) = trace.columns.get(&reg.name) {
            for value in col {
                if value.bit_len() > reg.width {
                    errs.push(TraceError::ValueOutOfBounds {
                        register: reg.name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
    }
    errs
}

/// Re-derives each register's padding value for an atomic (single-
/// instruction) function by executing that instruction once from a state
/// composed entirely of every register's own declared padding value, not
/// just the Inputs' (spec.md §4.6); non-atomic functions are left unchanged.
pub fn infer_padding(f: &MicroFunction, padding: &[Int], step_budget: u64) -> Vec<Int> {
    if f.code.len() != 1 {
        return padding.to_vec();
    }
    let frame = Frame {
        function: 0,
        pc: 0,
        registers: padding.to_vec(),
    };
    match run_traced_from(std::slice::from_ref(f), frame, step_budget) {
        (RunOutcome::Returned(values), _) => values,
        _ => padding.to_vec(),
    }
}
