//! Interpreter & tracing executor (spec.md §4.4, §5).
//!
//! Single-threaded, synchronous, deterministic. Cancellation is cooperative
//! via a step budget rather than any asynchronous mechanism (spec.md §5).

use crate::arith::{self, Int};
use crate::error::ExecError;
use crate::ir::{Microcode, Source};
use crate::register::MicroFunction;
use std::collections::BTreeMap;

/// One activation frame: which function is running, where in its code, and
/// the current values of all its registers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub function: usize,
    pub pc: usize,
    pub registers: Vec<Int>,
}

/// The interpreter's step-budget exhaustion return shape, mirroring a
/// `Running`/`Exit` tick result: on exhaustion the caller gets the frame
/// back intact and can resume or abort (spec.md §5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumableState {
    pub frame: Frame,
    pub steps_executed: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Returned(Vec<Int>),
    BudgetExhausted(ResumableState),
}

enum StepResult {
    Next(usize),
    Return(Vec<Int>),
}

fn initial_frame(f: &MicroFunction, function: usize, inputs: &[Int]) -> Result<Frame, ExecError> {
    let expected = f.inputs().count();
    if inputs.len() != expected {
        return Err(ExecError::InputCountMismatch {
            expected,
            computed: inputs.len(),
        });
    }
    let mut registers = vec![Int::zero(); f.registers.len()];
    for (slot, (id, _)) in f.inputs().enumerate() {
        registers[id.index()] = inputs[slot].clone();
    }
    Ok(Frame {
        function,
        pc: 0,
        registers,
    })
}

/// Runs one packet's microcodes left-to-right from `pc`. Falls through to
/// `pc + 1` if the packet ends without an explicit `Jmp`/`Ret`.
fn execute_packet_at(codes: &[Microcode], f: &MicroFunction, pc: usize, registers: &mut [Int]) -> StepResult {
    let mut idx = 0usize;
    while idx < codes.len() {
        match &codes[idx] {
            Microcode::Arith {
                op,
                targets,
                sources,
                constant,
            } => {
                let target_width: u32 = targets.iter().map(|t| f.register(*t).width).sum();
                let values: Vec<Int> = sources.iter().map(|s| registers[s.index()].clone()).collect();
                let result = arith::eval(*op, &values, constant, target_width);
                let mut offset = 0u32;
                for t in targets {
                    let width = f.register(*t).width;
                    registers[t.index()] = result.bit_slice(offset, width);
                    offset += width;
                }
                idx += 1;
            }
            Microcode::Jmp { target } => return StepResult::Next(*target),
            Microcode::Skip { left, right, delta } => {
                let left_value = &registers[left.index()];
                let right_value = match right {
                    Source::Register(r) => registers[r.index()].clone(),
                    Source::Const(c) => c.clone(),
                };
                idx = if *left_value != right_value {
                    (idx as i64 + 1 + *delta as i64).max(0) as usize
                } else {
                    idx + 1
                };
            }
            Microcode::Ret => return StepResult::Return(registers.to_vec()),
        }
    }
    StepResult::Next(pc + 1)
}

/// Runs `function` within `program` to completion or until `step_budget`
/// microcode steps have been executed, whichever comes first.
pub fn execute(
    program: &[MicroFunction],
    function: usize,
    inputs: &[Int],
    step_budget: u64,
) -> Result<RunOutcome, ExecError> {
    let f = &program[function];
    let frame = initial_frame(f, function, inputs)?;
    run_from(program, frame, step_budget)
}

pub fn resume(program: &[MicroFunction], state: ResumableState, step_budget: u64) -> Result<RunOutcome, ExecError> {
    run_from(program, state.frame, step_budget)
}

fn run_from(program: &[MicroFunction], mut frame: Frame, step_budget: u64) -> Result<RunOutcome, ExecError> {
    let f = &program[frame.function];
    let mut steps = 0u64;
    loop {
        if steps >= step_budget {
            return Ok(RunOutcome::BudgetExhausted(ResumableState {
                frame,
                steps_executed: steps,
            }));
        }
        let codes = &f.code[frame.pc].0;
        match execute_packet_at(codes, f, frame.pc, &mut frame.registers) {
            StepResult::Return(values) => return Ok(RunOutcome::Returned(values)),
            StepResult::Next(target) => frame.pc = target,
        }
        steps += 1;
    }
}

/// Per-step `(pc, register snapshot)` log produced by the tracing variant
/// of the interpreter. Snapshots are deep clones so later mutation of the
/// live frame cannot retroactively alter a recorded row (spec.md §4.4,
/// "Cloning").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceLog {
    pub steps: Vec<(usize, Vec<Int>)>,
}

pub fn execute_traced(
    program: &[MicroFunction],
    function: usize,
    inputs: &[Int],
    step_budget: u64,
) -> Result<(RunOutcome, TraceLog), ExecError> {
    let f = &program[function];
    let frame = initial_frame(f, function, inputs)?;
    Ok(run_traced_from(program, frame, step_budget))
}

/// Runs a frame whose registers are already fully seeded (e.g. from a
/// function's declared per-register padding rather than an input vector,
/// spec.md §4.6) to completion or budget exhaustion, recording every step.
pub fn run_traced_from(program: &[MicroFunction], mut frame: Frame, step_budget: u64) -> (RunOutcome, TraceLog) {
    let f = &program[frame.function];
    let mut log = TraceLog { steps: Vec::new() };
    let mut steps = 0u64;
    loop {
        if steps >= step_budget {
            return (
                RunOutcome::BudgetExhausted(ResumableState {
                    frame,
                    steps_executed: steps,
                }),
                log,
            );
        }
        log.steps.push((frame.pc, frame.registers.clone()));
        let codes = &f.code[frame.pc].0;
        match execute_packet_at(codes, f, frame.pc, &mut frame.registers) {
            StepResult::Return(values) => return (RunOutcome::Returned(values), log),
            StepResult::Next(target) => frame.pc = target,
        }
        steps += 1;
    }
}

/// Read-only bus abstraction: functions may be invoked as memoised lookups
/// by other callers. Writes on buses are not supported in the core
/// (spec.md §4.4, §9).
pub trait Bus {
    fn read(&mut self, function: usize, inputs: &[Int]) -> Result<Vec<Int>, ExecError>;
}

/// Caches `(function, inputs) -> outputs` in a sorted map for `O(log n)`
/// lookup, per spec.md §9's "ownership of instance cache" note. The cache
/// is owned by the executor and mutated in place; it must not be shared
/// across threads (spec.md §5).
pub struct MemoExecutor<'p> {
    program: &'p [MicroFunction],
    cache: BTreeMap<(usize, Vec<Int>), Vec<Int>>,
    step_budget: u64,
    max_depth: u32,
    depth: u32,
}

impl<'p> MemoExecutor<'p> {
    pub fn new(program: &'p [MicroFunction], step_budget: u64, max_depth: u32) -> MemoExecutor<'p> {
        MemoExecutor {
            program,
            cache: BTreeMap::new(),
            step_budget,
            max_depth,
            depth: 0,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl<'p> Bus for MemoExecutor<'p> {
    fn read(&mut self, function: usize, inputs: &[Int]) -> Result<Vec<Int>, ExecError> {
        let key = (function, inputs.to_vec());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        if self.depth >= self.max_depth {
            return Err(ExecError::RecursionBudgetExceeded);
        }
        self.depth += 1;
        let outcome = execute(self.program, function, inputs, self.step_budget);
        self.depth -= 1;
        let outputs: Vec<Int> = match outcome? {
            RunOutcome::Returned(values) => {
                let f = &self.program[function];
                f.outputs().map(|(id, _)| values[id.index()].clone()).collect()
            }
            RunOutcome::BudgetExhausted(_) => return Err(ExecError::RecursionBudgetExceeded),
        };
        self.cache.insert(key, outputs.clone());
        Ok(outputs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{MacroOp, MicroInstr};
    use crate::register::{Function, Kind, Register, RegisterId};

    fn counter_micro() -> MicroFunction {
        Function {
            name: "counter".into(),
            registers: vec![
                Register::new(Kind::Input, "i", 8),
                Register::new(Kind::Output, "o", 8),
            ],
            code: vec![
                MicroInstr::new(vec![
                    Microcode::Arith {
                        op: MacroOp::Add,
                        targets: vec![RegisterId(1)],
                        sources: vec![RegisterId(0)],
                        constant: Int::from_u64(1),
                    },
                    Microcode::Jmp { target: 1 },
                ]),
                MicroInstr::new(vec![Microcode::Ret]),
            ],
        }
    }

    #[test]
    fn counter_wraps_within_width() {
        let program = vec![counter_micro()];
        let out = execute(&program, 0, &[Int::from_u64(255)], 100).unwrap();
        match out {
            RunOutcome::Returned(values) => assert_eq!(values[1], Int::zero()),
            other => panic!("expected Returned, got {:?}", other),
        }
    }

    #[test]
    fn counter_increments() {
        let program = vec![counter_micro()];
        let out = execute(&program, 0, &[Int::from_u64(7)], 100).unwrap();
        match out {
            RunOutcome::Returned(values) => assert_eq!(values[1], Int::from_u64(8)),
            other => panic!("expected Returned, got {:?}", other),
        }
    }

    #[test]
    fn budget_exhaustion_is_resumable() {
        let program = vec![counter_micro()];
        let first = execute(&program, 0, &[Int::from_u64(7)], 0).unwrap();
        let state = match first {
            RunOutcome::BudgetExhausted(s) => s,
            other => panic!("expected BudgetExhausted, got {:?}", other),
        };
        let second = resume(&program, state, 100).unwrap();
        match second {
            RunOutcome::Returned(values) => assert_eq!(values[1], Int::from_u64(8)),
            other => panic!("expected Returned, got {:?}", other),
        }
    }

    #[test]
    fn memoised_read_is_deterministic_across_calls() {
        let program = vec![counter_micro()];
        let mut exec = MemoExecutor::new(&program, 100, 8);
        let a = exec.read(0, &[Int::from_u64(7)]).unwrap();
        let b = exec.read(0, &[Int::from_u64(7)]).unwrap();
        assert_eq!(a, b);
        assert_eq!(exec.cache_len(), 1);
    }

    #[test]
    fn tracing_variant_logs_every_step() {
        let program = vec![counter_micro()];
        let (_, log) = execute_traced(&program, 0, &[Int::from_u64(7)], 100).unwrap();
        assert_eq!(log.steps.len(), 2);
        assert_eq!(log.steps[0].0, 0);
        assert_eq!(log.steps[1].0, 1);
    }
}
