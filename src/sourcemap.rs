//! Consumed interface to the (out-of-scope) parser's source-map layer
//! (spec.md §6, "Source-map interface (consumed)").

/// An index into a macro function's instruction list, given a source-level
/// identity independent of any later lowering/vectorisation/splitting pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub u32);

/// What the core needs from the surrounding assembler's source-map: a way
/// to attach a diagnostic to the instruction that produced it, and a way to
/// ask whether a mapping for that instruction exists at all. The core never
/// originates source locations itself.
pub trait SourceMap {
    fn syntax_error(&mut self, instr: InstrId, message: String);
    fn has(&self, instr: InstrId) -> bool;
}

/// A zero-cost `SourceMap` for callers that have not wired up real source
/// spans (unit tests, synthetic programs).
#[derive(Default)]
pub struct NullSourceMap;

impl SourceMap for NullSourceMap {
    fn syntax_error(&mut self, _instr: InstrId, _message: String) {}

    fn has(&self, _instr: InstrId) -> bool {
        false
    }
}
