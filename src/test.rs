//! Cross-module end-to-end scenarios (spec.md §8, "literal" cases). Each
//! file drives a macro function through the full `assemble` + `interp`
//! pipeline rather than exercising a single module in isolation.

mod borrow;
mod carry;
mod max;
