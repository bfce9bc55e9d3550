//! Context: which prior turns are sent with the next prompt, and what they cost.

pub mod assembler;
pub mod token;

pub use assembler::{AssembledContext, AssignedId, ContextAssembler, ContextRequest, ContextSource};
