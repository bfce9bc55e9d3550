//! The conversation engine for ask-ollama.
//!
//! 1. **Assemble** context from the chat log or the conversation store
//! 2. **Assign** the conversation id for the next exchange
//! 3. **Exchange**: log the prompt, ask the backend, log and store the reply
//! 4. **Reload** the open thread so the next prompt continues it

pub mod context;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::token::{estimate_tokens, estimate_turns_tokens, max_tokens_budget};
pub use context::{
    AssembledContext, AssignedId, ContextAssembler, ContextRequest, ContextSource,
};
pub use session::{ChatSession, Exchange, SessionSettings};
