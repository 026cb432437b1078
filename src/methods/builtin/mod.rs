//! Built-in methods
//!
//! - `Echo`: sleeps for `ms` milliseconds (stub workload)
//! - `Command`: runs a shell command
//! - `OpenAIChat` / `OpenAIChatStream`: one chat-completion request against an
//!   OpenAI-compatible endpoint

pub mod command;
pub mod echo;
pub mod openai;

use super::{Method, MethodRegistry};

pub use command::CommandMethod;
pub use echo::Echo;
pub use openai::{OpenAIChat, OpenAIChatStream};

/// Register every built-in method
pub fn register_builtins(registry: &mut MethodRegistry) {
    registry.register_fn("Echo", Echo::from_args);
    registry.register_fn("Command", CommandMethod::from_args);
    registry.register_fn("OpenAIChat", OpenAIChat::from_args);
    registry.register_fn("OpenAIChatStream", OpenAIChatStream::from_args);
}
