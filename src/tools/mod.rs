//! Tool data model shared by the catalog, extractor, dispatcher and synthesizer.
//!
//! - [`tool_descriptor`] - operation names and argument schemas
//! - [`tool_calling`] - invocations and per-invocation results

pub mod tool_calling;
pub mod tool_descriptor;

pub use tool_calling::{Arguments, ToolCallResult, ToolInvocation, TIMEOUT_ERROR};
pub use tool_descriptor::{find_tool, FieldSpec, ToolDescriptor};
