//! Tool catalog and tool-call execution.
//!
//! [`ToolRegistry`] is the static list of function tools advertised to the
//! model in `session.update`. [`ToolDispatcher`] maps a call (name plus
//! arguments) to its handler and always yields a [`ToolResult`].

mod dispatcher;
mod error;
mod registry;

pub use dispatcher::{DEFAULT_MAX_RESULTS, ToolArguments, ToolDispatcher};
pub use error::{ToolError, ToolErrorKind, ToolResult};
pub use registry::{ToolDefinition, ToolRegistry};
