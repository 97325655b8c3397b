//! Vendor MCP servers
//!
//! Each vendor gets a [`McpServer`]: a [`SessionManager`] handing out
//! `mcp-session-id`s and a [`ToolRegistry`] that validates arguments and
//! forwards calls to the response generator.

mod registry;
mod server;
mod session;

pub use registry::{PORT_CONTEXT, ParamKind, ParamSpec, ToolRegistry, ToolSpec};
pub use server::{McpReply, McpServer, SESSION_HEADER};
pub use session::{Session, SessionManager};
