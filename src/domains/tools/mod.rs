//! Tools domain module.
//!
//! Everything between a decoded `tools/call` and the Box API:
//!
//! - `definitions/` - tool bodies, grouped by family, and the [`catalog`]
//! - `registry.rs` - the fixed name → descriptor table built at startup
//! - `schema.rs` - argument validation against each tool's input schema
//! - `dispatcher.rs` - resolve, validate, run, wrap the result
//! - `error.rs` - tool errors and their protocol envelopes
//!
//! ## Adding a New Tool
//!
//! 1. Add a params struct and a unit struct with `NAME`, `DESCRIPTION`,
//!    `execute()` and `definition()` in `definitions/`
//! 2. Append its `definition()` to [`catalog`]
//!
//! Transports never need to change: they only talk to the dispatcher.

mod context;
pub mod definitions;
mod dispatcher;
mod error;
mod handlers;
mod registry;
mod schema;

pub use context::ToolContext;
pub use definitions::catalog;
pub use dispatcher::{Dispatcher, ToolInvocation};
pub use error::{ParamProblem, Problem, RegistryError, ToolError};
pub use handlers::{Handler, HandlerFuture, NoParams, ToolDefinition, ToolOutput};
pub use registry::{SideEffect, ToolDescriptor, ToolRegistry};
pub use schema::{InputSchema, ParamKind, ParamSpec};
