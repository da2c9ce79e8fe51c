//! Capability interface to the embedded scripting runtime.
//!
//! The expander and renderer only need three things from a runtime: run a
//! chunk of source, call a registered callback with positional arguments,
//! and call the line-info generator.  [`crate::lua::LuaRuntime`] is the
//! implementation shipped with luatp.

use crate::context::SharedContext;
use crate::error::ScriptError;

/// A positional macro argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroArg {
    Text(String),
    /// Collected values of a variadic parameter.
    List(Vec<String>),
}

/// Scripting runtime consumed by the expander and renderer.
pub trait ScriptRuntime {
    /// Handle to a script function held by the registries.
    type Callback: Clone;

    /// The run-wide context the runtime's native functions operate on.
    fn context(&self) -> &SharedContext<Self::Callback>;

    /// Execute `source` as one chunk.  `chunk_name` appears in error
    /// messages; `first_line` is the 0-based line of the chunk's first line
    /// within that file.
    fn execute(&self, source: &str, chunk_name: &str, first_line: usize)
        -> Result<(), ScriptError>;

    /// Call a macro callback with positional arguments.
    fn call(&self, callback: &Self::Callback, args: &[MacroArg]) -> Result<(), ScriptError>;

    /// Call the line-info generator and return its marker string.
    fn line_info(
        &self,
        callback: &Self::Callback,
        line: usize,
        file: &str,
    ) -> Result<String, ScriptError>;
}

// ── Test double ───────────────────────────────────────────────────────────────
