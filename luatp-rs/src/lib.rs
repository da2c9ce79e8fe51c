//! luatp: a text preprocessor driven by embedded Lua.
//!
//! Input text passes through unchanged except for `<?lua ... lua?>` blocks,
//! which are replaced by whatever their Lua code writes, and invocations of
//! macros that Lua code registered.  See [`Preprocessor`] for the entry
//! point.

pub mod cli;
pub mod context;
pub mod error;
pub mod expand;
pub mod lexer;
pub mod lua;
pub mod preprocessor;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod token;

pub use error::{Error, Result};
pub use lua::LuaRuntime;
pub use preprocessor::Preprocessor;
