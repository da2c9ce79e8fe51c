//! Lua 5.4 runtime via the `mlua` crate.
//!
//! One [`LuaRuntime`] is created per run.  Preload scripts, script blocks and
//! macro callbacks all execute in the same Lua state, so globals defined by
//! one are visible to the others.
//!
//! # Lua API
//!
//! The following globals are registered in every state:
//!
//! | Lua function                              | Effect                                   |
//! |-------------------------------------------|------------------------------------------|
//! | `echo(text)`                              | Append to `currentBlock`                 |
//! | `writeToBlock(block, text)`               | Append to `block`                        |
//! | `macro(name, {"raw", …, "raw*"}, fn)`     | Register a macro                         |
//! | `markBlock(name, block)`                  | Give `block` a run-wide name             |
//! | `getMarkedBlock(name)`                    | Look up a named block                    |
//! | `registerGenerateLineInfoCallback(fn)`    | Set the `fn(line, file)` marker generator |
//!
//! `currentBlock` holds the handle of the current output block while a
//! script block or macro callback runs.  Scripts may assign another handle
//! to it; later `echo` calls follow the assignment.

use mlua::prelude::*;
use tracing::{debug, warn};

use crate::context::{append_to_block, Context, SharedContext};
use crate::error::ScriptError;
use crate::registry::MacroDef;
use crate::runtime::{MacroArg, ScriptRuntime};
use crate::token::WeakTokenRef;

/// Global holding the current output block.
const CURRENT_BLOCK: &str = "currentBlock";

// ── BlockHandle ───────────────────────────────────────────────────────────────

/// Script-side handle to an output token.  Never keeps the token alive.
#[derive(Debug, Clone)]
pub struct BlockHandle(pub WeakTokenRef);

impl LuaUserData for BlockHandle {}

fn block_arg(ud: &LuaAnyUserData) -> LuaResult<WeakTokenRef> {
    Ok(ud.borrow::<BlockHandle>()?.0.clone())
}

/// Text of a Lua value as `echo` sees it: strings and numbers convert,
/// anything else is empty.
fn lua_text(lua: &Lua, value: LuaValue) -> LuaResult<String> {
    Ok(lua
        .coerce_string(value)?
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default())
}

fn to_script_error(e: LuaError) -> ScriptError {
    ScriptError::new(resolve_chunk_lines(&e.to_string()))
}

/// Chunk name for source starting on 0-based line `first_line` of `file`.
/// Lua reports positions in it as `file:+first_line:line`.
fn offset_chunk_name(file: &str, first_line: usize) -> String {
    format!("@{file}:+{first_line}")
}

/// Rewrite every `:+offset:line` position in a Lua message into the
/// plain file line `:offset+line`.
fn resolve_chunk_lines(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(at) = rest.find(":+") {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 2..];
        match parse_offset_line(tail) {
            Some((line, used)) => {
                out.push(':');
                out.push_str(&line.to_string());
                rest = &tail[used..];
            }
            None => {
                out.push_str(":+");
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse `offset:line` at the start of `s`; returns the file line and the
/// number of bytes consumed.
fn parse_offset_line(s: &str) -> Option<(usize, usize)> {
    let offset_len = s.bytes().take_while(u8::is_ascii_digit).count();
    let offset: usize = s[..offset_len].parse().ok()?;
    let after = s[offset_len..].strip_prefix(':')?;
    let line_len = after.bytes().take_while(u8::is_ascii_digit).count();
    let line: usize = after[..line_len].parse().ok()?;
    Some((offset + line, offset_len + 1 + line_len))
}

// ── LuaRuntime ────────────────────────────────────────────────────────────────

/// A Lua interpreter with luatp's API pre-registered.
pub struct LuaRuntime {
    lua: Lua,
    ctx: SharedContext<LuaFunction>,
}

impl LuaRuntime {
    /// Create a Lua state bound to a fresh [`Context`].
    pub fn new() -> LuaResult<Self> {
        Self::with_context(Context::shared())
    }

    /// Create a Lua state whose natives operate on `ctx`.
    pub fn with_context(ctx: SharedContext<LuaFunction>) -> LuaResult<Self> {
        let lua = Lua::new();
        Self::register_api(&lua, &ctx)?;
        Ok(Self { lua, ctx })
    }

    fn register_api(lua: &Lua, ctx: &SharedContext<LuaFunction>) -> LuaResult<()> {
        let globals = lua.globals();

        // echo(text): appends to whatever `currentBlock` holds right now
        globals.set(
            "echo",
            lua.create_function(|lua, args: LuaMultiValue| {
                let Some(value) = args.into_iter().next() else {
                    return Err(LuaError::RuntimeError(
                        "bad argument #1 to 'echo' (value expected)".into(),
                    ));
                };
                let text = lua_text(lua, value)?;
                match lua.globals().get::<Option<LuaAnyUserData>>(CURRENT_BLOCK)? {
                    Some(block) => append_to_block(&block_arg(&block)?, &text),
                    None => warn!("echo outside of a lua block or macro; text dropped"),
                }
                Ok(())
            })?,
        )?;

        // writeToBlock(block, text)
        globals.set(
            "writeToBlock",
            lua.create_function(|lua, (block, value): (LuaAnyUserData, LuaValue)| {
                let block = block_arg(&block)?;
                append_to_block(&block, &lua_text(lua, value)?);
                Ok(())
            })?,
        )?;

        // macro(name, params, callback)
        {
            let ctx = ctx.clone();
            globals.set(
                "macro",
                lua.create_function(
                    move |lua, (name, params, callback): (String, LuaTable, LuaFunction)| {
                        let spec = params
                            .sequence_values::<LuaValue>()
                            .map(|v| lua_text(lua, v?))
                            .collect::<LuaResult<Vec<_>>>()?;
                        let def = MacroDef::parse(name, &spec, callback).map_err(LuaError::external)?;
                        debug!(name = %def.name, params = def.arity(), variadic = def.variadic, "registering macro");
                        ctx.borrow_mut().macros.register(def).map_err(LuaError::external)
                    },
                )?,
            )?;
        }

        // markBlock(name, block)
        {
            let ctx = ctx.clone();
            globals.set(
                "markBlock",
                lua.create_function(move |_, (name, block): (String, LuaAnyUserData)| {
                    let block = block_arg(&block)?;
                    ctx.borrow_mut().blocks.mark(name, block).map_err(LuaError::external)
                })?,
            )?;
        }

        // getMarkedBlock(name) → block
        {
            let ctx = ctx.clone();
            globals.set(
                "getMarkedBlock",
                lua.create_function(move |lua, name: String| {
                    let block = ctx.borrow().blocks.get(&name).map_err(LuaError::external)?;
                    lua.create_userdata(BlockHandle(block))
                })?,
            )?;
        }

        // registerGenerateLineInfoCallback(fn)
        {
            let ctx = ctx.clone();
            globals.set(
                "registerGenerateLineInfoCallback",
                lua.create_function(move |_, callback: LuaFunction| {
                    ctx.borrow_mut().line_info = Some(callback);
                    Ok(())
                })?,
            )?;
        }

        Ok(())
    }

    /// Publish the context's current output slot as `currentBlock`.
    fn sync_current_block(&self) -> LuaResult<()> {
        let current = self.ctx.borrow().current_output();
        let value = match current {
            Some(block) => LuaValue::UserData(self.lua.create_userdata(BlockHandle(block))?),
            None => LuaValue::Nil,
        };
        self.lua.globals().set(CURRENT_BLOCK, value)
    }
}

impl ScriptRuntime for LuaRuntime {
    type Callback = LuaFunction;

    fn context(&self) -> &SharedContext<LuaFunction> {
        &self.ctx
    }

    fn execute(&self, source: &str, chunk_name: &str, first_line: usize) -> Result<(), ScriptError> {
        self.sync_current_block().map_err(to_script_error)?;
        self.lua
            .load(source)
            .set_name(offset_chunk_name(chunk_name, first_line))
            .exec()
            .map_err(to_script_error)
    }

    fn call(&self, callback: &LuaFunction, args: &[MacroArg]) -> Result<(), ScriptError> {
        self.sync_current_block().map_err(to_script_error)?;
        let lua_args: LuaMultiValue = args
            .iter()
            .map(|arg| match arg {
                MacroArg::Text(s) => Ok(LuaValue::String(self.lua.create_string(s)?)),
                MacroArg::List(items) => {
                    Ok(LuaValue::Table(self.lua.create_sequence_from(items.iter().map(String::as_str))?))
                }
            })
            .collect::<LuaResult<Vec<_>>>()
            .map_err(to_script_error)?
            .into();
        callback.call::<()>(lua_args).map_err(to_script_error)
    }

    fn line_info(&self, callback: &LuaFunction, line: usize, file: &str) -> Result<String, ScriptError> {
        let value: LuaValue = callback.call((line as i64, file)).map_err(to_script_error)?;
        let tostring: LuaFunction = self.lua.globals().get("tostring").map_err(to_script_error)?;
        tostring.call::<String>(value).map_err(to_script_error)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
