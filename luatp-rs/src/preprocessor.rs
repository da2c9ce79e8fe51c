//! Run driver: preload scripts, then tokenize → expand → render each input
//! file in order.
//!
//! A [`Preprocessor`] owns the scripting runtime for the whole run, so
//! macros, marked blocks and the line-info generator registered while
//! processing one file stay available to every file after it.

use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{Error, Result, ScriptError};
use crate::expand::expand;
use crate::lexer::tokenize;
use crate::lua::LuaRuntime;
use crate::render::render;
use crate::runtime::ScriptRuntime;

/// Processes preload scripts and input files through one runtime.
pub struct Preprocessor<R: ScriptRuntime = LuaRuntime> {
    runtime: R,
}

impl Preprocessor<LuaRuntime> {
    /// Create a preprocessor backed by a fresh Lua state.
    pub fn new() -> Result<Self> {
        let runtime = LuaRuntime::new().map_err(|e| Error::Runtime(ScriptError::new(e.to_string())))?;
        Ok(Self::with_runtime(runtime))
    }
}

impl<R: ScriptRuntime> Preprocessor<R> {
    pub fn with_runtime(runtime: R) -> Self {
        Self { runtime }
    }

    /// Execute a preload script file.
    pub fn load_script_file(&self, path: &Path) -> Result<()> {
        let src = read_file(path)?;
        self.load_script_source(&src, &path.display().to_string())
    }

    /// Execute preload script source directly.
    pub fn load_script_source(&self, src: &str, label: &str) -> Result<()> {
        debug!(script = label, "loading preload script");
        self.runtime
            .execute(src, label, 0)
            .map_err(|source| Error::Preload { label: label.to_owned(), source })
    }

    /// Process one input file and write its expansion to `out`.
    pub fn process_file<W: Write + ?Sized>(&self, path: &Path, out: &mut W) -> Result<()> {
        let text = read_file(path)?;
        self.process_source(&text, &path.display().to_string(), out)
    }

    /// Process `text` as if read from the file identified by `file`.
    pub fn process_source<W: Write + ?Sized>(&self, text: &str, file: &str, out: &mut W) -> Result<()> {
        debug!(file, "processing");
        let mut stream = tokenize(text, Rc::from(file))?;
        trace!(tokens = stream.len(), stream = %stream.debug_dump(None), "tokenized");
        expand(&mut stream, &self.runtime)?;
        trace!(tokens = stream.len(), stream = %stream.debug_dump(None), "expanded");
        render(&stream, &self.runtime, out)
    }

    /// Run every preload script, then every input file, writing all output
    /// to `out`.
    pub fn run<P, Q, W>(&self, preloads: &[P], inputs: &[Q], out: &mut W) -> Result<()>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        W: Write + ?Sized,
    {
        for script in preloads {
            self.load_script_file(script.as_ref())?;
        }
        for input in inputs {
            self.process_file(input.as_ref(), out)?;
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read { path: path.to_owned(), source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
