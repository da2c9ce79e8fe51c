//! Command-line argument parsing.
//!
//! Usage:
//!   luatp -f <input> [-f <input>...] [-l <script.lua>...] [-o <out|console>]
//!   luatp -v | --version
//!   luatp -h | --help

use std::path::{Path, PathBuf};

use clap::Parser;
use directories::ProjectDirs;
use tracing::{debug, Level};

use crate::error::{Error, Result};

/// Value of `-o` that selects standard output.
pub const CONSOLE: &str = "console";

/// Environment variable naming an extra directory searched for `-l` scripts.
pub const LIBDIR_ENV: &str = "LUATP_LIBDIR";

pub const VERSION_BANNER: &str = "luatp 0.2\nhttps://github.com/Otaka/LuaTextProcessor";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "luatp",
    about = "Lua text preprocessor: expands embedded <?lua ... lua?> blocks and Lua-defined macros",
    disable_version_flag = true,
    arg_required_else_help = true
)]
pub struct CliArgs {
    /// Input file to process (repeatable, processed in order)
    #[arg(short = 'f', value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Lua script to run before any input (repeatable, run in order)
    #[arg(short = 'l', value_name = "SCRIPT")]
    pub scripts: Vec<PathBuf>,

    /// Output file, or `console` for standard output
    #[arg(short = 'o', value_name = "OUTPUT", default_value = CONSOLE)]
    pub output: String,

    /// Print version information and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(long, default_value_t = Level::WARN)]
    pub log_level: Level,
}

/// Where expanded text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Console,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_arg(arg: &str) -> Self {
        if arg == CONSOLE {
            OutputTarget::Console
        } else {
            OutputTarget::File(PathBuf::from(arg))
        }
    }
}

/// A validated run: every path exists and inputs are non-empty.
#[derive(Debug)]
pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
    pub output: OutputTarget,
}

// ── Validation ────────────────────────────────────────────────────────────────

impl CliArgs {
    /// Resolve preload scripts and check that every file exists before any
    /// processing starts.
    pub fn into_run_config(self) -> Result<RunConfig> {
        if self.files.is_empty() {
            return Err(Error::NoInput);
        }
        for f in &self.files {
            if !f.is_file() {
                return Err(Error::MissingFile { kind: "input", path: f.clone() });
            }
        }
        let scripts = self
            .scripts
            .iter()
            .map(|s| {
                resolve_script(s, &search_dirs())
                    .ok_or_else(|| Error::MissingFile { kind: "lua", path: s.clone() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RunConfig {
            inputs: self.files,
            scripts,
            output: OutputTarget::from_arg(&self.output),
        })
    }
}

/// Directories searched for a relative `-l` script not found as given:
/// `$LUATP_LIBDIR`, then the per-user data directory.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(d) = std::env::var_os(LIBDIR_ENV) {
        dirs.push(PathBuf::from(d));
    }
    if let Some(proj) = ProjectDirs::from("", "", "luatp") {
        dirs.push(proj.data_dir().to_path_buf());
    }
    dirs
}

/// Find `script` as given, then under each of `dirs` in order.
pub fn resolve_script(script: &Path, dirs: &[PathBuf]) -> Option<PathBuf> {
    if script.is_file() {
        return Some(script.to_path_buf());
    }
    if script.is_absolute() {
        return None;
    }
    let found = dirs.iter().map(|d| d.join(script)).find(|p| p.is_file());
    if let Some(p) = &found {
        debug!(script = %script.display(), resolved = %p.display(), "resolved lua script");
    }
    found
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("luatp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn repeatable_flags_keep_order() {
        let a = parse(&["-f", "a.txt", "-l", "x.lua", "-f", "b.txt", "-l", "y.lua"]);
        assert_eq!(a.files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert_eq!(a.scripts, vec![PathBuf::from("x.lua"), PathBuf::from("y.lua")]);
    }

    #[test]
    fn output_defaults_to_console() {
        let a = parse(&["-f", "a.txt"]);
        assert_eq!(OutputTarget::from_arg(&a.output), OutputTarget::Console);
        assert_eq!(a.log_level, Level::WARN);
    }

    #[test]
    fn output_file() {
        let a = parse(&["-f", "a.txt", "-o", "out.c"]);
        assert_eq!(OutputTarget::from_arg(&a.output), OutputTarget::File("out.c".into()));
    }

    #[test]
    fn version_flags() {
        assert!(parse(&["-v"]).version);
        assert!(parse(&["--version"]).version);
    }

    #[test]
    fn no_arguments_is_an_error() {
        assert!(CliArgs::try_parse_from(["luatp"]).is_err());
    }

    #[test]
    fn missing_input_rejected() {
        let err = parse(&["-f", "/no/such/input.txt"]).into_run_config().unwrap_err();
        assert!(matches!(err, Error::MissingFile { kind: "input", .. }));
    }

    #[test]
    fn no_input_rejected() {
        let err = parse(&["-l", "x.lua"]).into_run_config().unwrap_err();
        assert!(matches!(err, Error::NoInput));
    }

    #[test]
    fn script_found_in_search_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.lua"), "").unwrap();
        let found = resolve_script(Path::new("lib.lua"), &[dir.path().to_path_buf()]);
        assert_eq!(found, Some(dir.path().join("lib.lua")));
        assert_eq!(resolve_script(Path::new("other.lua"), &[dir.path().to_path_buf()]), None);
    }
}
