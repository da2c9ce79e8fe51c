//! Output rendering.
//!
//! Writes the text of an expanded token stream.  Whenever the next visible
//! token's `(line, file)` differs from where the output currently is, the
//! line-info generator (if one is registered) is asked for a marker line.
//! The running line only moves by counting newlines actually written, so a
//! multi-line token shifts every comparison after it.

use std::io::Write;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::runtime::ScriptRuntime;
use crate::token::TokenStream;

/// Write `stream` to `out`.
pub fn render<R: ScriptRuntime, W: Write + ?Sized>(
    stream: &TokenStream,
    runtime: &R,
    out: &mut W,
) -> Result<()> {
    let mut line = 0usize;
    let mut file: Rc<str> = Rc::from("");

    for tok in stream.iter() {
        if tok.borrow().kind.is_script() {
            continue;
        }
        // The generator may write to blocks, so no borrow is held across it.
        let (tok_line, tok_file) = {
            let t = tok.borrow();
            (t.line, Rc::clone(&t.file))
        };
        if tok_line != line || tok_file != file {
            let generator = runtime.context().borrow().line_info.clone();
            if let Some(generator) = generator {
                let marker = runtime.line_info(&generator, tok_line, &tok_file).map_err(
                    |source| Error::LineInfo { location: tok.borrow().location(), source },
                )?;
                out.write_all(marker.as_bytes())?;
                out.write_all(b"\n")?;
            }
            line = tok_line;
            file = tok_file;
        }
        let tok = tok.borrow();
        out.write_all(tok.text.as_bytes())?;
        line += tok.text.matches('\n').count();
    }
    out.flush()?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
