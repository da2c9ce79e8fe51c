//! Macro and script-block expansion.
//!
//! [`expand`] walks a file's [`TokenStream`] once.  Script blocks are run
//! with the token after them bound as their output slot.  A symbol naming a
//! registered macro has its argument list matched directly on the stream:
//! every consumed token is unlinked, so when the walk resumes it continues
//! right after the closing `)`.
//!
//! # Argument grammar
//!
//! | Signature      | Accepted invocations                                 |
//! |----------------|------------------------------------------------------|
//! | `{}`           | `name`, `name()`, `name( )`                          |
//! | `{"raw", …}`   | `name(a, b)`; each argument is raw text up to `,`/`)` |
//! | `{…, "raw*"}`  | `name(a, b, c, …)`; trailing arguments form a list   |
//!
//! Raw arguments are trimmed of spaces, tabs, CR and LF.  A variadic list
//! always holds at least one element, so `name()` yields `[""]`.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{escape_for_display, Error, Location, Result};
use crate::registry::MacroDef;
use crate::runtime::{MacroArg, ScriptRuntime};
use crate::token::{NodeId, TokenKind, TokenStream};

/// Characters trimmed from both ends of a raw argument.
const ARG_TRIM: &[char] = &[' ', '\t', '\n', '\r'];

/// Expand every script block and macro invocation in `stream`, in order.
pub fn expand<R: ScriptRuntime>(stream: &mut TokenStream, runtime: &R) -> Result<()> {
    let mut cur = stream.first();
    while let Some(id) = cur {
        match stream.kind(id) {
            TokenKind::ScriptBlock => run_block(stream, id, runtime)?,
            TokenKind::Symbol => {
                let name = stream.token(id).borrow().text.clone();
                let def = runtime.context().borrow().macros.get(&name).cloned();
                if let Some(def) = def {
                    run_macro(stream, id, &def, runtime)?;
                }
            }
            _ => {}
        }
        cur = stream.next(id);
    }
    Ok(())
}

fn run_block<R: ScriptRuntime>(stream: &TokenStream, id: NodeId, runtime: &R) -> Result<()> {
    let (code, location) = {
        let tok = stream.token(id).borrow();
        (tok.text.clone(), tok.location())
    };
    if let Some(slot) = stream.next(id) {
        runtime.context().borrow_mut().bind_output(stream.token(slot));
    }
    trace!(file = %location.file, line = location.line + 1, block = %stream.token(id).borrow(), "running lua block");
    runtime
        .execute(&code, &location.file, location.line)
        .map_err(|source| Error::Block { location, source })
}

fn run_macro<R: ScriptRuntime>(
    stream: &mut TokenStream,
    id: NodeId,
    def: &MacroDef<R::Callback>,
    runtime: &R,
) -> Result<()> {
    let location = stream.token(id).borrow().location();
    debug!(name = %def.name, file = %location.file, line = location.line + 1, "expanding macro");

    let args = match_arguments(stream, id, def)?;

    let slot = Rc::clone(stream.token(id));
    slot.borrow_mut().text.clear();
    runtime.context().borrow_mut().bind_output(&slot);

    runtime.call(&def.callback, &args).map_err(|source| Error::Macro {
        location,
        name: def.name.clone(),
        source,
    })
}

// ── Argument matching ─────────────────────────────────────────────────────────

/// Consume the argument list following the invocation at `id` and return
/// the positional arguments.  The invocation token itself is left in place.
pub fn match_arguments<C>(
    stream: &mut TokenStream,
    id: NodeId,
    def: &MacroDef<C>,
) -> Result<Vec<MacroArg>> {
    let invocation = stream.token(id).borrow().location();
    let mut m = Matcher { stream, name: &def.name, invocation };
    let start = m.stream.next(id);

    if def.arity() == 0 {
        m.match_empty_list(start)?;
        return Ok(Vec::new());
    }

    let mut cur = m.open_list(start)?;
    let mut args = Vec::with_capacity(def.arity());
    for i in 0..def.arity() {
        let last = i + 1 == def.arity();
        if last && def.variadic {
            let (list, next) = m.collect_list(cur)?;
            args.push(MacroArg::List(list));
            cur = next;
        } else {
            let (text, next) = m.collect_raw(cur);
            args.push(MacroArg::Text(text));
            cur = next;
            if !last {
                cur = m.expect_comma(cur)?;
            }
        }
    }
    m.close_list(cur)?;
    trace!(stream = %m.stream.debug_dump(Some(id)), "arguments matched");
    Ok(args)
}

struct Matcher<'a> {
    stream: &'a mut TokenStream,
    name: &'a str,
    invocation: Location,
}

impl Matcher<'_> {
    fn text(&self, cur: Option<NodeId>) -> Option<String> {
        self.stream.text(cur)
    }

    /// Error at the token under `cur`, or the end-of-input error.
    fn error_at(&self, cur: Option<NodeId>, message: String) -> Error {
        match cur {
            Some(id) => Error::syntax(self.stream.token(id).borrow().location(), message),
            None => self.eof_error(),
        }
    }

    fn eof_error(&self) -> Error {
        Error::syntax(
            self.invocation.clone(),
            format!("Syntax error while calling macro [{}]", self.name),
        )
    }

    fn found(&self, cur: Option<NodeId>) -> String {
        escape_for_display(&self.text(cur).unwrap_or_default())
    }

    fn skip_whitespace(&mut self, mut cur: Option<NodeId>) -> Option<NodeId> {
        while let Some(id) = cur {
            if self.stream.kind(id) != TokenKind::Whitespace {
                break;
            }
            cur = self.stream.remove(id);
        }
        cur
    }

    /// `name` or `name()` for a macro without parameters.
    fn match_empty_list(&mut self, start: Option<NodeId>) -> Result<()> {
        if self.text(start).as_deref() != Some("(") {
            return Ok(());
        }
        let Some(open) = start else { return Ok(()) };
        let after = self.stream.next(open);
        let close = self.skip_whitespace(after);
        match self.text(close).as_deref() {
            Some(")") => {
                if let Some(close) = close {
                    self.stream.remove(close);
                }
                self.stream.remove(open);
                Ok(())
            }
            Some(_) => Err(self.error_at(
                close,
                format!(
                    "Expected ')' to finish 0 argument list, but found [{}] while processing macro [{}]",
                    self.found(close),
                    self.name
                ),
            )),
            None => Err(self.eof_error()),
        }
    }

    fn open_list(&mut self, start: Option<NodeId>) -> Result<Option<NodeId>> {
        match (start, self.text(start).as_deref()) {
            (Some(open), Some("(")) => {
                let next = self.stream.remove(open);
                Ok(self.skip_whitespace(next))
            }
            (None, _) => Err(self.eof_error()),
            _ => Err(self.error_at(
                start,
                format!(
                    "Expected '(' to start argument list, but found [{}] while processing macro [{}]",
                    self.found(start),
                    self.name
                ),
            )),
        }
    }

    /// Concatenate and remove tokens up to the next `,` or `)`.
    fn collect_raw(&mut self, mut cur: Option<NodeId>) -> (String, Option<NodeId>) {
        let mut text = String::new();
        while let Some(id) = cur {
            let tok = self.stream.token(id).borrow();
            if tok.text == "," || tok.text == ")" {
                break;
            }
            text.push_str(&tok.text);
            drop(tok);
            cur = self.stream.remove(id);
        }
        (text.trim_matches(ARG_TRIM).to_owned(), cur)
    }

    fn collect_list(&mut self, mut cur: Option<NodeId>) -> Result<(Vec<String>, Option<NodeId>)> {
        let mut items = Vec::new();
        loop {
            let (text, next) = self.collect_raw(cur);
            items.push(text);
            cur = next;
            match self.text(cur).as_deref() {
                Some(")") => return Ok((items, cur)),
                Some(",") => {
                    if let Some(comma) = cur {
                        cur = self.stream.remove(comma);
                    }
                }
                Some(_) => {
                    return Err(self.error_at(
                        cur,
                        format!(
                            "Cannot parse variadic argument list in macro [{}]. Expected [,] or [)] but found [{}]",
                            self.name,
                            self.found(cur)
                        ),
                    ))
                }
                None => return Err(self.eof_error()),
            }
        }
    }

    fn expect_comma(&mut self, cur: Option<NodeId>) -> Result<Option<NodeId>> {
        match (cur, self.text(cur).as_deref()) {
            (Some(comma), Some(",")) => Ok(self.stream.remove(comma)),
            (None, _) => Err(self.eof_error()),
            _ => Err(self.error_at(
                cur,
                format!(
                    "Expected ',' but found [{}] while processing arguments of macro [{}]",
                    self.found(cur),
                    self.name
                ),
            )),
        }
    }

    fn close_list(&mut self, cur: Option<NodeId>) -> Result<()> {
        match (cur, self.text(cur).as_deref()) {
            (Some(close), Some(")")) => {
                self.stream.remove(close);
                Ok(())
            }
            (None, _) => Err(self.eof_error()),
            _ => Err(self.error_at(
                cur,
                format!(
                    "Expected ')' to finish argument list, but found [{}] while processing macro [{}]",
                    self.found(cur),
                    self.name
                ),
            )),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::runtime::fake::FakeRuntime;

    fn concat(stream: &TokenStream) -> String {
        stream
            .iter()
            .filter(|t| !t.borrow().kind.is_script())
            .map(|t| t.borrow().text.clone())
            .collect()
    }

    fn run(rt: &FakeRuntime, input: &str) -> Result<String> {
        let mut stream = tokenize(input, Rc::from("in.txt"))?;
        expand(&mut stream, rt)?;
        Ok(concat(&stream))
    }

    /// Runtime with `capture(...)` macros that record their arguments.
    fn capture(spec: &'static [&'static str]) -> (FakeRuntime, Rc<std::cell::RefCell<Vec<Vec<MacroArg>>>>) {
        let rt = FakeRuntime::new();
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        rt.define("m", spec, move |args| {
            sink.borrow_mut().push(args.to_vec());
            Ok("<out>".to_owned())
        });
        (rt, seen)
    }

    fn text(s: &str) -> MacroArg {
        MacroArg::Text(s.to_owned())
    }

    fn list(items: &[&str]) -> MacroArg {
        MacroArg::List(items.iter().map(|&s| s.to_owned()).collect())
    }

    // ── Zero-parameter macros ─────────────────────────────────────────────

    #[test]
    fn zero_param_bare_and_parens_match() {
        let (rt, seen) = capture(&[]);
        assert_eq!(run(&rt, "a m b").unwrap(), "a <out> b");
        assert_eq!(run(&rt, "a m() b").unwrap(), "a <out> b");
        assert_eq!(run(&rt, "a m(  ) b").unwrap(), "a <out> b");
        assert_eq!(seen.borrow().len(), 3);
        assert!(seen.borrow().iter().all(Vec::is_empty));
    }

    #[test]
    fn zero_param_at_end_of_input() {
        let (rt, _) = capture(&[]);
        assert_eq!(run(&rt, "m").unwrap(), "<out>");
    }

    #[test]
    fn zero_param_with_argument_is_error() {
        let (rt, _) = capture(&[]);
        let err = run(&rt, "m(x)").unwrap_err();
        match err {
            Error::Syntax { message, location } => {
                assert!(message.contains("Expected ')' to finish 0 argument list"));
                assert!(message.contains("[x]"));
                assert!(message.contains("macro [m]"));
                assert_eq!(location.line, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn zero_param_unclosed_is_error() {
        let (rt, _) = capture(&[]);
        assert!(matches!(run(&rt, "m( "), Err(Error::Syntax { .. })));
    }

    // ── Raw parameters ────────────────────────────────────────────────────

    #[test]
    fn one_raw_param_is_trimmed() {
        let (rt, seen) = capture(&["raw"]);
        assert_eq!(run(&rt, "m(  hello world  )!").unwrap(), "<out>!");
        assert_eq!(seen.borrow()[0], vec![text("hello world")]);
    }

    #[test]
    fn raw_params_keep_inner_punctuation() {
        let (rt, seen) = capture(&["raw", "raw"]);
        assert_eq!(run(&rt, "m(a + b.c, \n\t(x y\n)").unwrap(), "<out>");
        assert_eq!(seen.borrow()[0], vec![text("a + b.c"), text("(x y")]);
    }

    #[test]
    fn parentheses_do_not_nest() {
        let (rt, seen) = capture(&["raw"]);
        assert_eq!(run(&rt, "m(f(x))").unwrap(), "<out>)");
        assert_eq!(seen.borrow()[0], vec![text("f(x")]);
    }

    #[test]
    fn empty_raw_argument() {
        let (rt, seen) = capture(&["raw"]);
        run(&rt, "m()").unwrap();
        assert_eq!(seen.borrow()[0], vec![text("")]);
    }

    #[test]
    fn missing_open_paren_is_error() {
        let (rt, _) = capture(&["raw"]);
        let err = run(&rt, "m x").unwrap_err();
        assert!(
            matches!(&err, Error::Syntax { message, .. } if message.contains("Expected '(' to start argument list, but found [ ]"))
        );
    }

    #[test]
    fn missing_open_paren_at_eof() {
        let (rt, _) = capture(&["raw"]);
        let err = run(&rt, "m").unwrap_err();
        assert!(
            matches!(&err, Error::Syntax { message, .. } if message == "Syntax error while calling macro [m]")
        );
    }

    #[test]
    fn too_few_arguments_is_error() {
        let (rt, _) = capture(&["raw", "raw"]);
        let err = run(&rt, "m(a)").unwrap_err();
        assert!(
            matches!(&err, Error::Syntax { message, .. } if message.starts_with("Expected ',' but found [)]"))
        );
    }

    #[test]
    fn too_many_arguments_is_error() {
        let (rt, _) = capture(&["raw"]);
        let err = run(&rt, "m(a, b)").unwrap_err();
        assert!(
            matches!(&err, Error::Syntax { message, .. } if message.starts_with("Expected ')' to finish argument list, but found [,]"))
        );
    }

    #[test]
    fn unclosed_list_reports_invocation_location() {
        let (rt, _) = capture(&["raw"]);
        let err = run(&rt, "\n\nm(abc\nmore").unwrap_err();
        match err {
            Error::Syntax { location, message } => {
                assert_eq!(location, Location::new("in.txt", 2));
                assert_eq!(message, "Syntax error while calling macro [m]");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    // ── Variadic parameters ───────────────────────────────────────────────

    #[test]
    fn variadic_collects_list() {
        let (rt, seen) = capture(&["raw*"]);
        run(&rt, "m(1,2,3)").unwrap();
        assert_eq!(seen.borrow()[0], vec![list(&["1", "2", "3"])]);
    }

    #[test]
    fn variadic_empty_call_yields_one_empty_string() {
        let (rt, seen) = capture(&["raw*"]);
        run(&rt, "m()").unwrap();
        assert_eq!(seen.borrow()[0], vec![list(&[""])]);
    }

    #[test]
    fn variadic_after_fixed_params() {
        let (rt, seen) = capture(&["raw", "raw*"]);
        run(&rt, "m( head , a , b )").unwrap();
        assert_eq!(seen.borrow()[0], vec![text("head"), list(&["a", "b"])]);
    }

    #[test]
    fn variadic_unterminated_is_error() {
        let (rt, _) = capture(&["raw*"]);
        let err = run(&rt, "m(a, b").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    // ── Stream effects ────────────────────────────────────────────────────

    #[test]
    fn argument_tokens_are_removed() {
        let (rt, _) = capture(&["raw"]);
        let mut stream = tokenize("x m( a ) y", Rc::from("f")).unwrap();
        expand(&mut stream, &rt).unwrap();
        let texts: Vec<String> = stream.iter().map(|t| t.borrow().text.clone()).collect();
        assert_eq!(texts, ["x", " ", "<out>", " ", "y"]);
    }

    #[test]
    fn identity_without_macros() {
        let rt = FakeRuntime::new();
        let input = "int main(void) { return 0; }\n";
        assert_eq!(run(&rt, input).unwrap(), input);
    }

    #[test]
    fn consecutive_macros() {
        let (rt, seen) = capture(&["raw"]);
        assert_eq!(run(&rt, "m(1)m(2)").unwrap(), "<out><out>");
        assert_eq!(seen.borrow().len(), 2);
    }

    // ── Script blocks ─────────────────────────────────────────────────────

    #[test]
    fn block_output_lands_in_slot() {
        let rt = FakeRuntime::new();
        assert_eq!(run(&rt, "a<?lua hi lua?>b").unwrap(), "ahib");
    }

    #[test]
    fn block_output_naming_a_macro_is_expanded() {
        let (rt, seen) = capture(&[]);
        assert_eq!(run(&rt, "<?lua m lua?>").unwrap(), "<out>");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn block_error_reports_block_line() {
        let rt = FakeRuntime::new();
        let err = run(&rt, "x\n<?lua error boom lua?>").unwrap_err();
        match err {
            Error::Block { location, source } => {
                assert_eq!(location, Location::new("in.txt", 1));
                assert_eq!(source.message, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn macro_error_is_wrapped_with_name_and_location() {
        let rt = FakeRuntime::new();
        rt.define("bad", &["raw"], |_| Err(crate::error::ScriptError::new("nope")));
        let err = run(&rt, "\nbad(1)").unwrap_err();
        match err {
            Error::Macro { location, name, source } => {
                assert_eq!(location, Location::new("in.txt", 1));
                assert_eq!(name, "bad");
                assert_eq!(source.message, "nope");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
