use std::rc::Rc;

use luatp::lexer::{tokenize, BLOCK_START};
use luatp::token::TokenKind;
use luatp::Preprocessor;
use proptest::prelude::*;

fn run(pp: &Preprocessor, input: &str) -> String {
    let mut out = Vec::new();
    pp.process_source(input, "prop.txt", &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

proptest! {
    /// Text without script blocks or macro names comes out unchanged.
    #[test]
    fn identity_without_markers(s in "\\PC*") {
        prop_assume!(!s.contains(BLOCK_START));
        let pp = Preprocessor::new().unwrap();
        prop_assert_eq!(run(&pp, &s), s);
    }
}

proptest! {
    /// Near-misses of the start marker never swallow input or move lines.
    #[test]
    fn marker_prefixes_roll_back(s in "[<?lua \\n]{0,40}") {
        prop_assume!(!s.contains(BLOCK_START));
        let stream = tokenize(&s, Rc::from("prop.txt")).unwrap();
        let mut text = String::new();
        let mut line = 0;
        for tok in stream.iter() {
            let tok = tok.borrow();
            prop_assert!(!tok.kind.is_script());
            prop_assert_eq!(tok.line, line);
            line += tok.text.matches('\n').count();
            text.push_str(&tok.text);
        }
        prop_assert_eq!(text, s);
    }
}

proptest! {
    /// Whatever surrounds it, a block's output replaces exactly the block.
    #[test]
    fn block_output_is_spliced(before in "[a-z ,.;\\n]{0,20}", after in "[a-z ,.;\\n]{0,20}") {
        let pp = Preprocessor::new().unwrap();
        let input = format!("{before}<?lua echo('X') lua?>{after}");
        prop_assert_eq!(run(&pp, &input), format!("{before}X{after}"));
    }
}

#[test]
fn rollback_splits_marker_prefix() {
    let stream = tokenize("<?lux", Rc::from("t")).unwrap();
    let kinds: Vec<_> = stream.iter().map(|t| t.borrow().kind).collect();
    assert_eq!(kinds.first(), Some(&TokenKind::Special));
    assert_eq!(stream.text(stream.first()).as_deref(), Some("<"));
}
