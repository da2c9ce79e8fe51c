//! Tokens and the mutable per-file token stream.
//!
//! Tokens are shared as [`TokenRef`] (`Rc<RefCell<Token>>`) so that script
//! callbacks can hold weak handles to them and append text while the
//! expander walks the stream.
//!
//! [`TokenStream`] is a doubly linked list laid out in an arena: nodes are
//! addressed by [`NodeId`] and never move, so removing the node under (or
//! ahead of) a cursor leaves every other id valid.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Location;

// ── TokenKind ─────────────────────────────────────────────────────────────────

/// Classification of a token.  The discriminants match the numeric codes
/// printed in token dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum TokenKind {
    Eof = -1,
    Whitespace = 1,
    Symbol = 2,
    ScriptBlockStart = 3,
    ScriptBlockEnd = 4,
    ScriptBlock = 5,
    Special = 6,
    Unknown = 7,
    Number = 8,
}

impl TokenKind {
    /// Kinds that never reach the rendered output.
    pub fn is_script(self) -> bool {
        matches!(
            self,
            TokenKind::ScriptBlockStart | TokenKind::ScriptBlockEnd | TokenKind::ScriptBlock
        )
    }
}

// ── Token ─────────────────────────────────────────────────────────────────────

/// A classified fragment of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Current text.  Output slots are cleared and appended to by scripts.
    pub text: String,
    /// 0-based line on which the token starts.
    pub line: usize,
    /// Identifier of the file the token came from.
    pub file: Rc<str>,
}

/// Shared, mutable token.
pub type TokenRef = Rc<RefCell<Token>>;

/// Non-owning token handle given to scripts.
pub type WeakTokenRef = Weak<RefCell<Token>>;

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, file: Rc<str>) -> Self {
        Self { kind, text: text.into(), line, file }
    }

    pub fn location(&self) -> Location {
        Location::new(&*self.file, self.line)
    }

    pub fn into_ref(self) -> TokenRef {
        Rc::new(RefCell::new(self))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-\"{}\"", self.kind as i8, self.text)
    }
}

// ── TokenStream ───────────────────────────────────────────────────────────────

/// Stable address of a node in a [`TokenStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    token: TokenRef,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    removed: bool,
}

/// Ordered, mutable token sequence for one file.
#[derive(Debug, Default)]
pub struct TokenStream {
    nodes: Vec<Node>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token at the end.
    pub fn push_back(&mut self, token: Token) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            token: token.into_ref(),
            prev: self.tail,
            next: None,
            removed: false,
        });
        match self.tail {
            Some(t) => self.nodes[t.0].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        id
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<NodeId> {
        self.head
    }

    /// The live node after `id`.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next
    }

    /// The shared token stored at `id`.
    pub fn token(&self, id: NodeId) -> &TokenRef {
        &self.nodes[id.0].token
    }

    /// Current text of the token at `id`, or `None` past the end.
    pub fn text(&self, id: Option<NodeId>) -> Option<String> {
        id.map(|id| self.nodes[id.0].token.borrow().text.clone())
    }

    pub fn kind(&self, id: NodeId) -> TokenKind {
        self.nodes[id.0].token.borrow().kind
    }

    /// Unlink `id` and return the node that followed it.
    ///
    /// Removing an already removed node is a no-op that still returns its
    /// former successor.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeId> {
        let (prev, next, removed) = {
            let n = &self.nodes[id.0];
            (n.prev, n.next, n.removed)
        };
        if removed {
            return next;
        }
        match prev {
            Some(p) => self.nodes[p.0].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n.0].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[id.0].removed = true;
        self.len -= 1;
        next
    }

    /// Iterate over live tokens in order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { stream: self, cur: self.head }
    }

    /// One-line dump of the stream, marking `cursor` with `^`.
    pub fn debug_dump(&self, cursor: Option<NodeId>) -> String {
        let mut out = String::new();
        let mut cur = self.head;
        while let Some(id) = cur {
            let tok = self.nodes[id.0].token.borrow();
            let text = tok.text.replace(['\n', '\r'], " ");
            let mark = if Some(id) == cursor { "^" } else { "" };
            out.push_str(&format!("[{mark}{} #{} {text}]", tok.kind as i8, tok.line));
            cur = self.nodes[id.0].next;
        }
        out
    }
}

impl FromIterator<Token> for TokenStream {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        let mut stream = TokenStream::new();
        for tok in iter {
            stream.push_back(tok);
        }
        stream
    }
}

/// Iterator over the live tokens of a [`TokenStream`].
pub struct Iter<'a> {
    stream: &'a TokenStream,
    cur: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TokenRef;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.stream.next(id);
        Some(self.stream.token(id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
