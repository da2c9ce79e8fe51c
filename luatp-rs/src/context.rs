//! Run-wide processing state.
//!
//! A [`Context`] is created once per run and shared between the driver, the
//! expander and the native functions exposed to scripts.  It outlives every
//! token stream, so it only ever holds weak references to tokens.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::registry::{BlockRegistry, MacroRegistry};
use crate::token::{TokenRef, WeakTokenRef};

/// Shared handle to the run's [`Context`].
pub type SharedContext<C> = Rc<RefCell<Context<C>>>;

/// Registries, the line-info generator and the active output slot.
#[derive(Debug)]
pub struct Context<C> {
    pub macros: MacroRegistry<C>,
    pub blocks: BlockRegistry,
    /// Produces the marker line emitted on each line/file transition.
    pub line_info: Option<C>,
    output: Option<WeakTokenRef>,
}

impl<C> Default for Context<C> {
    fn default() -> Self {
        Self {
            macros: MacroRegistry::new(),
            blocks: BlockRegistry::new(),
            line_info: None,
            output: None,
        }
    }
}

impl<C> Context<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedContext<C> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Make `slot` the current output slot, published to scripts as
    /// `currentBlock` when they start.
    pub fn bind_output(&mut self, slot: &TokenRef) {
        self.output = Some(Rc::downgrade(slot));
    }

    /// Handle of the currently bound output slot.
    pub fn current_output(&self) -> Option<WeakTokenRef> {
        self.output.clone()
    }
}

/// Append `text` to the token behind `block`.  Tokens of files that have
/// already been rendered are gone; writes to them are dropped.
pub fn append_to_block(block: &WeakTokenRef, text: &str) {
    match block.upgrade() {
        Some(tok) => tok.borrow_mut().text.push_str(text),
        None => warn!("write to a block whose file has already been rendered; text dropped"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
