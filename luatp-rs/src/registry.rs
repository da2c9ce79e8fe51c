//! Macro and marked-block registries.
//!
//! Both live for the whole run and are filled in by scripts.  Names are
//! unique: a second registration under an existing name is rejected and
//! leaves the registry untouched.
//!
//! The registries are generic over the callback handle type `C` so they do
//! not depend on a particular scripting runtime.

use std::collections::HashMap;

use crate::error::{escape_for_display, RegistryError};
use crate::token::WeakTokenRef;

// ── Macro definitions ─────────────────────────────────────────────────────────

/// Kind of a macro parameter.  Only raw text is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Raw,
}

/// A registered macro.
#[derive(Debug, Clone)]
pub struct MacroDef<C> {
    pub name: String,
    pub params: Vec<ParamKind>,
    /// `true` when the last parameter collects a comma-separated list.
    pub variadic: bool,
    pub callback: C,
}

impl<C> MacroDef<C> {
    /// Build a definition from a parameter spec such as `["raw", "raw*"]`.
    ///
    /// A trailing `*` marks the parameter variadic, which is only legal on
    /// the last parameter.
    pub fn parse(
        name: impl Into<String>,
        spec: &[String],
        callback: C,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let mut params = Vec::with_capacity(spec.len());
        let mut variadic = false;

        for (i, raw) in spec.iter().enumerate() {
            let index = i + 1;
            let is_last = index == spec.len();
            let (kind, star) = match raw.strip_suffix('*') {
                Some(k) => (k, true),
                None => (raw.as_str(), false),
            };
            if star && !is_last {
                return Err(RegistryError::VariadicNotLast { name, index });
            }
            match kind {
                "raw" => params.push(ParamKind::Raw),
                other => {
                    return Err(RegistryError::UnknownParamKind {
                        name,
                        index,
                        found: escape_for_display(other),
                    })
                }
            }
            variadic |= star;
        }

        Ok(Self { name, params, variadic, callback })
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Name → macro definition.
#[derive(Debug)]
pub struct MacroRegistry<C> {
    macros: HashMap<String, MacroDef<C>>,
}

impl<C> Default for MacroRegistry<C> {
    fn default() -> Self {
        Self { macros: HashMap::new() }
    }
}

impl<C> MacroRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a macro.  Fails if the name is taken.
    pub fn register(&mut self, def: MacroDef<C>) -> Result<(), RegistryError> {
        if self.macros.contains_key(&def.name) {
            return Err(RegistryError::DuplicateMacro(def.name));
        }
        self.macros.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef<C>> {
        self.macros.get(name)
    }
}

// ── Marked blocks ─────────────────────────────────────────────────────────────

/// Name → weak handle to an output token.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, WeakTokenRef>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, name: impl Into<String>, block: WeakTokenRef) -> Result<(), RegistryError> {
        let name = name.into();
        if self.blocks.contains_key(&name) {
            return Err(RegistryError::DuplicateBlock(name));
        }
        self.blocks.insert(name, block);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<WeakTokenRef, RegistryError> {
        self.blocks
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownBlock(name.to_owned()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
