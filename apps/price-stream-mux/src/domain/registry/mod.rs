//! Symbol Subscription Registry
//!
//! Tracks which callbacks are interested in which symbols and hands out the
//! listener sets that price updates are delivered to.
//!
//! # Design
//!
//! The registry is a plain `symbol -> set of callbacks` map. A symbol entry
//! exists if and only if at least one callback is registered for it, so the
//! transitions reported by [`SymbolRegistry::add`] and
//! [`SymbolRegistry::remove`] are exactly the points where a provider-level
//! subscribe or unsubscribe is due. Every other add/remove is bookkeeping
//! that never reaches the wire.
//!
//! The registry is authoritative across transport churn: it is never cleared
//! on disconnect, and the connection layer reconciles the provider's session
//! against [`SymbolRegistry::symbols`] at open time.
//!
//! # Callback identity
//!
//! Callbacks are deduplicated by `Arc` identity, not by closure shape.
//! Callers must retain the `Arc` they subscribed with in order to
//! unsubscribe it later; a freshly built `Arc` wrapping identical code is a
//! different callback and will not match.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

/// A normalized ticker symbol (uppercase, no surrounding whitespace).
pub type Symbol = String;

/// Callback invoked with `(price, symbol)` for every matching price update.
pub type PriceCallback = Arc<dyn Fn(Decimal, &str) + Send + Sync>;

/// Normalize a raw symbol to its canonical uppercase form.
///
/// Returns `None` when the symbol is empty after trimming; such symbols are
/// never registered.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<Symbol> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

/// Result of registering a callback for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// First callback for this symbol; a provider subscribe is due.
    FirstForSymbol(Symbol),
    /// Symbol already had listeners; no provider traffic needed.
    Added(Symbol),
    /// This exact callback was already registered for this symbol.
    AlreadyRegistered,
    /// Symbol was empty after normalization.
    InvalidSymbol,
}

/// Result of removing a callback for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Last callback for this symbol removed; a provider unsubscribe is due.
    LastForSymbol(Symbol),
    /// Other listeners remain; no provider traffic needed.
    Removed(Symbol),
    /// The callback was not registered for this symbol.
    NotRegistered,
    /// Symbol was empty after normalization.
    InvalidSymbol,
}

/// Mapping from normalized symbol to the set of callbacks watching it.
#[derive(Default)]
pub struct SymbolRegistry {
    entries: HashMap<Symbol, Vec<PriceCallback>>,
}

impl SymbolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `symbol`.
    ///
    /// Duplicate registrations of the same `Arc` are no-ops (set semantics),
    /// as are invalid symbols.
    pub fn add(&mut self, symbol: &str, callback: &PriceCallback) -> AddOutcome {
        let Some(symbol) = normalize_symbol(symbol) else {
            return AddOutcome::InvalidSymbol;
        };

        let entry = self.entries.entry(symbol.clone()).or_default();
        if entry.iter().any(|cb| Arc::ptr_eq(cb, callback)) {
            return AddOutcome::AlreadyRegistered;
        }

        let first = entry.is_empty();
        entry.push(Arc::clone(callback));

        if first {
            AddOutcome::FirstForSymbol(symbol)
        } else {
            AddOutcome::Added(symbol)
        }
    }

    /// Remove `callback` from `symbol`, deleting the entry when it empties.
    ///
    /// Unknown symbols and never-registered callbacks are no-ops; UI
    /// mount/unmount races are expected, not exceptional.
    pub fn remove(&mut self, symbol: &str, callback: &PriceCallback) -> RemoveOutcome {
        let Some(symbol) = normalize_symbol(symbol) else {
            return RemoveOutcome::InvalidSymbol;
        };

        let Some(entry) = self.entries.get_mut(&symbol) else {
            return RemoveOutcome::NotRegistered;
        };

        let before = entry.len();
        entry.retain(|cb| !Arc::ptr_eq(cb, callback));
        if entry.len() == before {
            return RemoveOutcome::NotRegistered;
        }

        if entry.is_empty() {
            self.entries.remove(&symbol);
            RemoveOutcome::LastForSymbol(symbol)
        } else {
            RemoveOutcome::Removed(symbol)
        }
    }

    /// Snapshot the listeners for `symbol`, with its normalized form.
    ///
    /// Returns cloned callback handles so delivery can happen without
    /// holding the registry borrow (callbacks may re-enter the registry
    /// owner). A symbol with no entry (e.g. a price already in flight when
    /// the last callback unsubscribed) yields `None` and is silently
    /// dropped by the caller.
    #[must_use]
    pub fn listeners(&self, symbol: &str) -> Option<(Symbol, Vec<PriceCallback>)> {
        let symbol = normalize_symbol(symbol)?;
        let entry = self.entries.get(&symbol)?;
        Some((symbol, entry.clone()))
    }

    /// All symbols with at least one registered callback.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.entries.keys().cloned().collect()
    }

    /// Whether `symbol` currently has any listeners.
    #[must_use]
    pub fn has_symbol(&self, symbol: &str) -> bool {
        normalize_symbol(symbol).is_some_and(|s| self.entries.contains_key(&s))
    }

    /// Number of distinct symbols with listeners.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of registered callbacks across all symbols.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether no symbols are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("symbols", &self.symbol_count())
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
