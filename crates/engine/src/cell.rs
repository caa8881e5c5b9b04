//! A single cell: raw input, computed value, dependency edges, and the
//! per-pass bookkeeping flags.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::addr::Addr;
use crate::formula::eval::Value;

/// Cell state. Edge sets are kept symmetric by the engine: `a` appears in
/// `b.observers` exactly when `b` appears in `a.observed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Exact text the user entered, formulas included.
    raw: String,
    /// Last computed value.
    calculated: Value,
    /// Addresses this cell's formula reads.
    observed: FxHashSet<Addr>,
    /// Addresses whose formulas read this cell.
    observers: FxHashSet<Addr>,
    /// Formula failed to parse or evaluate (or was rejected as a cycle).
    invalid: bool,
    /// Structurally modified during the current edit pass.
    touched: bool,
    /// Value changed during the current edit pass.
    recalculated: bool,
}

impl Cell {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn calculated(&self) -> &Value {
        &self.calculated
    }

    /// What the cell shows: the computed value's rendering.
    pub fn display(&self) -> String {
        self.calculated.display()
    }

    pub fn invalid(&self) -> bool {
        self.invalid
    }

    pub fn touched(&self) -> bool {
        self.touched
    }

    pub fn recalculated(&self) -> bool {
        self.recalculated
    }

    pub fn observed(&self) -> &FxHashSet<Addr> {
        &self.observed
    }

    pub fn observers(&self) -> &FxHashSet<Addr> {
        &self.observers
    }

    /// True for cells that hold nothing and participate in no edges; such
    /// cells are storage filler and never serialize meaningful state.
    pub fn is_blank(&self) -> bool {
        self.raw.is_empty() && self.observed.is_empty() && self.observers.is_empty()
    }

    pub(crate) fn set_raw(&mut self, raw: &str) {
        self.raw = raw.to_string();
        self.touched = true;
    }

    pub(crate) fn set_calculated(&mut self, value: Value) {
        self.calculated = value;
    }

    pub(crate) fn set_invalid(&mut self, invalid: bool) {
        self.invalid = invalid;
    }

    pub(crate) fn mark_recalculated(&mut self) {
        self.recalculated = true;
        self.touched = true;
    }

    /// Reset per-pass flags. Runs on every cell carried into a new snapshot.
    pub(crate) fn clear_flags(&mut self) {
        self.touched = false;
        self.recalculated = false;
    }

    // Edge mutators mark the cell touched: an edge change is a structural
    // modification even when the value stays put.

    pub(crate) fn insert_observed(&mut self, addr: Addr) {
        if self.observed.insert(addr) {
            self.touched = true;
        }
    }

    pub(crate) fn remove_observed(&mut self, addr: Addr) {
        if self.observed.remove(&addr) {
            self.touched = true;
        }
    }

    pub(crate) fn insert_observer(&mut self, addr: Addr) {
        if self.observers.insert(addr) {
            self.touched = true;
        }
    }

    pub(crate) fn remove_observer(&mut self, addr: Addr) {
        if self.observers.remove(&addr) {
            self.touched = true;
        }
    }
}
