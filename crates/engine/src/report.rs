//! Edit reports: what an edit pass did, in a loggable form.

use crate::addr::Addr;

/// A rejected formula: storing it would have made its cell reachable from
/// one of its own references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cell whose formula was rejected.
    pub addr: Addr,
    /// Referenced cell that leads back to `addr`.
    pub via: Addr,
}

impl CycleReport {
    pub fn self_reference(addr: Addr) -> Self {
        Self { addr, via: addr }
    }

    pub fn through(addr: Addr, via: Addr) -> Self {
        Self { addr, via }
    }

    pub fn is_self_reference(&self) -> bool {
        self.addr == self.via
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_self_reference() {
            write!(f, "{} references itself", self.addr)
        } else {
            write!(
                f,
                "formula in {} rejected: {} leads back to {}",
                self.addr, self.via, self.addr
            )
        }
    }
}

impl std::error::Error for CycleReport {}

/// Outcome counters for one edit pass (or several, for range copies).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditReport {
    /// Number of cell edits applied.
    pub edits_applied: usize,
    /// Total cells in the recalculation scopes of those edits.
    pub scope_size: usize,
    /// Formulas actually re-evaluated.
    pub cells_recomputed: usize,
    /// Cells whose value changed, in the order they changed.
    pub changed: Vec<Addr>,
    /// Formulas rejected for forming a cycle.
    pub cycles: Vec<CycleReport>,
}

impl EditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_change(&mut self, addr: Addr) {
        if !self.changed.contains(&addr) {
            self.changed.push(addr);
        }
    }

    /// Fold a later pass's counters into this report.
    pub(crate) fn merge(&mut self, other: EditReport) {
        self.edits_applied += other.edits_applied;
        self.scope_size += other.scope_size;
        self.cells_recomputed += other.cells_recomputed;
        for addr in other.changed {
            self.record_change(addr);
        }
        self.cycles.extend(other.cycles);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} edit(s), scope {}, {} recomputed, {} changed, {} rejected",
            self.edits_applied,
            self.scope_size,
            self.cells_recomputed,
            self.changed.len(),
            self.cycles.len()
        )
    }

    /// Single-line form for logs.
    pub fn log_line(&self) -> String {
        let changed: Vec<String> = self.changed.iter().map(|a| a.to_string()).collect();
        format!(
            "[edit] edits={} scope={} recomputed={} changed=[{}] cycles={}",
            self.edits_applied,
            self.scope_size,
            self.cells_recomputed,
            changed.join(","),
            self.cycles.len()
        )
    }
}
