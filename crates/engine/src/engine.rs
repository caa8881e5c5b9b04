//! The edit pass: scope computation, cycle detection, edge resync, and
//! scoped incremental re-evaluation.
//!
//! An edit never mutates the published grid. `edit` takes the published
//! snapshot by shared reference, works on a private copy, and returns the
//! copy with a report of what happened. The caller publishes the new
//! snapshot when it sees fit.
//!
//! Rejected-formula policy: a formula that would close a dependency cycle
//! still stores its raw text and resyncs edges (the cyclic edge stays
//! recorded in the graph), the cell is marked invalid, and its value
//! becomes the `#CYCLE!` sentinel without evaluating the formula.
//! Termination is guaranteed regardless: every evaluation pass carries a
//! visited set, so recorded cyclic edges can never cause unbounded
//! recursion.

use rustc_hash::FxHashSet;

use crate::addr::Addr;
use crate::formula::analyze;
use crate::formula::eval::{self, Value};
use crate::grid::Grid;
use crate::report::{CycleReport, EditReport};

/// Displayed by a cell whose formula was rejected as cyclic.
pub const CYCLE_SENTINEL: &str = "#CYCLE!";

/// A finished edit: the new grid snapshot plus its report.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub grid: Grid,
    pub report: EditReport,
}

/// Apply one raw-text edit against the published snapshot. The published
/// grid is left untouched; the returned snapshot carries the result.
pub fn edit(published: &Grid, addr: Addr, new_text: &str) -> EditOutcome {
    let mut grid = published.snapshot();
    debug_assert_ne!(grid.revision(), published.revision());
    let mut report = EditReport::new();
    edit_in(&mut grid, addr, new_text, &mut report);
    EditOutcome { grid, report }
}

/// The edit state machine, run against a working snapshot. Range copies
/// funnel several edits through this on a single snapshot.
pub(crate) fn edit_in(grid: &mut Grid, addr: Addr, new_text: &str, report: &mut EditReport) {
    if grid.resolve(addr).raw() == new_text {
        return;
    }

    report.edits_applied += 1;

    // Scope and cycle check both read the pre-edit edges.
    let scope = observers_closure(grid, addr);
    report.scope_size += scope.len();

    let refs: Vec<Addr> = if analyze::is_formula(new_text) {
        analyze::referenced_addrs(analyze::expression_body(new_text))
    } else {
        Vec::new()
    };

    if analyze::is_formula(new_text) {
        if let Some(cycle) = detect_cycle(grid, addr, &refs) {
            apply_rejected(grid, addr, new_text, &refs, cycle, &scope, report);
            return;
        }
    }

    grid.cell_mut(addr).set_raw(new_text);
    let removed_invalid = resync_edges(grid, addr, &refs);

    // A cell that lost an observer may be displaying an error that no
    // longer applies; re-evaluate it without forward propagation.
    for target in removed_invalid {
        let target_scope = FxHashSet::from_iter([target]);
        let mut visited = FxHashSet::default();
        evaluate(grid, target, &target_scope, &mut visited, false, report);
    }

    let mut visited = FxHashSet::default();
    evaluate(grid, addr, &scope, &mut visited, true, report);
}

/// Re-evaluate `addr` and, when its value changes and `propagate` is set,
/// its observers inside `scope`. `visited` bounds the pass.
fn evaluate(
    grid: &mut Grid,
    addr: Addr,
    scope: &FxHashSet<Addr>,
    visited: &mut FxHashSet<Addr>,
    propagate: bool,
    report: &mut EditReport,
) {
    report.cells_recomputed += 1;
    // Mark visited before any recursion: with the rejected-formula policy
    // a cyclic observed edge can be recorded in the graph, and a dependency
    // walk re-entering this cell must see it as done.
    visited.insert(addr);
    let raw = grid.resolve(addr).raw().to_string();
    let previous = grid.resolve(addr).calculated().clone();

    let mut invalid = false;
    let new_value = if analyze::is_formula(&raw) {
        let body = analyze::strip_absolute_markers(analyze::expression_body(&raw));
        let expanded = analyze::expand_ranges(&body);

        // Bring stale in-scope dependencies up to date first, in address
        // order so passes are deterministic. Their own observer propagation
        // is deferred to this outer pass.
        let mut deps: Vec<Addr> = grid.resolve(addr).observed().iter().copied().collect();
        deps.sort();
        for dep in deps {
            if scope.contains(&dep) && !visited.contains(&dep) {
                evaluate(grid, dep, scope, visited, false, report);
            }
        }

        let substituted = analyze::substitute_refs(&expanded, |dep| {
            grid.get(dep)
                .map(|cell| cell.calculated().substitution_text())
                .unwrap_or_else(|| "0".to_string())
        });

        match eval::evaluate_expression(&substituted) {
            Ok(value) => value,
            Err(_) => {
                // Fall back to showing the formula text itself.
                invalid = true;
                Value::Text(raw.clone())
            }
        }
    } else {
        Value::from_input(&raw)
    };

    if grid.resolve(addr).invalid() != invalid {
        grid.cell_mut(addr).set_invalid(invalid);
    }

    if new_value != previous {
        let cell = grid.cell_mut(addr);
        cell.set_calculated(new_value);
        cell.mark_recalculated();
        report.record_change(addr);

        if propagate {
            let mut observers: Vec<Addr> =
                grid.resolve(addr).observers().iter().copied().collect();
            observers.sort();
            for observer in observers {
                if scope.contains(&observer) && !visited.contains(&observer) {
                    evaluate(grid, observer, scope, visited, true, report);
                }
            }
        }
    }
}

/// The edited address plus every cell reachable from it over observer
/// edges. Only these cells may be recomputed during the pass.
pub(crate) fn observers_closure(grid: &Grid, addr: Addr) -> FxHashSet<Addr> {
    let mut scope = FxHashSet::default();
    scope.insert(addr);
    let mut stack = vec![addr];

    while let Some(current) = stack.pop() {
        if let Some(cell) = grid.get(current) {
            for &observer in cell.observers() {
                if scope.insert(observer) {
                    stack.push(observer);
                }
            }
        }
    }

    scope
}

/// Would storing a formula with references `refs` at `edited` close a
/// loop? True when `edited` is reachable from any reference over the
/// current observed edges (or is itself referenced).
fn detect_cycle(grid: &Grid, edited: Addr, refs: &[Addr]) -> Option<CycleReport> {
    if refs.contains(&edited) {
        return Some(CycleReport::self_reference(edited));
    }

    for &start in refs {
        let mut visited = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == edited {
                return Some(CycleReport::through(edited, start));
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(cell) = grid.get(current) {
                stack.extend(cell.observed().iter().copied());
            }
        }
    }

    None
}

/// Diff the cell's observed set against `refs`, applying both sides of
/// every edge add/remove together. Returns the removed targets that are
/// currently invalid.
fn resync_edges(grid: &mut Grid, addr: Addr, refs: &[Addr]) -> Vec<Addr> {
    let mut current: Vec<Addr> = grid.resolve(addr).observed().iter().copied().collect();
    current.sort();
    let wanted: FxHashSet<Addr> = refs.iter().copied().collect();

    let mut removed_invalid = Vec::new();
    for dep in current {
        if !wanted.contains(&dep) {
            grid.cell_mut(addr).remove_observed(dep);
            grid.cell_mut(dep).remove_observer(addr);
            if grid.resolve(dep).invalid() {
                removed_invalid.push(dep);
            }
        }
    }

    for &dep in refs {
        if !grid.resolve(addr).observed().contains(&dep) {
            grid.cell_mut(addr).insert_observed(dep);
            grid.cell_mut(dep).insert_observer(addr);
        }
    }

    removed_invalid
}

/// Rejected-formula path: store the text and edges, mark invalid, set the
/// sentinel, and let in-scope observers see the new value. The formula
/// itself is never evaluated.
fn apply_rejected(
    grid: &mut Grid,
    addr: Addr,
    new_text: &str,
    refs: &[Addr],
    cycle: CycleReport,
    scope: &FxHashSet<Addr>,
    report: &mut EditReport,
) {
    grid.cell_mut(addr).set_raw(new_text);
    resync_edges(grid, addr, refs);

    let previous = grid.resolve(addr).calculated().clone();
    let sentinel = Value::Error(CYCLE_SENTINEL.to_string());
    {
        let cell = grid.cell_mut(addr);
        cell.set_invalid(true);
        cell.set_calculated(sentinel.clone());
    }
    report.cycles.push(cycle);

    if sentinel != previous {
        grid.cell_mut(addr).mark_recalculated();
        report.record_change(addr);

        let mut visited = FxHashSet::from_iter([addr]);
        let mut observers: Vec<Addr> = grid.resolve(addr).observers().iter().copied().collect();
        observers.sort();
        for observer in observers {
            if scope.contains(&observer) && !visited.contains(&observer) {
                evaluate(grid, observer, scope, &mut visited, true, report);
            }
        }
    }
}
