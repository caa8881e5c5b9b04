// End-to-end edit flows against the public engine surface: incremental
// recomputation, cycle rejection, range functions, copy/fill translation,
// and snapshot isolation.

use gridcalc_engine::addr::{Addr, CellRef};
use gridcalc_engine::engine::{edit, CYCLE_SENTINEL};
use gridcalc_engine::error::EngineError;
use gridcalc_engine::fill::{copy_cell, copy_range_to_range};
use gridcalc_engine::grid::Grid;

fn addr(text: &str) -> Addr {
    CellRef::parse(text).unwrap().addr
}

fn apply(grid: &Grid, at: &str, text: &str) -> Grid {
    edit(grid, addr(at), text).grid
}

fn display(grid: &Grid, at: &str) -> String {
    grid.get(addr(at)).unwrap().display()
}

#[test]
fn incremental_recalculation_stays_in_scope() {
    let mut grid = Grid::new(5, 5);
    grid = apply(&grid, "A1", "1");
    grid = apply(&grid, "A2", "2");
    grid = apply(&grid, "A3", "=A1+A2");
    grid = apply(&grid, "E5", "=D5*2");
    assert_eq!(display(&grid, "A3"), "3");

    let outcome = edit(&grid, addr("A1"), "10");
    assert_eq!(display(&outcome.grid, "A3"), "12");

    // Only A1 and its observer chain were eligible; the unrelated E5
    // formula never re-evaluated.
    assert_eq!(outcome.report.scope_size, 2);
    assert!(!outcome.grid.get(addr("E5")).unwrap().recalculated());
    assert!(outcome.grid.check_edges().is_ok());
}

#[test]
fn second_edit_closing_a_cycle_is_rejected() {
    let mut grid = Grid::new(3, 3);
    grid = apply(&grid, "A1", "=A2");
    let outcome = edit(&grid, addr("A2"), "=A1");

    let a2 = outcome.grid.get(addr("A2")).unwrap();
    assert!(a2.invalid());
    assert_eq!(a2.display(), CYCLE_SENTINEL);
    assert_eq!(outcome.report.cycles.len(), 1);
    assert_eq!(
        outcome.report.cycles[0].to_string(),
        "formula in A2 rejected: A1 leads back to A2"
    );
}

#[test]
fn range_functions_over_a_block() {
    let mut grid = Grid::new(4, 4);
    for (at, v) in [("A1", "1"), ("A2", "2"), ("B1", "3"), ("B2", "4")] {
        grid = apply(&grid, at, v);
    }
    grid = apply(&grid, "C1", "=SUM(A1:B2)");
    grid = apply(&grid, "C2", "=ROWS(A1:B2)");
    grid = apply(&grid, "C3", "=COLS(A1:B2)");
    grid = apply(&grid, "C4", "=AVG(A1:B2)+MAX(A1:B2)");

    assert_eq!(display(&grid, "C1"), "10");
    assert_eq!(display(&grid, "C2"), "2");
    assert_eq!(display(&grid, "C3"), "2");
    assert_eq!(display(&grid, "C4"), "6.5");
    assert!(grid.check_edges().is_ok());
}

#[test]
fn copy_translates_relative_but_not_absolute_refs() {
    let mut grid = Grid::new(4, 5);
    grid = apply(&grid, "A1", "2");
    grid = apply(&grid, "B1", "3");
    grid = apply(&grid, "C1", "=A1+$B$1");

    let outcome = copy_cell(&grid, addr("C1"), addr("D2"));
    assert_eq!(outcome.grid.get(addr("D2")).unwrap().raw(), "=B2+$B$1");
    // The source is untouched.
    assert_eq!(outcome.grid.get(addr("C1")).unwrap().raw(), "=A1+$B$1");
}

#[test]
fn overlapping_copy_is_rejected_without_side_effects() {
    let mut grid = Grid::new(4, 2);
    grid = apply(&grid, "A1", "1");
    grid = apply(&grid, "A2", "2");

    let err = copy_range_to_range(&grid, "A1:A2", "A2:A3").unwrap_err();
    assert_eq!(
        err,
        EngineError::OverlappingRanges {
            src: (addr("A1"), addr("A2")),
            dst: (addr("A2"), addr("A3")),
        }
    );
    assert_eq!(display(&grid, "A1"), "1");
    assert_eq!(display(&grid, "A2"), "2");
    assert_eq!(grid.get(addr("A3")).unwrap().raw(), "");
}

#[test]
fn published_snapshot_survives_an_edit() {
    let mut published = Grid::new(3, 3);
    published = apply(&published, "A1", "1");
    published = apply(&published, "B1", "=A1*100");
    assert_eq!(display(&published, "B1"), "100");

    let outcome = edit(&published, addr("A1"), "2");
    assert_eq!(display(&published, "A1"), "1");
    assert_eq!(display(&published, "B1"), "100");
    assert_eq!(display(&outcome.grid, "B1"), "200");
    assert!(outcome.grid.revision() > published.revision());
}

#[test]
fn grid_serializes_with_edges_intact() {
    let mut grid = Grid::new(3, 3);
    grid = apply(&grid, "A1", "4");
    grid = apply(&grid, "B1", "=A1*2");

    let json = serde_json::to_string(&grid).unwrap();
    let restored: Grid = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.get(addr("B1")).unwrap().raw(), "=A1*2");
    assert_eq!(display(&restored, "B1"), "8");
    assert!(restored.check_edges().is_ok());

    // Edits keep working on the restored grid.
    let outcome = edit(&restored, addr("A1"), "5");
    assert_eq!(display(&outcome.grid, "B1"), "10");
}

#[test]
fn conditional_builtins_compose() {
    let mut grid = Grid::new(3, 3);
    grid = apply(&grid, "A1", "0");
    grid = apply(&grid, "B1", "=IFNULLORZERO(A1,99)");
    grid = apply(&grid, "C1", "=IF(B1>50,\"high\",\"low\")");
    assert_eq!(display(&grid, "B1"), "99");
    assert_eq!(display(&grid, "C1"), "high");

    grid = apply(&grid, "A1", "7");
    assert_eq!(display(&grid, "B1"), "7");
    assert_eq!(display(&grid, "C1"), "low");
}
