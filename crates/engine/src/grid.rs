//! Dense cell storage with copy-on-write snapshots.
//!
//! A `Grid` is one published state of the sheet. Editing never mutates a
//! published grid: the engine clones it first (`snapshot`), which is cheap
//! because cells sit behind `Arc` and only the cells an edit actually
//! touches get copied out (`Arc::make_mut`). Untouched cells stay shared
//! between the old and new snapshot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::addr::Addr;
use crate::cell::Cell;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// Row-major, always rectangular.
    cells: Vec<Vec<Arc<Cell>>>,
    /// Monotonic snapshot counter; lets the engine assert it is writing to
    /// a fresh snapshot rather than a published one.
    revision: u64,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        let blank = Arc::new(Cell::default());
        let cells = (0..rows)
            .map(|_| (0..cols).map(|_| Arc::clone(&blank)).collect())
            .collect();
        Self { cells, revision: 0 }
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, |row| row.len())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// A new working copy with a bumped revision and per-pass flags cleared.
    /// Clearing a flag copies that cell out; unflagged cells stay shared.
    pub fn snapshot(&self) -> Grid {
        let mut next = self.clone();
        next.revision = self.revision + 1;
        for row in &mut next.cells {
            for cell in row.iter_mut() {
                if cell.touched() || cell.recalculated() {
                    Arc::make_mut(cell).clear_flags();
                }
            }
        }
        next
    }

    /// Ensure `addr` is in bounds, backfilling whole rows and columns with
    /// blanks so the grid stays rectangular.
    pub fn grow_to(&mut self, addr: Addr) {
        let need_rows = addr.row + 1;
        let need_cols = (addr.col + 1).max(self.cols());
        let blank = Arc::new(Cell::default());

        for row in &mut self.cells {
            while row.len() < need_cols {
                row.push(Arc::clone(&blank));
            }
        }
        while self.cells.len() < need_rows {
            self.cells.push(vec![Arc::clone(&blank); need_cols]);
        }
    }

    /// The cell at `addr`, growing the grid if needed.
    pub fn resolve(&mut self, addr: Addr) -> &Cell {
        self.grow_to(addr);
        &self.cells[addr.row][addr.col]
    }

    /// Mutable access at `addr`, growing the grid if needed. Copies the
    /// cell out of any sharing with older snapshots.
    pub(crate) fn cell_mut(&mut self, addr: Addr) -> &mut Cell {
        self.grow_to(addr);
        Arc::make_mut(&mut self.cells[addr.row][addr.col])
    }

    /// In-bounds lookup without growth.
    pub fn get(&self, addr: Addr) -> Option<&Cell> {
        self.cells.get(addr.row)?.get(addr.col).map(Arc::as_ref)
    }

    /// Existence check with no creation side effect.
    pub fn exists(&self, addr: Addr) -> bool {
        self.get(addr).is_some()
    }

    /// Read and reset the UI hint flags at `addr`: (touched, recalculated).
    /// Hosts that keep a snapshot alive across reads use this instead of
    /// waiting for the next `snapshot` to clear them.
    pub fn take_flags(&mut self, addr: Addr) -> (bool, bool) {
        match self.get(addr) {
            Some(cell) if cell.touched() || cell.recalculated() => {
                let cell = self.cell_mut(addr);
                let flags = (cell.touched(), cell.recalculated());
                cell.clear_flags();
                flags
            }
            _ => (false, false),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Addr, &Cell)> {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, cell)| (Addr::new(r, c), cell.as_ref()))
        })
    }

    /// Check edge symmetry across the whole grid: every observed edge has a
    /// matching observer edge and vice versa. Returns the first broken edge.
    pub fn check_edges(&self) -> Result<(), (Addr, Addr)> {
        for (addr, cell) in self.iter() {
            for &dep in cell.observed() {
                let ok = self
                    .get(dep)
                    .is_some_and(|target| target.observers().contains(&addr));
                if !ok {
                    return Err((addr, dep));
                }
            }
            for &obs in cell.observers() {
                let ok = self
                    .get(obs)
                    .is_some_and(|source| source.observed().contains(&addr));
                if !ok {
                    return Err((addr, obs));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_dimensions() {
        let grid = Grid::new(4, 3);
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.revision(), 0);
        assert!(grid.get(Addr::new(3, 2)).is_some());
        assert!(grid.get(Addr::new(4, 0)).is_none());
    }

    #[test]
    fn test_grow_stays_rectangular() {
        let mut grid = Grid::new(2, 2);
        grid.grow_to(Addr::new(5, 4));
        assert_eq!(grid.rows(), 6);
        assert_eq!(grid.cols(), 5);
        for (_, cell) in grid.iter() {
            assert!(cell.is_blank());
        }
    }

    #[test]
    fn test_snapshot_bumps_revision_and_clears_flags() {
        let mut grid = Grid::new(2, 2);
        grid.cell_mut(Addr::new(0, 0)).set_raw("7");
        assert!(grid.get(Addr::new(0, 0)).unwrap().touched());

        let next = grid.snapshot();
        assert_eq!(next.revision(), grid.revision() + 1);
        assert!(!next.get(Addr::new(0, 0)).unwrap().touched());
        // The source grid keeps its flags.
        assert!(grid.get(Addr::new(0, 0)).unwrap().touched());
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut grid = Grid::new(2, 2);
        grid.cell_mut(Addr::new(0, 0)).set_raw("1");

        let mut next = grid.snapshot();
        next.cell_mut(Addr::new(0, 0)).set_raw("2");
        next.cell_mut(Addr::new(1, 1)).set_raw("9");

        assert_eq!(grid.get(Addr::new(0, 0)).unwrap().raw(), "1");
        assert_eq!(grid.get(Addr::new(1, 1)).unwrap().raw(), "");
        assert_eq!(next.get(Addr::new(0, 0)).unwrap().raw(), "2");
    }

    #[test]
    fn test_untouched_cells_stay_shared() {
        let mut grid = Grid::new(3, 3);
        grid.cell_mut(Addr::new(0, 0)).set_raw("1");
        let next = grid.snapshot();

        let a = grid.get(Addr::new(2, 2)).unwrap() as *const Cell;
        let b = next.get(Addr::new(2, 2)).unwrap() as *const Cell;
        assert_eq!(a, b);
    }

    #[test]
    fn test_exists_and_take_flags() {
        let mut grid = Grid::new(2, 2);
        assert!(grid.exists(Addr::new(1, 1)));
        assert!(!grid.exists(Addr::new(2, 0)));

        grid.cell_mut(Addr::new(0, 0)).mark_recalculated();
        assert_eq!(grid.take_flags(Addr::new(0, 0)), (true, true));
        assert_eq!(grid.take_flags(Addr::new(0, 0)), (false, false));
        assert_eq!(grid.take_flags(Addr::new(9, 9)), (false, false));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut grid = Grid::new(2, 2);
        grid.cell_mut(Addr::new(0, 1)).set_raw("=A1*2");
        let json = serde_json::to_string(&grid).unwrap();
        let back: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rows(), 2);
        assert_eq!(back.get(Addr::new(0, 1)).unwrap().raw(), "=A1*2");
        assert_eq!(back.revision(), grid.revision());
    }
}
