//! Copy/fill: reference-translating cell copy and range tiling.

use crate::addr::{self, Addr};
use crate::engine::{self, EditOutcome};
use crate::error::EngineError;
use crate::formula::analyze;
use crate::grid::Grid;
use crate::report::EditReport;

/// Translate a raw value for a copy shifted by the given deltas. Formula
/// references shift by the deltas except for `$`-absolute components;
/// a reference pushed off the grid collapses the copy to `#REF!`.
/// Non-formula values pass through verbatim.
pub fn translate_formula(raw: &str, row_delta: i64, col_delta: i64) -> String {
    if !analyze::is_formula(raw) {
        return raw.to_string();
    }

    let mut out_of_bounds = false;
    let body = analyze::map_refs(analyze::expression_body(raw), |cell| {
        match cell.shift(row_delta, col_delta) {
            Some(shifted) => shifted.to_string(),
            None => {
                out_of_bounds = true;
                String::new()
            }
        }
    });

    if out_of_bounds {
        "#REF!".to_string()
    } else {
        format!("={}", body)
    }
}

/// Copy one cell to another address, translating formula references by the
/// address delta. Runs as a normal edit on a fresh snapshot.
pub fn copy_cell(published: &Grid, from: Addr, to: Addr) -> EditOutcome {
    let raw = published
        .get(from)
        .map(|cell| cell.raw().to_string())
        .unwrap_or_default();
    let (row_delta, col_delta) = from.delta(to);
    engine::edit(published, to, &translate_formula(&raw, row_delta, col_delta))
}

/// Tile the source rectangle across the destination rectangle, row-major,
/// skipping any tile that would not fully fit. Source and destination must
/// not share an address; on overlap nothing is copied.
pub fn copy_range_to_range(
    published: &Grid,
    src_range: &str,
    dst_range: &str,
) -> Result<EditOutcome, EngineError> {
    let src = parse_rect(src_range)?;
    let dst = parse_rect(dst_range)?;

    if rects_overlap(src, dst) {
        return Err(EngineError::OverlappingRanges { src, dst });
    }

    let height = src.1.row - src.0.row + 1;
    let width = src.1.col - src.0.col + 1;

    let mut grid = published.snapshot();
    debug_assert_ne!(grid.revision(), published.revision());
    let mut report = EditReport::new();

    let mut tile_row = dst.0.row;
    while tile_row + height - 1 <= dst.1.row {
        let mut tile_col = dst.0.col;
        while tile_col + width - 1 <= dst.1.col {
            let row_delta = tile_row as i64 - src.0.row as i64;
            let col_delta = tile_col as i64 - src.0.col as i64;

            let mut tile_report = EditReport::new();
            for row in addr::expand_range(src.0, src.1) {
                for from in row {
                    let raw = grid
                        .get(from)
                        .map(|cell| cell.raw().to_string())
                        .unwrap_or_default();
                    let to = Addr::new(
                        (from.row as i64 + row_delta) as usize,
                        (from.col as i64 + col_delta) as usize,
                    );
                    let text = translate_formula(&raw, row_delta, col_delta);
                    engine::edit_in(&mut grid, to, &text, &mut tile_report);
                }
            }
            report.merge(tile_report);

            tile_col += width;
        }
        tile_row += height;
    }

    Ok(EditOutcome { grid, report })
}

/// Parse a range into normalized rectangle corners (top-left, bottom-right).
fn parse_rect(range: &str) -> Result<(Addr, Addr), EngineError> {
    let (a, b) = addr::parse_range(range)?;
    let (a, b) = (a.addr, b.addr);
    Ok((
        Addr::new(a.row.min(b.row), a.col.min(b.col)),
        Addr::new(a.row.max(b.row), a.col.max(b.col)),
    ))
}

fn rects_overlap(a: (Addr, Addr), b: (Addr, Addr)) -> bool {
    a.0.row <= b.1.row && b.0.row <= a.1.row && a.0.col <= b.1.col && b.0.col <= a.1.col
}
