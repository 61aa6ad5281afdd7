//! FILENAME: pivot-engine/src/fixed.rs
//! PURPOSE: Fixed-column pivot construction.
//! CONTEXT: Each row descends one tree level per dimension column via
//! add-or-get and lands in the leaf for its dimension values. Rows with no
//! usable timestamp are skipped entirely.

use log::{debug, trace};

use crate::definition::{ColumnSelector, TimeColumn};
use crate::error::PivotError;
use crate::source::{CellValue, ColumnIndex, RowSource, NULL_VALUE};
use crate::tree::PivotTree;

/// Groups the rows of `source` by `dimensions`, outermost level first.
///
/// Fails before reading any row when no dimension is given or a column
/// cannot be resolved.
pub fn build_fixed<S: RowSource + ?Sized>(
    source: &S,
    time_column: &TimeColumn,
    dimensions: &[ColumnSelector],
) -> Result<PivotTree, PivotError> {
    if dimensions.is_empty() {
        return Err(PivotError::NoDimensions);
    }

    let time_index = time_column.resolve(source)?;
    let levels = dimensions
        .iter()
        .map(|selector| {
            let index = selector.resolve(source)?;
            Ok((index, source.columns()[index].name.clone()))
        })
        .collect::<Result<Vec<(ColumnIndex, String)>, PivotError>>()?;

    let mut tree = PivotTree::new();
    for row in source.rows() {
        tree.stats_mut().rows_seen += 1;

        let Some(timestamp) = row.value(time_index).and_then(CellValue::as_timestamp) else {
            trace!("Row {} has no usable timestamp, skipping", row.id());
            tree.stats_mut().rows_skipped += 1;
            continue;
        };

        let mut node = tree.root();
        for (column, name) in &levels {
            let value = match row.value(*column) {
                Some(cell) => cell.to_dimension_string(),
                None => NULL_VALUE.to_string(),
            };
            node = tree.add_or_get_child(node, name.as_str(), value);
        }
        tree.add_row(node, row.id(), timestamp);
        tree.stats_mut().rows_added += 1;
    }

    let stats = tree.stats();
    debug!(
        "Fixed pivot over {} level(s): {} rows seen, {} added, {} skipped, {} nodes",
        levels.len(),
        stats.rows_seen,
        stats.rows_added,
        stats.rows_skipped,
        tree.len()
    );

    Ok(tree)
}
