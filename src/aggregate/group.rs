//! Grouping core
//!
//! Builds composite group keys from dimension columns and folds measure
//! columns through their aggregation functions. NULL is a distinct group
//! value, not an excluded row; output order is deterministic (group key
//! ascending, NULL placement per request).

use std::cmp::Ordering;

use crate::resolver::ResolvedMeasure;
use crate::table::{FlatTable, NullOrder, Value};

/// Compare two composite group keys element-wise
pub(crate) fn compare_keys(a: &[Value], b: &[Value], nulls: NullOrder) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.cmp_grouping(y, nulls);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Group rows by the values of the given columns
///
/// Returns `(key, row indices)` pairs sorted ascending by key. With no
/// key columns every row lands in one group, so `group_by = []` is the
/// grand total.
pub(crate) fn group_rows(
    table: &FlatTable,
    key_columns: &[usize],
    nulls: NullOrder,
) -> Vec<(Vec<Value>, Vec<usize>)> {
    if key_columns.is_empty() {
        return vec![(Vec::new(), (0..table.rows.len()).collect())];
    }

    let mut keyed: Vec<(Vec<Value>, usize)> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let key: Vec<Value> = key_columns.iter().map(|&c| row[c].clone()).collect();
            (key, i)
        })
        .collect();

    // Stable sort keeps original row order within equal keys
    keyed.sort_by(|a, b| compare_keys(&a.0, &b.0, nulls));

    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    for (key, index) in keyed {
        match groups.last_mut() {
            Some((last_key, indices)) if *last_key == key => indices.push(index),
            _ => groups.push((key, vec![index])),
        }
    }
    groups
}

/// Fold a group's rows through each measure's aggregation function
pub(crate) fn aggregate_measures(
    table: &FlatTable,
    row_indices: &[usize],
    measures: &[ResolvedMeasure],
) -> Vec<Value> {
    measures
        .iter()
        .map(|measure| {
            let values: Vec<&Value> = row_indices
                .iter()
                .map(|&i| &table.rows[i][measure.column])
                .collect();
            measure.agg.apply(&values)
        })
        .collect()
}
