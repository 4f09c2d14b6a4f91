//! Composite-key join between an extrema subset and its parent table.

use std::collections::{HashMap, HashSet};

use crate::model::{CugnError, GridTable, Result};

/// Multiplier separating the depth level from the profile id in a key.
pub const KEY_STRIDE: i64 = 100_000;

/// `depth * 100000 + profile`. Profiles outside `[0, 100000)` would collide
/// with a neighbouring depth level and are refused.
pub fn composite_key(depth: usize, profile: i64) -> Result<i64> {
    if !(0..KEY_STRIDE).contains(&profile) {
        return Err(CugnError::JoinIntegrity(format!(
            "profile id {} does not fit a depth*{}+profile key",
            profile, KEY_STRIDE
        )));
    }
    i64::try_from(depth)
        .ok()
        .and_then(|d| d.checked_mul(KEY_STRIDE))
        .and_then(|k| k.checked_add(profile))
        .ok_or_else(|| CugnError::JoinIntegrity(format!("depth level {} too large", depth)))
}

/// Composite key of every row of `table`.
pub fn table_keys(table: &GridTable) -> Result<Vec<i64>> {
    table
        .depth
        .iter()
        .zip(&table.profile)
        .map(|(&d, &p)| composite_key(d, p))
        .collect()
}

/// Position in `full` of each key in `subset`.
///
/// Every subset key must occur exactly once in `full`, and no two subset
/// keys may resolve to the same row. Anything else is a `JoinIntegrity`
/// error; nothing is dropped or duplicated silently.
pub fn match_ids(subset: &[i64], full: &[i64]) -> Result<Vec<usize>> {
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(full.len());
    for (i, &k) in full.iter().enumerate() {
        if index.insert(k, i).is_some() {
            return Err(CugnError::JoinIntegrity(format!(
                "key {} appears more than once in the full table",
                k
            )));
        }
    }

    let mut seen = HashSet::with_capacity(subset.len());
    subset
        .iter()
        .map(|k| {
            let &i = index.get(k).ok_or_else(|| {
                CugnError::JoinIntegrity(format!("key {} not found in the full table", k))
            })?;
            if !seen.insert(i) {
                return Err(CugnError::JoinIntegrity(format!(
                    "key {} matched more than once",
                    k
                )));
            }
            Ok(i)
        })
        .collect()
}
