//! Generic get-or-create, diff-and-save and duplicate repair over any
//! [`Persistable`] entity.

use rusqlite::types::Value;

use super::{Catalog, Filter, Persistable};
use crate::error::Result;

/// Column/value pairs, used both as lookup keys and as proposed values.
pub type Values<'a> = [(&'a str, Value)];

fn to_filter(pairs: &Values<'_>) -> Filter {
    pairs
        .iter()
        .fold(Filter::all(), |filter, (column, value)| {
            filter.eq(column, value.clone())
        })
}

/// Looks an entity up by equality on `lookup`. A miss creates and persists a new
/// entity carrying the lookup values and `defaults`.
///
/// Returns `(true, entity)` when the entity was created.
pub fn get_or_create<T, C>(catalog: &C, lookup: &Values<'_>, defaults: &Values<'_>) -> Result<(bool, T)>
where
    T: Persistable,
    C: Catalog,
{
    if let Some(existing) = catalog.find::<T>(&to_filter(lookup))? {
        return Ok((false, existing));
    }

    let mut entity = T::blank();
    for (column, value) in lookup.iter().chain(defaults) {
        entity.set_value(column, value.clone())?;
    }
    catalog.create(&entity)?;
    Ok((true, entity))
}

/// Applies `proposed` to `entity` when any value differs.
///
/// With `autosave` the entity is persisted here and the returned flag is `false`:
/// nothing is left for the caller to save. Without it the flag is `true` on change
/// and the caller is expected to batch the save.
pub fn diff_and_apply<T, C>(
    catalog: &C,
    mut entity: T,
    proposed: &Values<'_>,
    autosave: bool,
) -> Result<(bool, T)>
where
    T: Persistable,
    C: Catalog,
{
    let mut changed = proposed
        .iter()
        .any(|(column, value)| entity.value(column).as_ref() != Some(value));

    if changed {
        for (column, value) in proposed {
            entity.set_value(column, value.clone())?;
        }
        if autosave {
            catalog.update(&entity)?;
            changed = false;
        }
    }

    Ok((changed, entity))
}

/// Keeps one row per distinct `distinct_on` combination inside `scope` and deletes
/// the rest. Returns the number of rows deleted.
pub fn deduplicate<T, C>(catalog: &C, scope: &Filter, distinct_on: &[&str]) -> Result<usize>
where
    T: Persistable,
    C: Catalog,
{
    let mut removed = 0;
    for combination in catalog.distinct::<T>(scope, distinct_on)? {
        let group = distinct_on
            .iter()
            .zip(combination)
            .fold(scope.clone(), |filter, (column, value)| filter.eq(column, value));

        let Some(survivor) = catalog.find::<T>(&group)? else {
            continue;
        };
        removed += catalog.delete::<T>(&group.exclude(T::COLUMNS[0], survivor.id()))?;
    }

    if removed > 0 {
        tracing::info!("Removed {} duplicate {} rows", removed, T::TABLE);
    }
    Ok(removed)
}
