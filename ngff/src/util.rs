use itertools::Itertools;
use std::hash::Hash;

/// Values occurring more than once, in first-seen order.
pub(crate) fn duplicates<T>(values: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Clone + Eq + Hash,
{
    let values: Vec<T> = values.into_iter().collect();
    let counts = values.iter().counts();
    values
        .iter()
        .unique()
        .filter(|v| counts[v] > 1)
        .cloned()
        .collect()
}
