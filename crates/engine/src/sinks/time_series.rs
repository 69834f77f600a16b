//! Time-series sink: only points the store has never seen are written.
//!
//! The store is append-only from here. A transaction whose total changes
//! between runs leaves its old point in place and adds a new one.
use std::collections::HashSet;

use crate::{
    Point, ResultEngine, Transaction,
    points::{missing_points, point_set},
};

/// Minimal surface of a point store.
pub trait PointStore {
    /// Every point the store currently retains.
    fn existing_points(&self) -> impl Future<Output = ResultEngine<HashSet<Point>>> + Send;

    fn write_point(&self, point: &Point) -> impl Future<Output = ResultEngine<()>> + Send;
}

/// Writes the points of `transactions` missing from `store`, one call per
/// point, and returns how many were written.
///
/// A failure midway leaves the already written points in the store.
pub async fn publish_points<S: PointStore>(
    store: &S,
    transactions: &[Transaction],
) -> ResultEngine<usize> {
    let actual = point_set(transactions);
    let existing = store.existing_points().await?;
    let missing = missing_points(&actual, &existing);
    tracing::info!(
        "{} points extracted, {} already stored, {} to write",
        actual.len(),
        existing.len(),
        missing.len()
    );

    for point in &missing {
        tracing::debug!("writing {} point of {} from {}", point.field, point.account, point.time);
        store.write_point(point).await?;
    }

    Ok(missing.len())
}
