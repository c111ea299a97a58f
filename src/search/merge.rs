// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Client-side union for backends without a native `UNION`.

use super::query::{Entity, Page};
use crate::hit::{HitRecord, SOURCE_TYPE_FIELD};

/// Tag each batch with its source, order by relevance (ties by source type,
/// then id, as the native `UNION ALL` orders them), then apply the page window.
pub fn merge_ranked<I>(batches: I, page: Page) -> Vec<HitRecord>
where
    I: IntoIterator<Item = (Entity, Vec<HitRecord>)>,
{
    let mut merged: Vec<HitRecord> = batches
        .into_iter()
        .flat_map(|(entity, hits)| {
            hits.into_iter()
                .map(move |hit| hit.with_field(SOURCE_TYPE_FIELD, entity.source_type()))
        })
        .collect();

    merged.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| a.source_type().cmp(&b.source_type()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
    merged.into_iter().skip(offset).take(limit).collect()
}
