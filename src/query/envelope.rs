use serde::Serialize;
use utoipa::ToSchema;

use super::params::PageRequest;
use crate::db::models::{AggregatedBucket, ReadingRecord};

/// Uniform response wrapper shared by raw and aggregated results.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    /// Size of the full filtered set (rows, sensors or buckets).
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    /// `max(1, ceil(total / limit))`.
    pub total_pages: i64,
    pub has_more: bool,
    pub is_aggregated: bool,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: PageRequest, is_aggregated: bool) -> Self {
        let total = total.max(0);
        let total_pages = ((total + page.limit - 1) / page.limit).max(1);
        Self {
            data,
            total,
            page: page.page,
            limit: page.limit,
            total_pages,
            has_more: page.page < total_pages,
            is_aggregated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ReadingsResponse {
    Raw(Paginated<ReadingRecord>),
    Aggregated(Paginated<AggregatedBucket>),
}

impl ReadingsResponse {
    pub fn total(&self) -> i64 {
        match self {
            ReadingsResponse::Raw(p) => p.total,
            ReadingsResponse::Aggregated(p) => p.total,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReadingsResponse::Raw(p) => p.data.len(),
            ReadingsResponse::Aggregated(p) => p.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
