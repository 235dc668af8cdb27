//! Time-bucketed aggregation over readings.
//!
//! Each `(bucket, group key)` pair is one row for pagination purposes. The
//! count query wraps the same grouped SELECT (same WHERE clause, same
//! GROUP BY) so `total` is the number of buckets the data query can return.

use sqlx::PgConnection;
use tokio::time::Instant;
use tracing::debug;

use super::{
    engine::within,
    envelope::Paginated,
    filter::{ReadingFilter, SqlArg},
    params::{AggregateFunc, AggregateSpec, BucketWidth, GroupBy, Order, PageRequest},
    raw::FROM_READINGS,
};
use crate::{
    db::models::AggregatedBucket,
    error::{Error, Result},
};

/// Origin for fixed-width buckets. A Monday, so `1w` buckets start on
/// Mondays and `1d` buckets at midnight UTC.
const BUCKET_ORIGIN: &str = "TIMESTAMPTZ '2000-01-03 00:00:00+00'";

pub(crate) fn bucket_expr(width: BucketWidth) -> String {
    match width.fixed_interval() {
        Some(interval) => {
            format!("date_bin(INTERVAL '{interval}', r.recorded_at, {BUCKET_ORIGIN})")
        }
        None => "date_trunc('month', r.recorded_at, 'UTC')".to_owned(),
    }
}

pub(crate) fn func_expr(func: AggregateFunc) -> &'static str {
    match func {
        AggregateFunc::Avg => "AVG(r.value)",
        AggregateFunc::Min => "MIN(r.value)",
        AggregateFunc::Max => "MAX(r.value)",
        AggregateFunc::Sum => "SUM(r.value)",
        AggregateFunc::Count => "COUNT(*)::float8",
        AggregateFunc::First => "(ARRAY_AGG(r.value ORDER BY r.recorded_at ASC, r.id ASC))[1]",
        AggregateFunc::Last => "(ARRAY_AGG(r.value ORDER BY r.recorded_at DESC, r.id DESC))[1]",
    }
}

/// The GROUP BY key and the identity columns projected for it.
///
/// Grouping by `s.id` lets Postgres accept the sensor's type and location in
/// the projection (functionally dependent on the primary key). The other
/// dimensions project only their own key; a bucket can span many sensors.
pub(crate) fn group_columns(group_by: GroupBy) -> (&'static str, &'static str) {
    match group_by {
        GroupBy::Sensor => (
            "s.id",
            "s.id AS sensor_id, s.sensor_type AS sensor_type, s.location AS location",
        ),
        GroupBy::SensorType => (
            "s.sensor_type",
            "NULL::uuid AS sensor_id, s.sensor_type AS sensor_type, NULL::text AS location",
        ),
        GroupBy::Location => (
            "s.location",
            "NULL::uuid AS sensor_id, NULL::text AS sensor_type, s.location AS location",
        ),
    }
}

pub async fn aggregate(
    conn: &mut PgConnection,
    filter: &ReadingFilter,
    spec: AggregateSpec,
    order: Order,
    page: PageRequest,
    deadline: Instant,
) -> Result<Paginated<AggregatedBucket>> {
    const OPERATION: &str = "aggregate readings";

    let clause = filter.where_clause();
    let bucket = bucket_expr(spec.width);
    let (group_key, identity) = group_columns(spec.group_by);

    let count_sql = format!(
        "SELECT COUNT(*) FROM ( \
             SELECT 1 {FROM_READINGS} {} GROUP BY {bucket}, {group_key} \
         ) buckets",
        clause.sql(),
    );
    let count_args = clause.arguments(&[]).map_err(Error::data_access(OPERATION))?;
    let total: i64 = within(
        deadline,
        OPERATION,
        sqlx::query_scalar_with::<_, i64, _>(&count_sql, count_args).fetch_one(&mut *conn),
    )
    .await?;

    if page.offset() >= total {
        debug!(total, page = page.page, "page past last bucket; skipping fetch");
        return Ok(Paginated::new(Vec::new(), total, page, true));
    }

    let n = clause.next_placeholder();
    let dir = order.as_sql();
    let sql = format!(
        "SELECT {bucket} AS bucket, {identity}, \
                ({})::float8 AS value, \
                COUNT(*) AS count, \
                MIN(r.value) AS min, \
                MAX(r.value) AS max \
         {FROM_READINGS} {} \
         GROUP BY {bucket}, {group_key} \
         ORDER BY 1 {dir}, {group_key} \
         LIMIT ${n} OFFSET ${}",
        func_expr(spec.func),
        clause.sql(),
        n + 1,
    );
    let args = clause
        .arguments(&[SqlArg::BigInt(page.limit), SqlArg::BigInt(page.offset())])
        .map_err(Error::data_access(OPERATION))?;
    let rows = within(
        deadline,
        OPERATION,
        sqlx::query_as_with::<_, AggregatedBucket, _>(&sql, args).fetch_all(&mut *conn),
    )
    .await?;

    debug!(
        total,
        returned = rows.len(),
        width = ?spec.width,
        func = ?spec.func,
        group_by = ?spec.group_by,
        "aggregated readings"
    );
    Ok(Paginated::new(rows, total, page, true))
}
