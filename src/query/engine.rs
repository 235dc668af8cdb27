use std::{future::Future, time::Duration};

use sqlx::PgPool;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::{
    aggregate::aggregate,
    envelope::ReadingsResponse,
    params::{QueryMode, ReadingRequest},
    raw::{latest_per_sensor, list},
};
use crate::{
    db::models::Sensor,
    error::{Error, Result},
};

/// Stateless entry point for reading queries. Cheap to clone; the pool is
/// the only shared resource.
#[derive(Debug, Clone)]
pub struct ReadingQueryEngine {
    pool: PgPool,
    timeout: Duration,
}

impl ReadingQueryEngine {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Runs `request` with the engine's default deadline.
    pub async fn execute(&self, request: &ReadingRequest) -> Result<ReadingsResponse> {
        self.execute_until(request, Instant::now() + self.timeout)
            .await
    }

    /// Runs `request` so that every round trip (snapshot setup, count,
    /// page fetch) finishes before `deadline`, or fails with
    /// [`Error::Cancelled`].
    ///
    /// Count and fetch share one `REPEATABLE READ, READ ONLY` transaction,
    /// so `total` and the returned page see the same snapshot. Rows are
    /// fully materialized before the connection goes back to the pool.
    pub async fn execute_until(
        &self,
        request: &ReadingRequest,
        deadline: Instant,
    ) -> Result<ReadingsResponse> {
        let mut tx = within(deadline, "begin snapshot", self.pool.begin()).await?;
        within(
            deadline,
            "begin snapshot",
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                .execute(&mut *tx),
        )
        .await?;

        let filter = &request.filter;
        let response = match request.mode {
            QueryMode::Raw => ReadingsResponse::Raw(
                list(&mut tx, filter, request.order, request.page, deadline).await?,
            ),
            QueryMode::Latest => ReadingsResponse::Raw(
                latest_per_sensor(&mut tx, filter, request.order, request.page, deadline).await?,
            ),
            QueryMode::Aggregate(spec) => ReadingsResponse::Aggregated(
                aggregate(&mut tx, filter, spec, request.order, request.page, deadline).await?,
            ),
        };

        within(deadline, "end snapshot", tx.commit()).await?;

        debug!(
            mode = ?request.mode,
            total = response.total(),
            returned = response.len(),
            "reading query complete"
        );
        Ok(response)
    }

    pub async fn sensor(&self, id: Uuid) -> Result<Sensor> {
        let deadline = Instant::now() + self.timeout;
        within(
            deadline,
            "get sensor",
            sqlx::query_as::<_, Sensor>(
                "SELECT id, station_id, name, sensor_type, location, enabled, \
                        battery_level, signal_strength, remote_id, created_at, updated_at \
                 FROM sensors WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| Error::not_found("sensor", id))
    }
}

/// Awaits one database round trip under `deadline`.
///
/// A deadline that has already passed fails before the query is issued, so
/// a request that ran out of time after its count never fetches a page.
pub(crate) async fn within<T, F>(deadline: Instant, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    if Instant::now() >= deadline {
        return Err(Error::Cancelled { operation });
    }
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result.map_err(Error::data_access(operation)),
        Err(_) => Err(Error::Cancelled { operation }),
    }
}
