//! Row-level retrieval: filtered pages of readings and the latest reading
//! per sensor.

use sqlx::PgConnection;
use tokio::time::Instant;
use tracing::debug;

use super::{
    engine::within,
    envelope::Paginated,
    filter::{ReadingFilter, SqlArg},
    params::{Order, PageRequest},
};
use crate::{
    db::models::ReadingRecord,
    error::{Error, Result},
};

pub(crate) const FROM_READINGS: &str = "FROM readings r JOIN sensors s ON s.id = r.sensor_id";

const READING_COLUMNS: &str =
    "r.id, r.sensor_id, s.station_id, s.sensor_type, s.location, r.value, r.recorded_at";

/// One page of readings ordered by timestamp, plus the size of the whole
/// filtered set.
pub async fn list(
    conn: &mut PgConnection,
    filter: &ReadingFilter,
    order: Order,
    page: PageRequest,
    deadline: Instant,
) -> Result<Paginated<ReadingRecord>> {
    const OPERATION: &str = "list readings";

    let clause = filter.where_clause();
    let count_sql = format!("SELECT COUNT(*) {FROM_READINGS} {}", clause.sql());
    let count_args = clause.arguments(&[]).map_err(Error::data_access(OPERATION))?;
    let total: i64 = within(
        deadline,
        OPERATION,
        sqlx::query_scalar_with::<_, i64, _>(&count_sql, count_args).fetch_one(&mut *conn),
    )
    .await?;

    if page.offset() >= total {
        debug!(total, page = page.page, "page past end of readings; skipping fetch");
        return Ok(Paginated::new(Vec::new(), total, page, false));
    }

    let n = clause.next_placeholder();
    let dir = order.as_sql();
    let sql = format!(
        "SELECT {READING_COLUMNS} {FROM_READINGS} {} \
         ORDER BY r.recorded_at {dir}, r.id {dir} \
         LIMIT ${n} OFFSET ${}",
        clause.sql(),
        n + 1,
    );
    let args = clause
        .arguments(&[SqlArg::BigInt(page.limit), SqlArg::BigInt(page.offset())])
        .map_err(Error::data_access(OPERATION))?;
    let rows = within(
        deadline,
        OPERATION,
        sqlx::query_as_with::<_, ReadingRecord, _>(&sql, args).fetch_all(&mut *conn),
    )
    .await?;

    debug!(total, returned = rows.len(), page = page.page, "listed readings");
    Ok(Paginated::new(rows, total, page, false))
}

/// The reading with the greatest timestamp for every sensor that has at
/// least one reading matching `filter`. Paginated over sensors.
pub async fn latest_per_sensor(
    conn: &mut PgConnection,
    filter: &ReadingFilter,
    order: Order,
    page: PageRequest,
    deadline: Instant,
) -> Result<Paginated<ReadingRecord>> {
    const OPERATION: &str = "latest reading per sensor";

    let clause = filter.where_clause();
    let count_sql = format!(
        "SELECT COUNT(DISTINCT r.sensor_id) {FROM_READINGS} {}",
        clause.sql()
    );
    let count_args = clause.arguments(&[]).map_err(Error::data_access(OPERATION))?;
    let total: i64 = within(
        deadline,
        OPERATION,
        sqlx::query_scalar_with::<_, i64, _>(&count_sql, count_args).fetch_one(&mut *conn),
    )
    .await?;

    if page.offset() >= total {
        return Ok(Paginated::new(Vec::new(), total, page, false));
    }

    let n = clause.next_placeholder();
    let dir = order.as_sql();
    // DISTINCT ON keeps the first row of each sensor group, which the inner
    // ORDER BY makes the newest one.
    let sql = format!(
        "SELECT latest.* FROM ( \
             SELECT DISTINCT ON (r.sensor_id) {READING_COLUMNS} {FROM_READINGS} {} \
             ORDER BY r.sensor_id, r.recorded_at DESC, r.id DESC \
         ) latest \
         ORDER BY latest.recorded_at {dir}, latest.sensor_id \
         LIMIT ${n} OFFSET ${}",
        clause.sql(),
        n + 1,
    );
    let args = clause
        .arguments(&[SqlArg::BigInt(page.limit), SqlArg::BigInt(page.offset())])
        .map_err(Error::data_access(OPERATION))?;
    let rows = within(
        deadline,
        OPERATION,
        sqlx::query_as_with::<_, ReadingRecord, _>(&sql, args).fetch_all(&mut *conn),
    )
    .await?;

    Ok(Paginated::new(rows, total, page, false))
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use sqlx::PgPool;

    use super::*;
    use crate::{
        db::models::SensorType,
        query::test_support::{deadline, insert_reading, insert_sensor, insert_station, t0},
    };

    fn page(page: i64, limit: i64) -> PageRequest {
        PageRequest { page, limit }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn empty_store_reports_coherent_envelope(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let result = list(
            &mut conn,
            &ReadingFilter::default(),
            Order::Desc,
            page(1, 100),
            deadline(),
        )
        .await
        .unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.total, 0);
        assert_eq!(result.total_pages, 1);
        assert!(!result.has_more);
        assert!(!result.is_aggregated);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn second_page_of_fifteen_readings(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let sensor = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        for i in 0..15 {
            insert_reading(&pool, sensor, i as f64, t0() + ChronoDuration::minutes(i)).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let result = list(
            &mut conn,
            &ReadingFilter::default(),
            Order::Asc,
            page(2, 10),
            deadline(),
        )
        .await
        .unwrap();

        assert_eq!(result.data.len(), 5);
        assert_eq!(result.total, 15);
        assert_eq!(result.total_pages, 2);
        assert!(!result.has_more);
        let values: Vec<f64> = result.data.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![10.0, 11.0, 12.0, 13.0, 14.0]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn descending_order_returns_newest_first(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let sensor = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        for i in 0..3 {
            insert_reading(&pool, sensor, i as f64, t0() + ChronoDuration::minutes(i)).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let result = list(
            &mut conn,
            &ReadingFilter::default(),
            Order::Desc,
            page(1, 10),
            deadline(),
        )
        .await
        .unwrap();
        let values: Vec<f64> = result.data.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 1.0, 0.0]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn page_beyond_end_is_empty_not_an_error(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let sensor = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        insert_reading(&pool, sensor, 1.0, t0()).await;

        let mut conn = pool.acquire().await.unwrap();
        let result = list(
            &mut conn,
            &ReadingFilter::default(),
            Order::Desc,
            page(5, 10),
            deadline(),
        )
        .await
        .unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.total, 1);
        assert!(!result.has_more);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unreachable_page_is_empty_not_an_error(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let sensor = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        insert_reading(&pool, sensor, 1.0, t0()).await;

        let mut conn = pool.acquire().await.unwrap();
        let huge = page(1_000_000_000_000_000, 10_000);
        let listed = list(&mut conn, &ReadingFilter::default(), Order::Desc, huge, deadline())
            .await
            .unwrap();
        assert!(listed.data.is_empty());
        assert_eq!(listed.total, 1);

        let latest = latest_per_sensor(
            &mut conn,
            &ReadingFilter::default(),
            Order::Desc,
            huge,
            deadline(),
        )
        .await
        .unwrap();
        assert!(latest.data.is_empty());
        assert_eq!(latest.total, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn inserted_reading_round_trips_once(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let sensor = insert_sensor(&pool, station, SensorType::Pressure, "outdoor").await;
        insert_reading(&pool, sensor, 1013.25, t0()).await;

        let filter = ReadingFilter {
            start: Some(t0() - ChronoDuration::hours(1)),
            end: Some(t0() + ChronoDuration::hours(1)),
            ..Default::default()
        };
        let mut conn = pool.acquire().await.unwrap();
        let result = list(&mut conn, &filter, Order::Desc, page(1, 100), deadline())
            .await
            .unwrap();
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].value, 1013.25);
        assert_eq!(result.data[0].recorded_at, t0());
        assert_eq!(result.data[0].sensor_id, sensor);
        assert_eq!(result.data[0].station_id, station);
        assert_eq!(result.data[0].sensor_type, "Pressure");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn filters_combine_and_total_matches_filtered_set(pool: PgPool) {
        let roof = insert_station(&pool, "roof").await;
        let garden = insert_station(&pool, "garden").await;
        let roof_temp = insert_sensor(&pool, roof, SensorType::Temperature, "outdoor").await;
        let roof_hum = insert_sensor(&pool, roof, SensorType::Humidity, "outdoor").await;
        let garden_temp = insert_sensor(&pool, garden, SensorType::Temperature, "indoor").await;
        for i in 0..4 {
            let ts = t0() + ChronoDuration::minutes(i);
            insert_reading(&pool, roof_temp, 20.0, ts).await;
            insert_reading(&pool, roof_hum, 60.0, ts).await;
            insert_reading(&pool, garden_temp, 18.0, ts).await;
        }

        let mut conn = pool.acquire().await.unwrap();

        let by_station = ReadingFilter {
            station_id: Some(roof),
            ..Default::default()
        };
        let result = list(&mut conn, &by_station, Order::Desc, page(1, 3), deadline())
            .await
            .unwrap();
        assert_eq!(result.total, 8);
        assert_eq!(result.data.len(), 3);
        assert!(result.has_more);

        let by_type = ReadingFilter {
            sensor_type: Some(SensorType::Temperature),
            location: Some("indoor".into()),
            ..Default::default()
        };
        let result = list(&mut conn, &by_type, Order::Desc, page(1, 100), deadline())
            .await
            .unwrap();
        assert_eq!(result.total, 4);
        assert!(result.data.iter().all(|r| r.sensor_id == garden_temp));

        let by_ids = ReadingFilter {
            sensor_ids: vec![roof_hum, garden_temp],
            start: Some(t0() + ChronoDuration::minutes(2)),
            ..Default::default()
        };
        let result = list(&mut conn, &by_ids, Order::Asc, page(1, 100), deadline())
            .await
            .unwrap();
        assert_eq!(result.total, 4);
        assert!(result.data.iter().all(|r| r.sensor_id != roof_temp));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn repeated_request_is_identical(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let sensor = insert_sensor(&pool, station, SensorType::Rainfall, "outdoor").await;
        // Duplicate timestamps must still order deterministically.
        for i in 0..6 {
            insert_reading(&pool, sensor, i as f64, t0()).await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let first = list(&mut conn, &ReadingFilter::default(), Order::Desc, page(1, 4), deadline())
            .await
            .unwrap();
        let second = list(&mut conn, &ReadingFilter::default(), Order::Desc, page(1, 4), deadline())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_skips_sensors_without_readings(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let a = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        let b = insert_sensor(&pool, station, SensorType::Humidity, "outdoor").await;
        insert_reading(&pool, a, 21.5, t0()).await;

        let filter = ReadingFilter {
            sensor_ids: vec![a, b],
            ..Default::default()
        };
        let mut conn = pool.acquire().await.unwrap();
        let result = latest_per_sensor(&mut conn, &filter, Order::Desc, page(1, 100), deadline())
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].sensor_id, a);
        assert_eq!(result.data[0].value, 21.5);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_picks_newest_reading_per_sensor(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let a = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        let b = insert_sensor(&pool, station, SensorType::WindSpeed, "outdoor").await;
        insert_reading(&pool, a, 1.0, t0()).await;
        insert_reading(&pool, a, 2.0, t0() + ChronoDuration::minutes(5)).await;
        insert_reading(&pool, a, 3.0, t0() + ChronoDuration::minutes(1)).await;
        insert_reading(&pool, b, 7.0, t0() + ChronoDuration::minutes(2)).await;

        let mut conn = pool.acquire().await.unwrap();
        let result = latest_per_sensor(
            &mut conn,
            &ReadingFilter::default(),
            Order::Desc,
            page(1, 100),
            deadline(),
        )
        .await
        .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.data[0].sensor_id, a);
        assert_eq!(result.data[0].value, 2.0);
        assert_eq!(result.data[1].sensor_id, b);
        assert_eq!(result.data[1].value, 7.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_respects_time_bound(pool: PgPool) {
        let station = insert_station(&pool, "roof").await;
        let a = insert_sensor(&pool, station, SensorType::Temperature, "outdoor").await;
        insert_reading(&pool, a, 1.0, t0()).await;
        insert_reading(&pool, a, 2.0, t0() + ChronoDuration::hours(2)).await;

        let filter = ReadingFilter {
            end: Some(t0() + ChronoDuration::hours(1)),
            ..Default::default()
        };
        let mut conn = pool.acquire().await.unwrap();
        let result = latest_per_sensor(&mut conn, &filter, Order::Desc, page(1, 100), deadline())
            .await
            .unwrap();
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].value, 1.0);
    }
}
