//! Query Parameter Validator.
//!
//! Turns the loosely-typed request (every field an optional string, as it
//! arrives from a query string) into a [`ReadingRequest`] whose types make
//! malformed combinations unrepresentable. Nothing here touches the
//! database.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::filter::ReadingFilter;
use crate::{
    db::models::SensorType,
    error::{Error, Result},
};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 10_000;

// ---------------------------------------------------------------------------
// Raw request
// ---------------------------------------------------------------------------

/// Request fields exactly as a caller supplies them.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReadingsParams {
    /// Station UUID.
    pub station_id: Option<String>,
    /// Comma-separated sensor UUIDs.
    pub sensor_ids: Option<String>,
    /// Sensor type name, e.g. `Temperature`.
    pub sensor_type: Option<String>,
    pub location: Option<String>,
    /// Inclusive lower bound (RFC3339).
    pub start: Option<String>,
    /// Inclusive upper bound (RFC3339).
    pub end: Option<String>,
    /// 1..=10000, default 100.
    pub limit: Option<String>,
    /// 1-indexed, default 1.
    pub page: Option<String>,
    /// `asc` or `desc` (default).
    pub order: Option<String>,
    /// Bucket width: 1m, 5m, 15m, 30m, 1h, 6h, 12h, 1d, 1w, 1M.
    pub aggregate: Option<String>,
    /// avg (default), min, max, sum, count, first, last.
    pub aggregate_func: Option<String>,
    /// sensor (default), sensor_type, location.
    pub group_by: Option<String>,
    /// Latest reading per sensor. Cannot be combined with `aggregate`.
    pub latest: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl FromStr for Order {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            _ => Err(()),
        }
    }
}

/// Time-bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketWidth {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    SixHours,
    TwelveHours,
    OneDay,
    OneWeek,
    OneMonth,
}

impl BucketWidth {
    /// Interval literal for fixed-width buckets; `None` for calendar months.
    pub fn fixed_interval(self) -> Option<&'static str> {
        match self {
            BucketWidth::OneMinute => Some("1 minute"),
            BucketWidth::FiveMinutes => Some("5 minutes"),
            BucketWidth::FifteenMinutes => Some("15 minutes"),
            BucketWidth::ThirtyMinutes => Some("30 minutes"),
            BucketWidth::OneHour => Some("1 hour"),
            BucketWidth::SixHours => Some("6 hours"),
            BucketWidth::TwelveHours => Some("12 hours"),
            BucketWidth::OneDay => Some("1 day"),
            BucketWidth::OneWeek => Some("7 days"),
            BucketWidth::OneMonth => None,
        }
    }
}

impl FromStr for BucketWidth {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "1m" => Ok(BucketWidth::OneMinute),
            "5m" => Ok(BucketWidth::FiveMinutes),
            "15m" => Ok(BucketWidth::FifteenMinutes),
            "30m" => Ok(BucketWidth::ThirtyMinutes),
            "1h" => Ok(BucketWidth::OneHour),
            "6h" => Ok(BucketWidth::SixHours),
            "12h" => Ok(BucketWidth::TwelveHours),
            "1d" => Ok(BucketWidth::OneDay),
            "1w" => Ok(BucketWidth::OneWeek),
            "1M" => Ok(BucketWidth::OneMonth),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateFunc {
    #[default]
    Avg,
    Min,
    Max,
    Sum,
    Count,
    /// Value of the chronologically first reading in the bucket.
    First,
    /// Value of the chronologically last reading in the bucket.
    Last,
}

impl FromStr for AggregateFunc {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "avg" => Ok(AggregateFunc::Avg),
            "min" => Ok(AggregateFunc::Min),
            "max" => Ok(AggregateFunc::Max),
            "sum" => Ok(AggregateFunc::Sum),
            "count" => Ok(AggregateFunc::Count),
            "first" => Ok(AggregateFunc::First),
            "last" => Ok(AggregateFunc::Last),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Sensor,
    SensorType,
    Location,
}

impl FromStr for GroupBy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "sensor" => Ok(GroupBy::Sensor),
            "sensor_type" => Ok(GroupBy::SensorType),
            "location" => Ok(GroupBy::Location),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-indexed.
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Rows to skip. Saturates at `i64::MAX` for pages no result set can
    /// reach, which callers treat as past the end.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSpec {
    pub width: BucketWidth,
    pub func: AggregateFunc,
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Raw,
    Latest,
    Aggregate(AggregateSpec),
}

/// A request that passed validation and carries every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRequest {
    pub filter: ReadingFilter,
    pub order: Order,
    pub page: PageRequest,
    pub mode: QueryMode,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl ReadingsParams {
    /// Validates every field and applies defaults. On failure no partially
    /// normalized request escapes; the error names the offending field.
    pub fn validate(&self) -> Result<ReadingRequest> {
        let aggregate = present(&self.aggregate);
        let latest = match present(&self.latest) {
            None => false,
            Some(raw) => parse_bool("latest", raw)?,
        };
        if latest && aggregate.is_some() {
            return Err(Error::validation(
                "aggregate",
                "cannot be combined with latest=true",
            ));
        }

        let limit = match present(&self.limit) {
            None => DEFAULT_LIMIT,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if (1..=MAX_LIMIT).contains(&n) => n,
                _ => {
                    return Err(Error::validation(
                        "limit",
                        format!("must be an integer between 1 and {MAX_LIMIT}, got {raw:?}"),
                    ))
                }
            },
        };
        let page = match present(&self.page) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(Error::validation(
                        "page",
                        format!("must be an integer >= 1, got {raw:?}"),
                    ))
                }
            },
        };
        let order = choice::<Order>("order", present(&self.order), "asc, desc")?.unwrap_or_default();

        let width: Option<BucketWidth> = choice(
            "aggregate",
            aggregate,
            "1m, 5m, 15m, 30m, 1h, 6h, 12h, 1d, 1w, 1M",
        )?;
        let func: Option<AggregateFunc> = choice(
            "aggregate_func",
            present(&self.aggregate_func),
            "avg, min, max, sum, count, first, last",
        )?;
        let group_by: Option<GroupBy> = choice(
            "group_by",
            present(&self.group_by),
            "sensor, sensor_type, location",
        )?;

        let mode = match width {
            Some(width) => QueryMode::Aggregate(AggregateSpec {
                width,
                func: func.unwrap_or_default(),
                group_by: group_by.unwrap_or_default(),
            }),
            None if latest => QueryMode::Latest,
            None => QueryMode::Raw,
        };

        Ok(ReadingRequest {
            filter: self.validate_filter()?,
            order,
            page: PageRequest { page, limit },
            mode,
        })
    }

    fn validate_filter(&self) -> Result<ReadingFilter> {
        let station_id = present(&self.station_id)
            .map(|raw| parse_uuid("station_id", raw))
            .transpose()?;

        let sensor_ids = present(&self.sensor_ids)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| parse_uuid("sensor_ids", s))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let sensor_type = present(&self.sensor_type)
            .map(|raw| {
                raw.parse::<SensorType>().map_err(|_| {
                    let accepted = SensorType::ALL.map(SensorType::as_str).join(", ");
                    Error::validation(
                        "sensor_type",
                        format!("must be one of {accepted}, got {raw:?}"),
                    )
                })
            })
            .transpose()?;

        let start = present(&self.start)
            .map(|raw| parse_timestamp("start", raw))
            .transpose()?;
        let end = present(&self.end)
            .map(|raw| parse_timestamp("end", raw))
            .transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(Error::validation(
                    "start",
                    format!("must not be after end ({start} > {end})"),
                ));
            }
        }

        Ok(ReadingFilter {
            station_id,
            sensor_ids,
            sensor_type,
            location: present(&self.location).map(str::to_owned),
            start,
            end,
        })
    }
}

/// Empty strings count as absent, so `?aggregate=` means raw mode.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn choice<T: FromStr>(field: &'static str, raw: Option<&str>, accepted: &str) -> Result<Option<T>> {
    raw.map(|raw| {
        raw.parse::<T>().map_err(|_| {
            Error::validation(field, format!("must be one of {accepted}, got {raw:?}"))
        })
    })
    .transpose()
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::validation(
            field,
            format!("must be true or false, got {raw:?}"),
        )),
    }
}

fn parse_uuid(field: &'static str, raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|_| Error::validation(field, format!("must be a UUID, got {raw:?}")))
}

/// Accepts RFC3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            Error::validation(field, format!("must be an RFC3339 timestamp, got {raw:?}"))
        })
}
