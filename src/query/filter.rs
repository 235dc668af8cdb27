//! Filter Predicate Builder.
//!
//! A [`ReadingFilter`] is lowered into an ordered list of [`Predicate`]s
//! and rendered once into a [`WhereClause`]: the SQL fragment and its
//! positional arguments are produced together, so the count query and the
//! data query that embed the same clause cannot drift apart. Filter values
//! only ever travel as bound arguments.
//!
//! Every query that uses the clause must alias `readings` as `r` and
//! `sensors` as `s`.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgArguments, Arguments};
use uuid::Uuid;

use crate::db::models::SensorType;

/// Optional, independently applicable filters over readings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    pub station_id: Option<Uuid>,
    /// Empty means "any sensor".
    pub sensor_ids: Vec<Uuid>,
    pub sensor_type: Option<SensorType>,
    pub location: Option<String>,
    /// Inclusive.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive.
    pub end: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(id) = self.station_id {
            predicates.push(Predicate::Station(id));
        }
        if !self.sensor_ids.is_empty() {
            predicates.push(Predicate::SensorIn(self.sensor_ids.clone()));
        }
        if let Some(t) = self.sensor_type {
            predicates.push(Predicate::SensorType(t));
        }
        if let Some(location) = &self.location {
            predicates.push(Predicate::Location(location.clone()));
        }
        if let Some(start) = self.start {
            predicates.push(Predicate::RecordedFrom(start));
        }
        if let Some(end) = self.end {
            predicates.push(Predicate::RecordedUntil(end));
        }
        predicates
    }

    pub fn where_clause(&self) -> WhereClause {
        WhereClause::render(&self.predicates())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Station(Uuid),
    SensorIn(Vec<Uuid>),
    SensorType(SensorType),
    Location(String),
    RecordedFrom(DateTime<Utc>),
    RecordedUntil(DateTime<Utc>),
}

/// A value bound to one `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Uuid(Uuid),
    Text(String),
    Timestamp(DateTime<Utc>),
    BigInt(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    sql: String,
    args: Vec<SqlArg>,
}

impl WhereClause {
    pub fn render(predicates: &[Predicate]) -> Self {
        // `TRUE` keeps every predicate a uniform `AND ...` suffix.
        let mut sql = String::from("WHERE TRUE");
        let mut args = Vec::new();

        for predicate in predicates {
            match predicate {
                Predicate::Station(id) => {
                    args.push(SqlArg::Uuid(*id));
                    sql.push_str(&format!(" AND s.station_id = ${}", args.len()));
                }
                Predicate::SensorIn(ids) => {
                    let mut placeholders = Vec::with_capacity(ids.len());
                    for id in ids {
                        args.push(SqlArg::Uuid(*id));
                        placeholders.push(format!("${}", args.len()));
                    }
                    sql.push_str(&format!(" AND r.sensor_id IN ({})", placeholders.join(", ")));
                }
                Predicate::SensorType(t) => {
                    args.push(SqlArg::Text(t.as_str().to_owned()));
                    sql.push_str(&format!(" AND s.sensor_type = ${}", args.len()));
                }
                Predicate::Location(location) => {
                    args.push(SqlArg::Text(location.clone()));
                    sql.push_str(&format!(" AND s.location = ${}", args.len()));
                }
                Predicate::RecordedFrom(ts) => {
                    args.push(SqlArg::Timestamp(*ts));
                    sql.push_str(&format!(" AND r.recorded_at >= ${}", args.len()));
                }
                Predicate::RecordedUntil(ts) => {
                    args.push(SqlArg::Timestamp(*ts));
                    sql.push_str(&format!(" AND r.recorded_at <= ${}", args.len()));
                }
            }
        }

        Self { sql, args }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    /// Index of the first placeholder a query may append after this clause.
    pub fn next_placeholder(&self) -> usize {
        self.args.len() + 1
    }

    /// Builds the bound arguments for this clause followed by `trailing`
    /// (e.g. LIMIT and OFFSET at `next_placeholder()` onwards).
    pub fn arguments(&self, trailing: &[SqlArg]) -> Result<PgArguments, sqlx::Error> {
        let mut arguments = PgArguments::default();
        for arg in self.args.iter().chain(trailing) {
            let added = match arg {
                SqlArg::Uuid(v) => arguments.add(*v),
                SqlArg::Text(v) => arguments.add(v.clone()),
                SqlArg::Timestamp(v) => arguments.add(*v),
                SqlArg::BigInt(v) => arguments.add(*v),
            };
            added.map_err(sqlx::Error::Encode)?;
        }
        Ok(arguments)
    }
}
