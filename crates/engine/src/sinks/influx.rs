//! InfluxDB v2 backed [`PointStore`].
use std::{collections::HashSet, str::FromStr, time::Duration};

use chrono::{DateTime, NaiveTime};
use reqwest::{Client, header};
use rust_decimal::Decimal;

use crate::{
    Field, Point, ResultEngine,
    error::{PersistenceError, with_deadline},
    sinks::time_series::PointStore,
};

pub const DEFAULT_MEASUREMENT: &str = "transaction";

/// Close to the largest time InfluxDB can store.
const QUERY_STOP: &str = "2262-01-01T00:00:00Z";

#[derive(Clone, Debug)]
pub struct InfluxStore {
    client: Client,
    base_url: String,
    token: String,
    org: String,
    bucket: String,
    measurement: String,
    timeout: Option<Duration>,
}

impl InfluxStore {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            org: org.into(),
            bucket: bucket.into(),
            measurement: DEFAULT_MEASUREMENT.to_string(),
            timeout: None,
        }
    }

    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    /// Deadline applied to every single request.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn query(&self) -> ResultEngine<String> {
        let resp = self
            .client
            .post(self.url("/api/v2/query"))
            .query(&[("org", self.org.as_str())])
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .header(header::CONTENT_TYPE, "application/vnd.flux")
            .header(header::ACCEPT, "application/csv")
            .body(flux_query(&self.bucket, &self.measurement))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(PersistenceError::Store {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }
        Ok(body)
    }

    async fn write(&self, line: String) -> ResultEngine<()> {
        let resp = self
            .client
            .post(self.url("/api/v2/write"))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = resp
            .text()
            .await
            .unwrap_or_else(|_| "store error".to_string());
        Err(PersistenceError::Store {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

impl PointStore for InfluxStore {
    async fn existing_points(&self) -> ResultEngine<HashSet<Point>> {
        let body = with_deadline("time-series query", self.timeout, self.query()).await?;
        let points = parse_query_csv(&body)?;
        tracing::debug!("found {} stored points", points.len());
        Ok(points)
    }

    async fn write_point(&self, point: &Point) -> ResultEngine<()> {
        let line = line_protocol(&self.measurement, point);
        with_deadline("time-series write", self.timeout, self.write(line)).await
    }
}

/// Flux query selecting every retained point of `measurement`.
///
/// `stop` defaults to `now()` in Flux; postings dated in the future must be
/// found too.
pub fn flux_query(bucket: &str, measurement: &str) -> String {
    format!(
        "from(bucket: \"{}\") |> range(start: 0, stop: {QUERY_STOP}) |> filter(fn: (r) => r._measurement == \"{}\")",
        escape_flux(bucket),
        escape_flux(measurement)
    )
}

/// One line-protocol record, stamped at midnight UTC of the posting date.
pub fn line_protocol(measurement: &str, point: &Point) -> String {
    let timestamp = point.time.and_time(NaiveTime::MIN).and_utc().timestamp();
    format!(
        "{},account={},payee={} {}={} {}",
        escape(measurement, &[',', ' ']),
        escape(&point.account, &[',', '=', ' ']),
        escape(&point.payee, &[',', '=', ' ']),
        point.field,
        point.value,
        timestamp
    )
}

/// Reads the CSV answer of a query into points.
///
/// Tables may be separated by blank lines and repeat their header row;
/// annotation rows (`#...`) are skipped. Rows of unknown fields are ignored.
pub fn parse_query_csv(body: &str) -> ResultEngine<HashSet<Point>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut columns: Option<Columns> = None;
    let mut points = HashSet::new();

    for record in reader.records() {
        let record = record.map_err(|err| PersistenceError::Response(err.to_string()))?;
        if record.iter().all(str::is_empty) || record.get(0).is_some_and(|c| c.starts_with('#')) {
            continue;
        }
        if record.iter().any(|column| column == "_value") {
            columns = Some(Columns::from_header(&record)?);
            continue;
        }
        let Some(columns) = &columns else {
            return Err(PersistenceError::Response("data row before header".to_string()).into());
        };
        if let Some(point) = columns.point(&record)? {
            points.insert(point);
        }
    }

    Ok(points)
}

struct Columns {
    time: usize,
    value: usize,
    field: usize,
    account: usize,
    payee: usize,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> ResultEngine<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column == name)
                .ok_or_else(|| PersistenceError::Response(format!("missing column {name}")))
        };
        Ok(Self {
            time: find("_time")?,
            value: find("_value")?,
            field: find("_field")?,
            account: find("account")?,
            payee: find("payee")?,
        })
    }

    fn point(&self, record: &csv::StringRecord) -> ResultEngine<Option<Point>> {
        let get = |index: usize| record.get(index).unwrap_or_default();
        let Ok(field) = Field::from_str(get(self.field)) else {
            tracing::debug!("skipping stored field {:?}", get(self.field));
            return Ok(None);
        };

        let time = DateTime::parse_from_rfc3339(get(self.time))
            .map_err(|err| PersistenceError::Response(format!("bad _time: {err}")))?
            .naive_utc()
            .date();
        let raw = get(self.value);
        let value = Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|err| PersistenceError::Response(format!("bad _value {raw:?}: {err}")))?;

        Ok(Some(Point::new(
            time,
            get(self.account),
            get(self.payee),
            field,
            value,
        )))
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_flux(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
