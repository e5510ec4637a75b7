//! PostgreSQL connection implementation
//!
//! Wraps tokio-postgres: connect with the configured TLS policy and
//! session timeouts, bind positional [`Value`] parameters, and convert
//! result rows back into [`Value`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row as PgRow};
use vitrine_core::{Connection, Result, Row, RowSet, Value, VitrineError};

use crate::config::DbConfig;
use crate::pool::ConnectionFactory;
use crate::tls;

/// Keep the server-reported message, SQLSTATE and detail intact; callers
/// depend on the original text never being rewritten.
fn format_pg_error(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => {
            let mut message = format!("{} (code: {})", db.message(), db.code().code());
            if let Some(detail) = db.detail() {
                if !detail.trim().is_empty() {
                    message.push_str(&format!(" (detail: {})", detail));
                }
            }
            message
        }
        None => error.to_string(),
    }
}

/// PostgreSQL connection wrapper
pub struct PgConnection {
    client: Client,
    /// Set by `close`; the socket itself closes when the last handle drops
    closed: AtomicBool,
    query_timeout: Duration,
}

impl PgConnection {
    /// Connect to the configured database
    ///
    /// Sends `statement_timeout` as a session option so the server bounds
    /// runaway statements independent of the client-side query timeout.
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            tls = ?config.tls_policy(),
            "connecting to PostgreSQL"
        );

        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user)
            .password(&config.password)
            .connect_timeout(config.connect_timeout)
            .options(&format!(
                "-c statement_timeout={}",
                config.statement_timeout.as_millis()
            ));

        let connect_error = |e: tokio_postgres::Error| {
            VitrineError::Connection(format!(
                "failed to connect to {}:{}: {}",
                config.host,
                config.port,
                format_pg_error(&e)
            ))
        };

        let client = match tls::build_connector(config.tls_policy())? {
            Some(connector) => {
                let (client, connection) = pg.connect(connector).await.map_err(connect_error)?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "PostgreSQL connection error");
                    }
                });
                client
            }
            None => {
                let (client, connection) = pg.connect(NoTls).await.map_err(connect_error)?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "PostgreSQL connection error");
                    }
                });
                client
            }
        };

        tracing::info!(host = %config.host, port = config.port, "PostgreSQL connection established");

        Ok(Self {
            client,
            closed: AtomicBool::new(false),
            query_timeout: config.query_timeout,
        })
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Result<RowSet> {
        // Prepare first so the statement's declared parameter types drive
        // the binary widths we bind.
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| VitrineError::Query(format_pg_error(&e)))?;

        let param_types = statement.params();
        let bound: Vec<PgParam> = params
            .iter()
            .enumerate()
            .map(|(i, value)| match param_types.get(i) {
                Some(ty) => PgParam::from_value_for_type(value, ty),
                None => PgParam::from_value(value),
            })
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        // Commands report affected rows; queries return the rows.
        if statement.columns().is_empty() {
            let affected = self
                .client
                .execute(&statement, &param_refs)
                .await
                .map_err(|e| VitrineError::Query(format_pg_error(&e)))?;
            return Ok(RowSet::with_affected(affected));
        }

        let pg_rows = self
            .client
            .query(&statement, &param_refs)
            .await
            .map_err(|e| VitrineError::Query(format_pg_error(&e)))?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(column_to_value(pg_row, idx)?);
            }
            rows.push(Row::new(columns.clone(), values));
        }

        Ok(RowSet::with_rows(columns, rows))
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<RowSet> {
        let started = Instant::now();
        let mut set = match tokio::time::timeout(self.query_timeout, self.run(sql, params)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(VitrineError::Timeout(format!(
                    "query exceeded the client-side timeout of {:?}",
                    self.query_timeout
                )));
            }
        };
        set.execution_time_ms = started.elapsed().as_millis() as u64;
        Ok(set)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_closed()
    }
}

/// Factory producing Postgres connections for the pool
pub struct PgConnectionFactory {
    config: DbConfig,
}

impl PgConnectionFactory {
    /// Create a factory for the given configuration
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(PgConnection::connect(&self.config).await?))
    }
}

/// Owned wrapper so positional [`Value`]s implement `ToSql` with the
/// binary width the statement expects.
#[derive(Debug)]
enum PgParam {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Date(chrono::NaiveDate),
    DateTime(chrono::NaiveDateTime),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
}

impl PgParam {
    /// Pick the variant matching the statement's declared parameter type
    fn from_value_for_type(value: &Value, target: &Type) -> Self {
        match value {
            Value::Int16(v) => Self::coerce_int(*v as i64, target),
            Value::Int32(v) => Self::coerce_int(*v as i64, target),
            Value::Int64(v) => Self::coerce_int(*v, target),
            Value::Float32(v) if *target == Type::FLOAT8 => PgParam::Float64(*v as f64),
            Value::Float64(v) if *target == Type::FLOAT4 => PgParam::Float32(*v as f32),
            _ => Self::from_value(value),
        }
    }

    /// Match the integer width to the target column type so
    /// tokio-postgres writes the correct number of bytes.
    fn coerce_int(value: i64, target: &Type) -> Self {
        if *target == Type::INT2 {
            PgParam::Int16(value as i16)
        } else if *target == Type::INT4 {
            PgParam::Int32(value as i32)
        } else {
            PgParam::Int64(value)
        }
    }

    /// Fallback used when the statement reports no type for the parameter
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgParam::Null,
            Value::Bool(v) => PgParam::Bool(*v),
            Value::Int16(v) => PgParam::Int16(*v),
            Value::Int32(v) => PgParam::Int32(*v),
            Value::Int64(v) => PgParam::Int64(*v),
            Value::Float32(v) => PgParam::Float32(*v),
            Value::Float64(v) => PgParam::Float64(*v),
            Value::Decimal(v) => PgParam::String(v.clone()),
            Value::String(v) => PgParam::String(v.clone()),
            Value::Bytes(v) => PgParam::Bytes(v.clone()),
            Value::Uuid(v) => PgParam::Uuid(*v),
            Value::Json(v) => PgParam::Json(v.clone()),
            Value::Date(v) => PgParam::Date(*v),
            Value::DateTime(v) => PgParam::DateTime(*v),
            Value::DateTimeUtc(v) => PgParam::DateTimeUtc(*v),
        }
    }
}

impl ToSql for PgParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>>
    {
        match self {
            PgParam::Null => Ok(postgres_types::IsNull::Yes),
            PgParam::Bool(v) => v.to_sql(ty, out),
            PgParam::Int16(v) => v.to_sql(ty, out),
            PgParam::Int32(v) => v.to_sql(ty, out),
            PgParam::Int64(v) => v.to_sql(ty, out),
            PgParam::Float32(v) => v.to_sql(ty, out),
            PgParam::Float64(v) => v.to_sql(ty, out),
            PgParam::String(v) => v.to_sql(ty, out),
            PgParam::Bytes(v) => v.to_sql(ty, out),
            PgParam::Uuid(v) => v.to_sql(ty, out),
            PgParam::Json(v) => v.to_sql(ty, out),
            PgParam::Date(v) => v.to_sql(ty, out),
            PgParam::DateTime(v) => v.to_sql(ty, out),
            PgParam::DateTimeUtc(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// NUMERIC decoded from its binary wire form into decimal text
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Last-resort decode for types outside the studio schema
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(String::from_utf8_lossy(raw).into_owned()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// The wire form is a header {ndigits, weight, sign, dscale} followed by
/// base-10000 digit groups.
fn decode_numeric(
    raw: &[u8],
) -> std::result::Result<String, Box<dyn std::error::Error + Sync + Send>> {
    if raw.len() < 8 {
        return Err("NUMERIC payload shorter than its header".into());
    }

    let ndigits = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as isize;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    if raw.len() < 8 + ndigits * 2 {
        return Err("NUMERIC payload truncated".into());
    }
    if sign == 0xC000 {
        return Ok("NaN".to_string());
    }

    let groups: Vec<u16> = (0..ndigits)
        .map(|i| u16::from_be_bytes([raw[8 + i * 2], raw[9 + i * 2]]))
        .collect();

    let mut integer = String::new();
    if weight >= 0 {
        for gi in 0..=(weight as usize) {
            let group = groups.get(gi).copied().unwrap_or(0);
            if gi == 0 {
                integer.push_str(&group.to_string());
            } else {
                integer.push_str(&format!("{group:04}"));
            }
        }
    } else {
        integer.push('0');
    }

    let mut fraction = String::new();
    if dscale > 0 {
        // Groups between the decimal point and the first stored group are
        // implicit zeros when weight < -1.
        if weight < -1 {
            fraction.push_str(&"0".repeat(((-weight - 1) as usize) * 4));
        }
        let skip = if weight >= 0 { weight as usize + 1 } else { 0 };
        for group in groups.iter().skip(skip) {
            fraction.push_str(&format!("{group:04}"));
        }
        if fraction.len() < dscale {
            fraction.push_str(&"0".repeat(dscale - fraction.len()));
        } else {
            fraction.truncate(dscale);
        }
    }

    let negative = sign == 0x4000
        && (integer.bytes().any(|b| b != b'0') || fraction.bytes().any(|b| b != b'0'));

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&integer);
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

fn column_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    let ty = column.type_();

    let decoded = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Bool))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx).map(|v| v.map(Value::Int16))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx).map(|v| v.map(Value::Int32))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int64))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(Value::Float32))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)
            .map(|v| v.map(Value::Float64))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx)
            .map(|v| v.map(Value::String))
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)
            .map(|v| v.map(Value::Bytes))
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(idx)
            .map(|v| v.map(Value::Uuid))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)
            .map(|v| v.map(Value::Json))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map(|v| v.map(Value::Date))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map(|v| v.map(Value::DateTime))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map(|v| v.map(Value::DateTimeUtc))
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<PgNumeric>>(idx)
            .map(|v| v.map(|n| Value::Decimal(n.0)))
    } else {
        row.try_get::<_, Option<RawText>>(idx)
            .map(|v| v.map(|t| Value::String(t.0)))
    };

    match decoded {
        Ok(value) => Ok(value.unwrap_or(Value::Null)),
        Err(e) => Err(VitrineError::Query(format!(
            "failed to decode column `{}`: {}",
            column.name(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests;
