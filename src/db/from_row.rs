//! Row mapping for the SQLite tables.
//!
//! Each `*_COLS` constant lists the columns in the order its `FromRow` impl
//! reads them. Timestamps are stored as unix microseconds.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Params, Row, types::Type};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub const BRAND_COLS: &str = "id, slug, name, api_key_hash, is_active, created_at";

pub const PRODUCT_COLS: &str =
    "id, brand_id, slug, name, is_active, default_max_seats, created_at";

/// Selected from `license_keys k JOIN brands b`.
pub const LICENSE_KEY_COLS: &str =
    "k.id, k.key, k.brand_id, b.slug, k.customer_email, k.external_reference, k.created_at";

pub const LICENSE_KEY_FROM: &str = "license_keys k JOIN brands b ON b.id = k.brand_id";

/// Selected from `licenses l JOIN products p`; the seat count is computed.
pub const LICENSE_COLS: &str = "l.id, l.license_key_id, l.product_id, p.slug, l.status, \
     l.expires_at, l.max_seats, \
     (SELECT COUNT(*) FROM activations a WHERE a.license_id = l.id AND a.is_active = 1), \
     l.created_at, l.updated_at";

pub const LICENSE_FROM: &str = "licenses l JOIN products p ON p.id = l.product_id";

pub const ACTIVATION_COLS: &str = "id, license_id, instance_id, instance_name, is_active, \
     activated_at, deactivated_at, ip_address, user_agent";

pub const AUDIT_LOG_COLS: &str =
    "id, action, actor_type, actor_id, license_id, license_key_id, details, ip_address, created_at";

pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Current time at storage precision, so returned records equal re-read ones.
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn opt_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let micros: Option<i64> = row.get(idx)?;
    micros
        .map(|m| {
            DateTime::from_timestamp_micros(m)
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, m))
        })
        .transpose()
}

fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl FromRow for Brand {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Brand {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            api_key_hash: row.get(3)?,
            is_active: row.get(4)?,
            created_at: timestamp(row, 5)?,
        })
    }
}

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            brand_id: row.get(1)?,
            slug: row.get(2)?,
            name: row.get(3)?,
            is_active: row.get(4)?,
            default_max_seats: row.get(5)?,
            created_at: timestamp(row, 6)?,
        })
    }
}

impl FromRow for LicenseKey {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LicenseKey {
            id: row.get(0)?,
            key: row.get(1)?,
            brand_id: row.get(2)?,
            brand_slug: row.get(3)?,
            customer_email: row.get(4)?,
            external_reference: row.get(5)?,
            created_at: timestamp(row, 6)?,
        })
    }
}

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            license_key_id: row.get(1)?,
            product_id: row.get(2)?,
            product_slug: row.get(3)?,
            status: parse_enum(row, 4)?,
            expires_at: opt_timestamp(row, 5)?,
            max_seats: row.get(6)?,
            used_seats: row.get(7)?,
            created_at: timestamp(row, 8)?,
            updated_at: timestamp(row, 9)?,
        })
    }
}

impl FromRow for Activation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Activation {
            id: row.get(0)?,
            license_id: row.get(1)?,
            instance_id: row.get(2)?,
            instance_name: row.get(3)?,
            is_active: row.get(4)?,
            activated_at: timestamp(row, 5)?,
            deactivated_at: opt_timestamp(row, 6)?,
            ip_address: row.get(7)?,
            user_agent: row.get(8)?,
        })
    }
}

impl FromRow for AuditLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let details: String = row.get(6)?;
        Ok(AuditLog {
            id: row.get(0)?,
            action: parse_enum(row, 1)?,
            actor_type: parse_enum(row, 2)?,
            actor_id: row.get(3)?,
            license_id: row.get(4)?,
            license_key_id: row.get(5)?,
            details: serde_json::from_str(&details).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
            })?,
            ip_address: row.get(7)?,
            created_at: timestamp(row, 8)?,
        })
    }
}

pub fn query_one<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Option<T>> {
    Ok(conn.query_row(sql, params, |row| T::from_row(row)).optional()?)
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
