//! Row decoding.
//!
//! The driver hands back dynamically-typed values; the transport serializes
//! JSON. Rows are decoded column-by-column through a typed `try_get` cascade,
//! more specific types first, so driver typing is preserved as far as JSON
//! allows. Unknown types decode to null rather than failing the row.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row};

/// An ordered mapping from column name to JSON-compatible value. Key order is
/// stable within one response page.
pub type ResultRow = serde_json::Map<String, Value>;

/// Decode one row into a [`ResultRow`], pairing the driver's typed values
/// with the result's column descriptors.
pub fn row_to_json(row: &PgRow) -> ResultRow {
    let mut obj = ResultRow::new();

    for col in row.columns() {
        let name = col.name();
        obj.insert(name.to_string(), decode_value(row, name));
    }

    obj
}

fn decode_value(row: &PgRow, name: &str) -> Value {
    // Integer types
    if let Ok(v) = row.try_get::<i64, _>(name) {
        json!(v)
    } else if let Ok(v) = row.try_get::<i32, _>(name) {
        json!(v)
    } else if let Ok(v) = row.try_get::<i16, _>(name) {
        json!(v)
    }
    // Floating point
    else if let Ok(v) = row.try_get::<f64, _>(name) {
        json!(v)
    } else if let Ok(v) = row.try_get::<f32, _>(name) {
        json!(v)
    }
    // BigDecimal for DECIMAL/NUMERIC columns
    else if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(name) {
        match v {
            Some(d) => json!(d.to_f64().unwrap_or(0.0)),
            None => Value::Null,
        }
    }
    // Boolean
    else if let Ok(v) = row.try_get::<bool, _>(name) {
        json!(v)
    }
    // Timestamp with timezone
    else if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(name) {
        match v {
            Some(dt) => json!(dt.to_rfc3339()),
            None => Value::Null,
        }
    }
    // Timestamp without timezone
    else if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(name) {
        match v {
            Some(dt) => json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Value::Null,
        }
    }
    // Date
    else if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(name) {
        match v {
            Some(d) => json!(d.format("%Y-%m-%d").to_string()),
            None => Value::Null,
        }
    }
    // Time
    else if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(name) {
        match v {
            Some(t) => json!(t.format("%H:%M:%S").to_string()),
            None => Value::Null,
        }
    }
    // UUID
    else if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        match v {
            Some(u) => json!(u.to_string()),
            None => Value::Null,
        }
    }
    // String
    else if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        match v {
            Some(s) => json!(s),
            None => Value::Null,
        }
    }
    // JSON/JSONB
    else if let Ok(v) = row.try_get::<Value, _>(name) {
        v
    }
    // String array
    else if let Ok(v) = row.try_get::<Option<Vec<String>>, _>(name) {
        match v {
            Some(arr) => json!(arr),
            None => Value::Null,
        }
    }
    // Byte string, rendered as lowercase hex
    else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(name) {
        match v {
            Some(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                json!(hex)
            }
            None => Value::Null,
        }
    }
    // Final fallback
    else {
        Value::Null
    }
}
