//! In-memory representation of Avro values.

use base64::Engine;
use chrono::{DateTime, Duration as TimeDelta, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{json, Map, Value};

/// A decoded (or to-be-encoded) Avro value.
///
/// Logical values carry the reinterpreted form; the binary codec lowers them
/// back to their base type when encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Byte array
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Record fields in declared order
    Record(Vec<(String, AvroValue)>),
    /// Enum index and symbol
    Enum(i32, String),
    /// Array of values
    Array(Vec<AvroValue>),
    /// Map entries in wire order
    Map(Vec<(String, AvroValue)>),
    /// Union branch index and value
    Union(i32, Box<AvroValue>),
    /// Fixed-size byte array
    Fixed(Vec<u8>),

    /// Decimal as a big-endian two's complement unscaled integer
    Decimal {
        unscaled: Vec<u8>,
        precision: u32,
        scale: u32,
    },
    /// UUID in its textual form
    Uuid(String),
    /// Days since 1970-01-01
    Date(i32),
    /// Milliseconds after midnight
    TimeMillis(i32),
    /// Microseconds after midnight
    TimeMicros(i64),
    /// Milliseconds since the Unix epoch, UTC
    TimestampMillis(i64),
    /// Microseconds since the Unix epoch, UTC
    TimestampMicros(i64),
    /// Milliseconds since the Unix epoch, no timezone
    LocalTimestampMillis(i64),
    /// Microseconds since the Unix epoch, no timezone
    LocalTimestampMicros(i64),
    /// Months, days and milliseconds
    Duration {
        months: u32,
        days: u32,
        milliseconds: u32,
    },
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl AvroValue {
    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AvroValue::Null => "null",
            AvroValue::Boolean(_) => "boolean",
            AvroValue::Int(_) => "int",
            AvroValue::Long(_) => "long",
            AvroValue::Float(_) => "float",
            AvroValue::Double(_) => "double",
            AvroValue::Bytes(_) => "bytes",
            AvroValue::String(_) => "string",
            AvroValue::Record(_) => "record",
            AvroValue::Enum(..) => "enum",
            AvroValue::Array(_) => "array",
            AvroValue::Map(_) => "map",
            AvroValue::Union(..) => "union",
            AvroValue::Fixed(_) => "fixed",
            AvroValue::Decimal { .. } => "decimal",
            AvroValue::Uuid(_) => "uuid",
            AvroValue::Date(_) => "date",
            AvroValue::TimeMillis(_) => "time-millis",
            AvroValue::TimeMicros(_) => "time-micros",
            AvroValue::TimestampMillis(_) => "timestamp-millis",
            AvroValue::TimestampMicros(_) => "timestamp-micros",
            AvroValue::LocalTimestampMillis(_) => "local-timestamp-millis",
            AvroValue::LocalTimestampMicros(_) => "local-timestamp-micros",
            AvroValue::Duration { .. } => "duration",
        }
    }

    /// Strip any union wrappers.
    pub fn unwrap_union(&self) -> &AvroValue {
        match self {
            AvroValue::Union(_, inner) => inner.unwrap_union(),
            other => other,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self.unwrap_union() {
            AvroValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unwrap_union(), AvroValue::Null)
    }

    /// Build a record value from `(name, value)` pairs.
    pub fn record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, AvroValue)>,
        S: Into<String>,
    {
        AvroValue::Record(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }

    // ------------------------------------------------------------------
    // Decimal helpers
    // ------------------------------------------------------------------

    /// Build a decimal from an unscaled integer, using the minimal
    /// two's complement byte width.
    pub fn decimal_from_i128(unscaled: i128, precision: u32, scale: u32) -> Self {
        AvroValue::Decimal {
            unscaled: minimal_twos_complement(unscaled),
            precision,
            scale,
        }
    }

    /// Unscaled integer of a decimal, if it fits in 128 bits.
    pub fn decimal_unscaled_i128(&self) -> Option<i128> {
        match self {
            AvroValue::Decimal { unscaled, .. } => twos_complement_to_i128(unscaled),
            _ => None,
        }
    }

    /// Render a decimal as text, e.g. `-12.50` for unscaled -1250, scale 2.
    pub fn decimal_to_string(&self) -> Option<String> {
        match self {
            AvroValue::Decimal {
                unscaled, scale, ..
            } => twos_complement_to_i128(unscaled).map(|v| format_scaled(v, *scale)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Date and time helpers
    // ------------------------------------------------------------------

    /// Date value for a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        AvroValue::Date((date - epoch_date()).num_days() as i32)
    }

    /// Microsecond timestamp for a UTC instant.
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        AvroValue::TimestampMicros(ts.timestamp_micros())
    }

    /// Calendar date of a `Date` value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            AvroValue::Date(days) => epoch_date().checked_add_signed(TimeDelta::days(*days as i64)),
            _ => None,
        }
    }

    /// Time of day of a `TimeMillis`/`TimeMicros` value.
    pub fn as_time(&self) -> Option<NaiveTime> {
        let micros = match self {
            AvroValue::TimeMillis(ms) => *ms as i64 * 1_000,
            AvroValue::TimeMicros(us) => *us,
            _ => return None,
        };
        let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
    }

    /// UTC instant of a timestamp value.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            AvroValue::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms),
            AvroValue::TimestampMicros(us) => DateTime::from_timestamp_micros(*us),
            _ => None,
        }
    }

    /// Wall-clock time of a local timestamp value.
    pub fn as_local_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            AvroValue::LocalTimestampMillis(ms) => {
                DateTime::from_timestamp_millis(*ms).map(|t| t.naive_utc())
            }
            AvroValue::LocalTimestampMicros(us) => {
                DateTime::from_timestamp_micros(*us).map(|t| t.naive_utc())
            }
            _ => None,
        }
    }

    /// Convert the value to JSON for display and export.
    ///
    /// Bytes and fixed become base64 strings, decimals become decimal text,
    /// and unions are shown as their inner value.
    pub fn to_json(&self) -> Value {
        let b64 = |b: &[u8]| Value::String(base64::engine::general_purpose::STANDARD.encode(b));
        let float = |f: f64| serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number);

        match self {
            AvroValue::Null => Value::Null,
            AvroValue::Boolean(b) => Value::Bool(*b),
            AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => json!(i),
            AvroValue::Long(l)
            | AvroValue::TimeMicros(l)
            | AvroValue::TimestampMillis(l)
            | AvroValue::TimestampMicros(l)
            | AvroValue::LocalTimestampMillis(l)
            | AvroValue::LocalTimestampMicros(l) => json!(l),
            AvroValue::Float(f) => float(*f as f64),
            AvroValue::Double(d) => float(*d),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => b64(b),
            AvroValue::String(s) | AvroValue::Uuid(s) | AvroValue::Enum(_, s) => json!(s),
            AvroValue::Record(entries) | AvroValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            AvroValue::Array(items) => Value::Array(items.iter().map(AvroValue::to_json).collect()),
            AvroValue::Union(_, inner) => inner.to_json(),
            AvroValue::Decimal { unscaled, .. } => match self.decimal_to_string() {
                Some(text) => Value::String(text),
                None => b64(unscaled),
            },
            AvroValue::Duration {
                months,
                days,
                milliseconds,
            } => json!({ "months": months, "days": days, "milliseconds": milliseconds }),
        }
    }
}

/// Shortest big-endian two's complement encoding of `value`.
pub(crate) fn minimal_twos_complement(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let sign = if value < 0 { 0xFF } else { 0x00 };
    let mut start = 0;
    // Drop leading sign bytes while the next byte still carries the sign bit
    while start < bytes.len() - 1
        && bytes[start] == sign
        && (bytes[start + 1] & 0x80) == (sign & 0x80)
    {
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Interpret big-endian two's complement bytes, if they fit in an i128.
pub(crate) fn twos_complement_to_i128(bytes: &[u8]) -> Option<i128> {
    if bytes.is_empty() {
        return Some(0);
    }
    let negative = bytes[0] & 0x80 != 0;
    let sign = if negative { 0xFF } else { 0x00 };
    let significant = bytes
        .iter()
        .position(|&b| b != sign)
        .map_or(&bytes[bytes.len() - 1..], |i| &bytes[i..]);
    if significant.len() > 16 {
        return None;
    }
    // Sixteen bytes whose top bit disagrees with the sign need a 17th
    if significant.len() == 16 && (significant[0] & 0x80 != 0) != negative {
        return None;
    }
    let mut value: i128 = if negative { -1 } else { 0 };
    for &byte in significant {
        value = (value << 8) | byte as i128;
    }
    Some(value)
}

fn format_scaled(value: i128, scale: u32) -> String {
    if scale == 0 {
        return value.to_string();
    }
    let digits = value.unsigned_abs().to_string();
    let scale = scale as usize;
    let padded = if digits.len() <= scale {
        format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let sign = if value < 0 { "-" } else { "" };
    format!("{}{}.{}", sign, int_part, frac_part)
}

impl From<bool> for AvroValue {
    fn from(v: bool) -> Self {
        AvroValue::Boolean(v)
    }
}

impl From<i32> for AvroValue {
    fn from(v: i32) -> Self {
        AvroValue::Int(v)
    }
}

impl From<i64> for AvroValue {
    fn from(v: i64) -> Self {
        AvroValue::Long(v)
    }
}

impl From<f32> for AvroValue {
    fn from(v: f32) -> Self {
        AvroValue::Float(v)
    }
}

impl From<f64> for AvroValue {
    fn from(v: f64) -> Self {
        AvroValue::Double(v)
    }
}

impl From<&str> for AvroValue {
    fn from(v: &str) -> Self {
        AvroValue::String(v.to_string())
    }
}

impl From<String> for AvroValue {
    fn from(v: String) -> Self {
        AvroValue::String(v)
    }
}

impl From<Vec<u8>> for AvroValue {
    fn from(v: Vec<u8>) -> Self {
        AvroValue::Bytes(v)
    }
}

impl<T: Into<AvroValue>> From<Option<T>> for AvroValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AvroValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_twos_complement() {
        assert_eq!(minimal_twos_complement(0), vec![0x00]);
        assert_eq!(minimal_twos_complement(127), vec![0x7F]);
        assert_eq!(minimal_twos_complement(128), vec![0x00, 0x80]);
        assert_eq!(minimal_twos_complement(-1), vec![0xFF]);
        assert_eq!(minimal_twos_complement(-128), vec![0x80]);
        assert_eq!(minimal_twos_complement(-129), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_twos_complement_round_trip_edges() {
        for v in [0i128, 1, -1, 255, -256, i64::MAX as i128, i128::MIN, i128::MAX] {
            assert_eq!(twos_complement_to_i128(&minimal_twos_complement(v)), Some(v));
        }
        // Sign extension does not change the value
        assert_eq!(twos_complement_to_i128(&[0xFF, 0xFF, 0x85]), Some(-123));
        assert_eq!(twos_complement_to_i128(&[0x00; 20]), Some(0));
        assert_eq!(twos_complement_to_i128(&[0x01; 17]), None);
    }

    #[test]
    fn test_twos_complement_beyond_i128() {
        // 2^127 and -2^127 - 1 need seventeen bytes
        let mut positive = vec![0x00, 0x80];
        positive.extend([0x00; 15]);
        assert_eq!(twos_complement_to_i128(&positive), None);
        let mut negative = vec![0xFF, 0x7F];
        negative.extend([0xFF; 15]);
        assert_eq!(twos_complement_to_i128(&negative), None);

        // Extremes that do fit, with redundant sign bytes
        let mut max = vec![0x00, 0x7F];
        max.extend([0xFF; 15]);
        assert_eq!(twos_complement_to_i128(&max), Some(i128::MAX));
        let mut min = vec![0xFF, 0x80];
        min.extend([0x00; 15]);
        assert_eq!(twos_complement_to_i128(&min), Some(i128::MIN));

        let wide = AvroValue::Decimal {
            unscaled: positive,
            precision: 40,
            scale: 0,
        };
        assert_eq!(wide.decimal_unscaled_i128(), None);
    }

    #[test]
    fn test_decimal_to_string() {
        let d = AvroValue::decimal_from_i128(-1250, 6, 2);
        assert_eq!(d.decimal_to_string().as_deref(), Some("-12.50"));
        let d = AvroValue::decimal_from_i128(5, 3, 3);
        assert_eq!(d.decimal_to_string().as_deref(), Some("0.005"));
        let d = AvroValue::decimal_from_i128(42, 2, 0);
        assert_eq!(d.decimal_to_string().as_deref(), Some("42"));
    }

    #[test]
    fn test_date_helpers() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 14).unwrap();
        let value = AvroValue::from_date(date);
        assert_eq!(value, AvroValue::Date(18700));
        assert_eq!(value.as_date(), Some(date));
        assert_eq!(AvroValue::Date(-1).as_date(), NaiveDate::from_ymd_opt(1969, 12, 31));
    }

    #[test]
    fn test_time_and_timestamp_helpers() {
        let t = AvroValue::TimeMillis(3_723_004).as_time().unwrap();
        assert_eq!(t, NaiveTime::from_hms_milli_opt(1, 2, 3, 4).unwrap());

        let ts = AvroValue::TimestampMillis(1_000).as_datetime().unwrap();
        assert_eq!(ts.timestamp(), 1);
        let round = AvroValue::from_datetime(ts);
        assert_eq!(round, AvroValue::TimestampMicros(1_000_000));

        let local = AvroValue::LocalTimestampMicros(0).as_local_datetime().unwrap();
        assert_eq!(local.and_utc().timestamp(), 0);
    }

    #[test]
    fn test_to_json() {
        let value = AvroValue::record([
            ("id", AvroValue::Int(1)),
            ("tag", AvroValue::Union(1, Box::new(AvroValue::from("x")))),
            ("raw", AvroValue::Bytes(vec![0, 1, 2])),
        ]);
        let json = value.to_json();
        assert_eq!(json["id"], json!(1));
        assert_eq!(json["tag"], json!("x"));
        assert_eq!(json["raw"], json!("AAEC"));
    }

    #[test]
    fn test_field_access_and_conversions() {
        let value = AvroValue::record([
            ("name", AvroValue::from(Some("a"))),
            ("n", AvroValue::from(None::<i32>)),
        ]);
        assert_eq!(value.field("name"), Some(&AvroValue::String("a".into())));
        assert!(value.field("n").unwrap().is_null());
        assert!(value.field("missing").is_none());
        assert_eq!(AvroValue::from(vec![1u8, 2]), AvroValue::Bytes(vec![1, 2]));
    }
}
