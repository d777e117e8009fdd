//! Serde adapters for the platform's JSON representation.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Float(f64),
}

/// Timestamps travel as unix seconds, sometimes with a fractional part.
pub mod unix_time {
    use super::*;

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(time.timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = match Number::deserialize(deserializer)? {
            Number::Int(s) => s,
            Number::Float(s) => s.trunc() as i64,
        };
        Utc.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}

/// Booleans stored as integer columns come back as `0`/`1`.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Formats a timestamp the way the admin tables show it.
pub fn format_date(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "unix_time")]
        time: DateTime<Utc>,
        #[serde(deserialize_with = "flexible_bool")]
        flag: bool,
    }

    #[test]
    fn test_unix_time_accepts_int_and_float() {
        let a: Stamped = serde_json::from_str(r#"{"time": 1700000000, "flag": true}"#).unwrap();
        let b: Stamped = serde_json::from_str(r#"{"time": 1700000000.75, "flag": 1}"#).unwrap();
        assert_eq!(a.time, b.time);
        assert!(a.flag && b.flag);
        assert_eq!(format_date(&a.time), "2023-11-14 22:13");
    }

    #[test]
    fn test_unix_time_serializes_seconds() {
        let stamped = Stamped {
            time: Utc.timestamp_opt(42, 0).unwrap(),
            flag: false,
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert_eq!(json, r#"{"time":42,"flag":false}"#);
    }
}
