//! Text-format encoding of [`PostgresValue`] into bind-parameter bytes.

use pgnative_core::value::{Date, Interval, Time, TimeTz, Timestamp, TimestampTz};
use pgnative_core::{PostgresValue, Result};

use super::oid;

/// Encode a value for use as a Bind parameter, returning its wire bytes and
/// the parameter type OID to declare in the `Parse` message.
///
/// Callers must special-case [`PostgresValue::Null`] themselves (the Bind
/// parameter becomes a `-1`-length field with no bytes here).
pub fn encode_text(value: &PostgresValue) -> Result<(Vec<u8>, u32)> {
    let (text, type_oid) = match value {
        PostgresValue::Null => (String::new(), oid::UNKNOWN),
        PostgresValue::Bool(b) => ((if *b { "t" } else { "f" }).to_string(), oid::BOOL),
        PostgresValue::Integer(i) => (i.to_string(), oid::INT8),
        PostgresValue::Double(d) => (encode_float(*d), oid::FLOAT8),
        PostgresValue::Decimal(s) => (s.clone(), oid::NUMERIC),
        PostgresValue::String(s) => (s.clone(), oid::TEXT),
        PostgresValue::ByteString(bytes) => (encode_bytea(bytes), oid::BYTEA),
        PostgresValue::Date(d) => (encode_date(d), oid::DATE),
        PostgresValue::Time(t) => (encode_time(t), oid::TIME),
        PostgresValue::TimeTz(t) => (encode_timetz(t), oid::TIMETZ),
        PostgresValue::Timestamp(t) => (encode_timestamp(t), oid::TIMESTAMP),
        PostgresValue::TimestampTz(t) => (encode_timestamptz(t), oid::TIMESTAMPTZ),
        PostgresValue::Interval(i) => (encode_interval(i), oid::INTERVAL),
    };
    Ok((text.into_bytes(), type_oid))
}

fn encode_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format!("{value}")
    }
}

fn encode_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn encode_date(date: &Date) -> String {
    if date.year <= 0 {
        // Astronomical year 0 is 1 BC, -1 is 2 BC, ...
        format!("{:04}-{:02}-{:02} BC", 1 - date.year, date.month, date.day)
    } else {
        format!("{:04}-{:02}-{:02}", date.year, date.month, date.day)
    }
}

fn encode_time(time: &Time) -> String {
    encode_time_body(time)
}

fn encode_time_body(time: &Time) -> String {
    if time.nanos == 0 {
        format!("{:02}:{:02}:{:02}", time.hour, time.minute, time.second)
    } else {
        let micros = time.nanos / 1000;
        format!(
            "{:02}:{:02}:{:02}.{:06}",
            time.hour, time.minute, time.second, micros
        )
    }
}

fn encode_offset(utc_offset_seconds: i32) -> String {
    let sign = if utc_offset_seconds < 0 { '-' } else { '+' };
    let total = utc_offset_seconds.unsigned_abs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if seconds != 0 {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    } else if minutes != 0 {
        format!("{sign}{hours:02}:{minutes:02}")
    } else {
        format!("{sign}{hours:02}")
    }
}

fn encode_timetz(timetz: &TimeTz) -> String {
    format!(
        "{}{}",
        encode_time_body(&timetz.time),
        encode_offset(timetz.utc_offset_seconds)
    )
}

fn encode_timestamp(ts: &Timestamp) -> String {
    format!("{} {}", encode_date(&ts.date), encode_time_body(&ts.time))
}

fn encode_timestamptz(ts: &TimestampTz) -> String {
    format!(
        "{} {}{}",
        encode_date(&ts.date),
        encode_time_body(&ts.time),
        encode_offset(ts.utc_offset_seconds)
    )
}

fn encode_interval(interval: &Interval) -> String {
    if interval.months == 0 && interval.days == 0 && interval.micros == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::from("P");
    let years = interval.months / 12;
    let months = interval.months % 12;
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    if interval.micros != 0 {
        out.push('T');
        let negative = interval.micros < 0;
        let mut remaining = interval.micros.unsigned_abs();
        let hours = remaining / 3_600_000_000;
        remaining %= 3_600_000_000;
        let minutes = remaining / 60_000_000;
        remaining %= 60_000_000;
        let micros = remaining;

        let sign = if negative { "-" } else { "" };
        if hours != 0 {
            out.push_str(&format!("{sign}{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{sign}{minutes}M"));
        }
        if micros != 0 || (hours == 0 && minutes == 0) {
            if micros % 1_000_000 == 0 {
                out.push_str(&format!("{sign}{}S", micros / 1_000_000));
            } else {
                out.push_str(&format!(
                    "{sign}{}.{:06}S",
                    micros / 1_000_000,
                    micros % 1_000_000
                ));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_bool_and_null() {
        assert_eq!(
            encode_text(&PostgresValue::Bool(true)).unwrap(),
            (b"t".to_vec(), oid::BOOL)
        );
        let (bytes, type_oid) = encode_text(&PostgresValue::Null).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(type_oid, oid::UNKNOWN);
    }

    #[test]
    fn encode_float_specials() {
        assert_eq!(encode_float(f64::NAN), "NaN");
        assert_eq!(encode_float(f64::INFINITY), "Infinity");
        assert_eq!(encode_float(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn encode_date_bc_year() {
        assert_eq!(
            encode_date(&Date {
                year: -43,
                month: 3,
                day: 15
            }),
            "0044-03-15 BC"
        );
    }

    #[test]
    fn encode_timestamptz_emits_offset() {
        let ts = TimestampTz {
            date: Date {
                year: 2024,
                month: 1,
                day: 1,
            },
            time: Time {
                hour: 0,
                minute: 0,
                second: 0,
                nanos: 0,
            },
            utc_offset_seconds: 0,
        };
        assert_eq!(encode_timestamptz(&ts), "2024-01-01 00:00:00+00");
    }

    #[test]
    fn encode_interval_roundtrips_through_decode() {
        let iv = Interval {
            months: 14,
            days: 3,
            micros: 4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000,
        };
        assert_eq!(encode_interval(&iv), "P1Y2M3DT4H5M6S");
    }

    #[test]
    fn encode_bytea_hex() {
        assert_eq!(encode_bytea(&[0xde, 0xad]), "\\xdead");
    }
}
