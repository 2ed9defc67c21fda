//! Text-format decoding of Postgres wire values into [`PostgresValue`].
//!
//! The client always negotiates `DateStyle=ISO, MDY` and `TimeZone=UTC`, so
//! every date/time format below is the single, deterministic ISO shape
//! Postgres emits under that session configuration.

use pgnative_core::error::Error;
use pgnative_core::value::{Date, Interval, Time, TimeTz, Timestamp, TimestampTz};
use pgnative_core::{PostgresValue, Result};

use super::oid;

/// A parse failure with no column/type context yet attached; `decode_text`
/// wraps it into a full [`Error::ValueConversion`] once it knows both.
type DecodeResult<T> = std::result::Result<T, String>;

fn conversion_error(column: usize, target_type: &'static str, reason: impl Into<String>) -> Error {
    Error::ValueConversion {
        column,
        target_type,
        reason: reason.into(),
    }
}

/// Decode a single column's raw text bytes (`None` for SQL NULL) under the
/// given type OID. `column` is the zero-based index of this value within
/// its row, threaded through only to label a `ValueConversion` error.
pub fn decode_text(oid: u32, raw: Option<&[u8]>, column: usize) -> Result<PostgresValue> {
    let Some(raw) = raw else {
        return Ok(PostgresValue::Null);
    };
    let wrap = |reason: String| conversion_error(column, oid::type_name(oid), reason);

    let text = std::str::from_utf8(raw).map_err(|e| wrap(format!("column is not valid UTF-8: {e}")))?;

    match oid {
        oid::BOOL => decode_bool(text).map_err(wrap),
        oid::INT2 | oid::INT4 | oid::INT8 => decode_integer(text).map_err(wrap),
        oid::FLOAT4 | oid::FLOAT8 => decode_float(text).map_err(wrap),
        oid::NUMERIC => Ok(PostgresValue::Decimal(text.to_string())),
        oid::TEXT | oid::VARCHAR | oid::CHAR | oid::NAME | oid::BPCHAR => {
            Ok(PostgresValue::String(text.to_string()))
        }
        oid::BYTEA => decode_bytea(text).map_err(wrap),
        oid::DATE => decode_date(text).map(PostgresValue::Date).map_err(wrap),
        oid::TIME => decode_time(text).map(PostgresValue::Time).map_err(wrap),
        oid::TIMETZ => decode_timetz(text).map(PostgresValue::TimeTz).map_err(wrap),
        oid::TIMESTAMP => decode_timestamp(text)
            .map(PostgresValue::Timestamp)
            .map_err(wrap),
        oid::TIMESTAMPTZ => decode_timestamptz(text)
            .map(PostgresValue::TimestampTz)
            .map_err(wrap),
        oid::INTERVAL => decode_interval(text).map(PostgresValue::Interval).map_err(wrap),
        _ => Ok(PostgresValue::String(text.to_string())),
    }
}

fn decode_bool(text: &str) -> DecodeResult<PostgresValue> {
    match text {
        "t" => Ok(PostgresValue::Bool(true)),
        "f" => Ok(PostgresValue::Bool(false)),
        other => Err(format!("invalid bool literal '{other}'")),
    }
}

fn decode_integer(text: &str) -> DecodeResult<PostgresValue> {
    text.parse::<i64>()
        .map(PostgresValue::Integer)
        .map_err(|e| format!("invalid integer literal '{text}': {e}"))
}

fn decode_float(text: &str) -> DecodeResult<PostgresValue> {
    let value = match text {
        "NaN" => f64::NAN,
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        other => other
            .parse::<f64>()
            .map_err(|e| format!("invalid float literal '{other}': {e}"))?,
    };
    Ok(PostgresValue::Double(value))
}

fn decode_bytea(text: &str) -> DecodeResult<PostgresValue> {
    let hex = text
        .strip_prefix("\\x")
        .ok_or_else(|| format!("bytea literal missing '\\x' prefix: '{text}'"))?;
    if hex.len() % 2 != 0 {
        return Err("bytea literal has odd hex digit count".to_string());
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    let digits = hex.as_bytes();
    for pair in digits.chunks(2) {
        let byte_str = std::str::from_utf8(pair).unwrap();
        let byte = u8::from_str_radix(byte_str, 16)
            .map_err(|e| format!("invalid hex byte '{byte_str}': {e}"))?;
        bytes.push(byte);
    }
    Ok(PostgresValue::ByteString(bytes))
}

/// Parse `YYYY-MM-DD`, optionally followed by ` BC` for a year before 1 AD.
fn decode_date(text: &str) -> DecodeResult<Date> {
    let (body, is_bc) = match text.strip_suffix(" BC") {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let mut parts = body.splitn(3, '-');
    let year_str = parts
        .next()
        .ok_or_else(|| format!("invalid date literal '{text}'"))?;
    let month_str = parts
        .next()
        .ok_or_else(|| format!("invalid date literal '{text}'"))?;
    let day_str = parts
        .next()
        .ok_or_else(|| format!("invalid date literal '{text}'"))?;

    let mut year: i32 = year_str
        .parse()
        .map_err(|e| format!("invalid year in date literal '{text}': {e}"))?;
    if is_bc {
        // Postgres year 1 BC is year 0 in astronomical (proleptic) numbering.
        year = -(year - 1);
    }
    let month: u8 = month_str
        .parse()
        .map_err(|e| format!("invalid month in date literal '{text}': {e}"))?;
    let day: u8 = day_str
        .parse()
        .map_err(|e| format!("invalid day in date literal '{text}': {e}"))?;

    Ok(Date { year, month, day })
}

/// Parse `HH:MM:SS[.ffffff]`.
fn decode_time(text: &str) -> DecodeResult<Time> {
    let (hms, frac) = match text.split_once('.') {
        Some((h, f)) => (h, Some(f)),
        None => (text, None),
    };
    let mut parts = hms.splitn(3, ':');
    let hour: u8 = parts
        .next()
        .ok_or_else(|| format!("invalid time literal '{text}'"))?
        .parse()
        .map_err(|e| format!("invalid hour in time literal '{text}': {e}"))?;
    let minute: u8 = parts
        .next()
        .ok_or_else(|| format!("invalid time literal '{text}'"))?
        .parse()
        .map_err(|e| format!("invalid minute in time literal '{text}': {e}"))?;
    let second: u8 = parts
        .next()
        .ok_or_else(|| format!("invalid time literal '{text}'"))?
        .parse()
        .map_err(|e| format!("invalid second in time literal '{text}': {e}"))?;
    let nanos = parse_fractional_nanos(frac, text)?;

    Ok(Time {
        hour,
        minute,
        second,
        nanos,
    })
}

fn parse_fractional_nanos(frac: Option<&str>, text: &str) -> DecodeResult<u32> {
    let Some(frac) = frac else {
        return Ok(0);
    };
    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid fractional seconds in '{text}'"));
    }
    let mut digits = frac.to_string();
    while digits.len() < 9 {
        digits.push('0');
    }
    digits
        .parse::<u32>()
        .map_err(|e| format!("invalid fractional seconds in '{text}': {e}"))
}

/// Parse a UTC offset suffix of the form `±HH[:MM[:SS]]`.
fn parse_utc_offset(text: &str) -> DecodeResult<(&str, i32)> {
    let sign_pos = text
        .rfind(['+', '-'])
        .ok_or_else(|| format!("timetz/timestamptz literal missing offset: '{text}'"))?;
    let (body, offset_str) = text.split_at(sign_pos);
    let sign: i32 = if offset_str.starts_with('-') { -1 } else { 1 };
    let offset_str = &offset_str[1..];
    let mut fields = offset_str.split(':');
    let hours: i32 = fields
        .next()
        .ok_or_else(|| format!("invalid offset in '{text}'"))?
        .parse()
        .map_err(|e| format!("invalid offset hours in '{text}': {e}"))?;
    let minutes: i32 = match fields.next() {
        Some(m) => m
            .parse()
            .map_err(|e| format!("invalid offset minutes in '{text}': {e}"))?,
        None => 0,
    };
    let seconds: i32 = match fields.next() {
        Some(s) => s
            .parse()
            .map_err(|e| format!("invalid offset seconds in '{text}': {e}"))?,
        None => 0,
    };
    let total = sign * (hours * 3600 + minutes * 60 + seconds);
    Ok((body, total))
}

fn decode_timetz(text: &str) -> DecodeResult<TimeTz> {
    let (body, utc_offset_seconds) = parse_utc_offset(text)?;
    let time = decode_time(body)?;
    Ok(TimeTz {
        time,
        utc_offset_seconds,
    })
}

fn decode_timestamp(text: &str) -> DecodeResult<Timestamp> {
    let (date_part, time_part) = text
        .split_once(' ')
        .ok_or_else(|| format!("invalid timestamp literal '{text}'"))?;
    let date = decode_date(date_part)?;
    let time = decode_time(time_part)?;
    Ok(Timestamp { date, time })
}

fn decode_timestamptz(text: &str) -> DecodeResult<TimestampTz> {
    let (body, utc_offset_seconds) = parse_utc_offset(text)?;
    let (date_part, time_part) = body
        .split_once(' ')
        .ok_or_else(|| format!("invalid timestamptz literal '{text}'"))?;
    let date = decode_date(date_part)?;
    let time = decode_time(time_part)?;
    Ok(TimestampTz {
        date,
        time,
        utc_offset_seconds,
    })
}

/// Parse either ISO 8601 (`P1Y2M3DT4H5M6S`) or Postgres verbose
/// (`1 year 2 mons 3 days 04:05:06`) interval text.
fn decode_interval(text: &str) -> DecodeResult<Interval> {
    if let Some(rest) = text.strip_prefix('P') {
        decode_interval_iso(rest, text)
    } else {
        decode_interval_verbose(text)
    }
}

fn decode_interval_iso(rest: &str, original: &str) -> DecodeResult<Interval> {
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut months: i32 = 0;
    let mut days: i32 = 0;
    let mut num = String::new();
    for c in date_part.chars() {
        match c {
            '-' | '0'..='9' => num.push(c),
            'Y' => {
                months += parse_signed_component(&num, original)? * 12;
                num.clear();
            }
            'M' => {
                months += parse_signed_component(&num, original)?;
                num.clear();
            }
            'W' => {
                days += parse_signed_component(&num, original)? * 7;
                num.clear();
            }
            'D' => {
                days += parse_signed_component(&num, original)?;
                num.clear();
            }
            _ => return Err(format!("invalid interval literal '{original}'")),
        }
    }

    let mut micros: i64 = 0;
    if let Some(time_part) = time_part {
        let mut num = String::new();
        for c in time_part.chars() {
            match c {
                '-' | '.' | '0'..='9' => num.push(c),
                'H' => {
                    micros += parse_signed_seconds(&num, original)? * 3_600_000_000;
                    num.clear();
                }
                'M' => {
                    micros += parse_signed_seconds(&num, original)? * 60_000_000;
                    num.clear();
                }
                'S' => {
                    micros += parse_signed_seconds(&num, original)?;
                    num.clear();
                }
                _ => {
                    return Err(format!("invalid interval literal '{original}'"));
                }
            }
        }
    }

    Ok(Interval {
        months,
        days,
        micros,
    })
}

fn parse_signed_component(num: &str, original: &str) -> DecodeResult<i32> {
    num.parse()
        .map_err(|e| format!("invalid interval component in '{original}': {e}"))
}

fn parse_signed_seconds(num: &str, original: &str) -> DecodeResult<i64> {
    let value: f64 = num
        .parse()
        .map_err(|e| format!("invalid interval component in '{original}': {e}"))?;
    Ok((value * 1_000_000.0).round() as i64)
}

fn decode_interval_verbose(text: &str) -> DecodeResult<Interval> {
    let mut months: i32 = 0;
    let mut days: i32 = 0;
    let mut micros: i64 = 0;

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if token.contains(':') {
            let negative = token.starts_with('-');
            let clock = token.trim_start_matches('-');
            let mut parts = clock.splitn(3, ':');
            let h: i64 = parts
                .next()
                .unwrap_or("0")
                .parse()
                .map_err(|e| format!("invalid interval time in '{text}': {e}"))?;
            let m: i64 = parts
                .next()
                .unwrap_or("0")
                .parse()
                .map_err(|e| format!("invalid interval time in '{text}': {e}"))?;
            let s: f64 = parts
                .next()
                .unwrap_or("0")
                .parse()
                .map_err(|e| format!("invalid interval time in '{text}': {e}"))?;
            let mut total = h * 3_600_000_000 + m * 60_000_000 + (s * 1_000_000.0).round() as i64;
            if negative {
                total = -total;
            }
            micros += total;
            i += 1;
            continue;
        }

        let count: i64 = token
            .parse()
            .map_err(|e| format!("invalid interval literal '{text}': {e}"))?;
        let unit = tokens
            .get(i + 1)
            .ok_or_else(|| format!("invalid interval literal '{text}'"))?;
        let unit = unit.trim_end_matches('s');
        match unit {
            "year" => months += (count * 12) as i32,
            "mon" => months += count as i32,
            "day" => days += count as i32,
            "hour" => micros += count * 3_600_000_000,
            "min" | "minute" => micros += count * 60_000_000,
            "sec" | "second" => micros += count * 1_000_000,
            other => {
                return Err(format!("unknown interval unit '{other}' in '{text}'"));
            }
        }
        i += 2;
    }

    Ok(Interval {
        months,
        days,
        micros,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_bool_values() {
        assert_eq!(
            decode_text(oid::BOOL, Some(b"t"), 0).unwrap(),
            PostgresValue::Bool(true)
        );
        assert_eq!(
            decode_text(oid::BOOL, Some(b"f"), 0).unwrap(),
            PostgresValue::Bool(false)
        );
        assert!(decode_text(oid::BOOL, Some(b"x"), 0).is_err());
    }

    #[test]
    fn decode_null_is_null_regardless_of_oid() {
        assert_eq!(decode_text(oid::INT4, None, 0).unwrap(), PostgresValue::Null);
    }

    #[test]
    fn decode_float_specials() {
        assert!(matches!(
            decode_text(oid::FLOAT8, Some(b"NaN"), 0).unwrap(),
            PostgresValue::Double(v) if v.is_nan()
        ));
        assert_eq!(
            decode_text(oid::FLOAT8, Some(b"Infinity"), 0).unwrap(),
            PostgresValue::Double(f64::INFINITY)
        );
        assert_eq!(
            decode_text(oid::FLOAT8, Some(b"-Infinity"), 0).unwrap(),
            PostgresValue::Double(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn decode_bytea_hex() {
        let v = decode_text(oid::BYTEA, Some(b"\\xdeadbeef"), 0).unwrap();
        assert_eq!(v, PostgresValue::ByteString(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn decode_date_ad_and_bc() {
        let ad = decode_date("2024-03-05").unwrap();
        assert_eq!(
            ad,
            Date {
                year: 2024,
                month: 3,
                day: 5
            }
        );

        let bc = decode_date("0044-03-15 BC").unwrap();
        assert_eq!(bc.year, -43);
    }

    #[test]
    fn decode_time_with_fraction() {
        let t = decode_time("13:45:07.123").unwrap();
        assert_eq!(t.hour, 13);
        assert_eq!(t.minute, 45);
        assert_eq!(t.second, 7);
        assert_eq!(t.nanos, 123_000_000);
    }

    #[test]
    fn decode_timestamptz_is_utc_offset_aware() {
        let ts = decode_timestamptz("2024-03-05 13:45:07.5+00").unwrap();
        assert_eq!(ts.utc_offset_seconds, 0);
        assert_eq!(ts.time.second, 7);
    }

    #[test]
    fn decode_interval_iso_roundtrips_components() {
        let iv = decode_interval("P1Y2M3DT4H5M6S").unwrap();
        assert_eq!(iv.months, 14);
        assert_eq!(iv.days, 3);
        assert_eq!(iv.micros, 4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000);
    }

    #[test]
    fn decode_interval_verbose_form() {
        let iv = decode_interval("1 year 2 mons 3 days 04:05:06").unwrap();
        assert_eq!(iv.months, 14);
        assert_eq!(iv.days, 3);
        assert_eq!(iv.micros, 4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000);
    }

    #[test]
    fn decode_integer_rejects_float_text() {
        assert!(decode_text(oid::INT4, Some(b"1.5"), 0).is_err());
    }

    #[test]
    fn conversion_error_reports_the_failing_column_and_type() {
        match decode_text(oid::INT4, Some(b"not-a-number"), 3).unwrap_err() {
            Error::ValueConversion {
                column,
                target_type,
                ..
            } => {
                assert_eq!(column, 3);
                assert_eq!(target_type, "int4");
            }
            other => panic!("expected ValueConversion, got {other:?}"),
        }
    }
}
