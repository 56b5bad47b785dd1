use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

/// The fixed size of a zone name on the wire, including its NUL terminator
/// (`CDB2_MAX_TZNAME`).
const MAX_TZNAME: usize = 36;

/// Nine 32-bit `tm` fields, a 32-bit sub-second fraction, and the zone name.
const WIRE_LEN: usize = 9 * 4 + 4 + MAX_TZNAME;

/// A Comdb2 datetime value: calendar fields plus a timezone *name*.
///
/// The zone is carried as an opaque name exactly as the wire format does; no
/// timezone database lookup happens client-side, because it is the server
/// that interprets the name. Values read from a result column always carry a
/// zone. Values built locally may be naive (`zone == None`), in which case
/// the codec stamps them with the connection's configured zone when they are
/// bound as parameters.
///
/// Whether a `Timestamp` is sent with millisecond or microsecond precision is
/// decided by the [`Value`][crate::Value] variant wrapping it: `Datetime` and
/// `DatetimeUs` are distinct wire types, not a formatting difference. The
/// sub-second fraction is rounded half-up to the target unit during encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    datetime: NaiveDateTime,
    zone: Option<String>,
}

impl Timestamp {
    pub fn new(datetime: NaiveDateTime, zone: impl Into<String>) -> Self {
        Self {
            datetime,
            zone: Some(zone.into()),
        }
    }

    /// A timestamp without a zone; the connection's configured zone is used
    /// when this value is bound.
    pub fn naive(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            zone: None,
        }
    }

    /// The current time, stamped with the UTC zone.
    pub fn now() -> Self {
        Self::new(Utc::now().naive_utc(), "UTC")
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(datetime: NaiveDateTime) -> Self {
        Timestamp::naive(datetime)
    }
}

/// The two datetime wire precisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DatetimePrecision {
    Millis,
    Micros,
}

impl DatetimePrecision {
    fn unit_nanos(self) -> i64 {
        match self {
            DatetimePrecision::Millis => 1_000_000,
            DatetimePrecision::Micros => 1_000,
        }
    }
}

/// Round the sub-second component half-up to the given unit, carrying into
/// the seconds field when it rounds all the way up.
fn round_subsec(datetime: NaiveDateTime, unit_nanos: i64) -> NaiveDateTime {
    let subsec = i64::from(datetime.nanosecond());
    let rounded = (subsec + unit_nanos / 2) / unit_nanos * unit_nanos;

    datetime - Duration::nanoseconds(subsec) + Duration::nanoseconds(rounded)
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn tm_field(value: u32) -> i32 {
    // Every `tm` field is far below i32::MAX.
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl Timestamp {
    /// Encode into the `cdb2_client_datetime(us)_t` layout. Naive values are
    /// stamped with `default_zone`.
    pub(crate) fn encode(
        &self,
        precision: DatetimePrecision,
        default_zone: &str,
    ) -> Result<Vec<u8>, String> {
        let zone = self.zone.as_deref().unwrap_or(default_zone);
        if zone.len() >= MAX_TZNAME {
            return Err(format!("timezone name {zone:?} is too long"));
        }

        let datetime = round_subsec(self.datetime, precision.unit_nanos());
        let fraction = i64::from(datetime.nanosecond()) / precision.unit_nanos();

        let mut buf = Vec::with_capacity(WIRE_LEN);
        put_i32(&mut buf, tm_field(datetime.second()));
        put_i32(&mut buf, tm_field(datetime.minute()));
        put_i32(&mut buf, tm_field(datetime.hour()));
        put_i32(&mut buf, tm_field(datetime.day()));
        put_i32(&mut buf, tm_field(datetime.month0()));
        put_i32(&mut buf, datetime.year() - 1900);
        put_i32(
            &mut buf,
            tm_field(datetime.weekday().num_days_from_sunday()),
        );
        put_i32(&mut buf, tm_field(datetime.ordinal0()));
        // isdst is unknowable without a zone database; the server goes by the
        // zone name.
        put_i32(&mut buf, -1);
        put_i32(&mut buf, tm_field(u32::try_from(fraction).unwrap_or(0)));

        buf.extend_from_slice(zone.as_bytes());
        buf.resize(WIRE_LEN, 0);

        Ok(buf)
    }

    /// Decode from the `cdb2_client_datetime(us)_t` layout.
    ///
    /// The day-of-week and day-of-year fields on the wire are ignored; they
    /// are derivable from the calendar fields and are not trusted.
    pub(crate) fn decode(data: &[u8], precision: DatetimePrecision) -> Result<Self, String> {
        if data.len() != WIRE_LEN {
            return Err(format!(
                "expected {WIRE_LEN} bytes for a datetime, got {}",
                data.len()
            ));
        }

        let field = |index: usize| -> i32 {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&data[index * 4..index * 4 + 4]);
            i32::from_le_bytes(raw)
        };

        let year = 1900 + field(5);
        let month = u32::try_from(field(4) + 1)
            .map_err(|_| format!("month field {} out of range", field(4)))?;
        let day =
            u32::try_from(field(3)).map_err(|_| format!("day field {} out of range", field(3)))?;
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| format!("invalid calendar date {year:04}-{month:02}-{day:02}"))?;

        let hms = |index: usize| {
            u32::try_from(field(index)).map_err(|_| format!("time field {} out of range", field(index)))
        };
        let (hour, minute, second) = (hms(2)?, hms(1)?, hms(0)?);

        let fraction = hms(9)?;
        let limit = match precision {
            DatetimePrecision::Millis => 1_000,
            DatetimePrecision::Micros => 1_000_000,
        };
        if fraction >= limit {
            return Err(format!("sub-second fraction {fraction} out of range"));
        }
        let nanos = fraction
            * match precision {
                DatetimePrecision::Millis => 1_000_000,
                DatetimePrecision::Micros => 1_000,
            };

        let datetime = date
            .and_hms_nano_opt(hour, minute, second, nanos)
            .ok_or_else(|| format!("invalid time of day {hour:02}:{minute:02}:{second:02}"))?;

        let zone_raw = &data[40..WIRE_LEN];
        let zone_len = zone_raw.iter().position(|&b| b == 0).unwrap_or(MAX_TZNAME);
        let zone = std::str::from_utf8(&zone_raw[..zone_len])
            .map_err(|_| "timezone name is not valid UTF-8".to_owned())?;

        Ok(Timestamp::new(datetime, zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(
        y: i32,
        mo: u32,
        d: u32,
        h: u32,
        mi: u32,
        s: u32,
        nanos: u32,
    ) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_nano_opt(h, mi, s, nanos)
            .unwrap()
    }

    #[test]
    fn round_trips_both_precisions() {
        let ts = Timestamp::new(datetime(2023, 4, 5, 6, 7, 8, 123_000_000), "US/Eastern");

        for precision in [DatetimePrecision::Millis, DatetimePrecision::Micros] {
            let wire = ts.encode(precision, "UTC").unwrap();
            assert_eq!(Timestamp::decode(&wire, precision).unwrap(), ts);
        }
    }

    #[test]
    fn naive_values_take_the_default_zone() {
        let ts = Timestamp::naive(datetime(2023, 4, 5, 6, 7, 8, 0));
        let wire = ts.encode(DatetimePrecision::Millis, "Europe/Paris").unwrap();
        let decoded = Timestamp::decode(&wire, DatetimePrecision::Millis).unwrap();

        assert_eq!(decoded.zone(), Some("Europe/Paris"));
        assert_eq!(decoded.datetime(), ts.datetime());
    }

    #[test]
    fn rounds_half_up_to_millis() {
        let encode = |nanos| {
            Timestamp::new(datetime(2023, 1, 1, 0, 0, 0, nanos), "UTC")
                .encode(DatetimePrecision::Millis, "UTC")
                .unwrap()
        };

        // 1.4999995 ms stays at 1 ms; exactly 1.5 ms rounds up to 2 ms.
        let down = Timestamp::decode(&encode(1_499_999), DatetimePrecision::Millis).unwrap();
        assert_eq!(down.datetime().nanosecond(), 1_000_000);

        let up = Timestamp::decode(&encode(1_500_000), DatetimePrecision::Millis).unwrap();
        assert_eq!(up.datetime().nanosecond(), 2_000_000);
    }

    #[test]
    fn rounding_carries_into_the_next_second() {
        let ts = Timestamp::new(datetime(2023, 12, 31, 23, 59, 59, 999_600_000), "UTC");
        let wire = ts.encode(DatetimePrecision::Millis, "UTC").unwrap();
        let decoded = Timestamp::decode(&wire, DatetimePrecision::Millis).unwrap();

        assert_eq!(decoded.datetime(), datetime(2024, 1, 1, 0, 0, 0, 0));
    }

    #[test]
    fn micros_keep_sub_millisecond_detail() {
        let ts = Timestamp::new(datetime(2023, 4, 5, 6, 7, 8, 123_456_789), "UTC");
        let wire = ts.encode(DatetimePrecision::Micros, "UTC").unwrap();
        let decoded = Timestamp::decode(&wire, DatetimePrecision::Micros).unwrap();

        // 123456.789 µs rounds half-up to 123457 µs.
        assert_eq!(decoded.datetime().nanosecond(), 123_457_000);
    }

    #[test]
    fn rejects_invalid_calendar_fields() {
        let ts = Timestamp::new(datetime(2023, 2, 3, 4, 5, 6, 0), "UTC");
        let mut wire = ts.encode(DatetimePrecision::Millis, "UTC").unwrap();

        // month0 = 12 is out of range
        wire[16..20].copy_from_slice(&12i32.to_le_bytes());
        assert!(Timestamp::decode(&wire, DatetimePrecision::Millis).is_err());
    }

    #[test]
    fn rejects_oversized_zone_names() {
        let ts = Timestamp::new(datetime(2023, 2, 3, 4, 5, 6, 0), "x".repeat(MAX_TZNAME));
        assert!(ts.encode(DatetimePrecision::Millis, "UTC").is_err());
    }

    #[test]
    fn wday_and_yday_are_recomputed_not_trusted() {
        // 2023-04-05 is a Wednesday (wday 3), yday0 94.
        let ts = Timestamp::new(datetime(2023, 4, 5, 0, 0, 0, 0), "UTC");
        let mut wire = ts.encode(DatetimePrecision::Millis, "UTC").unwrap();
        assert_eq!(wire[24..28], 3i32.to_le_bytes());
        assert_eq!(wire[28..32], 94i32.to_le_bytes());

        // Corrupt the derived fields; the decoded value is unaffected.
        wire[24..28].copy_from_slice(&6i32.to_le_bytes());
        wire[28..32].copy_from_slice(&0i32.to_le_bytes());
        let decoded = Timestamp::decode(&wire, DatetimePrecision::Millis).unwrap();
        assert_eq!(decoded.datetime(), ts.datetime());
    }
}
