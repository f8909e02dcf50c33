use chrono::{DateTime, TimeZone, Utc};

/// Values at or above this magnitude are millisecond stamps that ended up in a
/// seconds column (or vice versa).
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

fn utc_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now)
}

pub fn utc_from_epoch_seconds_lossy(ts: i64) -> DateTime<Utc> {
    if ts.abs() >= MILLIS_THRESHOLD
        && let Some(dt) = Utc.timestamp_opt(ts / 1000, 0).single()
    {
        log::warn!("Coerced milliseconds timestamp to seconds (ts={ts})");
        return dt;
    }

    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(|| {
        log::warn!("Invalid epoch seconds timestamp (ts={ts}); falling back to epoch");
        utc_epoch()
    })
}

pub fn utc_from_epoch_millis_lossy(ms: i64) -> DateTime<Utc> {
    let candidate = if ms.abs() < MILLIS_THRESHOLD { ms * 1000 } else { ms };

    if let Some(dt) = Utc.timestamp_millis_opt(candidate).single() {
        if candidate != ms {
            log::warn!("Coerced seconds timestamp to millis (ms={ms})");
        }
        return dt;
    }

    log::warn!("Invalid epoch millis timestamp (ms={ms}); falling back to epoch");
    utc_epoch()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_round_trip() {
        let now = Utc::now();
        let decoded = utc_from_epoch_seconds_lossy(now.timestamp());
        assert_eq!(decoded.timestamp(), now.timestamp());
    }

    #[test]
    fn millis_in_seconds_column_are_coerced() {
        let now = Utc::now();
        let decoded = utc_from_epoch_seconds_lossy(now.timestamp_millis());
        assert_eq!(decoded.timestamp(), now.timestamp());
    }

    #[test]
    fn millis_keep_sub_second_precision() {
        let stamp = 1_700_000_000_123;
        let decoded = utc_from_epoch_millis_lossy(stamp);
        assert_eq!(decoded.timestamp_millis(), stamp);
    }
}
