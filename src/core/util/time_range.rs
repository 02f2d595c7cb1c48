use chrono::{DateTime, TimeDelta, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// A requested window before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Set when the window was derived from a relative duration ending at "now".
    span: Option<TimeDelta>,
}

/// A window snapped to a step grid. The grid is `start, start+step, .., end-step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: TimeDelta,
}

impl TimeRange {
    /// Resolve `(start, end, range)` against the current time.
    pub fn resolve(start: i64, end: i64, range: &str) -> Self {
        Self::resolve_at(start, end, range, Utc::now())
    }

    pub fn resolve_at(start: i64, end: i64, range: &str, now: DateTime<Utc>) -> Self {
        if start > 0 && end > 0 {
            return TimeRange {
                start: parse_unix_timestamp(start),
                // end is inclusive on the wire
                end: parse_unix_timestamp(end.saturating_add(1)),
                span: None,
            };
        }

        let span = parse_duration(range).unwrap_or_else(|| TimeDelta::hours(1));
        TimeRange {
            start: now - span,
            end: now,
            span: Some(span),
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Step that keeps a chart at roughly 120 to 180 points.
    pub fn optimal_step(&self) -> TimeDelta {
        let secs = self.duration().num_seconds();
        let step = match secs {
            s if s <= HOUR => 30,
            s if s <= 3 * HOUR => MINUTE,
            s if s <= 6 * HOUR => 2 * MINUTE,
            s if s <= 12 * HOUR => 5 * MINUTE,
            s if s <= DAY => 10 * MINUTE,
            s if s <= 7 * DAY => 2 * HOUR,
            s if s <= 30 * DAY => 8 * HOUR,
            _ => DAY,
        };
        TimeDelta::seconds(step)
    }

    /// Snap the window to `step`, picking one from the table when `step` is zero.
    pub fn align(&self, step: TimeDelta) -> AlignedRange {
        let step = if step <= TimeDelta::zero() { self.optimal_step() } else { step };
        let end = truncate(self.end, step) + step;
        let start = match self.span {
            Some(span) => truncate(end - span, step),
            None => truncate(self.start, step),
        };
        AlignedRange { start, end, step }
    }
}

impl AlignedRange {
    /// Expected sample timestamps in milliseconds.
    pub fn grid_millis(&self) -> Vec<i64> {
        let step = self.step.num_milliseconds();
        if step <= 0 {
            return Vec::new();
        }
        let start = self.start.timestamp_millis();
        let end = self.end.timestamp_millis();
        (0..)
            .map(|i| start + i * step)
            .take_while(|t| *t < end)
            .collect()
    }

    pub fn step_seconds(&self) -> f64 {
        self.step.num_milliseconds() as f64 / 1000.0
    }
}

/// Interpret an integer timestamp as ns, µs, ms or s by magnitude.
pub fn parse_unix_timestamp(ts: i64) -> DateTime<Utc> {
    let nanos = match ts {
        t if t > 1_000_000_000_000_000_000 => t,
        t if t > 1_000_000_000_000_000 => t.saturating_mul(1_000),
        t if t > 1_000_000_000_000 => t.saturating_mul(1_000_000),
        t => t.saturating_mul(1_000_000_000),
    };
    DateTime::from_timestamp_nanos(nanos)
}

fn truncate(t: DateTime<Utc>, step: TimeDelta) -> DateTime<Utc> {
    let step_ms = step.num_milliseconds();
    if step_ms <= 0 {
        return t;
    }
    let ms = t.timestamp_millis();
    let snapped = ms - ms.rem_euclid(step_ms);
    DateTime::from_timestamp_millis(snapped).unwrap_or(t)
}

/// Parse a duration such as `1h`, `90m`, `1h30m`, `500ms` or `2d`.
pub fn parse_duration(s: &str) -> Option<TimeDelta> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total = TimeDelta::zero();
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "d" => 86_400e9,
            "w" => 604_800e9,
            _ => return None,
        };
        total += TimeDelta::nanoseconds((value * nanos_per_unit) as i64);
    }
    Some(total)
}

/// `2006-01-02 15:04:05` style rendering.
pub fn format(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn test_one_hour_default_grid_has_120_points() {
        let now = at(10, 17, 43);
        let tr = TimeRange::resolve_at(0, 0, "1h", now);
        let aligned = tr.align(TimeDelta::zero());

        assert_eq!(aligned.step, TimeDelta::seconds(30));
        let grid = aligned.grid_millis();
        assert_eq!(grid.len(), 120);
        assert!(grid.windows(2).all(|w| w[1] - w[0] == 30_000));
        assert_eq!(aligned.start.timestamp_millis() % 30_000, 0);
        assert!(aligned.start <= now - TimeDelta::hours(1) + TimeDelta::seconds(30));
        assert!(aligned.end > now);
    }

    #[test]
    fn test_unparsable_range_defaults_to_one_hour() {
        let now = at(8, 0, 0);
        let tr = TimeRange::resolve_at(0, 0, "garbage", now);
        assert_eq!(tr.duration(), TimeDelta::hours(1));
        let tr = TimeRange::resolve_at(0, 0, "", now);
        assert_eq!(tr.end, now);
    }

    #[test]
    fn test_explicit_bounds_by_magnitude() {
        let secs = at(1, 0, 0).timestamp();
        assert_eq!(parse_unix_timestamp(secs), at(1, 0, 0));
        assert_eq!(parse_unix_timestamp(secs * 1_000), at(1, 0, 0));
        assert_eq!(parse_unix_timestamp(secs * 1_000_000), at(1, 0, 0));
        assert_eq!(parse_unix_timestamp(secs * 1_000_000_000), at(1, 0, 0));
    }

    #[test]
    fn test_explicit_end_is_exclusive() {
        let start = at(1, 0, 0).timestamp();
        let end = at(2, 0, 0).timestamp();
        let tr = TimeRange::resolve_at(start, end, "", at(5, 0, 0));
        assert_eq!(tr.end, at(2, 0, 1));

        let aligned = tr.align(TimeDelta::minutes(1));
        assert_eq!(aligned.start, at(1, 0, 0));
        assert_eq!(aligned.end, at(2, 1, 0));
    }

    #[test]
    fn test_step_table() {
        let now = at(12, 0, 0);
        let cases = [
            ("30m", 30),
            ("2h", 60),
            ("6h", 120),
            ("12h", 300),
            ("24h", 600),
            ("72h", 7200),
            ("720h", 28_800),
            ("1000h", 86_400),
        ];
        for (range, expected) in cases {
            let tr = TimeRange::resolve_at(0, 0, range, now);
            assert_eq!(tr.optimal_step(), TimeDelta::seconds(expected), "range {range}");
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h30m"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration("500ms"), Some(TimeDelta::milliseconds(500)));
        assert_eq!(parse_duration("1.5h"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration("7d"), Some(TimeDelta::days(7)));
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("10x"), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(format(at(9, 5, 7)), "2025-03-10 09:05:07");
    }
}
