use chrono::{
    DateTime, Datelike, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::{Captures, Match, Regex};
use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::text::normalize_space;

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static DOT_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\.(\d{2})\s*([ap])\.?m\b\.?").expect("valid dotted time regex")
});
static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex"));
static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\b\.?,?(?:\s+(\d{{4}}|\d{{2}})\b)?"
    ))
    .expect("valid day-month regex")
});
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b{MONTH}\b\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b,?(?:\s+(\d{{4}})\b)?"
    ))
    .expect("valid month-day regex")
});
static NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").expect("valid numeric date regex")
});
static TIME_12H_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\b\.?").expect("valid 12h time regex")
});
static TIME_24H_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid 24h time regex"));
static TIME_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[:.]\d|\s*[ap]\.?m\b)").expect("valid time tail regex"));
static ZONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\d{1,2}:\d{2}(?::\d{2})?\s*|\s)(z|utc|gmt|(?:utc|gmt)?[+-]\d{2}:?\d{2})$")
        .expect("valid zone regex")
});
static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{1,2}\s+[a-z]{3,9}\.?\s+\d{2,4})\s*(?:to|-|–|—)\s*(\d{1,2}\s+[a-z]{3,9}\.?\s+\d{2,4})",
    )
    .expect("valid date range regex")
});

/// An explicit `start to end` span found in free text.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub raw: String,
}

/// Turns free text into timestamps in the reference zone. Years outside
/// `[reference_year - back, reference_year + forward]` are rejected.
#[derive(Debug, Clone)]
pub struct DateParser {
    tz: Tz,
    reference_year: i32,
    min_year: i32,
    max_year: i32,
}

impl DateParser {
    pub fn new(tz: Tz, reference_year: i32, back: i32, forward: i32) -> Self {
        Self {
            tz,
            reference_year,
            min_year: reference_year - back,
            max_year: reference_year + forward,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let tz = config.tz()?;
        let reference_year = Utc::now().with_timezone(&tz).year();
        Ok(Self::new(
            tz,
            reference_year,
            config.year_window_back,
            config.year_window_forward,
        ))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Converts any instant to the reference zone, keeping its offset.
    pub fn localize<Z: TimeZone>(&self, dt: &DateTime<Z>) -> DateTime<FixedOffset> {
        dt.with_timezone(&self.tz).fixed_offset()
    }

    /// Fuzzy single-date parse. Never fails loudly: unparseable or
    /// implausible text yields `None`.
    pub fn parse_date(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let text = normalize_space(text);
        if text.is_empty() {
            return None;
        }
        let parsed = self
            .parse_timestamp(&text)
            .or_else(|| self.parse_fuzzy(&prepare(&text)))?;
        if parsed.year() < self.min_year || parsed.year() > self.max_year {
            debug!(%text, year = parsed.year(), "rejecting implausible date");
            return None;
        }
        Some(parsed)
    }

    /// First `D Month YYYY (to|-) D Month YYYY` span whose ends both parse
    /// and are in order.
    pub fn parse_date_range(&self, text: &str) -> Option<DateRange> {
        for caps in RANGE_RE.captures_iter(text) {
            let start = caps.get(1).and_then(|m| self.parse_date(m.as_str()));
            let end = caps.get(2).and_then(|m| self.parse_date(m.as_str()));
            if let (Some(start), Some(end)) = (start, end) {
                if end >= start {
                    return Some(DateRange {
                        start,
                        end,
                        raw: normalize_space(caps.get(0).map_or("", |m| m.as_str())),
                    });
                }
            }
        }
        None
    }

    /// Strict ISO-8601 or RFC 2822 parse used for already-structured
    /// values. A value without an offset is read as local reference time.
    pub fn parse_timestamp(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(self.localize(&dt));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
            return Some(self.localize(&dt));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Some(self.localize(&dt));
            }
        }
        for fmt in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return self.localize_naive(naive);
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| self.localize_naive(date.and_time(NaiveTime::MIN)))
    }

    /// Naive text is local reference time; a trailing zone token
    /// (`Z`, `UTC`, `GMT`, `+08:00`, `-0500`) is honored and converted.
    fn parse_fuzzy(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let (body, offset) = match split_zone(text) {
            Some((body, offset)) => (body, Some(offset)),
            None => (text, None),
        };
        let date = self.find_date(body)?;
        let time = find_time(body).unwrap_or(NaiveTime::MIN);
        let naive = NaiveDateTime::new(date, time);
        match offset {
            Some(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| self.localize(&dt)),
            None => self.localize_naive(naive),
        }
    }

    /// A captured year that is really the hour of a following time
    /// (`14 March 10:30am`) counts as missing.
    fn year_or_reference(&self, text: &str, year: Option<Match<'_>>) -> Option<i32> {
        match year {
            Some(m) if !TIME_TAIL_RE.is_match(&text[m.end()..]) => expand_year(m.as_str()),
            _ => Some(self.reference_year),
        }
    }

    fn find_date(&self, text: &str) -> Option<NaiveDate> {
        let mut candidates: Vec<(usize, NaiveDate)> = Vec::new();

        if let Some(caps) = ISO_DATE_RE.captures(text) {
            if let Some(date) = ymd(num(&caps, 1), num(&caps, 2), num(&caps, 3)) {
                candidates.push((start_of(&caps), date));
            }
        }
        for caps in DAY_MONTH_RE.captures_iter(text) {
            let month = caps.get(2).and_then(|m| month_number(m.as_str()));
            let year = self.year_or_reference(text, caps.get(3));
            if let Some(date) = ymd(year, month, num(&caps, 1)) {
                candidates.push((start_of(&caps), date));
                break;
            }
        }
        for caps in MONTH_DAY_RE.captures_iter(text) {
            let month = caps.get(1).and_then(|m| month_number(m.as_str()));
            let year = self.year_or_reference(text, caps.get(3));
            if let Some(date) = ymd(year, month, num(&caps, 2)) {
                candidates.push((start_of(&caps), date));
                break;
            }
        }
        if let Some(caps) = NUMERIC_DATE_RE.captures(text) {
            let first = num(&caps, 1);
            let second = num(&caps, 2);
            let year = caps.get(3).and_then(|m| expand_year(m.as_str()));
            // month first, unless the first number cannot be a month
            let date = match (first, second) {
                (Some(a), Some(_)) if a > 12 => ymd(year, second, first),
                _ => ymd(year, first, second),
            };
            if let Some(date) = date {
                candidates.push((start_of(&caps), date));
            }
        }

        candidates
            .into_iter()
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, date)| date)
    }

    fn localize_naive(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt.fixed_offset()),
            LocalResult::Ambiguous(dt, _) => Some(dt.fixed_offset()),
            LocalResult::None => None,
        }
    }
}

/// `7.30pm` becomes `7:30 pm`; slashes between words become spaces while
/// numeric `10/8/2025` dates are kept intact.
fn prepare(text: &str) -> String {
    let dotted = DOT_TIME_RE.replace_all(text, "$1:$2 ${3}m");
    let chars: Vec<char> = dotted.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (idx, ch) in chars.iter().enumerate() {
        if *ch == '/' {
            let before = idx > 0 && chars[idx - 1].is_ascii_digit();
            let after = chars.get(idx + 1).map_or(false, |c| c.is_ascii_digit());
            if !(before && after) {
                out.push(' ');
                continue;
            }
        }
        out.push(*ch);
    }
    normalize_space(&out)
}

fn split_zone(text: &str) -> Option<(&str, FixedOffset)> {
    let zone = ZONE_RE.captures(text)?.get(1)?;
    let offset = parse_offset(zone.as_str())?;
    Some((text[..zone.start()].trim_end(), offset))
}

fn parse_offset(token: &str) -> Option<FixedOffset> {
    let lowered = token.to_ascii_lowercase();
    let rest = lowered
        .strip_prefix("utc")
        .or_else(|| lowered.strip_prefix("gmt"))
        .unwrap_or(lowered.as_str());
    if rest.is_empty() || rest == "z" {
        return FixedOffset::east_opt(0);
    }
    let sign = if rest.starts_with('-') { -1 } else { 1 };
    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn find_time(text: &str) -> Option<NaiveTime> {
    if let Some(caps) = TIME_12H_RE.captures(text) {
        let hour = num(&caps, 1)?;
        let minute = num(&caps, 2).unwrap_or(0);
        let pm = caps
            .get(3)
            .map_or(false, |m| m.as_str().eq_ignore_ascii_case("p"));
        if (1..=12).contains(&hour) {
            let hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }
    }
    TIME_24H_RE
        .captures(text)
        .and_then(|caps| NaiveTime::from_hms_opt(num(&caps, 1)?, num(&caps, 2)?, 0))
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_lowercase();
    let prefix = lowered.get(..3)?;
    let idx = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == prefix)?;
    Some(idx as u32 + 1)
}

fn expand_year(text: &str) -> Option<i32> {
    let value: i32 = text.parse().ok()?;
    if text.len() == 2 {
        Some(2000 + value)
    } else {
        Some(value)
    }
}

fn ymd<Y, M, D>(year: Option<Y>, month: Option<M>, day: Option<D>) -> Option<NaiveDate>
where
    Y: TryInto<i32>,
    M: TryInto<u32>,
    D: TryInto<u32>,
{
    NaiveDate::from_ymd_opt(
        year?.try_into().ok()?,
        month?.try_into().ok()?,
        day?.try_into().ok()?,
    )
}

fn num(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx).and_then(|m| m.as_str().parse().ok())
}

fn start_of(caps: &Captures<'_>) -> usize {
    caps.get(0).map_or(usize::MAX, |m| m.start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn parser() -> DateParser {
        DateParser::new(chrono_tz::Asia::Singapore, 2025, 1, 3)
    }

    #[test]
    fn naive_text_is_read_as_singapore_time() {
        let dt = parser().parse_date("Sat, 12 April 2025, 7.30pm").expect("parse");
        assert_eq!(dt.to_rfc3339(), "2025-04-12T19:30:00+08:00");
    }

    #[test]
    fn explicit_offsets_are_converted() {
        let dt = parser()
            .parse_date("2025-03-01T02:00:00Z")
            .expect("parse utc");
        assert_eq!(dt.to_rfc3339(), "2025-03-01T10:00:00+08:00");
    }

    #[test]
    fn month_first_and_numeric_forms() {
        let p = parser();
        let dt = p.parse_date("March 5, 2026 at 11am").expect("month day");
        assert_eq!((dt.month(), dt.day(), dt.hour()), (3, 5, 11));
        let dt = p.parse_date("10/8/2025").expect("numeric");
        assert_eq!((dt.month(), dt.day()), (10, 8));
        let dt = p.parse_date("25/12/2025").expect("day first fallback");
        assert_eq!((dt.month(), dt.day()), (12, 25));
    }

    #[test]
    fn slash_separated_tokens_are_collapsed() {
        let dt = parser().parse_date("Fri/Sat 14 Mar 2025 / 8pm").expect("parse");
        assert_eq!(dt.to_rfc3339(), "2025-03-14T20:00:00+08:00");
    }

    #[test]
    fn missing_year_uses_reference_year() {
        let dt = parser().parse_date("6 June").expect("parse");
        assert_eq!(dt.year(), 2025);
    }

    #[test]
    fn hour_after_yearless_date_is_not_a_year() {
        let p = parser();
        let dt = p.parse_date("Sat, 14 March, 10:30am").expect("day month time");
        assert_eq!(dt.to_rfc3339(), "2025-03-14T10:30:00+08:00");
        let dt = p.parse_date("14 March 10:30am").expect("no comma");
        assert_eq!(dt.to_rfc3339(), "2025-03-14T10:30:00+08:00");
        let dt = p.parse_date("5 May 10 am").expect("spaced meridiem");
        assert_eq!(dt.to_rfc3339(), "2025-05-05T10:00:00+08:00");
        let dt = p.parse_date("2 Aug 7.30pm").expect("dotted time");
        assert_eq!(dt.to_rfc3339(), "2025-08-02T19:30:00+08:00");
        let dt = p.parse_date("1 Dec 25").expect("two digit year");
        assert_eq!(dt.to_rfc3339(), "2025-12-01T00:00:00+08:00");
    }

    #[test]
    fn textual_zones_are_converted() {
        let p = parser();
        let cases = [
            ("Sat, 12 Apr 2025 10:00:00 +0000", "2025-04-12T18:00:00+08:00"),
            ("2025-04-12 10:00 UTC", "2025-04-12T18:00:00+08:00"),
            ("12 April 2025 10:00 GMT", "2025-04-12T18:00:00+08:00"),
            ("12 April 2025 10:00Z", "2025-04-12T18:00:00+08:00"),
            ("12 April 2025 7pm +05:30", "2025-04-12T21:30:00+08:00"),
            ("April 12, 2025 9:00 -0400", "2025-04-12T21:00:00+08:00"),
            ("12 April 2025 10:00 GMT+08:00", "2025-04-12T10:00:00+08:00"),
        ];
        for (text, expected) in cases {
            let dt = p.parse_date(text).unwrap_or_else(|| panic!("parse {text}"));
            assert_eq!(dt.to_rfc3339(), expected, "{text}");
        }
    }

    #[test]
    fn rfc2822_timestamps() {
        let dt = parser()
            .parse_timestamp("Sat, 12 Apr 2025 10:00:00 GMT")
            .expect("rfc 2822");
        assert_eq!(dt.to_rfc3339(), "2025-04-12T18:00:00+08:00");
    }

    #[test]
    fn implausible_years_are_rejected() {
        let p = parser();
        assert!(p.parse_date("1 January 1999").is_none());
        assert!(p.parse_date("1 January 2030").is_none());
        assert!(p.parse_date("1 January 2024").is_some());
        assert!(p.parse_date("1 January 2028").is_some());
    }

    #[test]
    fn noise_yields_none() {
        let p = parser();
        assert!(p.parse_date("").is_none());
        assert!(p.parse_date("Tickets on sale soon").is_none());
        assert!(p.parse_date("7pm").is_none());
    }

    #[test]
    fn parses_explicit_ranges() {
        let range = parser()
            .parse_date_range("On view: 3 May 2025 to 27 July 2025 at Level 2")
            .expect("range");
        assert_eq!(range.start.to_rfc3339(), "2025-05-03T00:00:00+08:00");
        assert_eq!(range.end.to_rfc3339(), "2025-07-27T00:00:00+08:00");
        assert_eq!(range.raw, "3 May 2025 to 27 July 2025");
    }

    #[test]
    fn range_accepts_two_digit_years_and_dashes() {
        let range = parser()
            .parse_date_range("1 Dec 25 - 4 Jan 26")
            .expect("range");
        assert_eq!(range.start.year(), 2025);
        assert_eq!(range.end.year(), 2026);
    }

    #[test]
    fn reversed_range_is_skipped_for_a_later_valid_one() {
        let range = parser()
            .parse_date_range("9 May 2025 to 1 May 2025; 2 June 2025 to 8 June 2025")
            .expect("second range");
        assert_eq!(range.start.day(), 2);
        assert!(parser().parse_date_range("9 May 2025 to 1 May 2025").is_none());
    }

    #[test]
    fn structured_timestamps() {
        let p = parser();
        assert_eq!(
            p.parse_timestamp("2025-03-01T10:00:00+08:00").unwrap().to_rfc3339(),
            "2025-03-01T10:00:00+08:00"
        );
        assert_eq!(
            p.parse_timestamp("2025-03-01").unwrap().to_rfc3339(),
            "2025-03-01T00:00:00+08:00"
        );
        assert!(p.parse_timestamp("soon").is_none());
    }
}
