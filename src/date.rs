//! PDF date strings (`D:YYYYMMDDHHmmSSOHH'mm'`).

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Offset, TimeZone};

/// Format a timestamp as a PDF date, keeping its UTC offset.
///
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use pdf_assembler::date::to_pdf_date;
///
/// let tz = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
/// let dt = tz.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
/// assert_eq!(to_pdf_date(&dt), "D:20240309070501+05'30'");
/// ```
pub fn to_pdf_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    let offset = dt.offset().fix().local_minus_utc();
    let sign = if offset >= 0 { '+' } else { '-' };
    let offset = offset.unsigned_abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        dt.naive_local().format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

/// The current local time as a PDF date.
pub fn now_pdf_date() -> String {
    to_pdf_date(&Local::now())
}

/// Parse a PDF date, ignoring the time zone.
///
/// Surrounding parentheses are accepted. Only the year is required; missing
/// fields default to the start of their range. Returns `None` for strings
/// that do not start with `D:` or name an impossible date.
pub fn from_pdf_date(text: &str) -> Option<NaiveDateTime> {
    let text = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    let digits = text.strip_prefix("D:")?;

    let field = |start: usize, end: usize, default: u32| -> Option<u32> {
        match digits.get(start..end) {
            Some(part) if part.bytes().all(|b| b.is_ascii_digit()) => part.parse().ok(),
            Some(_) => None,
            None => Some(default),
        }
    };

    let year = digits.get(0..4)?.parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 6, 1)?, field(6, 8, 1)?)?;
    date.and_hms_opt(field(8, 10, 0)?, field(10, 12, 0)?, field(12, 14, 0)?)
}
