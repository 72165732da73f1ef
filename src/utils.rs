use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;

/// Taxa presumida applied when a purchase carries no explicit rate (cell N23).
pub const DEFAULT_TAXA_PRESUMIDO: f64 = 0.0291;

/// Largest serial the 1900 date system can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Builds an opaque identifier of the form `<prefix>_<random hex>_<epoch millis>`.
pub fn uid(prefix: &str) -> String {
    let noise: u64 = rand::thread_rng().gen::<u64>() >> 12;
    format!("{}_{:x}_{}", prefix, noise, Utc::now().timestamp_millis())
}

/// Parses free text the way a lenient numeric form field does: surrounding whitespace
/// is ignored, blank text is zero, anything that is not a finite number is rejected.
pub fn parse_number_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Normalizes a raw form value: an empty string is absent, everything else goes
/// through [`parse_number_text`].
pub fn safe_number_text(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    parse_number_text(text)
}

/// Absent numbers count as zero inside the calculation engine.
pub fn or_zero(value: Option<f64>) -> f64 {
    or_default(value, 0.0)
}

pub fn or_default(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => default,
    }
}

/// Converts a serial number from the 1900 date system into a calendar date.
///
/// Serial 60 is the fictitious 1900-02-29 and resolves to 1900-03-01. A time
/// fraction that rounds up to a whole day rolls over to the next date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }

    let mut days = serial.floor() as u64;
    let day_seconds = 86_400.0 * (serial - serial.floor());
    let whole_seconds = day_seconds.floor();
    if day_seconds - whole_seconds > 0.9999 && whole_seconds + 1.0 >= 86_400.0 {
        days += 1;
    }

    let epoch_1899_12_31 = NaiveDate::from_ymd_opt(1899, 12, 31)?;
    let epoch_1899_12_30 = NaiveDate::from_ymd_opt(1899, 12, 30)?;

    match days {
        0 => NaiveDate::from_ymd_opt(1900, 1, 1),
        1..=59 => epoch_1899_12_31.checked_add_days(Days::new(days)),
        60 => NaiveDate::from_ymd_opt(1900, 3, 1),
        _ => epoch_1899_12_30.checked_add_days(Days::new(days)),
    }
}

/// Interprets date text as a calendar date. Accepts ISO dates, ISO timestamps
/// (with or without offset) and the common slash layouts.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Normalizes date text to `YYYY-MM-DD`, or an empty string when it cannot be read.
pub fn to_iso_date(text: &str) -> String {
    parse_date_text(text)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// pt-BR currency style: exactly two decimals, `.` for thousands, `,` for decimals.
pub fn fmt_money(n: f64) -> String {
    let n = if n.is_finite() { n } else { 0.0 };
    let fixed = round_half_up(n.abs(), 2);
    localize(&fixed, n < 0.0)
}

/// pt-BR number style with up to six decimals and no trailing zeros.
pub fn fmt_num(n: f64) -> String {
    let n = if n.is_finite() { n } else { 0.0 };
    let fixed = round_half_up(n.abs(), 6);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    let negative = n < 0.0 && trimmed != "0";
    localize(trimmed, negative)
}

/// Rounds the shortest decimal form of a non-negative `n` to `places` digits, halves away
/// from zero, so `0.125` gives `0.13` and `1.005` gives `1.01`.
fn round_half_up(n: f64, places: usize) -> String {
    let shortest = n.to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(places))
        .map(|b| b - b'0')
        .collect();

    if frac_part.as_bytes().get(places).is_some_and(|d| *d >= b'5') {
        let mut idx = digits.len();
        loop {
            if idx == 0 {
                digits.insert(0, 1);
                break;
            }
            idx -= 1;
            if digits[idx] == 9 {
                digits[idx] = 0;
            } else {
                digits[idx] += 1;
                break;
            }
        }
    }

    let split = digits.len() - places;
    let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    if places == 0 {
        text
    } else {
        format!("{}.{}", &text[..split], &text[split..])
    }
}

fn localize(fixed: &str, negative: bool) -> String {
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push(',');
        out.push_str(frac);
    }
    out
}
