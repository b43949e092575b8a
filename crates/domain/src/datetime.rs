//! 日時ユーティリティ
//!
//! ポータルの日時は `YYYY-MM-DD HH:MM:SS`（中国標準時, UTC+8）の文字列か、
//! 秒またはミリ秒のエポック値で返ってくる。内部では `DateTime<Utc>` に揃え、
//! 表示時に中国標準時へ戻す。

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

/// 標準の表示形式
pub const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CHINESE_FORMAT: &str = "%Y年%m月%d日 %H:%M:%S";
const CHINESE_DATE_FORMAT: &str = "%Y年%m月%d日";

const CHINA_OFFSET_SECS: i32 = 8 * 3600;

/// 10 桁のエポック値は秒として扱う
const SECONDS_DIGITS: usize = 10;

const WEEKDAYS: [&str; 7] = [
    "星期日", "星期一", "星期二", "星期三", "星期四", "星期五", "星期六",
];

const MONTHS: [&str; 12] = [
    "一月", "二月", "三月", "四月", "五月", "六月", "七月", "八月", "九月", "十月", "十一月",
    "十二月",
];

/// 中国標準時のオフセット
pub fn china_offset() -> FixedOffset {
    FixedOffset::east_opt(CHINA_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// エポック値を日時に変換する。桁数が 10 なら秒、それ以外はミリ秒
pub fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs().to_string().len() == SECONDS_DIGITS {
        Utc.timestamp_opt(value, 0).single()
    } else {
        Utc.timestamp_millis_opt(value).single()
    }
}

/// `YYYY-MM-DDTHH:MM:SS[.mmm][Z]` 形式かどうか
pub fn is_iso8601(text: &str) -> bool {
    let bytes = text.as_bytes();
    let body = match bytes.last() {
        Some(b'Z') => &bytes[..bytes.len() - 1],
        _ => bytes,
    };

    let (base, fraction) = match body.len() {
        19 => (body, &[][..]),
        23 => (&body[..19], &body[19..]),
        _ => return false,
    };

    let base_ok = base.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    });
    let fraction_ok = fraction.is_empty()
        || (fraction[0] == b'.' && fraction[1..].iter().all(u8::is_ascii_digit));

    base_ok && fraction_ok
}

/// 日時文字列を解釈する
///
/// 数字のみならエポック値、RFC 3339 はそのオフセット、オフセットの無い
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` は中国標準時とみなす。
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i64>().ok().and_then(from_epoch);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    let formats: &[&str] = if is_iso8601(text) {
        &["%Y-%m-%dT%H:%M:%S%.f"]
    } else {
        &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
    };
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .and_then(|naive| china_offset().from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
}

/// 日時文字列をミリ秒のエポック値にする。解釈できなければ 0
pub fn string_to_timestamp(text: &str) -> i64 {
    parse_datetime(text)
        .map(|at| at.timestamp_millis())
        .unwrap_or(0)
}

/// 中国標準時で整形する
pub fn format_china(at: &DateTime<Utc>, format: &str) -> String {
    at.with_timezone(&china_offset()).format(format).to_string()
}

/// エポック値を `YYYY-MM-DD HH:MM:SS`（中国標準時）にする。0 は空文字
pub fn timestamp_to_string(value: i64) -> String {
    if value == 0 {
        return String::new();
    }
    from_epoch(value)
        .map(|at| format_china(&at, DEFAULT_FORMAT))
        .unwrap_or_default()
}

/// `2024年05月01日 08:00:00`
pub fn to_chinese_format(at: &DateTime<Utc>) -> String {
    format_china(at, CHINESE_FORMAT)
}

pub fn to_chinese_date(at: &DateTime<Utc>) -> String {
    format_china(at, CHINESE_DATE_FORMAT)
}

/// 曜日（中国標準時での日付）
pub fn chinese_weekday(at: &DateTime<Utc>) -> &'static str {
    let local = at.with_timezone(&china_offset());
    WEEKDAYS[local.weekday().num_days_from_sunday() as usize]
}

pub fn chinese_month(at: &DateTime<Utc>) -> &'static str {
    let local = at.with_timezone(&china_offset());
    MONTHS[local.month0() as usize]
}
