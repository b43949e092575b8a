//! 残業時間の集計
//!
//! 勤怠レコード（初回出勤・初回退勤・勤務日区分）から 1 日分の残業時間を求める。
//! - 勤務日: 18:30 以降のみが対象。60 分未満は切り捨てて 0。
//! - 休日: 08:30 以降が対象。昼休み 11:30〜13:00 は常に除外。
//!
//! 集計は丸めずに保持し、小数 2 桁への丸めは表示時のみ行う。

use crate::errors::DomainError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 勤務日の残業開始時刻
pub const WORKDAY_OVERTIME_START: (u32, u32) = (18, 30);
/// 休日の勤務開始時刻（これより前の出勤は切り上げ）
pub const NON_WORKDAY_START: (u32, u32) = (8, 30);
/// 休日の昼休み開始
pub const LUNCH_START: (u32, u32) = (11, 30);
/// 休日の昼休み終了
pub const LUNCH_END: (u32, u32) = (13, 0);
/// 勤務日はこの分数に満たない残業を計上しない
pub const MIN_WORKDAY_OVERTIME_MINUTES: i64 = 60;

/// 勤務日区分（ポータルの `isWorkingDays`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayType {
    /// `"1"`
    Workday,
    /// `"0"`
    NonWorkday,
    #[default]
    Unknown,
}

impl Serialize for DayType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DayType::Workday => serializer.serialize_str("1"),
            DayType::NonWorkday => serializer.serialize_str("0"),
            DayType::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for DayType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(code)) => match code.trim() {
                "1" => DayType::Workday,
                "0" => DayType::NonWorkday,
                _ => DayType::Unknown,
            },
            Some(serde_json::Value::Number(code)) => match code.as_i64() {
                Some(1) => DayType::Workday,
                Some(0) => DayType::NonWorkday,
                _ => DayType::Unknown,
            },
            Some(serde_json::Value::Bool(true)) => DayType::Workday,
            Some(serde_json::Value::Bool(false)) => DayType::NonWorkday,
            _ => DayType::Unknown,
        })
    }
}

/// 1 日分の勤怠レコード
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "firstOnRgTime", default)]
    pub first_on_time: Option<String>,
    #[serde(rename = "firstOffRgTime", default)]
    pub first_off_time: Option<String>,
    #[serde(rename = "isWorkingDays", default)]
    pub day_type: DayType,
}

impl AttendanceRecord {
    pub fn workday(on: &str, off: &str) -> Self {
        Self {
            first_on_time: Some(on.to_string()),
            first_off_time: Some(off.to_string()),
            day_type: DayType::Workday,
        }
    }

    pub fn non_workday(on: &str, off: &str) -> Self {
        Self {
            first_on_time: Some(on.to_string()),
            first_off_time: Some(off.to_string()),
            day_type: DayType::NonWorkday,
        }
    }
}

/// ポータルの勤怠集計レスポンス `{ code, data }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub data: Vec<AttendanceRecord>,
}

/// 集計結果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OvertimeSummary {
    /// 残業時間（丸めなし）
    pub hours: f64,
    /// 集計対象になったレコード数
    pub counted: usize,
    /// 退勤なし・区分不明・時刻不正で除外したレコード数
    pub skipped: usize,
}

impl OvertimeSummary {
    /// 小数 2 桁で表示
    pub fn display(&self) -> String {
        format!("{:.2}", self.hours)
    }
}

/// `HH:MM` または `HH:MM:SS` を解釈する
pub fn parse_clock_time(text: &str) -> Result<NaiveTime, DomainError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| DomainError::InvalidTime(text.to_string()))
}

/// 1 日分のレコード群から残業時間を集計する
pub fn compute_overtime_hours(
    records: &[AttendanceRecord],
    reference_date: NaiveDate,
) -> OvertimeSummary {
    let mut summary = OvertimeSummary::default();

    for record in records {
        match record_overtime_minutes(record, reference_date) {
            Some(minutes) => {
                summary.hours += minutes as f64 / 60.0;
                summary.counted += 1;
            }
            None => summary.skipped += 1,
        }
    }

    summary
}

/// レスポンスの `code` が `"1"` の場合のみ集計する
pub fn compute_from_response(
    response: &AttendanceResponse,
    reference_date: NaiveDate,
) -> Option<OvertimeSummary> {
    (response.code == "1").then(|| compute_overtime_hours(&response.data, reference_date))
}

/// レコード 1 件分の残業分数。集計対象外なら `None`
fn record_overtime_minutes(record: &AttendanceRecord, date: NaiveDate) -> Option<i64> {
    let off_text = record
        .first_off_time
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())?;
    let off = date.and_time(parse_clock_time(off_text).ok()?);

    match record.day_type {
        DayType::Workday => Some(workday_minutes(date, off)),
        DayType::NonWorkday => {
            // 出勤時刻が無い・読めない場合は 08:30 出勤とみなす
            let on = record
                .first_on_time
                .as_deref()
                .and_then(|text| parse_clock_time(text).ok())
                .map(|time| date.and_time(time));
            Some(non_workday_minutes(date, on, off))
        }
        DayType::Unknown => None,
    }
}

fn workday_minutes(date: NaiveDate, off: NaiveDateTime) -> i64 {
    let start = at(date, WORKDAY_OVERTIME_START);
    if off <= start {
        return 0;
    }

    let minutes = (off - start).num_minutes();
    if minutes < MIN_WORKDAY_OVERTIME_MINUTES {
        0
    } else {
        minutes
    }
}

fn non_workday_minutes(date: NaiveDate, on: Option<NaiveDateTime>, off: NaiveDateTime) -> i64 {
    let day_start = at(date, NON_WORKDAY_START);
    let start = on.map_or(day_start, |on| on.max(day_start));
    if off <= start {
        return 0;
    }

    let lunch_start = at(date, LUNCH_START);
    let lunch_end = at(date, LUNCH_END);

    let morning = if start < lunch_start {
        (off.min(lunch_start) - start).num_minutes().max(0)
    } else {
        0
    };
    let afternoon = if off > lunch_end {
        (off - start.max(lunch_end)).num_minutes().max(0)
    } else {
        0
    };

    morning + afternoon
}

fn at(date: NaiveDate, (hour, minute): (u32, u32)) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
}
