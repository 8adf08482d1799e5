use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A time-of-day window within a single day, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Weekly working hours for one weekday: an enabled flag plus an ordered
/// set of disjoint windows. Weekday numbering is 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingDay {
    pub weekday: i64,
    pub enabled: bool,
    pub windows: Vec<TimeWindow>,
}

impl WorkingDay {
    pub fn for_weekday(weekday: Weekday) -> i64 {
        weekday.num_days_from_monday() as i64
    }
}

/// Raw row of the `working_hours` table (per-weekday enabled flag).
#[derive(Debug, Clone, FromRow)]
pub struct WorkingDayRow {
    pub weekday: i64,
    pub enabled: bool,
}

/// Raw row of the `working_hour_intervals` table.
#[derive(Debug, Clone, FromRow)]
pub struct WorkingIntervalRow {
    pub weekday: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}
