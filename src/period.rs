use chrono::{Datelike, FixedOffset, NaiveDate, Utc};

/// Budget periods roll on the 3rd of each month: salary lands on the
/// 2nd/3rd, so a period runs from the 3rd through the 2nd of the next
/// month.
pub const PERIOD_ANCHOR_DAY: u32 = 3;

/// All period math is pinned to Jakarta time regardless of where the
/// process runs.
pub fn jakarta_offset() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).expect("static offset")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

fn month_anchor(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, PERIOD_ANCHOR_DAY).expect("anchor day always valid")
}

fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// The period containing `date`. On the 1st and 2nd the window shifts
/// back, starting on the 3rd of the previous month and ending on the
/// 2nd of the current one.
pub fn period_containing(date: NaiveDate) -> Period {
    let (start_y, start_m) = if date.day() < PERIOD_ANCHOR_DAY {
        prev_month(date.year(), date.month())
    } else {
        (date.year(), date.month())
    };
    let (end_y, end_m) = next_month(start_y, start_m);
    Period {
        start: month_anchor(start_y, start_m),
        end: month_anchor(end_y, end_m).pred_opt().expect("day 2 exists"),
    }
}

/// The period containing "today" in Jakarta time.
pub fn current_period() -> Period {
    let today = Utc::now().with_timezone(&jakarta_offset()).date_naive();
    period_containing(today)
}
