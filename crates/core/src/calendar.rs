//! Date and time enumeration for the booking pickers.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};

use crate::domain::booking::{BOOKED_AT_FORMAT, DATE_FORMAT, TIME_FORMAT};

pub const WINDOW_DAYS: u32 = 30;
pub const DATES_PER_PAGE: usize = 5;
pub const FIRST_SLOT_HOUR: u32 = 9;
pub const LAST_SLOT_HOUR: u32 = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePage {
    pub page: usize,
    pub dates: Vec<NaiveDate>,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Rolling booking window anchored on "today" in a fixed UTC offset.
#[derive(Clone, Debug)]
pub struct Calendar {
    offset: FixedOffset,
    window_days: u32,
    page_size: usize,
    slots: Vec<NaiveTime>,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        let slots = (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .collect();
        Self { offset, window_days: WINDOW_DAYS, page_size: DATES_PER_PAGE, slots }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_now(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.offset)
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_now(now).date_naive()
    }

    pub fn window(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let today = self.today(now);
        (0..i64::from(self.window_days)).map(|day| today + Duration::days(day)).collect()
    }

    pub fn page_count(&self) -> usize {
        (self.window_days as usize).div_ceil(self.page_size)
    }

    /// Out-of-range pages clamp to the last one.
    pub fn page(&self, now: DateTime<Utc>, page: usize) -> DatePage {
        let page = page.min(self.page_count().saturating_sub(1));
        let window = self.window(now);
        let start = page * self.page_size;
        let end = (start + self.page_size).min(window.len());
        DatePage {
            page,
            dates: window.get(start..end).map(<[NaiveDate]>::to_vec).unwrap_or_default(),
            has_previous: page > 0,
            has_next: end < window.len(),
        }
    }

    pub fn contains_date(&self, now: DateTime<Utc>, date: NaiveDate) -> bool {
        let today = self.today(now);
        date >= today && date < today + Duration::days(i64::from(self.window_days))
    }

    /// Page holding `date`, or the first page when it left the window.
    pub fn page_of(&self, now: DateTime<Utc>, date: NaiveDate) -> usize {
        if !self.contains_date(now, date) {
            return 0;
        }
        let offset = (date - self.today(now)).num_days().max(0) as usize;
        offset / self.page_size
    }

    pub fn time_slots(&self) -> &[NaiveTime] {
        &self.slots
    }

    pub fn is_slot(&self, time: NaiveTime) -> bool {
        self.slots.contains(&time)
    }

    pub fn slot_start(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
        self.offset.from_local_datetime(&NaiveDateTime::new(date, time)).single()
    }

    pub fn booked_at(&self, now: DateTime<Utc>) -> String {
        self.local_now(now).format(BOOKED_AT_FORMAT).to_string()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).ok()
}

/// Picker label, e.g. `10.03 (Пн)`.
pub fn date_label(date: NaiveDate) -> String {
    format!("{} ({})", date.format("%d.%m"), weekday_short(date.weekday()))
}

fn weekday_short(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Пн",
        Weekday::Tue => "Вт",
        Weekday::Wed => "Ср",
        Weekday::Thu => "Чт",
        Weekday::Fri => "Пт",
        Weekday::Sat => "Сб",
        Weekday::Sun => "Вс",
    }
}

/// Parses `+HH:MM` / `-HH:MM` (or `Z`) into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match value.chars().next()? {
        '+' => (1, &value[1..]),
        '-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
