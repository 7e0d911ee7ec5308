use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Gender, MasterId};
use crate::domain::client::ClientId;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const BOOKED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub i64);

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "booked" => Some(Self::Booked),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Persisted reservation row. `date`/`time` keep their stored text so that a
/// malformed row can still be listed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub date: String,
    pub time: String,
    pub gender: Gender,
    pub master_id: MasterId,
    pub master_name: String,
    pub status: BookingStatus,
    pub user_id: Option<ClientId>,
    pub username: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub package_name: Option<String>,
    pub booked_at: String,
    pub source: String,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Booked
    }

    pub fn slot_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }

    pub fn slot_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, TIME_FORMAT).ok()
    }
}

/// Insert payload. The store assigns the id and sets status to booked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub date: String,
    pub time: String,
    pub gender: Gender,
    pub master_id: MasterId,
    pub master_name: String,
    pub user_id: ClientId,
    pub username: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub package_name: Option<String>,
    pub booked_at: String,
    pub source: String,
}

impl NewBooking {
    pub fn into_booking(self, id: BookingId) -> Booking {
        Booking {
            id,
            date: self.date,
            time: self.time,
            gender: self.gender,
            master_id: self.master_id,
            master_name: self.master_name,
            status: BookingStatus::Booked,
            user_id: Some(self.user_id),
            username: self.username,
            client_name: self.client_name,
            client_phone: self.client_phone,
            package_name: self.package_name,
            booked_at: self.booked_at,
            source: self.source,
        }
    }
}

/// Equality filter over booking rows; `None` fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<BookingStatus>,
    pub user_id: Option<ClientId>,
    pub master_id: Option<MasterId>,
    pub limit: Option<u32>,
}

impl BookingFilter {
    pub fn booked() -> Self {
        Self { status: Some(BookingStatus::Booked), ..Self::default() }
    }

    pub fn at(mut self, date: NaiveDate, time: NaiveTime) -> Self {
        self.date = Some(date.format(DATE_FORMAT).to_string());
        self.time = Some(time.format(TIME_FORMAT).to_string());
        self
    }

    pub fn for_user(mut self, user_id: ClientId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn for_master(mut self, master_id: MasterId) -> Self {
        self.master_id = Some(master_id);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.date.as_ref().map_or(true, |date| *date == booking.date)
            && self.time.as_ref().map_or(true, |time| *time == booking.time)
            && self.status.map_or(true, |status| status == booking.status)
            && self.user_id.map_or(true, |user| booking.user_id == Some(user))
            && self.master_id.as_ref().map_or(true, |master| *master == booking.master_id)
    }
}
