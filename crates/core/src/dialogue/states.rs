use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::{format_date, format_time, parse_date, parse_time};
use crate::domain::booking::BookingId;
use crate::domain::catalog::{Gender, MasterId, PackageKey};

/// Client answers collected before the date picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub package: PackageKey,
    pub gender: Gender,
    pub client_name: String,
    pub phone: String,
}

/// Conversation position. Each variant carries exactly the answers valid at
/// that point; there is no variant for idle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    PackageSelected { package: PackageKey },
    GenderChosen { package: PackageKey, gender: Gender },
    AwaitingName { package: PackageKey, gender: Gender },
    AwaitingPhone { package: PackageKey, gender: Gender, client_name: String },
    ChoosingDate { draft: ClientDraft, page: usize },
    DateChosen { draft: ClientDraft, date: NaiveDate },
    TimeChosen { draft: ClientDraft, date: NaiveDate, time: NaiveTime },
    AwaitingConfirmation { draft: ClientDraft, date: NaiveDate, time: NaiveTime, master: MasterId },
    MasterLogin { master: MasterId },
    AddMasterName,
    AddMasterCode { name: String },
    AddMasterContact { name: String, code: String },
    AddMasterGender { name: String, code: String, contact: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    PackageSelected,
    GenderChosen,
    AwaitingName,
    AwaitingPhone,
    ChoosingDate,
    DateChosen,
    TimeChosen,
    AwaitingConfirmation,
    MasterLogin,
    AddMasterName,
    AddMasterCode,
    AddMasterContact,
    AddMasterGender,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PackageSelected => "package_selected",
            Self::GenderChosen => "gender_chosen",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingPhone => "awaiting_phone",
            Self::ChoosingDate => "choosing_date",
            Self::DateChosen => "date_chosen",
            Self::TimeChosen => "time_chosen",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::MasterLogin => "master_login",
            Self::AddMasterName => "add_master_name",
            Self::AddMasterCode => "add_master_code",
            Self::AddMasterContact => "add_master_contact",
            Self::AddMasterGender => "add_master_gender",
        }
    }
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::PackageSelected { .. } => StepKind::PackageSelected,
            Self::GenderChosen { .. } => StepKind::GenderChosen,
            Self::AwaitingName { .. } => StepKind::AwaitingName,
            Self::AwaitingPhone { .. } => StepKind::AwaitingPhone,
            Self::ChoosingDate { .. } => StepKind::ChoosingDate,
            Self::DateChosen { .. } => StepKind::DateChosen,
            Self::TimeChosen { .. } => StepKind::TimeChosen,
            Self::AwaitingConfirmation { .. } => StepKind::AwaitingConfirmation,
            Self::MasterLogin { .. } => StepKind::MasterLogin,
            Self::AddMasterName => StepKind::AddMasterName,
            Self::AddMasterCode { .. } => StepKind::AddMasterCode,
            Self::AddMasterContact { .. } => StepKind::AddMasterContact,
            Self::AddMasterGender { .. } => StepKind::AddMasterGender,
        }
    }

    /// Steps that take unconstrained free text.
    pub fn accepts_text(&self) -> bool {
        matches!(
            self,
            Self::AwaitingName { .. }
                | Self::AwaitingPhone { .. }
                | Self::MasterLogin { .. }
                | Self::AddMasterName
                | Self::AddMasterCode { .. }
                | Self::AddMasterContact { .. }
        )
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::MasterLogin { .. }
                | Self::AddMasterName
                | Self::AddMasterCode { .. }
                | Self::AddMasterContact { .. }
                | Self::AddMasterGender { .. }
        )
    }

    /// The immediately preceding step, rebuilt from this step's fields.
    /// `None` means back leads to idle.
    pub fn previous(&self) -> Option<Step> {
        match self.clone() {
            Self::PackageSelected { .. } | Self::MasterLogin { .. } | Self::AddMasterName => None,
            Self::GenderChosen { package, .. } => Some(Self::PackageSelected { package }),
            Self::AwaitingName { package, gender } => Some(Self::GenderChosen { package, gender }),
            Self::AwaitingPhone { package, gender, .. } => Some(Self::AwaitingName { package, gender }),
            Self::ChoosingDate { draft, .. } => Some(Self::AwaitingPhone {
                package: draft.package,
                gender: draft.gender,
                client_name: draft.client_name,
            }),
            // The date picker page is recomputed by the engine from the date.
            Self::DateChosen { draft, .. } => Some(Self::ChoosingDate { draft, page: 0 }),
            Self::TimeChosen { draft, date, .. } => Some(Self::DateChosen { draft, date }),
            Self::AwaitingConfirmation { draft, date, time, .. } => {
                Some(Self::TimeChosen { draft, date, time })
            }
            Self::AddMasterCode { .. } => Some(Self::AddMasterName),
            Self::AddMasterContact { name, .. } => Some(Self::AddMasterCode { name }),
            Self::AddMasterGender { name, code, .. } => Some(Self::AddMasterContact { name, code }),
        }
    }
}

/// A discrete menu choice. Encoded into the callback payload of a button.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    Package(PackageKey),
    Gender(Gender),
    AgeConfirmed,
    AgeDeclined,
    DatePage(usize),
    Date(NaiveDate),
    Time(NaiveTime),
    Master(MasterId),
    ConfirmBooking,
    Back,
    CancelBooking(BookingId),
    AdminMasters,
    AdminDeveloper,
    AdminHome,
    MasterProfile(MasterId),
    AddMasterStart,
    MasterGender(Gender),
    MasterBookings(MasterId),
    MasterProfit(MasterId),
    MasterNotify(MasterId),
    MasterBack(MasterId),
}

impl Choice {
    pub fn encode(&self) -> String {
        match self {
            Self::Package(key) => format!("package_{key}"),
            Self::Gender(gender) => format!("gender_{}", gender.as_str()),
            Self::AgeConfirmed => "age_yes".to_owned(),
            Self::AgeDeclined => "age_no".to_owned(),
            Self::DatePage(page) => format!("date_page_{page}"),
            Self::Date(date) => format!("date_{}", format_date(*date)),
            Self::Time(time) => format!("time_{}", format_time(*time)),
            Self::Master(id) => format!("pick_master_{id}"),
            Self::ConfirmBooking => "confirm_booking".to_owned(),
            Self::Back => "back".to_owned(),
            Self::CancelBooking(id) => format!("cancel_booking_{id}"),
            Self::AdminMasters => "admin_masters".to_owned(),
            Self::AdminDeveloper => "admin_developer".to_owned(),
            Self::AdminHome => "admin_home".to_owned(),
            Self::MasterProfile(id) => format!("master_profile_{id}"),
            Self::AddMasterStart => "add_master_start".to_owned(),
            Self::MasterGender(gender) => format!("gender_master_{}", gender.as_str()),
            Self::MasterBookings(id) => format!("master_bookings_{id}"),
            Self::MasterProfit(id) => format!("master_profit_{id}"),
            Self::MasterNotify(id) => format!("master_notify_{id}"),
            Self::MasterBack(id) => format!("master_back_{id}"),
        }
    }

    /// Longer prefixes are matched before the shorter ones they contain.
    pub fn parse(data: &str) -> Option<Self> {
        let fixed = match data {
            "age_yes" => Some(Self::AgeConfirmed),
            "age_no" => Some(Self::AgeDeclined),
            "confirm_booking" => Some(Self::ConfirmBooking),
            "back" => Some(Self::Back),
            "admin_masters" => Some(Self::AdminMasters),
            "admin_developer" => Some(Self::AdminDeveloper),
            "admin_home" => Some(Self::AdminHome),
            "add_master_start" => Some(Self::AddMasterStart),
            _ => None,
        };
        if fixed.is_some() {
            return fixed;
        }

        let master = |rest: &str| (!rest.is_empty()).then(|| MasterId(rest.to_owned()));

        if let Some(rest) = data.strip_prefix("package_") {
            return (!rest.is_empty()).then(|| Self::Package(PackageKey(rest.to_owned())));
        }
        if let Some(rest) = data.strip_prefix("gender_master_") {
            return Gender::parse(rest).map(Self::MasterGender);
        }
        if let Some(rest) = data.strip_prefix("gender_") {
            return Gender::parse(rest).map(Self::Gender);
        }
        if let Some(rest) = data.strip_prefix("date_page_") {
            return rest.parse().ok().map(Self::DatePage);
        }
        if let Some(rest) = data.strip_prefix("date_") {
            return parse_date(rest).map(Self::Date);
        }
        if let Some(rest) = data.strip_prefix("time_") {
            return parse_time(rest).map(Self::Time);
        }
        if let Some(rest) = data.strip_prefix("cancel_booking_") {
            return rest.parse().ok().map(|id| Self::CancelBooking(BookingId(id)));
        }
        if let Some(rest) = data.strip_prefix("master_profile_") {
            return master(rest).map(Self::MasterProfile);
        }
        if let Some(rest) = data.strip_prefix("master_bookings_") {
            return master(rest).map(Self::MasterBookings);
        }
        if let Some(rest) = data.strip_prefix("master_profit_") {
            return master(rest).map(Self::MasterProfit);
        }
        if let Some(rest) = data.strip_prefix("master_notify_") {
            return master(rest).map(Self::MasterNotify);
        }
        if let Some(rest) = data.strip_prefix("master_back_") {
            return master(rest).map(Self::MasterBack);
        }
        if let Some(rest) = data.strip_prefix("pick_master_") {
            return master(rest).map(Self::Master);
        }
        None
    }

    /// Choices that make sense without an open session.
    pub fn is_sessionless(&self) -> bool {
        matches!(
            self,
            Self::Package(_)
                | Self::CancelBooking(_)
                | Self::AdminMasters
                | Self::AdminDeveloper
                | Self::AdminHome
                | Self::MasterProfile(_)
                | Self::AddMasterStart
                | Self::MasterBookings(_)
                | Self::MasterProfit(_)
                | Self::MasterNotify(_)
                | Self::MasterBack(_)
        )
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::AdminMasters
                | Self::AdminDeveloper
                | Self::AdminHome
                | Self::MasterProfile(_)
                | Self::AddMasterStart
                | Self::MasterGender(_)
                | Self::MasterBookings(_)
                | Self::MasterProfit(_)
                | Self::MasterNotify(_)
                | Self::MasterBack(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogueEvent {
    Text(String),
    Choice(Choice),
    /// Callback payload that does not decode to a known choice.
    Unrecognized(String),
}

impl DialogueEvent {
    pub fn from_callback(data: &str) -> Self {
        Choice::parse(data).map_or_else(|| Self::Unrecognized(data.to_owned()), Self::Choice)
    }
}

/// Free-text commands honoured while no session is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleCommand {
    Start,
    Book,
    AdminPanel,
    OtherOptions,
    MyBookings,
}

const IDLE_KEYWORDS: [(&str, IdleCommand); 5] = [
    ("/start", IdleCommand::Start),
    ("записаться", IdleCommand::Book),
    ("админ панель", IdleCommand::AdminPanel),
    ("другие возможности", IdleCommand::OtherOptions),
    ("мои записи", IdleCommand::MyBookings),
];

impl IdleCommand {
    /// Case-insensitive keyword containment, first match wins.
    pub fn detect(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        IDLE_KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, command)| *command)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{Choice, ClientDraft, DialogueEvent, IdleCommand, Step, StepKind};
    use crate::domain::booking::BookingId;
    use crate::domain::catalog::{Gender, MasterId, PackageKey};

    fn draft() -> ClientDraft {
        ClientDraft {
            package: PackageKey("complex".to_owned()),
            gender: Gender::Male,
            client_name: "Ivan".to_owned(),
            phone: "+79990000000".to_owned(),
        }
    }

    #[test]
    fn every_choice_survives_its_callback_encoding() {
        let choices = vec![
            Choice::Package(PackageKey("complex".to_owned())),
            Choice::Gender(Gender::Female),
            Choice::AgeConfirmed,
            Choice::DatePage(3),
            Choice::Date(NaiveDate::from_ymd_opt(2025, 3, 10).expect("date")),
            Choice::Time(NaiveTime::from_hms_opt(14, 0, 0).expect("time")),
            Choice::Master(MasterId("anna".to_owned())),
            Choice::CancelBooking(BookingId(42)),
            Choice::MasterGender(Gender::Male),
            Choice::MasterProfile(MasterId("anna_2".to_owned())),
            Choice::MasterNotify(MasterId("olga".to_owned())),
            Choice::Back,
        ];

        for choice in choices {
            assert_eq!(Choice::parse(&choice.encode()), Some(choice.clone()), "{choice:?}");
        }
    }

    #[test]
    fn malformed_callbacks_are_unrecognized() {
        assert_eq!(
            DialogueEvent::from_callback("date_2025-13-40"),
            DialogueEvent::Unrecognized("date_2025-13-40".to_owned())
        );
        assert!(Choice::parse("gender_other").is_none());
        assert!(Choice::parse("package_").is_none());
        assert!(Choice::parse("").is_none());
    }

    #[test]
    fn idle_commands_match_by_containment_ignoring_case() {
        assert_eq!(IdleCommand::detect("/start"), Some(IdleCommand::Start));
        assert_eq!(IdleCommand::detect("📍 Записаться на Хиджаму"), Some(IdleCommand::Book));
        assert_eq!(IdleCommand::detect("🔐 АДМИН ПАНЕЛЬ"), Some(IdleCommand::AdminPanel));
        assert_eq!(IdleCommand::detect("📋 Мои записи"), Some(IdleCommand::MyBookings));
        assert_eq!(IdleCommand::detect("Другие возможности"), Some(IdleCommand::OtherOptions));
        assert_eq!(IdleCommand::detect("привет"), None);
    }

    #[test]
    fn back_keeps_earlier_answers() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).expect("date");
        let time = NaiveTime::from_hms_opt(14, 0, 0).expect("time");
        let confirming = Step::AwaitingConfirmation {
            draft: draft(),
            date,
            time,
            master: MasterId("anna".to_owned()),
        };

        let previous = confirming.previous().expect("time step");
        assert_eq!(previous, Step::TimeChosen { draft: draft(), date, time });

        let phone = Step::ChoosingDate { draft: draft(), page: 2 }.previous().expect("phone step");
        assert_eq!(phone.kind(), StepKind::AwaitingPhone);
        assert!(matches!(phone, Step::AwaitingPhone { ref client_name, .. } if client_name == "Ivan"));

        assert!(Step::PackageSelected { package: draft().package }.previous().is_none());
    }
}
