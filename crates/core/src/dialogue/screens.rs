//! Prompt renderers for every conversation screen.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

use crate::calendar::{date_label, format_date, format_time, DatePage};
use crate::dialogue::prompt::{Prompt, PromptBuilder};
use crate::dialogue::states::Choice;
use crate::domain::booking::Booking;
use crate::domain::catalog::{Catalog, Gender, Master, MasterId, Package};

pub const BACK: &str = "← Назад";
pub const CANCEL: &str = "Отмена";

pub const SELECTION_MISSING: &str = "Ошибка: выбор устарел, начните запись заново";
pub const PACKAGE_MISSING: &str = "Ошибка: процедура не выбрана";
pub const MASTER_MISSING: &str = "Ошибка: мастер не выбран";
pub const MASTER_TAKEN: &str = "Этот мастер уже занят на выбранное время";
pub const SLOT_TAKEN: &str = "Это время уже заняли. Выберите другого мастера";
pub const BOOKING_FAILED: &str = "Ошибка при бронировании";
pub const BOOKING_DONE: &str = "Запись успешна!";
pub const CANCEL_FAILED: &str = "Ошибка при отмене";
pub const CANCEL_DONE: &str = "Запись отменена";
pub const CANCEL_TOO_LATE: &str = "Отмена невозможна (менее 2 часов до процедуры)";
pub const BOOKING_NOT_FOUND: &str = "Запись не найдена";
pub const ADMIN_ONLY: &str = "Доступно только администраторам";
pub const MASTER_NOT_FOUND: &str = "Мастер не найден";
pub const MASTER_SAVE_FAILED: &str = "Ошибка при сохранении мастера";

const PACKAGES_HEADER: &str = "Виды хиджамы и стоимость\n\nСтерильно по ГОСТ ISO 11135-2017";

const OTHER_OPTIONS: [(&str, &str); 3] = [
    ("Стать мастером", "https://hidjamaglobal.net"),
    ("Открыть центр HGN", "https://hgn-franchise.net"),
    ("Приложение HGN", "https://apps.apple.com/ru/app/hidjama-quantum/id6479644776"),
];

/// Where appointments take place; printed on confirmations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Venue {
    pub name: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingSummary {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub master_name: String,
    pub package_name: String,
    pub price: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MasterStats {
    pub upcoming: usize,
    pub completed: usize,
    pub profit: Decimal,
}

pub fn start_menu(is_admin: bool) -> Prompt {
    let builder = PromptBuilder::new("HGN · Доступ активирован\nРегистрация не требуется")
        .key("📍 Записаться на Хиджаму")
        .key("📋 Мои записи")
        .key("Другие возможности");
    if is_admin {
        builder.key("🔐 Админ панель").build()
    } else {
        builder.build()
    }
}

pub fn other_options() -> Prompt {
    OTHER_OPTIONS
        .iter()
        .fold(PromptBuilder::new("Другие возможности:"), |builder, (label, url)| {
            builder.row(|row| {
                row.url(*label, *url);
            })
        })
        .build()
}

pub fn package_menu(catalog: &Catalog) -> Prompt {
    package_menu_titled(catalog, "Выберите услугу:")
}

/// The package list as shown when stepping back from a package.
pub fn package_overview(catalog: &Catalog) -> Prompt {
    package_menu_titled(catalog, PACKAGES_HEADER)
}

fn package_menu_titled(catalog: &Catalog, title: &str) -> Prompt {
    catalog
        .menu_packages()
        .into_iter()
        .fold(PromptBuilder::new(title), |builder, package| {
            builder.button(format!("{} — {} ₽", package.name, package.price), Choice::Package(package.key.clone()))
        })
        .build()
}

pub fn package_details(package: &Package) -> Prompt {
    PromptBuilder::new(format!(
        "{}\n\n{}\n\nСтоимость: {} ₽\n\nВыберите пол:",
        package.name, package.description, package.price
    ))
    .row(|row| {
        row.choice(Gender::Male.label(), Choice::Gender(Gender::Male))
            .choice(Gender::Female.label(), Choice::Gender(Gender::Female));
    })
    .button(BACK, Choice::Back)
    .build()
}

pub fn age_gate() -> Prompt {
    PromptBuilder::new("Вам есть 18 лет?")
        .row(|row| {
            row.choice("Да, 18+", Choice::AgeConfirmed).choice("Нет", Choice::AgeDeclined);
        })
        .button(BACK, Choice::Back)
        .build()
}

pub fn underage() -> Prompt {
    Prompt::text("Услуга доступна только лицам старше 18 лет")
}

pub fn ask_name() -> Prompt {
    PromptBuilder::new("Прежде чем начать запись, укажите свое имя:").button(BACK, Choice::Back).build()
}

pub fn ask_phone() -> Prompt {
    PromptBuilder::new("Укажите ваш номер телефона:").button(BACK, Choice::Back).build()
}

pub fn date_picker(page: &DatePage) -> Prompt {
    let builder = page.dates.iter().fold(PromptBuilder::new("Выберите дату:"), |builder, date| {
        builder.button(date_label(*date), Choice::Date(*date))
    });
    builder
        .row(|row| {
            if page.has_previous {
                row.choice(BACK, Choice::DatePage(page.page - 1));
            }
            if page.has_next {
                row.choice("Далее →", Choice::DatePage(page.page + 1));
            }
        })
        .button("↩ К вводу телефона", Choice::Back)
        .build()
}

pub fn time_picker(date: NaiveDate, slots: &[NaiveTime]) -> Prompt {
    slots
        .chunks(3)
        .fold(PromptBuilder::new(format!("Доступное время на {}:", format_date(date))), |builder, chunk| {
            builder.row(|row| {
                for time in chunk {
                    row.choice(format_time(*time), Choice::Time(*time));
                }
            })
        })
        .button(BACK, Choice::Back)
        .build()
}

pub fn master_picker(date: NaiveDate, time: NaiveTime, free: &[Master]) -> Prompt {
    let mut title = format!("Выберите мастера на {} {}:", format_date(date), format_time(time));
    if free.is_empty() {
        title.push_str("\n\nНет свободных мастеров на это время");
    }
    free.iter()
        .fold(PromptBuilder::new(title), |builder, master| {
            builder.button(master.name.clone(), Choice::Master(master.id.clone()))
        })
        .button(BACK, Choice::Back)
        .build()
}

fn summary_lines(summary: &BookingSummary) -> String {
    format!(
        "📅 {}\n🕐 {}\n👨‍⚕️ {}",
        format_date(summary.date),
        format_time(summary.time),
        summary.master_name
    )
}

fn venue_lines(venue: &Venue) -> String {
    format!("Центр: {}\nАдрес: {}", venue.name, venue.address)
}

pub fn confirmation(summary: &BookingSummary, venue: &Venue) -> Prompt {
    PromptBuilder::new(format!(
        "Подтвердите запись:\n\n{}\n💼 {}\n💰 {} ₽\n\n{}",
        summary_lines(summary),
        summary.package_name,
        summary.price,
        venue_lines(venue)
    ))
    .button("✅ Подтвердить", Choice::ConfirmBooking)
    .button(BACK, Choice::Back)
    .build()
}

pub fn booked(summary: &BookingSummary, venue: &Venue) -> Prompt {
    Prompt::text(format!(
        "✅ Запись подтверждена!\n\n{}\n💼 {}\n\n{}",
        summary_lines(summary),
        summary.package_name,
        venue_lines(venue)
    ))
}

pub fn no_bookings() -> Prompt {
    Prompt::text("У вас нет активных записей")
}

pub fn booking_card(booking: &Booking, cancellable: bool) -> Prompt {
    let mut text = format!(
        "📋 Ваша запись:\n\n📅 {}\n🕐 {}\n👨‍⚕️ {}",
        booking.date, booking.time, booking.master_name
    );
    if let Some(package) = &booking.package_name {
        text.push_str(&format!("\n💼 {package}"));
    }
    if cancellable {
        text.push_str("\n\n⚠️ Отмена возможна за 2 часа до процедуры");
        PromptBuilder::new(text).button("❌ Отменить запись", Choice::CancelBooking(booking.id)).build()
    } else {
        text.push_str("\n\n⚠️ Отмена невозможна (менее 2 часов до процедуры)");
        Prompt::text(text)
    }
}

pub fn cancelled() -> Prompt {
    Prompt::text("✅ Запись отменена")
}

pub fn already_cancelled() -> Prompt {
    Prompt::text("Запись уже отменена")
}

pub fn admin_home() -> Prompt {
    PromptBuilder::new("Привет мастер!\nЭто админ панель")
        .row(|row| {
            row.choice("👨‍⚕️ Мастера", Choice::AdminMasters).choice("👨‍💻 Разработчик", Choice::AdminDeveloper);
        })
        .build()
}

pub fn masters_list(masters: &[Master]) -> Prompt {
    let title = if masters.is_empty() { "Мастеров пока нет" } else { "Мастера:" };
    masters
        .iter()
        .fold(PromptBuilder::new(title), |builder, master| {
            builder.button(format!("👨‍⚕️ {}", master.name), Choice::MasterProfile(master.id.clone()))
        })
        .button("➕ Добавить мастера", Choice::AddMasterStart)
        .button(BACK, Choice::AdminHome)
        .build()
}

pub fn master_login(master: &Master) -> Prompt {
    PromptBuilder::new(format!("Введите код доступа для мастера {}:", master.name))
        .button(CANCEL, Choice::AdminMasters)
        .build()
}

pub fn wrong_code() -> Prompt {
    Prompt::text("❌ Неверный код")
}

pub fn master_profile(master: &Master, stats: &MasterStats) -> Prompt {
    let contact = if master.contact.is_empty() { "—" } else { master.contact.as_str() };
    PromptBuilder::new(format!(
        "👨‍⚕️ {}\n📞 {}\n\nПредстоящие: {}\nВыполнено: {}\nПрибыль: {} ₽",
        master.name, contact, stats.upcoming, stats.completed, stats.profit
    ))
    .row(|row| {
        row.choice("📋 Записи", Choice::MasterBookings(master.id.clone()))
            .choice("💰 Прибыль", Choice::MasterProfit(master.id.clone()));
    })
    .button("🔔 Уведомления", Choice::MasterNotify(master.id.clone()))
    .button(BACK, Choice::AdminHome)
    .build()
}

pub fn master_bookings(master: &Master, bookings: &[Booking]) -> Prompt {
    let mut text = format!("📋 Записи мастера {}:\n", master.name);
    if bookings.is_empty() {
        text.push_str("\n(пока пусто)");
    }
    for booking in bookings {
        text.push_str(&format!(
            "\n📅 {} 🕐 {} · {} · {}",
            booking.date,
            booking.time,
            booking.client_name.as_deref().unwrap_or("—"),
            booking.package_name.as_deref().unwrap_or("—")
        ));
    }
    PromptBuilder::new(text).button(BACK, Choice::MasterBack(master.id.clone())).build()
}

pub fn master_profit(master: &Master, stats: &MasterStats) -> Prompt {
    PromptBuilder::new(format!(
        "💰 Прибыль мастера {}: {} ₽\nВыполнено: {}",
        master.name, stats.profit, stats.completed
    ))
    .button(BACK, Choice::MasterBack(master.id.clone()))
    .build()
}

pub fn master_notifications(master_id: &MasterId, enabled: bool) -> Prompt {
    let state = if enabled { "✅ Включены" } else { "❌ Отключены" };
    PromptBuilder::new(format!("🔔 Уведомления: {state}"))
        .button(BACK, Choice::MasterBack(master_id.clone()))
        .build()
}

pub fn ask_master_name() -> Prompt {
    PromptBuilder::new("Введите имя мастера:").button(CANCEL, Choice::AdminMasters).build()
}

pub fn ask_master_code() -> Prompt {
    admin_step("Введите код доступа:")
}

pub fn ask_master_contact() -> Prompt {
    admin_step("Введите контакт (или «-», если его нет):")
}

pub fn ask_master_gender() -> Prompt {
    PromptBuilder::new("Выберите пол:")
        .row(|row| {
            row.choice(Gender::Male.label(), Choice::MasterGender(Gender::Male))
                .choice(Gender::Female.label(), Choice::MasterGender(Gender::Female));
        })
        .row(|row| {
            row.choice(BACK, Choice::Back).choice(CANCEL, Choice::AdminMasters);
        })
        .build()
}

fn admin_step(text: &str) -> Prompt {
    PromptBuilder::new(text)
        .row(|row| {
            row.choice(BACK, Choice::Back).choice(CANCEL, Choice::AdminMasters);
        })
        .build()
}

pub fn master_added(name: &str) -> Prompt {
    PromptBuilder::new(format!("Мастер '{name}' добавлен!"))
        .button("👨‍⚕️ К списку мастеров", Choice::AdminMasters)
        .build()
}

pub fn developer(recent: Option<&[Booking]>) -> Prompt {
    let mut text = String::from("👨‍💻 Последние записи:\n");
    match recent {
        Some([]) => text.push_str("\n(пока пусто)"),
        Some(rows) => {
            for row in rows {
                text.push_str(&format!(
                    "\n#{} {} {} · {} · {}",
                    row.id,
                    row.date,
                    row.time,
                    row.master_name,
                    row.status.as_str()
                ));
            }
        }
        None => text.push_str("\n(недоступно)"),
    }
    let store = if recent.is_some() { "✅" } else { "❌" };
    text.push_str(&format!("\n\n🔌 Статус: {store} База данных, ✅ Telegram API"));
    PromptBuilder::new(text).button(BACK, Choice::AdminHome).build()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    use super::{booking_card, confirmation, date_picker, BookingSummary, Venue};
    use crate::calendar::DatePage;
    use crate::dialogue::prompt::Menu;
    use crate::dialogue::states::Choice;
    use crate::domain::booking::{Booking, BookingId, BookingStatus};
    use crate::domain::catalog::{Gender, MasterId};

    #[test]
    fn confirmation_lists_every_selection_and_the_venue() {
        let summary = BookingSummary {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).expect("date"),
            time: NaiveTime::from_hms_opt(14, 0, 0).expect("time"),
            master_name: "Anna".to_owned(),
            package_name: "Комплексная".to_owned(),
            price: Decimal::from(5000),
        };
        let venue = Venue { name: "HGN Москва".to_owned(), address: "Мичуринский проспект, 19к1".to_owned() };

        let prompt = confirmation(&summary, &venue);

        for expected in ["📅 2025-03-10", "🕐 14:00", "👨‍⚕️ Anna", "💼 Комплексная", "💰 5000 ₽", "Центр: HGN Москва"] {
            assert!(prompt.text.contains(expected), "missing {expected}");
        }
        assert_eq!(prompt.choices(), vec![&Choice::ConfirmBooking, &Choice::Back]);
    }

    #[test]
    fn middle_date_page_offers_both_directions() {
        let page = DatePage {
            page: 2,
            dates: vec![NaiveDate::from_ymd_opt(2025, 3, 11).expect("date")],
            has_previous: true,
            has_next: true,
        };

        let prompt = date_picker(&page);
        let choices = prompt.choices();

        assert!(choices.contains(&&Choice::DatePage(1)));
        assert!(choices.contains(&&Choice::DatePage(3)));
        assert!(choices.contains(&&Choice::Back));
    }

    #[test]
    fn cancel_button_only_while_cancellable() {
        let booking = Booking {
            id: BookingId(5),
            date: "2025-03-10".to_owned(),
            time: "14:00".to_owned(),
            gender: Gender::Male,
            master_id: MasterId("anna".to_owned()),
            master_name: "Anna".to_owned(),
            status: BookingStatus::Booked,
            user_id: None,
            username: None,
            client_name: None,
            client_phone: None,
            package_name: None,
            booked_at: String::new(),
            source: "bot".to_owned(),
        };

        assert_eq!(booking_card(&booking, true).choices(), vec![&Choice::CancelBooking(BookingId(5))]);
        let late = booking_card(&booking, false);
        assert!(matches!(late.menu, Menu::None));
        assert!(late.text.contains("Отмена невозможна"));
    }
}
