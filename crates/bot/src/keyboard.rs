//! Prompt menus rendered as Bot API `reply_markup` objects.

use serde::Serialize;

use slotbook_core::dialogue::{Button, Menu};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

impl From<&Button> for InlineKeyboardButton {
    fn from(button: &Button) -> Self {
        match button {
            Button::Choice { label, choice } => {
                Self { text: label.clone(), callback_data: Some(choice.encode()), url: None }
            }
            Button::Url { label, url } => {
                Self { text: label.clone(), callback_data: None, url: Some(url.clone()) }
            }
        }
    }
}

/// `None` for menus without buttons.
pub fn reply_markup(menu: &Menu) -> Option<ReplyMarkup> {
    match menu {
        Menu::None => None,
        Menu::Inline { rows } => Some(ReplyMarkup::Inline(InlineKeyboardMarkup {
            inline_keyboard: rows.iter().map(|row| row.iter().map(InlineKeyboardButton::from).collect()).collect(),
        })),
        Menu::Keyboard { rows } => Some(ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: rows
                .iter()
                .map(|row| row.iter().map(|text| KeyboardButton { text: text.clone() }).collect())
                .collect(),
            resize_keyboard: true,
        })),
    }
}

/// Inline-only markup; editing a message cannot attach a reply keyboard.
pub fn inline_markup(menu: &Menu) -> Option<InlineKeyboardMarkup> {
    match reply_markup(menu) {
        Some(ReplyMarkup::Inline(markup)) => Some(markup),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use slotbook_core::dialogue::{Choice, PromptBuilder};
    use slotbook_core::domain::catalog::Gender;

    use super::{inline_markup, reply_markup};

    #[test]
    fn inline_menus_carry_encoded_choices_and_urls() {
        let prompt = PromptBuilder::new("Выберите пол:")
            .row(|row| {
                row.choice("Мужчина", Choice::Gender(Gender::Male))
                    .choice("Женщина", Choice::Gender(Gender::Female));
            })
            .row(|row| {
                row.url("Сайт", "https://example.org");
            })
            .build();

        let value = serde_json::to_value(reply_markup(&prompt.menu)).expect("serialize");
        assert_eq!(
            value,
            json!({
                "inline_keyboard": [
                    [
                        {"text": "Мужчина", "callback_data": "gender_male"},
                        {"text": "Женщина", "callback_data": "gender_female"}
                    ],
                    [{"text": "Сайт", "url": "https://example.org"}]
                ]
            })
        );
    }

    #[test]
    fn reply_keyboards_resize_and_are_not_inline() {
        let prompt = PromptBuilder::new("menu").key("📍 Записаться на Хиджаму").key("📋 Мои записи").build();

        let value = serde_json::to_value(reply_markup(&prompt.menu)).expect("serialize");
        assert_eq!(value["resize_keyboard"], json!(true));
        assert_eq!(value["keyboard"][1][0]["text"], json!("📋 Мои записи"));
        assert!(inline_markup(&prompt.menu).is_none());
    }

    #[test]
    fn plain_prompts_have_no_markup() {
        let prompt = PromptBuilder::new("text only").build();
        assert!(reply_markup(&prompt.menu).is_none());
    }
}
