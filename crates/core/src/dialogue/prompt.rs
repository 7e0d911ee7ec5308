use serde::Serialize;

use crate::dialogue::states::Choice;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    Choice { label: String, choice: Choice },
    Url { label: String, url: String },
}

impl Button {
    pub fn choice(label: impl Into<String>, choice: Choice) -> Self {
        Self::Choice { label: label.into(), choice }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url { label: label.into(), url: url.into() }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Choice { label, .. } | Self::Url { label, .. } => label,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Menu {
    #[default]
    None,
    /// Buttons attached to the message itself.
    Inline { rows: Vec<Vec<Button>> },
    /// Persistent reply keyboard; pressing a key sends its label as text.
    Keyboard { rows: Vec<Vec<String>> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub text: String,
    pub menu: Menu,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), menu: Menu::None }
    }

    /// Every choice reachable from this prompt's inline menu.
    pub fn choices(&self) -> Vec<&Choice> {
        match &self.menu {
            Menu::Inline { rows } => rows
                .iter()
                .flatten()
                .filter_map(|button| match button {
                    Button::Choice { choice, .. } => Some(choice),
                    Button::Url { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub struct PromptBuilder {
    text: String,
    inline: Vec<Vec<Button>>,
    keyboard: Vec<Vec<String>>,
}

impl PromptBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), inline: Vec::new(), keyboard: Vec::new() }
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut row = RowBuilder::default();
        build(&mut row);
        if !row.buttons.is_empty() {
            self.inline.push(row.buttons);
        }
        self
    }

    pub fn button(self, label: impl Into<String>, choice: Choice) -> Self {
        self.row(|row| {
            row.choice(label, choice);
        })
    }

    pub fn key(mut self, label: impl Into<String>) -> Self {
        self.keyboard.push(vec![label.into()]);
        self
    }

    pub fn build(self) -> Prompt {
        let menu = if !self.inline.is_empty() {
            Menu::Inline { rows: self.inline }
        } else if !self.keyboard.is_empty() {
            Menu::Keyboard { rows: self.keyboard }
        } else {
            Menu::None
        };
        Prompt { text: self.text, menu }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<Button>,
}

impl RowBuilder {
    pub fn choice(&mut self, label: impl Into<String>, choice: Choice) -> &mut Self {
        self.buttons.push(Button::choice(label, choice));
        self
    }

    pub fn url(&mut self, label: impl Into<String>, url: impl Into<String>) -> &mut Self {
        self.buttons.push(Button::url(label, url));
        self
    }
}

/// Acknowledgement of a menu interaction: a transient toast, or a modal alert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub text: String,
    pub alert: bool,
}

impl Ack {
    pub fn toast(text: impl Into<String>) -> Self {
        Self { text: text.into(), alert: false }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self { text: text.into(), alert: true }
    }
}

/// What the transport should do in answer to one inbound event.
///
/// `primary` replaces the interacted message for choices and is sent as a
/// new message for text; `extra` prompts are always sent as new messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub primary: Option<Prompt>,
    pub extra: Vec<Prompt>,
    pub ack: Option<Ack>,
}

impl Reply {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn prompt(prompt: Prompt) -> Self {
        Self { primary: Some(prompt), ..Self::default() }
    }

    pub fn ack(ack: Ack) -> Self {
        Self { ack: Some(ack), ..Self::default() }
    }

    pub fn with_ack(mut self, ack: Ack) -> Self {
        self.ack = Some(ack);
        self
    }

    pub fn with_extra(mut self, extra: Vec<Prompt>) -> Self {
        self.extra = extra;
        self
    }

    /// Every prompt text in delivery order.
    pub fn texts(&self) -> Vec<&str> {
        self.primary.iter().chain(self.extra.iter()).map(|prompt| prompt.text.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Button, Menu, PromptBuilder};
    use crate::dialogue::states::Choice;

    #[test]
    fn builder_skips_empty_rows_and_prefers_inline_menus() {
        let prompt = PromptBuilder::new("Выберите:")
            .row(|_| {})
            .row(|row| {
                row.choice("Да", Choice::AgeConfirmed).choice("Нет", Choice::AgeDeclined);
            })
            .button("← Назад", Choice::Back)
            .build();

        let Menu::Inline { rows } = &prompt.menu else {
            panic!("expected inline menu");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1].label(), "Нет");
        assert_eq!(prompt.choices(), vec![&Choice::AgeConfirmed, &Choice::AgeDeclined, &Choice::Back]);
    }

    #[test]
    fn keyboard_prompt_has_no_choices() {
        let prompt = PromptBuilder::new("Меню").key("📋 Мои записи").key("Другие возможности").build();

        assert!(matches!(prompt.menu, Menu::Keyboard { ref rows } if rows.len() == 2));
        assert!(prompt.choices().is_empty());
    }

    #[test]
    fn url_buttons_are_not_choices() {
        let prompt = PromptBuilder::new("Ссылки")
            .row(|row| {
                row.url("Сайт", "https://example.org");
            })
            .build();

        assert!(prompt.choices().is_empty());
        assert!(matches!(
            &prompt.menu,
            Menu::Inline { rows } if matches!(rows[0][0], Button::Url { .. })
        ));
    }
}
