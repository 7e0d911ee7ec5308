use serde::{Deserialize, Serialize};

/// Messaging-platform user id. Stable per conversing user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl From<ClientId> for ChatId {
    // Private chats share the user's id.
    fn from(value: ClientId) -> Self {
        Self(value.0)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub chat_id: ChatId,
    pub username: Option<String>,
}

impl ClientProfile {
    pub fn new(id: ClientId, chat_id: ChatId, username: Option<String>) -> Self {
        Self { id, chat_id, username }
    }

    /// Handle used in staff notifications, e.g. `@ivan`.
    pub fn handle(&self) -> String {
        format!("@{}", self.username.as_deref().unwrap_or_default())
    }
}

/// Fixed set of privileged identities. Lookup is a linear scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminSet(Vec<ClientId>);

impl AdminSet {
    pub fn new(ids: impl IntoIterator<Item = ClientId>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.0.iter().any(|admin| *admin == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
