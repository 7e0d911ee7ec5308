use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Menu order for the well-known packages; anything else follows, sorted by key.
pub const PACKAGE_MENU_ORDER: [&str; 5] = ["complex", "upper", "lower", "individual", "cosmetology"];

/// Bot API callback data is capped at 64 bytes and the longest master
/// callback prefix, `master_bookings_`, takes 16 of them.
pub const MAX_MASTER_ID_BYTES: usize = 48;
/// Slug bytes kept before a `_N` uniqueness suffix is appended.
const MASTER_SLUG_BYTES: usize = 40;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MasterId(pub String);

impl std::fmt::Display for PackageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for MasterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "Мужчина",
            Self::Female => "Женщина",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub key: PackageKey,
    pub name: String,
    pub price: Decimal,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Master {
    pub id: MasterId,
    pub name: String,
    pub code: String,
    pub contact: String,
    pub gender: Gender,
    pub active: bool,
}

/// Process-local snapshot of bookable packages and providers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    packages: BTreeMap<PackageKey, Package>,
    masters: BTreeMap<MasterId, Master>,
    /// Every stored id, inactive masters included; new ids must avoid all of them.
    known_ids: BTreeSet<MasterId>,
}

impl Catalog {
    /// Inactive masters are dropped from the bookable set but keep their ids reserved.
    pub fn new(packages: Vec<Package>, masters: Vec<Master>) -> Self {
        let known_ids = masters.iter().map(|m| m.id.clone()).collect();
        Self {
            packages: packages.into_iter().map(|p| (p.key.clone(), p)).collect(),
            masters: masters
                .into_iter()
                .filter(|m| m.active)
                .map(|m| (m.id.clone(), m))
                .collect(),
            known_ids,
        }
    }

    pub fn package(&self, key: &PackageKey) -> Option<&Package> {
        self.packages.get(key)
    }

    pub fn package_by_name(&self, name: &str) -> Option<&Package> {
        self.packages.values().find(|p| p.name == name)
    }

    pub fn menu_packages(&self) -> Vec<&Package> {
        let mut ordered: Vec<&Package> = PACKAGE_MENU_ORDER
            .iter()
            .filter_map(|key| self.packages.get(&PackageKey((*key).to_owned())))
            .collect();
        ordered.extend(
            self.packages.values().filter(|p| !PACKAGE_MENU_ORDER.contains(&p.key.0.as_str())),
        );
        ordered
    }

    pub fn master(&self, id: &MasterId) -> Option<&Master> {
        self.masters.get(id)
    }

    /// Active masters sorted by display name.
    pub fn active_masters(&self) -> Vec<Master> {
        let mut masters: Vec<Master> = self.masters.values().cloned().collect();
        masters.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        masters
    }

    /// Lowercased name with spaces replaced by `_`, cut to fit a callback
    /// payload, then suffixed until no stored master uses it.
    pub fn unused_master_id(&self, name: &str) -> MasterId {
        let base = master_slug(name);
        if !self.known_ids.contains(&MasterId(base.clone())) {
            return MasterId(base);
        }
        (2..)
            .map(|n| MasterId(format!("{base}_{n}")))
            .find(|candidate| !self.known_ids.contains(candidate))
            .unwrap_or(MasterId(base))
    }

    pub fn add_master(&mut self, master: Master) -> Result<(), DomainError> {
        if master.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("master name is empty".to_owned()));
        }
        if self.known_ids.contains(&master.id) {
            return Err(DomainError::DuplicateMaster(master.id));
        }
        self.known_ids.insert(master.id.clone());
        if master.active {
            self.masters.insert(master.id.clone(), master);
        }
        Ok(())
    }
}

fn master_slug(name: &str) -> String {
    let slug = name.trim().to_lowercase().replace(' ', "_");
    let mut end = slug.len().min(MASTER_SLUG_BYTES);
    while !slug.is_char_boundary(end) {
        end -= 1;
    }
    let slug = slug[..end].trim_end_matches('_');
    if slug.is_empty() {
        "master".to_owned()
    } else {
        slug.to_owned()
    }
}
