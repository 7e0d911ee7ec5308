use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use slotbook_core::domain::catalog::{Gender, Master, MasterId, Package, PackageKey};
use slotbook_core::errors::StoreError;
use slotbook_core::store::CatalogStore;

use super::{decode, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogStore {
    pool: DbPool,
}

impl SqlCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_package(row: &sqlx::sqlite::SqliteRow) -> Result<Package, RepositoryError> {
    let price: String = decode(row.try_get("price"))?;
    Ok(Package {
        key: PackageKey(decode(row.try_get("key"))?),
        name: decode(row.try_get("name"))?,
        price: Decimal::from_str(price.trim())
            .map_err(|error| RepositoryError::Decode(format!("price `{price}`: {error}")))?,
        description: decode(row.try_get("description"))?,
    })
}

fn row_to_master(row: &sqlx::sqlite::SqliteRow) -> Result<Master, RepositoryError> {
    let gender: String = decode(row.try_get("gender"))?;
    let active: i64 = decode(row.try_get("active"))?;
    Ok(Master {
        id: MasterId(decode(row.try_get("id"))?),
        name: decode(row.try_get("name"))?,
        code: decode(row.try_get("code"))?,
        contact: decode(row.try_get("contact"))?,
        gender: Gender::parse(&gender)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown gender `{gender}`")))?,
        active: active != 0,
    })
}

#[async_trait::async_trait]
impl CatalogStore for SqlCatalogStore {
    async fn load_packages(&self) -> Result<Vec<Package>, StoreError> {
        let rows = sqlx::query("SELECT key, name, price, description FROM packages ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_package).collect::<Result<Vec<_>, _>>()?)
    }

    async fn load_masters(&self) -> Result<Vec<Master>, StoreError> {
        let rows = sqlx::query("SELECT id, name, code, contact, gender, active FROM masters ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_master).collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert_master(&self, master: Master) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO masters (id, name, code, contact, gender, active) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&master.id.0)
        .bind(&master.name)
        .bind(&master.code)
        .bind(&master.contact)
        .bind(master.gender.as_str())
        .bind(i64::from(master.active))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}
