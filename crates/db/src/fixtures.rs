use tracing::info;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Default services offered by the booking menu, in menu order.
const DEFAULT_PACKAGES: &[SeedPackage] = &[
    SeedPackage {
        key: "complex",
        name: "Комплексная хиджама",
        price: "5000",
        description: "Полная процедура: спина, шея и плечевой пояс",
    },
    SeedPackage {
        key: "upper",
        name: "Верхняя часть тела",
        price: "3500",
        description: "Шея, плечи и верхняя часть спины",
    },
    SeedPackage {
        key: "lower",
        name: "Нижняя часть тела",
        price: "3500",
        description: "Поясница и ноги",
    },
    SeedPackage {
        key: "individual",
        name: "Индивидуальная программа",
        price: "6000",
        description: "Точки подбираются мастером после консультации",
    },
    SeedPackage {
        key: "cosmetology",
        name: "Косметологическая хиджама",
        price: "4000",
        description: "Процедура для лица",
    },
];

struct SeedPackage {
    key: &'static str,
    name: &'static str,
    price: &'static str,
    description: &'static str,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub packages_inserted: u64,
    pub packages_present: u64,
}

/// Inserts any default package that is missing. Existing rows, including
/// edited prices, are left untouched.
pub async fn seed_catalog(pool: &DbPool) -> Result<SeedReport, RepositoryError> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();

    for package in DEFAULT_PACKAGES {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO packages (key, name, price, description) VALUES (?, ?, ?, ?)",
        )
        .bind(package.key)
        .bind(package.name)
        .bind(package.price)
        .bind(package.description)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            report.packages_present += 1;
        } else {
            report.packages_inserted += 1;
        }
    }

    tx.commit().await?;
    info!(
        event_name = "db.catalog_seeded",
        inserted = report.packages_inserted,
        present = report.packages_present,
        "catalog seed applied"
    );
    Ok(report)
}

pub fn default_package_keys() -> impl Iterator<Item = &'static str> {
    DEFAULT_PACKAGES.iter().map(|package| package.key)
}

#[cfg(test)]
mod tests {
    use slotbook_core::domain::catalog::PACKAGE_MENU_ORDER;

    use super::{default_package_keys, seed_catalog};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = seed_catalog(&pool).await.expect("first seed");
        assert_eq!(first.packages_inserted, 5);

        let second = seed_catalog(&pool).await.expect("second seed");
        assert_eq!(second.packages_inserted, 0);
        assert_eq!(second.packages_present, 5);
    }

    #[test]
    fn defaults_follow_menu_order() {
        assert!(default_package_keys().eq(PACKAGE_MENU_ORDER.iter().copied()));
    }
}
