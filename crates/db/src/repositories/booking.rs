use sqlx::{QueryBuilder, Row, Sqlite};

use slotbook_core::domain::booking::{Booking, BookingFilter, BookingId, BookingStatus, NewBooking};
use slotbook_core::domain::catalog::{Gender, MasterId};
use slotbook_core::domain::client::ClientId;
use slotbook_core::errors::StoreError;
use slotbook_core::store::BookingStore;

use super::{decode, RepositoryError};
use crate::DbPool;

const SLOT_COLUMNS: &str = "SELECT id, date, time, gender, master_id, master_name, status, user_id,
        username, client_name, client_phone, package_name, booked_at, source
     FROM slots";

pub struct SqlBookingStore {
    pool: DbPool,
}

impl SqlBookingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking, RepositoryError> {
    let gender: String = decode(row.try_get("gender"))?;
    let status: String = decode(row.try_get("status"))?;
    let user_id: Option<i64> = decode(row.try_get("user_id"))?;

    Ok(Booking {
        id: BookingId(decode(row.try_get("id"))?),
        date: decode(row.try_get("date"))?,
        time: decode(row.try_get("time"))?,
        gender: Gender::parse(&gender)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown gender `{gender}`")))?,
        master_id: MasterId(decode(row.try_get("master_id"))?),
        master_name: decode(row.try_get("master_name"))?,
        status: BookingStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status}`")))?,
        user_id: user_id.map(ClientId),
        username: decode(row.try_get("username"))?,
        client_name: decode(row.try_get("client_name"))?,
        client_phone: decode(row.try_get("client_phone"))?,
        package_name: decode(row.try_get("package_name"))?,
        booked_at: decode(row.try_get("booked_at"))?,
        source: decode(row.try_get("source"))?,
    })
}

impl SqlBookingStore {
    async fn insert_row(&self, booking: &NewBooking) -> Result<BookingId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO slots (date, time, gender, master_id, master_name, status, user_id,
                                username, client_name, client_phone, package_name, booked_at, source)
             VALUES (?, ?, ?, ?, ?, 'booked', ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking.date)
        .bind(&booking.time)
        .bind(booking.gender.as_str())
        .bind(&booking.master_id.0)
        .bind(&booking.master_name)
        .bind(booking.user_id.0)
        .bind(&booking.username)
        .bind(&booking.client_name)
        .bind(&booking.client_phone)
        .bind(&booking.package_name)
        .bind(&booking.booked_at)
        .bind(&booking.source)
        .execute(&self.pool)
        .await?;

        Ok(BookingId(result.last_insert_rowid()))
    }

    async fn select(&self, filter: &BookingFilter) -> Result<Vec<Booking>, RepositoryError> {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(SLOT_COLUMNS);
        query_builder.push(" WHERE 1=1");

        if let Some(date) = &filter.date {
            query_builder.push(" AND date = ");
            query_builder.push_bind(date.clone());
        }
        if let Some(time) = &filter.time {
            query_builder.push(" AND time = ");
            query_builder.push_bind(time.clone());
        }
        if let Some(status) = filter.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status.as_str());
        }
        if let Some(user_id) = filter.user_id {
            query_builder.push(" AND user_id = ");
            query_builder.push_bind(user_id.0);
        }
        if let Some(master_id) = &filter.master_id {
            query_builder.push(" AND master_id = ");
            query_builder.push_bind(master_id.0.clone());
        }

        query_builder.push(" ORDER BY id DESC");
        if let Some(limit) = filter.limit {
            query_builder.push(" LIMIT ");
            query_builder.push_bind(i64::from(limit));
        }

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }
}

#[async_trait::async_trait]
impl BookingStore for SqlBookingStore {
    async fn insert(&self, booking: NewBooking) -> Result<BookingId, StoreError> {
        match self.insert_row(&booking).await {
            Ok(id) => Ok(id),
            Err(error) if error.is_unique_violation() => Err(StoreError::SlotTaken {
                date: booking.date,
                time: booking.time,
                master_id: booking.master_id,
            }),
            Err(error) => Err(error.into()),
        }
    }

    async fn find(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!("{SLOT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(ref row) => Ok(Some(row_to_booking(row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError> {
        Ok(self.select(&filter).await?)
    }

    async fn cancel(&self, id: BookingId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE slots
             SET status = 'cancelled', user_id = NULL, username = NULL,
                 client_name = NULL, client_phone = NULL
             WHERE id = ?",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("booking {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use slotbook_core::domain::booking::{BookingFilter, NewBooking};
    use slotbook_core::domain::catalog::{Gender, MasterId};
    use slotbook_core::domain::client::ClientId;
    use slotbook_core::errors::StoreError;
    use slotbook_core::store::BookingStore;

    use super::SqlBookingStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlBookingStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlBookingStore::new(pool)
    }

    fn new_booking(master: &str, user: i64) -> NewBooking {
        NewBooking {
            date: "2025-03-10".to_owned(),
            time: "14:00".to_owned(),
            gender: Gender::Male,
            master_id: MasterId(master.to_owned()),
            master_name: "Анна".to_owned(),
            user_id: ClientId(user),
            username: Some("ivan".to_owned()),
            client_name: Some("Иван".to_owned()),
            client_phone: Some("+79990000000".to_owned()),
            package_name: Some("Комплекс".to_owned()),
            booked_at: "2025-03-01 10:00:00".to_owned(),
            source: "bot".to_owned(),
        }
    }

    #[tokio::test]
    async fn unique_index_maps_to_slot_taken() {
        let store = store().await;
        store.insert(new_booking("anna", 1)).await.expect("first insert");

        let error = store.insert(new_booking("anna", 2)).await.expect_err("second insert must fail");
        assert!(matches!(error, StoreError::SlotTaken { ref master_id, .. } if master_id.0 == "anna"));

        store.insert(new_booking("anna_2", 2)).await.expect("same name, different id");
    }

    #[tokio::test]
    async fn cancel_of_missing_row_is_not_found() {
        let store = store().await;
        let error = store.cancel(slotbook_core::BookingId(42)).await.expect_err("nothing to cancel");
        assert!(matches!(error, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn filter_limit_returns_newest_rows() {
        let store = store().await;
        store.insert(new_booking("anna", 1)).await.expect("insert");
        let newest = store.insert(new_booking("oleg", 1)).await.expect("insert");

        let rows = store.list(BookingFilter::default().limit(1)).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, newest);
    }
}
