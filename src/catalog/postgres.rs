//! PostgreSQL backend implementation.

use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use super::schema::{POSTGRES_SCHEMA, POSTGRES_UPSERT_LAST_ID, SELECT_LAST_ID, SELECT_PHOTOS};
use super::{CatalogStore, PhotoRecord, StoreError};

pub struct PgStore {
    pool: Pool<PostgresConnectionManager<NoTls>>,
    location: String,
}

/// `photo.id` is a 32-bit column.
fn to_column_id(id: i64) -> Result<i32, StoreError> {
    i32::try_from(id).map_err(|_| StoreError::Corrupt(format!("photo id {id} out of range")))
}

impl PgStore {
    pub fn open(url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let config: postgres::Config = url.parse()?;
        let location = match (config.get_hosts().first(), config.get_dbname()) {
            (Some(postgres::config::Host::Tcp(host)), Some(db)) => format!("postgresql:{host}/{db}"),
            (_, Some(db)) => format!("postgresql:{db}"),
            _ => "postgresql".to_string(),
        };

        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        let mut client = pool.get()?;
        client.batch_execute(POSTGRES_SCHEMA)?;

        Ok(Self { pool, location })
    }
}

impl CatalogStore for PgStore {
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        let mut client = self.pool.get()?;
        let rows = client.query(SELECT_PHOTOS, &[])?;

        let mut photos = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i32 = row.try_get(0)?;
            photos.push(PhotoRecord {
                id: i64::from(id),
                image_path: row.try_get(1)?,
                caption: row.try_get(2)?,
            });
        }
        Ok(photos)
    }

    fn last_id(&self) -> Result<i64, StoreError> {
        let mut client = self.pool.get()?;
        match client.query_opt(SELECT_LAST_ID, &[])? {
            Some(row) => {
                let last_id: i32 = row.try_get(0)?;
                Ok(i64::from(last_id))
            }
            None => Ok(0),
        }
    }

    fn save(&self, photos: &[PhotoRecord], last_id: i64) -> Result<(), StoreError> {
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        tx.execute("DELETE FROM photo", &[])?;

        let insert = tx.prepare(
            "INSERT INTO photo (id, image_path, caption, sort_order) VALUES ($1, $2, $3, $4)",
        )?;
        for (position, photo) in photos.iter().enumerate() {
            let id = to_column_id(photo.id)?;
            let position = to_column_id(position as i64)?;
            tx.execute(&insert, &[&id, &photo.image_path, &photo.caption, &position])?;
        }

        let last_id = to_column_id(last_id)?;
        tx.execute(POSTGRES_UPSERT_LAST_ID, &[&last_id])?;
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_column_id() {
        assert_eq!(to_column_id(42).unwrap(), 42);
        assert!(matches!(
            to_column_id(i64::from(i32::MAX) + 1),
            Err(StoreError::Corrupt(_))
        ));
    }
}
