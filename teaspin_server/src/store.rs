use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use teaspin_core::{Category, Item, ItemId, ItemStore, ReelError, ReelResult};
use teaspin_shared::ItemRecord;

// schema lives in migrations/

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ItemRow> for ItemRecord {
    fn from(row: ItemRow) -> Self {
        ItemRecord {
            id: row.id,
            name: row.name,
            category: row.category,
            created_at: row.created_at,
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        let category = row.category.as_deref().and_then(Category::parse);
        Item::new(ItemId::from(row.id), row.name, category)
    }
}

/// The `items` table.
#[derive(Debug, Clone)]
pub struct SqliteItemStore {
    pool: SqlitePool,
}

impl SqliteItemStore {
    /// Wraps `pool`, bringing the schema up to date first.
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn rows(&self) -> sqlx::Result<Vec<ItemRow>> {
        sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, category, created_at FROM items ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn create(&self, name: &str, category: Option<&str>) -> sqlx::Result<ItemRow> {
        let row = sqlx::query_as::<_, ItemRow>(
            "INSERT INTO items (name, category, created_at) VALUES (?, ?, ?) RETURNING id, name, category, created_at",
        )
        .bind(name)
        .bind(category)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        debug!(id = row.id, name = %row.name, "item row inserted");
        Ok(row)
    }

    /// Returns false when no row had that id.
    pub async fn remove(&self, id: i64) -> sqlx::Result<bool> {
        let done = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn list(&self) -> ReelResult<Vec<Item>> {
        let rows = self.rows().await.map_err(ReelError::persistence)?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn insert(&self, name: &str, category: Option<Category>) -> ReelResult<Item> {
        let row = self
            .create(name, category.map(Category::as_str))
            .await
            .map_err(ReelError::persistence)?;
        Ok(row.into())
    }

    async fn delete(&self, id: &ItemId) -> ReelResult<()> {
        let key: i64 = id
            .as_str()
            .parse()
            .map_err(|_| ReelError::Persistence(format!("{id} is not a table id")))?;
        if self.remove(key).await.map_err(ReelError::persistence)? {
            Ok(())
        } else {
            Err(ReelError::Persistence(format!("no item with id {id}")))
        }
    }
}
