use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use teaspin_core::{Category, Item, ItemId, ItemStore, ReelError, ReelResult};
use teaspin_shared::{CreateItemRequest, ErrorBody, ItemList, ItemRecord};

/// Client for the teaspin table service.
pub struct HttpItemStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpItemStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn to_item(record: ItemRecord) -> Item {
    let category = record.category.as_deref().and_then(Category::parse);
    Item::new(ItemId::from(record.id), record.name, category)
}

/// Passes 2xx responses through; turns anything else into a persistence
/// error carrying the server's message.
async fn checked(resp: Response) -> ReelResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(ReelError::Persistence(format!("server said {status}: {message}")))
}

#[async_trait]
impl ItemStore for HttpItemStore {
    async fn list(&self) -> ReelResult<Vec<Item>> {
        let resp = self
            .client
            .get(self.url("/items"))
            .send()
            .await
            .map_err(ReelError::persistence)?;
        let list: ItemList = checked(resp)
            .await?
            .json()
            .await
            .map_err(ReelError::persistence)?;
        debug!(count = list.items.len(), "fetched items");
        Ok(list.items.into_iter().map(to_item).collect())
    }

    async fn insert(&self, name: &str, category: Option<Category>) -> ReelResult<Item> {
        let req = CreateItemRequest {
            name: name.to_string(),
            category: category.map(|c| c.as_str().to_string()),
        };
        let resp = self
            .client
            .post(self.url("/items"))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(ReelError::persistence)?;
        let record: ItemRecord = checked(resp)
            .await?
            .json()
            .await
            .map_err(ReelError::persistence)?;
        Ok(to_item(record))
    }

    async fn delete(&self, id: &ItemId) -> ReelResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/items/{id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ReelError::persistence)?;
        checked(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn records_map_to_items() {
        let item = to_item(ItemRecord {
            id: 4,
            name: "雪花冷露".into(),
            category: Some("cold_dew".into()),
            created_at: Utc::now(),
        });
        assert_eq!(item.id, ItemId::from(4));
        assert_eq!(item.category, Some(Category::ColdDew));
    }

    #[test]
    fn base_url_is_normalized() {
        let store = HttpItemStore::new("http://localhost:8080/", "k");
        assert_eq!(store.url("/items"), "http://localhost:8080/items");
    }
}
