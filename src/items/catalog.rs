//! Generic item records with paginated listing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::store::{CollectionStore, IdSequence};

/// Page size when the caller gives none.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    pub total_items: usize,
    pub current_page: u64,
    pub total_pages: u64,
    pub items: Vec<Item>,
}

/// Highest id present, or 0 for an empty collection.
pub fn highest_item_id(items: &[Item]) -> u64 {
    items.iter().map(|item| item.id).max().unwrap_or(0)
}

/// Clamp a requested page and page size to `page >= 1`, `limit in [1, 30]`.
pub fn clamp_page(page: i64, limit: i64) -> (u64, u64) {
    let limit = limit.clamp(1, MAX_PAGE_LIMIT) as u64;
    let page = page.max(1) as u64;
    (page, limit)
}

#[derive(Clone)]
pub struct ItemCatalog {
    items: CollectionStore<Item>,
    ids: Arc<IdSequence>,
}

impl ItemCatalog {
    pub fn new(items: CollectionStore<Item>, ids: IdSequence) -> Self {
        Self {
            items,
            ids: Arc::new(ids),
        }
    }

    /// Append a new item. Ids come from the sequence, so a deleted id is
    /// never handed out again.
    pub fn create_item(&self, name: &str, description: &str) -> Result<Item, ServiceError> {
        let item = self.items.mutate(|items| {
            let item = Item {
                id: self.ids.advance(highest_item_id(items))?,
                name: name.to_owned(),
                description: description.to_owned(),
            };
            items.push(item.clone());
            Ok::<_, ServiceError>(item)
        })?;

        tracing::info!(id = item.id, "Item created");
        Ok(item)
    }

    /// One page of items in stored order.
    pub fn list_items(&self, page: i64, limit: i64) -> ItemPage {
        let (page, limit) = clamp_page(page, limit);
        let items = self.items.load_all();
        let total_items = items.len();

        let start = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
        let items: Vec<Item> = items
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        ItemPage {
            total_items,
            current_page: page,
            total_pages: (total_items as u64).div_ceil(limit),
            items,
        }
    }

    /// Replace the name and description of an existing item.
    pub fn update_item(&self, id: u64, name: &str, description: &str) -> Result<Item, ServiceError> {
        let item = self.items.mutate(|items| {
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| not_found(id))?;
            item.name = name.to_owned();
            item.description = description.to_owned();
            Ok::<_, ServiceError>(item.clone())
        })?;

        tracing::info!(id, "Item updated");
        Ok(item)
    }

    pub fn delete_item(&self, id: u64) -> Result<Item, ServiceError> {
        let removed = self.items.mutate(|items| {
            let index = items
                .iter()
                .position(|item| item.id == id)
                .ok_or_else(|| not_found(id))?;
            Ok::<_, ServiceError>(items.remove(index))
        })?;

        tracing::info!(id, "Item deleted");
        Ok(removed)
    }
}

fn not_found(id: u64) -> ServiceError {
    ServiceError::NotFound(format!("item {id} not found"))
}
