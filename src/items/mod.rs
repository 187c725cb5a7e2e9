//! Item records: `{id, name, description}` in their own collection file.

pub mod catalog;

pub use catalog::{clamp_page, highest_item_id, Item, ItemCatalog, ItemPage};
