use serde::Serialize;

use super::item::ItemResponse;

/// A locally persisted "like". The item id is the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, sqlx::FromRow)]
pub struct LikedItemEntity {
    pub item_id: String,
}

impl LikedItemEntity {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
        }
    }
}

impl From<&ItemResponse> for LikedItemEntity {
    fn from(item: &ItemResponse) -> Self {
        Self::new(item.id.clone())
    }
}
