mod catalog;
mod item;
mod liked_item;
mod user;

pub use catalog::{parse_item_type, search, Condition, ITEM_TYPES};
pub use item::{DraftError, GeoPoint, Item, ItemResponse};
pub use liked_item::LikedItemEntity;
pub use user::{UserData, UserDataState, UserModel};
