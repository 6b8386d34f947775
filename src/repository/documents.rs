//! Conversion between models and stored document fields.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{GeoPoint, Item, ItemResponse, UserDataState, UserModel};
use crate::remote::{Document, Fields};

pub const LISTED_STATUS: &str = "Listed";
const PENDING_STATUS: &str = "Pending";
const UNKNOWN: &str = "Unknown";

/// Every field a listing document must carry to appear in list results.
#[derive(Deserialize)]
struct ItemRecord {
    name: String,
    description: String,
    images: Vec<String>,
    condition: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(rename = "listedDate")]
    listed_date: DateTime<Utc>,
    status: String,
    price: String,
    address: String,
    location: GeoPoint,
}

pub fn item_fields(item: &Item, image_urls: Vec<String>) -> Fields {
    let value = json!({
        "name": item.name,
        "description": item.description,
        "listedDate": item.listed_date.to_rfc3339(),
        "images": image_urls,
        "type": item.item_type,
        "condition": item.condition,
        "listedByKey": item.listed_by_key,
        "price": item.price,
        "status": LISTED_STATUS,
        "address": item.address,
        "location": {
            "latitude": item.location.latitude,
            "longitude": item.location.longitude,
        },
    });
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

/// Strict mapping used by list reads. Fails if any field is missing or has
/// the wrong shape.
pub fn item_from_document(doc: &Document) -> Result<ItemResponse, serde_json::Error> {
    let record: ItemRecord = serde_json::from_value(Value::Object(doc.fields.clone()))?;
    Ok(ItemResponse {
        id: doc.id.clone(),
        name: record.name,
        description: record.description,
        item_type: record.item_type,
        condition: record.condition,
        price: record.price,
        listed_by: None,
        location: record.location,
        address: record.address,
        listed_date: record.listed_date,
        images: record.images,
        status: record.status,
    })
}

/// Lenient mapping used by the single-item read: absent fields fall back
/// to placeholders instead of failing. A missing status reads as
/// `"Pending"`.
pub fn item_from_document_lenient(doc: &Document, listed_by: Option<UserModel>) -> ItemResponse {
    let text = |field: &str| doc.get_str(field).unwrap_or(UNKNOWN).to_string();

    let location = doc
        .fields
        .get("location")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let listed_date = doc
        .get_str("listedDate")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    ItemResponse {
        id: doc.id.clone(),
        name: text("name"),
        description: text("description"),
        item_type: text("type"),
        condition: text("condition"),
        price: text("price"),
        listed_by,
        location,
        address: text("address"),
        listed_date,
        images: string_list(doc.fields.get("images")),
        status: doc
            .get_str("status")
            .unwrap_or(PENDING_STATUS)
            .to_string(),
    }
}

pub fn owner_key(doc: &Document) -> Option<&str> {
    doc.get_str("listedByKey").filter(|key| !key.is_empty())
}

pub fn user_model_from_document(doc: &Document) -> UserModel {
    let text = |field: &str| doc.get_str(field).unwrap_or_default().to_string();
    UserModel {
        name: text("name"),
        email: text("email"),
        phone: text("phone"),
        profile_image: text("image"),
        address: text("address"),
        listed_items: string_list(doc.fields.get("listedItems")),
    }
}

pub fn user_state_from_document(doc: &Document) -> UserDataState {
    let text = |field: &str| doc.get_str(field).unwrap_or_default().to_string();
    UserDataState {
        user_id: doc.id.clone(),
        name: text("name"),
        email: text("email"),
        address: text("address"),
        image: doc
            .get_str("image")
            .filter(|url| !url.is_empty())
            .map(str::to_string),
    }
}

/// Appends `id` to the string array at `field` unless already present.
pub fn append_unique(fields: &mut Fields, field: &str, id: &str) -> bool {
    let mut list = string_list(fields.get(field));
    if list.iter().any(|existing| existing == id) {
        return false;
    }
    list.push(id.to_string());
    fields.insert(field.to_string(), json!(list));
    true
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
