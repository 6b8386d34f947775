use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::UserModel;

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A listing being composed locally. Images are raw bytes until uploaded.
#[derive(Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub description: String,
    pub item_type: String,
    pub condition: String,
    /// Currency amount as typed by the user.
    pub price: String,
    pub listed_by_key: String,
    pub location: GeoPoint,
    pub address: String,
    pub listed_date: DateTime<Utc>,
    pub images: Vec<Vec<u8>>,
}

impl Default for Item {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            item_type: String::new(),
            condition: String::new(),
            price: String::new(),
            listed_by_key: String::new(),
            location: GeoPoint::default(),
            address: String::new(),
            listed_date: Utc::now(),
            images: Vec::new(),
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("item_type", &self.item_type)
            .field("condition", &self.condition)
            .field("price", &self.price)
            .field("listed_by_key", &self.listed_by_key)
            .field("location", &self.location)
            .field("address", &self.address)
            .field("listed_date", &self.listed_date)
            .field(
                "images",
                &self.images.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_location(mut self, location: GeoPoint, address: impl Into<String>) -> Self {
        self.location = location;
        self.address = address.into();
        self
    }

    pub fn with_images(mut self, images: Vec<Vec<u8>>) -> Self {
        self.images = images;
        self
    }

    /// Checks the fields a listing needs before it may be submitted.
    ///
    /// The listing service does not call this; front ends do, before
    /// `submit()`.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::MissingName);
        }
        if self.description.trim().is_empty() {
            return Err(DraftError::MissingDescription);
        }
        if self.item_type.trim().is_empty() {
            return Err(DraftError::MissingType);
        }
        if self.condition.trim().is_empty() {
            return Err(DraftError::MissingCondition);
        }
        if self.images.is_empty() {
            return Err(DraftError::MissingImages);
        }
        Ok(())
    }
}

/// Why a draft is not ready to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Please enter the item name")]
    MissingName,
    #[error("Please provide a description for the item")]
    MissingDescription,
    #[error("Please select the item type")]
    MissingType,
    #[error("Please select the item condition")]
    MissingCondition,
    #[error("Please add at least one image of the item")]
    MissingImages,
}

/// A stored listing as read back from the document store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub condition: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_by: Option<UserModel>,
    pub location: GeoPoint,
    pub address: String,
    pub listed_date: DateTime<Utc>,
    pub images: Vec<String>,
    pub status: String,
}

impl ItemResponse {
    /// Case-insensitive match of `query` against name, type and description.
    /// A blank query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self.item_type.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}

impl fmt::Display for ItemResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Type: {}", self.item_type)?;
        writeln!(f, "Condition: {}", self.condition)?;
        writeln!(f, "Price: {}", self.price)?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Listed: {}", self.listed_date.format("%Y-%m-%d"))?;
        if !self.address.is_empty() {
            writeln!(f, "Address: {}", self.address)?;
        }
        if let Some(owner) = &self.listed_by {
            writeln!(f, "Listed by: {}", owner.name)?;
        }

        if !self.description.is_empty() {
            writeln!(f, "\n{}", self.description)?;
        }

        if !self.images.is_empty() {
            writeln!(f, "\nImages:")?;
            for url in &self.images {
                writeln!(f, "  - {}", url)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> Item {
        Item::new("Tennis Racket")
            .with_description("Barely used")
            .with_type("Racquet Sports")
            .with_condition("Used")
            .with_price("15")
            .with_images(vec![vec![1, 2, 3]])
    }

    fn response(name: &str, item_type: &str, description: &str) -> ItemResponse {
        ItemResponse {
            id: "x".to_string(),
            name: name.to_string(),
            description: description.to_string(),
            item_type: item_type.to_string(),
            condition: "New".to_string(),
            price: "10".to_string(),
            listed_by: None,
            location: GeoPoint::default(),
            address: String::new(),
            listed_date: Utc::now(),
            images: vec![],
            status: "Listed".to_string(),
        }
    }

    #[test]
    fn test_complete_draft_is_valid() {
        assert_eq!(complete_draft().validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let draft = Item::default();
        assert_eq!(draft.validate(), Err(DraftError::MissingName));

        let mut draft = complete_draft();
        draft.condition = "  ".to_string();
        assert_eq!(draft.validate(), Err(DraftError::MissingCondition));

        let draft = complete_draft().with_images(vec![]);
        let err = draft.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please add at least one image of the item");
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let item = response("Carbon Road Bike", "Outdoor & Adventure", "Light frame");
        assert!(item.matches("road"));
        assert!(item.matches("OUTDOOR"));
        assert!(item.matches("frame"));
        assert!(!item.matches("racket"));
    }

    #[test]
    fn test_blank_query_matches_everything() {
        let item = response("Ball", "Ball Sports", "");
        assert!(item.matches(""));
        assert!(item.matches("   "));
    }

    #[test]
    fn test_debug_hides_image_bytes() {
        let rendered = format!("{:?}", complete_draft());
        assert!(rendered.contains("images: [3]"));
    }
}
