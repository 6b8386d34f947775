use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner summary embedded in an item detail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserModel {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_image: String,
    pub address: String,
    pub listed_items: Vec<String>,
}

/// Profile as read from the `users` collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserDataState {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub address: String,
    /// Download URL of the profile image, if one was uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl fmt::Display for UserDataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Email: {}", self.email)?;
        writeln!(f, "Address: {}", self.address)?;
        if let Some(image) = &self.image {
            writeln!(f, "Image: {}", image)?;
        }
        Ok(())
    }
}

/// Profile edit draft. The image is raw bytes pending upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserData {
    pub name: String,
    pub address: String,
    pub image: Option<Vec<u8>>,
}

impl UserData {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }
}
