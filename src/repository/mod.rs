//! Remote reads and writes, each reported as a [`ResourceStream`](crate::resource::ResourceStream).

mod auth;
mod documents;
mod items;
mod profile;

pub use auth::AuthGateway;
pub use documents::LISTED_STATUS;
pub use items::ItemRepository;
pub use profile::{ProfileRepository, PROFILE_UPDATED};
