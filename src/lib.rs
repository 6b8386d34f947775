//! Data-sync layer of the sportswap equipment exchange client.
//!
//! Listings, profiles and accounts live in remote services reached
//! through the traits in [`remote`]. Liked item ids live on the device in
//! SQLite ([`db`]). [`repository`] reports every remote operation as a
//! [`resource::ResourceStream`], and [`service`] republishes those streams
//! to subscribers.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;
pub mod resource;
pub mod service;

pub use error::SwapError;
pub use resource::{Resource, ResourceStream};
