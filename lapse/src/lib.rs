//! Word Lapse Core - query orchestration and chart layout for Word Lapse
//!
//! This library drives searches against the Word Lapse API (how a word's
//! meaning drifted across years of biomedical literature), turns the raw
//! payload into a deterministic view-model, and computes the geometry the
//! charts draw from.
//!
//! Everything a renderer needs is reachable from `LapseStore` (live state)
//! and the pure `normalize`, `layout`, `force`, `geometry`, `color` and
//! `text` modules.

pub mod api;
pub mod color;
pub mod config;
pub mod force;
pub mod geometry;
pub mod interface;
pub mod layout;
pub mod models;
pub mod normalize;
mod store;
pub mod text;

pub use config::LapseConfig;
pub use interface::*;
pub use models::NormalizedResult;
pub use normalize::normalize;
pub use store::LapseStore;
