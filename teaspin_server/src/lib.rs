//! Remote item table for teaspin: an `items` table in SQLite behind a small
//! JSON API.

pub mod routes;
pub mod store;

pub use crate::routes::{router, AppState};
pub use crate::store::{ItemRow, SqliteItemStore};
