mod config;
mod types;

pub use config::open_data_store;
pub use types::{DataStore, PostgresDataStore, SqliteDataStore};
