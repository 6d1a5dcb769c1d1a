pub mod access;
pub mod loader;
pub mod schema;

pub use access::{AccessControl, PermissionLevel};
pub use loader::{default_database_path, get_default_config_path, load_config};
pub use schema::Config;
