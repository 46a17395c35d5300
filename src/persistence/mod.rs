pub mod json_file;
pub mod store;

pub use self::json_file::{demo_tables, read_snapshot, write_snapshot};
pub use self::store::{NewItem, Store, Tables};
