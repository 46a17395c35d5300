pub mod bids;
pub mod core;
pub mod engine;
pub mod items;
pub mod outcomes;

pub use self::bids::*;
pub use self::core::*;
pub use self::engine::*;
pub use self::items::*;
pub use self::outcomes::*;
