pub mod key;
pub mod schema;
