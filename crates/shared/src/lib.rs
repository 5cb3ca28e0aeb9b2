pub mod adapters;
pub mod error;
pub mod identity;
pub mod libsql;
pub mod logging;
pub mod primitives;
pub mod test_utils;
