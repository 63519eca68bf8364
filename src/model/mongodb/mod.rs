mod bson;
mod collection;

pub use bson::{bson_datetime, optional_chrono_datetime, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
