pub mod error;
pub mod geo;
pub mod http;
pub mod reports;
pub mod store;
pub mod users;

pub use error::ServiceError;
pub use geo::GeoPoint;
pub use store::{KvStore, SharedStore, StoreError};
