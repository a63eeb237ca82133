pub mod model;
pub mod service;

pub use model::{Role, UpdateProfilePayload, User};
pub use service::*;
