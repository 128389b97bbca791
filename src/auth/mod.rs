pub mod extractor;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod session;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}
