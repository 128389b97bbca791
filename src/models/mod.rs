pub mod token;
pub mod user;

pub use token::{Token, TokenPurpose};
pub use user::{Role, User};
