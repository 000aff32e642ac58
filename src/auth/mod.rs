//! Credentials and bearer tokens.
//!
//! - `password` - argon2id hashing of account passwords
//! - `token` - HS256 access/refresh JWTs
//! - `extractor` - the `CurrentUser` request extractor

pub mod extractor;
pub mod password;
pub mod token;

pub use extractor::CurrentUser;
pub use password::{PasswordError, PasswordService};
pub use token::{Claims, TokenError, TokenIssuer, TokenKind, TokenPair};
