pub mod code;
pub mod compose;
pub mod crop;
pub mod export;
pub mod layout;
pub mod photo;

mod font_cache;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BadgeError {
    #[error("invalid source image: {0}")]
    InvalidSource(String),
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("render resources did not stabilize within the wait window")]
    RenderTimeout,
    #[error("contact payload not encodable: {0}")]
    Encoding(String),
    #[error("internal: {0}")]
    Internal(String),
}
