#![forbid(unsafe_code)]

mod client;
mod error;

pub use client::{HttpStatusClient, validate_target};
pub use error::{Error, Result};
