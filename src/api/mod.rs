//! Kibo REST API access

mod client;
mod request;

pub use client::KiboClient;
pub use request::ApiRequest;
