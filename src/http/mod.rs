//! HTTP transport module for zuulscan

pub mod client;
pub use client::{HttpClient, HttpResponse, Transport};
