//! HTTP plumbing shared by the auth client and the request transport

pub mod client;

pub use client::{read_body, HttpClient, HttpClientBuilder};
