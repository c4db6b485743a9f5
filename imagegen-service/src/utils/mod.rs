pub mod client_ip;

pub use client_ip::{rate_limit_identifier, FALLBACK_IP_ADDRESS};
