//! Outbound side of the gateway: the signed forwarding call and the
//! one-time commissioning handshake against the appliance's local API.

pub mod client;

pub use client::{commission, fetch_resource, ApplianceResponse};
