//! DataBridge Server
//!
//! JSON-over-HTTP front end for [`databridge_backends::Bridge`].

pub mod api;
pub mod server;

pub use server::BridgeServer;
