pub mod client;
pub mod peers;

pub use client::{BroadcastSummary, PeerClient, PeerError};
pub use peers::PeerRegistry;
