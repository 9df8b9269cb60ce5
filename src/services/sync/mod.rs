//! The mirroring engine: read both accounts, compute what is missing at the
//! destination, then apply it in the source's chronological order.

pub mod diff;
pub mod executor;
pub mod fetch;
pub mod manager;
pub mod state;
pub mod types;
