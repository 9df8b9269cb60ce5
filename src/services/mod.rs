pub mod cleanup;
pub mod order_check;
pub mod spotify;
pub mod stats;
pub mod sync;
pub mod watch;
