//! Online session services the client can be attached to

pub mod loopback;

pub use loopback::{LoopbackSession, LoopbackSessionService};
