//! vigil-push
//!
//! Kill-switch delivery fabric.
//!
//! A single hub tracks every live push socket as a `(device_id, sender)`
//! entry. One background relay subscribes to the kill-switch pub/sub channel
//! and fans each message out to the sockets whose device matches (or to all
//! sockets for untargeted messages). The relay's lifetime is tied to the
//! socket set: started when the first socket registers, stopped and joined
//! when the last one leaves.

pub mod hub;
pub mod message;
pub mod relay;

pub use hub::{PushHub, SocketId};
pub use message::target_device;
