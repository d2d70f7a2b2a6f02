//! DIH device host runtime.
//!
//! Production glue around [`dih_core`]: the [`dih_core::Device`] stays a
//! Sans-IO state machine, and this crate supplies the pieces that touch the
//! outside world.
//!
//! # Components
//!
//! - [`SystemEnv`]: real monotonic clock and OS randomness
//! - [`ChannelTransport`]: non-blocking [`dih_core::Transport`] fed by tokio
//!   tasks that own a TCP stream ([`connect`])
//! - [`SampleSchedule`]: pacing for periodic sensor readings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod link;
mod sampler;
mod system_env;

pub use error::DeviceError;
pub use link::{ChannelTransport, Link, PeerEnd, channel_pair, connect};
pub use sampler::{SampleSchedule, Thermometer};
pub use system_env::SystemEnv;
