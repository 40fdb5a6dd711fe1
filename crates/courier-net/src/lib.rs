//! # courier-net
//!
//! The wire layer of a Courier node: one TCP connection carries exactly one
//! encrypted envelope in one direction, with end-of-stream as the message
//! boundary (no length prefix, no multiplexing).  A reply, if any, is a
//! separate connection initiated by the receiver.
//!
//! [`Channel`] owns one such connection bound to one peer's key;
//! [`Transmitter`] implements the store-and-forward flooding algorithm on
//! top of it.

pub mod channel;
pub mod transmit;

mod error;

pub use channel::Channel;
pub use error::NetError;
pub use transmit::Transmitter;

/// Port a Courier daemon listens on unless a peer's address says otherwise.
pub const DEFAULT_PORT: u16 = 7667;
