pub mod daemon;
pub mod identity;
pub mod messaging;
pub mod peers;
