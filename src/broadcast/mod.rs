pub mod frame;
pub mod hub;
pub mod socket;

pub use frame::Frame;
pub use hub::BroadcastHub;
