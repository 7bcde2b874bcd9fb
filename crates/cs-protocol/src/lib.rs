pub mod frame;
pub mod hex;
pub mod isotp;
pub mod uds;

pub use frame::*;
pub use isotp::*;
pub use uds::*;
