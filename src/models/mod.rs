pub mod pool;
pub mod rpc;
pub mod session;

pub use pool::*;
pub use rpc::*;
pub use session::*;
