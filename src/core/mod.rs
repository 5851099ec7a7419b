pub mod endpoint;
pub mod frame;
pub mod message;
pub mod page;
pub mod preview;
pub mod reconnect;
pub mod types;

pub use endpoint::*;
pub use frame::*;
pub use message::*;
pub use page::*;
pub use preview::*;
pub use reconnect::*;
pub use types::*;
