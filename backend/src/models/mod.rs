pub mod location;
pub mod phase;
pub mod session;
pub mod window;

pub use location::*;
pub use phase::*;
pub use session::*;
pub use window::*;
