pub mod addrs;
pub mod diagnostics;
pub mod errors;
pub mod ids;
pub mod plan;
pub mod state;

pub use addrs::*;
pub use diagnostics::*;
pub use errors::*;
pub use ids::*;
pub use plan::*;
pub use state::*;
