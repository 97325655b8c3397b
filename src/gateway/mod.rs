//! HTTP surface: gate, router, lifecycle and server

pub mod gate;
mod lifecycle;
mod rate_limit;
mod router;
mod server;

pub use gate::{Gate, gate_middleware};
pub use lifecycle::{Lifecycle, LifecycleChain};
pub use rate_limit::RateWindow;
pub use router::{AppState, create_router};
pub use server::Gateway;
