// Cross-chain orchestrator: entry points, inbound settlement, admin

pub mod fiber_router;
pub mod inbound;
mod swap;

pub use fiber_router::{BridgeLeg, DispatchReceipt, FiberRouter, SourceSwap, StargateSettings, StargateTarget};
pub use inbound::Settlement;
