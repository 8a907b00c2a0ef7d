//! Domain models shared across the simulator.

pub mod position;
pub mod price;
pub mod stats;
pub mod thought;

pub use position::{ClosedTrade, CloseReason, Position, Side};
pub use price::PriceQuote;
pub use stats::{EquityPoint, TradingStats};
pub use thought::{Narration, ThoughtEntry, ThoughtKind, ThoughtView, TradeSnapshot};
