//! Domain types: timeframes, bars, positions, intents.

pub mod bar;
pub mod intent;
pub mod position;
pub mod timeframe;

pub use bar::{Bar, MarketEvent, PriceEvent};
pub use intent::{OrderAction, OrderIntent, ReasonTag, TradeIntent};
pub use position::{Bracket, ClosedTrade, ExitReason, Position, PositionStatus, Side};
pub use timeframe::Timeframe;
