// Order execution module
pub mod executor;
pub mod price_window;
pub mod sizer;

pub use executor::{TickOutcome, TradeExecutor};
pub use price_window::PriceWindow;
