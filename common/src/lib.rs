//! TickerFeed Common Types
//!
//! Currency codes, prices, timestamps and the bid/ask ticker shared by every
//! exchange adapter.

pub mod error;
pub mod monetary;
pub mod ticker;
pub mod time;

pub use error::*;
pub use monetary::*;
pub use ticker::*;
pub use time::*;
