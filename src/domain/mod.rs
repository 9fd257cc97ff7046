//! Domain types: validated primitives and pipeline entities.
//!
//! Everything in here is pure. Construction validates, derived values are
//! computed on demand, and no type mutates after it is built.

pub mod bookmaker;
pub mod market;
pub mod odds;
pub mod pick;
pub mod surebet;

pub use bookmaker::{Bookmaker, BookmakerRegistry, BookmakerRole};
pub use market::{Market, MarketKind};
pub use odds::{Odds, Profit};
pub use pick::Pick;
pub use surebet::Surebet;
