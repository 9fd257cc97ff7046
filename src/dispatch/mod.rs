//! Outbound delivery: priority queue, bot clients, multi-bot dispatcher.

pub mod bot;
pub mod dispatcher;
pub mod queue;

pub use bot::{BotClient, SendOutcome};
pub use dispatcher::Dispatcher;
pub use queue::{Outbound, PriorityQueue};
