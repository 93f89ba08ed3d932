//! Quota-limited proxy from authenticated users to the completion provider.

mod gateway;
pub mod handlers;
mod usage;

pub use gateway::{bearer_token, ChatGateway, ChatReply};
pub use usage::UsageGate;
