//! The notification/waiting core: an append-only message log, a registry
//! of parked long-poll waiters, the room that coordinates the two, and the
//! periodic sweep that reclaims waiters left idle too long.

pub mod clock;
pub mod message_log;
pub mod room;
pub mod sweeper;
pub mod waiter_queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use message_log::MessageLog;
pub use room::{ChatRoom, MessagesTurn};
pub use sweeper::IdleSweeper;
pub use waiter_queue::{Delivery, Waiter, WaiterQueue};
