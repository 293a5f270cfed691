//! Headless view models for the chat room, task board and ticket queue,
//! plus the configuration and follow loop of the `prosync-tail` binary.

pub mod chat_room;
pub mod sources;
pub mod tail;
pub mod task_board;
pub mod ticket_queue;

pub use chat_room::ChatRoom;
pub use task_board::TaskBoard;
pub use ticket_queue::TicketQueue;
