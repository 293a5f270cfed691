pub mod api;
pub mod events;
pub mod models;
pub mod query;
pub mod realtime;
pub mod record;

pub use events::{ChangeEvent, ChangeKind, ChannelSpec};
pub use query::{Filter, FilterOp, Order, Query};
pub use record::{DecodeError, Record, decode, decode_all};
