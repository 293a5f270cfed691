//! Live lists kept in step with the backend.
//!
//! A view opens a [`SyncView`] over a [`Source`]: one scoped bulk read
//! plus one realtime subscription on the same scope. Change events are
//! merged into a [`LiveList`] by id, and failures surface as [`Notice`]s
//! on the view's [`Notifier`].

pub mod live;
pub mod notify;
pub mod source;
pub mod view;

pub use live::{DeletePolicy, LiveList, MergeOutcome};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use source::{ScopedSubscription, Source};
pub use view::{SyncView, ViewStatus};
