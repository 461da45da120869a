//! # jiffy-directory: contracts for the directory service and notification bus
//!
//! Neither the directory/metadata service nor the notification bus is
//! implemented here — both are external collaborators (spec.md §1). This
//! crate carries only the trait interfaces the core relies on
//! (`DirectoryClient`, `NotificationSink`), the `DataStatus` DTO the
//! directory hands back on resolve, and in-memory fakes used by tests and
//! by `jiffy-server`'s in-process default.

mod client;
mod fake;
mod notification;
mod status;

pub use client::{DirectoryClient, DirectoryError};
pub use fake::FakeDirectory;
pub use notification::{NotificationSink, NullSink, SubscriberId, SubscriptionMap};
pub use status::DataStatus;
