//! Core domain entities
//!
//! All entities are defined here. These are pure data structures with
//! read-side helpers - no I/O or external dependencies.

mod batch;
pub mod result;
pub mod transfer;
mod user;
pub mod view;

pub use batch::{IngestBatch, Membership};
pub use transfer::{TransferFriend, TransferUser};
pub use user::{Friend, FriendView, User, UserRecord};
