//! Database query functions.
//!
//! Organized by store and domain.
//!
//! Config store:
//! - `user`: Accounts and batched author lookup
//! - `category`: Category rows, ordering, soft delete
//! - `moderation`: Moderator grants and bans
//! - `activity`: Append-only audit log
//!
//! Category partition:
//! - `post`: Posts, listings, counters
//! - `comment`: Comments
//! - `attachment`: Attachment blobs
//!
//! Callers normally go through [`crate::PartitionRegistry`] to obtain a
//! partition pool rather than opening one themselves.

mod activity;
mod attachment;
mod category;
mod comment;
mod moderation;
mod post;
mod user;

pub use activity::*;
pub use attachment::*;
pub use category::*;
pub use comment::*;
pub use moderation::*;
pub use post::*;
pub use user::*;
