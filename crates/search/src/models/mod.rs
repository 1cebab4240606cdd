//! Domain models consumed by the search engine

mod channel;
mod post;
mod search_params;
mod user;

pub use channel::Channel;
pub use post::{Attachment, Post};
pub use search_params::{ChannelScope, SearchParams, UserSearchOptions};
pub use user::User;
