//! Application services layer.

pub mod error;
pub mod fanout;
pub mod feed;
pub mod microblog;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod retry;
pub mod subscriptions;
