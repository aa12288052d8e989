pub mod auth;
pub mod engagement;
pub mod feed;
pub mod messages;
pub mod notifier;
pub mod posts;
pub mod social;
pub mod users;
