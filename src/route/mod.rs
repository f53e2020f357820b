pub mod auth;
pub mod chat;
pub mod model;
pub mod post;
pub mod review;
pub mod user;
