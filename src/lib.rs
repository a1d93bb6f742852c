pub mod anilist;
pub mod app;
pub mod config;
pub mod discord;
pub mod error;
pub mod messages;
pub mod responder;
pub mod schedule;
pub mod tracker;
