pub mod body_map;
pub mod chat;
pub mod coach;
pub mod config;
pub mod error;
pub mod exercise;
pub mod pose;

pub use error::{CoachError, Result};
