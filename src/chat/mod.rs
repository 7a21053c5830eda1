//! Client for the coaching chat backend

pub mod client;
pub mod dto;
pub mod format;

pub use client::{fallback_reply, youtube_search_url, ChatClient, ChatTransport, HttpTransport};
pub use dto::{AnalyzeRequest, AnalyzeResponse, ChatContext, ChatRequest, ChatResponse, MuscleContext};
pub use format::{clean_model_text, pick_ui_text};
