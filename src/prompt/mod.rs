//! Prompt System - system prompt rendering with Handlebars

mod render;

pub use render::{PromptRenderer, SYSTEM_TEMPLATE};
