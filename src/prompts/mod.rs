//! Prompt templates for LLM calls.

pub mod article_review;

pub use article_review::*;
