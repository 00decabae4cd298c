pub mod export;
pub mod illustration;
pub mod llm;
pub mod story;
pub mod workflow;
