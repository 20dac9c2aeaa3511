pub mod cli;
pub mod ollama;
