pub mod llm;
pub mod messages;
pub mod nlu;
pub mod traits;
