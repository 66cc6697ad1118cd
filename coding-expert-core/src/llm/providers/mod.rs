pub mod openai;
pub mod scripted;

pub use openai::OpenAIProvider;
pub use scripted::{RecordedRequest, ScriptedProvider};
