// Topic extraction: trait-based abstraction over the language model.
//
// TopicExtractor defines the interface; OpenAiExtractor implements it over
// any OpenAI-compatible chat endpoint. parse.rs owns the fallback policy for
// replies that aren't valid JSON.

pub mod openai;
pub mod parse;
pub mod rate_limiter;
pub mod traits;
