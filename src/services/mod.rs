pub mod extractor;
pub mod llm_client;
pub mod office;
pub mod pdf_processor;
pub mod prompt;
pub mod response_parser;

pub use extractor::{extract, extract_document, ExtractionError};
pub use llm_client::{CompletionClient, HttpCompletionClient, LlmError};
pub use prompt::{PromptComposer, PromptTemplates};
pub use response_parser::{BraceSpanParser, ParseError, ResponseParser};
