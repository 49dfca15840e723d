//! Adapters to external systems: the code host, the inference backend,
//! and the decoders that turn free-text model output into typed results.

pub mod decode;
pub mod inference;
pub mod source;

pub use decode::{
    CodeAnalysis, DiffAnalysis, SummaryOutcome, decode_code_analysis, decode_diff_analysis,
    decode_summary, extract_json,
};
pub use inference::{InferenceGateway, OllamaGateway};
pub use source::{GitHubGateway, SourceGateway, assemble_diff};
