pub mod config;
pub mod pipeline;

pub use config::DecoderConfig;
pub use pipeline::decoding::{
    normalize_response, CanonicalAnalysis, DecodeError, DecodeReport, LegalExposure, RawResponse,
    RecommendedTest, ResponseNormalizer, ShapeKind, SourceTag,
};
