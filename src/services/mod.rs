//! Business logic services

pub mod naming;
pub mod patterns;
pub mod pipeline;
pub mod quality_evaluator;
pub mod quality_profiles;
pub mod regex_tester;
pub mod release_parser;
pub mod text_utils;

pub use pipeline::{NamingPipeline, NamingRequest, PipelineError, PipelineOutcome};
pub use quality_evaluator::{PriorityResult, QualityEvaluator};
pub use release_parser::{FileInfo, MediaKind, ParsedRelease, parse_file, parse_release};
