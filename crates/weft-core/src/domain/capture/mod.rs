//! Capture ingestion: parsing, normalization and the pipeline itself

pub mod html;
pub mod parser;
pub mod service;

pub use html::{BasicHtmlToText, HtmlToText};
pub use parser::{parse_links, parse_tags, strip_tags};
pub use service::{CaptureService, CreateCaptureInput};
