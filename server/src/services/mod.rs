pub mod ci_context;
pub mod extractor;
pub mod line_source;
pub mod parsers;
pub mod registry;

pub use ci_context::{ActParser, CiContextParser, PassthroughParser};
pub use extractor::{ExtractResult, Extractor};
pub use registry::ToolRegistry;
