pub mod config;
pub mod directives;
pub mod policy;
pub mod variety;

pub use config::{report_path_of, CspConfig, CspConfigBuilder, CspOptions, ReportHandler};
pub use directives::{quote_source, DirectiveValue, FetchDirectives, SourceList};
pub use policy::RenderedPolicy;
pub use variety::Variety;
