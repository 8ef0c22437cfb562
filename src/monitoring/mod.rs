pub mod report;

pub use report::{CspViolationReport, LogSink, ReportPayload, ReportSink};
