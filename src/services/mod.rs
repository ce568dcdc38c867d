pub mod diagnostics;
pub mod output_writer;
pub mod strategy_health;

pub use diagnostics::{DiagnosticSink, DiagnosticSnapshot, FileDiagnosticSink, MemoryDiagnosticSink};
pub use output_writer::{FileOutputWriter, OutputNaming, OutputWriter};
pub use strategy_health::StrategyHealthTracker;
