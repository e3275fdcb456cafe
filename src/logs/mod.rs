// Logs module - Line selection, target colors and operator output

pub mod color;
pub mod filter;
pub mod sink;

pub use color::{color_for, TargetColor};
pub use filter::{FilterSpec, Verdict, SEPARATOR};
pub use sink::{MemorySink, OutputSink, TerminalSink};
