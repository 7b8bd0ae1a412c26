//! Backtrace reports
//!
//! Turns resolver results into the frame lines of a crash or hang report:
//!
//! ```text
//! Thread 259 (main thread):
//! 0   libsystem_kernel.dylib              0x00000001a2b3c4d8 __pthread_kill + 8
//! 1   App                                 0x0000000100004f10 App::run + 112
//! ```
//!
//! Frames carry owned strings so a report outlives the image source it was
//! resolved against and can be serialized with serde.

pub mod backtrace;
pub mod stack_symbol;

pub use backtrace::Backtrace;
pub use stack_symbol::{image_name, symbolicate, StackSymbol, UNKNOWN_IMAGE};
