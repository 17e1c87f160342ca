//! Remote-desktop protocol subsystem.
//!
//! # Data Flow
//! ```text
//! raw bytes from the relay
//!     → instruction.rs (decode <len>.<value>,...;)
//!     → frame.rs (classify by opcode, check arity)
//!     → Frame::Key | Frame::Mouse | Frame::Other
//! ```

pub mod frame;
pub mod instruction;

pub use frame::{Frame, FrameError, FrameFilter, KeyFrame, KeyFrameFilter, MouseFrame, MouseFrameFilter};
pub use instruction::{Element, Instruction, MalformedInstruction};
