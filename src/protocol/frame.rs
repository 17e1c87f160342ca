//! Typed frames extracted from instructions.
//!
//! # Responsibilities
//! - Recognize the opcodes the audit trail cares about (`key`, `mouse`)
//! - Enforce the argument count for a recognized opcode
//! - Classify an already-decoded instruction in a single pass
//!
//! # Design Decisions
//! - Wrong opcode is not an error (`Ok(None)`): callers probe freely
//! - Right opcode with wrong arity is always an error
//! - Codec errors pass through unchanged

use thiserror::Error;

use crate::protocol::instruction::{Element, Instruction, MalformedInstruction};

/// Errors produced while extracting a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The bytes are not an instruction at all.
    #[error(transparent)]
    Malformed(#[from] MalformedInstruction),

    /// Opcode recognized, payload has the wrong shape.
    #[error("'{opcode}' expects {expected} arguments, got {actual}")]
    InvalidArguments {
        opcode: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A keyboard event: keysym and pressed flag (`1` down, `0` up).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    pub key: Element,
    pub pressed: Element,
}

/// A pointer event: position and button mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseFrame {
    pub x: Element,
    pub y: Element,
    pub button: Element,
}

impl KeyFrame {
    pub const OPCODE: &'static str = "key";
    pub const ARITY: usize = 2;

    pub fn from_instruction(instruction: &Instruction) -> Result<Option<Self>, FrameError> {
        Ok(match_args(instruction, Self::OPCODE, Self::ARITY)?.map(|args| Self {
            key: args[0].clone(),
            pressed: args[1].clone(),
        }))
    }
}

impl MouseFrame {
    pub const OPCODE: &'static str = "mouse";
    pub const ARITY: usize = 3;

    pub fn from_instruction(instruction: &Instruction) -> Result<Option<Self>, FrameError> {
        Ok(match_args(instruction, Self::OPCODE, Self::ARITY)?.map(|args| Self {
            x: args[0].clone(),
            y: args[1].clone(),
            button: args[2].clone(),
        }))
    }
}

/// Returns the arguments when `instruction` carries `opcode` with exactly
/// `arity` arguments.
fn match_args<'a>(
    instruction: &'a Instruction,
    opcode: &'static str,
    arity: usize,
) -> Result<Option<&'a [Element]>, FrameError> {
    if instruction.opcode().as_str() != opcode {
        return Ok(None);
    }
    let args = instruction.args();
    if args.len() != arity {
        return Err(FrameError::InvalidArguments {
            opcode,
            expected: arity,
            actual: args.len(),
        });
    }
    Ok(Some(args))
}

/// Probes raw instruction bytes for one frame kind.
pub trait FrameFilter {
    type Frame;

    fn filter(&self, raw: &[u8]) -> Result<Option<Self::Frame>, FrameError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFrameFilter;

impl FrameFilter for KeyFrameFilter {
    type Frame = KeyFrame;

    fn filter(&self, raw: &[u8]) -> Result<Option<KeyFrame>, FrameError> {
        KeyFrame::from_instruction(&Instruction::parse(raw)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MouseFrameFilter;

impl FrameFilter for MouseFrameFilter {
    type Frame = MouseFrame;

    fn filter(&self, raw: &[u8]) -> Result<Option<MouseFrame>, FrameError> {
        MouseFrame::from_instruction(&Instruction::parse(raw)?)
    }
}

/// An instruction classified by opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Key(KeyFrame),
    Mouse(MouseFrame),
    Other(Instruction),
}

impl Frame {
    /// Decode the opcode once and build the matching variant.
    pub fn classify(instruction: Instruction) -> Result<Self, FrameError> {
        let frame = match instruction.opcode().as_str() {
            KeyFrame::OPCODE => KeyFrame::from_instruction(&instruction)?.map(Frame::Key),
            MouseFrame::OPCODE => MouseFrame::from_instruction(&instruction)?.map(Frame::Mouse),
            _ => None,
        };
        Ok(frame.unwrap_or(Frame::Other(instruction)))
    }

    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        Self::classify(Instruction::parse(raw)?)
    }
}
