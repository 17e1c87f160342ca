//! Instruction wire codec.
//!
//! # Wire Format
//! ```text
//! <len>.<value>(,<len>.<value>)*;
//!   │      │                     └─ terminator
//!   │      └─ exactly <len> bytes
//!   └─ ASCII decimal byte count
//! ```
//!
//! The first element is the opcode, the rest are positional arguments.
//!
//! # Design Decisions
//! - Parsing is strict: one instruction per buffer, nothing after `;`
//! - Lengths count bytes, and every value must be valid UTF-8
//! - Leading zeros are accepted on input and never produced on output
//! - No opcode or arity checks here (see `frame.rs`)

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One length-prefixed field of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Element(String);

impl Element {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length written in the element's prefix.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for Element {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Element {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Structural violation of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInstruction {
    #[error("instruction is empty")]
    Empty,

    #[error("expected a length digit at byte {offset}")]
    ExpectedDigit { offset: usize },

    #[error("length prefix at byte {offset} overflows")]
    LengthOverflow { offset: usize },

    #[error("expected '.' after length prefix at byte {offset}")]
    MissingDot { offset: usize },

    #[error("element at byte {offset} declares {declared} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("element value at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("expected ',' or ';' at byte {offset}")]
    MissingTerminator { offset: usize },

    #[error("{count} trailing bytes after terminator")]
    TrailingBytes { count: usize },
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Element,
    args: Vec<Element>,
}

impl Instruction {
    pub fn new(opcode: impl Into<Element>, args: Vec<Element>) -> Self {
        Self {
            opcode: opcode.into(),
            args,
        }
    }

    pub fn opcode(&self) -> &Element {
        &self.opcode
    }

    pub fn args(&self) -> &[Element] {
        &self.args
    }

    /// Decode exactly one instruction from `raw`.
    pub fn parse(raw: &[u8]) -> Result<Self, MalformedInstruction> {
        if raw.is_empty() {
            return Err(MalformedInstruction::Empty);
        }

        let mut elements = Vec::new();
        let mut pos = 0;
        loop {
            let (element, next) = read_element(raw, pos)?;
            elements.push(element);

            match raw.get(next) {
                Some(b',') => pos = next + 1,
                Some(b';') => {
                    let rest = raw.len() - next - 1;
                    if rest != 0 {
                        return Err(MalformedInstruction::TrailingBytes { count: rest });
                    }
                    break;
                }
                _ => return Err(MalformedInstruction::MissingTerminator { offset: next }),
            }
        }

        let mut elements = elements.into_iter();
        let opcode = elements.next().ok_or(MalformedInstruction::Empty)?;
        Ok(Self {
            opcode,
            args: elements.collect(),
        })
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

/// Read `<len>.<value>` starting at `start`; returns the element and the
/// offset of the byte following the value.
fn read_element(raw: &[u8], start: usize) -> Result<(Element, usize), MalformedInstruction> {
    let mut pos = start;
    let mut declared: usize = 0;
    while let Some(&b) = raw.get(pos) {
        if !b.is_ascii_digit() {
            break;
        }
        declared = declared
            .checked_mul(10)
            .and_then(|n| n.checked_add(usize::from(b - b'0')))
            .ok_or(MalformedInstruction::LengthOverflow { offset: start })?;
        pos += 1;
    }

    if pos == start {
        return Err(MalformedInstruction::ExpectedDigit { offset: start });
    }
    if raw.get(pos) != Some(&b'.') {
        return Err(MalformedInstruction::MissingDot { offset: pos });
    }

    let value_start = pos + 1;
    let available = raw.len() - value_start;
    if declared > available {
        return Err(MalformedInstruction::Truncated {
            offset: value_start,
            declared,
            available,
        });
    }

    let value_end = value_start + declared;
    let value = std::str::from_utf8(&raw[value_start..value_end])
        .map_err(|_| MalformedInstruction::InvalidUtf8 { offset: value_start })?;

    Ok((Element::new(value), value_end))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.opcode.len(), self.opcode)?;
        for arg in &self.args {
            write!(f, ",{}.{}", arg.len(), arg)?;
        }
        f.write_str(";")
    }
}

impl FromStr for Instruction {
    type Err = MalformedInstruction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_instruction() {
        let ins = Instruction::parse(b"3.key,5.10000,1.0;").unwrap();
        assert_eq!(ins.opcode(), &"key");
        assert_eq!(ins.args(), &[Element::from("10000"), Element::from("0")]);
    }

    #[test]
    fn test_parse_opcode_only() {
        let ins = Instruction::parse(b"3.nop;").unwrap();
        assert_eq!(ins.opcode(), &"nop");
        assert!(ins.args().is_empty());
    }

    #[test]
    fn test_empty_element_and_separators_in_value() {
        let ins = Instruction::parse(b"4.clip,0.,3.a,;;").unwrap();
        assert_eq!(ins.args(), &[Element::from(""), Element::from("a,;")]);
    }

    #[test]
    fn test_length_counts_bytes() {
        // "é" is two bytes in UTF-8
        let ins = Instruction::parse("4.name,2.é;".as_bytes()).unwrap();
        assert_eq!(ins.args()[0], "é");
        assert!(Instruction::parse("4.name,1.é;".as_bytes()).is_err());
    }

    #[test]
    fn test_leading_zeros_accepted_not_emitted() {
        let ins = Instruction::parse(b"03.key,005.10000,1.1;").unwrap();
        assert_eq!(ins.opcode(), &"key");
        assert_eq!(ins.encode(), b"3.key,5.10000,1.1;".to_vec());
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            Instruction::new("key", vec!["65307".into(), "1".into()]),
            Instruction::new("sync", vec!["31163115".into()]),
            Instruction::new("clipboard", vec!["line\nbreak, and ; stuff".into(), "".into()]),
            Instruction::new("", vec![]),
        ];
        for ins in cases {
            assert_eq!(Instruction::parse(&ins.encode()).unwrap(), ins);
        }
    }

    #[test]
    fn test_from_str() {
        let ins: Instruction = "5.mouse,3.100,4.1000,1.2;".parse().unwrap();
        assert_eq!(ins.args().len(), 3);
    }

    #[test]
    fn test_malformed_inputs() {
        let cases: [(&[u8], MalformedInstruction); 10] = [
            (b"", MalformedInstruction::Empty),
            (b"key;", MalformedInstruction::ExpectedDigit { offset: 0 }),
            (b"3key;", MalformedInstruction::MissingDot { offset: 1 }),
            (
                b"9.key;",
                MalformedInstruction::Truncated { offset: 2, declared: 9, available: 4 },
            ),
            (b"3.key", MalformedInstruction::MissingTerminator { offset: 5 }),
            (b"3.key.", MalformedInstruction::MissingTerminator { offset: 5 }),
            (b"3.key,;", MalformedInstruction::ExpectedDigit { offset: 6 }),
            (b"3.key;x", MalformedInstruction::TrailingBytes { count: 1 }),
            (
                b"99999999999999999999999.x;",
                MalformedInstruction::LengthOverflow { offset: 0 },
            ),
            (b"2.\xff\xfe;", MalformedInstruction::InvalidUtf8 { offset: 2 }),
        ];
        for (raw, expected) in cases {
            assert_eq!(Instruction::parse(raw).unwrap_err(), expected, "input {:?}", raw);
        }
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let raw = b"4.sync,8.31163115,8.31163115;";
        for end in 0..raw.len() {
            assert!(Instruction::parse(&raw[..end]).is_err(), "prefix of {} bytes parsed", end);
        }
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..2000 {
            let len = (seed % 24) as usize;
            let mut raw = Vec::with_capacity(len);
            for _ in 0..len {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                raw.push(b"0123456789.,;ak\xff"[(seed % 16) as usize]);
            }
            let _ = Instruction::parse(&raw);
        }
    }
}
