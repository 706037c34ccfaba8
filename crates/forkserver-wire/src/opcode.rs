//! Opcodes and resource request kinds.

use std::fmt;

use crate::error::{Result, WireError};

/// Reserved first byte of every resource request header.
pub const REQUEST_RESERVED: u8 = 0;

/// One-byte message tag.
///
/// `Error` and `Reply` tag answers; `Echo` and `Resource` tag requests.
/// `Echo` also acknowledges a successful echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Error,
    Reply,
    Echo,
    Resource,
}

impl Opcode {
    /// The signed protocol value of this opcode.
    pub const fn value(self) -> i8 {
        match self {
            Opcode::Error => -1,
            Opcode::Reply => 0,
            Opcode::Echo => 1,
            Opcode::Resource => 2,
        }
    }

    /// The byte written on the wire.
    pub const fn as_byte(self) -> u8 {
        self.value() as u8
    }

    /// Parse an opcode byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte as i8 {
            -1 => Ok(Opcode::Error),
            0 => Ok(Opcode::Reply),
            1 => Ok(Opcode::Echo),
            2 => Ok(Opcode::Resource),
            _ => Err(WireError::InvalidOpcode(byte)),
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Error => "ERROR",
            Opcode::Reply => "REPLY",
            Opcode::Echo => "ECHO",
            Opcode::Resource => "RESOURCE",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cardinality of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Exactly one body is expected (or none).
    Single,
    /// Any number of bodies, each preceded by a `true` presence flag.
    Multi,
}

impl ResourceKind {
    pub const fn as_byte(self) -> u8 {
        match self {
            ResourceKind::Single => 1,
            ResourceKind::Multi => 2,
        }
    }

    /// The two header bytes that follow the `Resource` opcode.
    pub const fn header(self) -> [u8; 2] {
        [REQUEST_RESERVED, self.as_byte()]
    }

    /// Parse the two header bytes of a resource request.
    pub fn from_header(reserved: u8, cardinality: u8) -> Result<Self> {
        match (reserved, cardinality) {
            (REQUEST_RESERVED, 1) => Ok(ResourceKind::Single),
            (REQUEST_RESERVED, 2) => Ok(ResourceKind::Multi),
            _ => Err(WireError::InvalidRequestHeader {
                reserved,
                cardinality,
            }),
        }
    }
}
