use std::str::FromStr;

use crate::errors::Error;

/// IPROTO map keys.
///
/// Describes only keys, used in this crate.
///
/// See details [here](https://github.com/tarantool/tarantool/blob/master/src/box/iproto_constants.h).
pub mod keys {
    pub const REQUEST_TYPE: u8 = 0x00;
    pub const RESPONSE_CODE: u8 = 0x00;
    pub const SYNC: u8 = 0x01;
    pub const SCHEMA_VERSION: u8 = 0x05;
    pub const SPACE_ID: u8 = 0x10;
    pub const INDEX_ID: u8 = 0x11;
    pub const LIMIT: u8 = 0x12;
    pub const OFFSET: u8 = 0x13;
    pub const ITERATOR: u8 = 0x14;
    pub const KEY: u8 = 0x20;
    pub const TUPLE: u8 = 0x21;
    pub const FUNCTION_NAME: u8 = 0x22;
    pub const USER_NAME: u8 = 0x23;
    pub const EXPR: u8 = 0x27;
    pub const OPS: u8 = 0x28;
    pub const DATA: u8 = 0x30;
    pub const ERROR: u8 = 0x31;
}

/// Response code ranges.
///
/// `0` means OK; codes with the high bit set carry a server error code
/// in the lower 15 bits.
pub mod response_codes {
    pub const OK: u32 = 0;
    pub const ERROR_RANGE_START: u32 = 0x8000;
    pub const ERROR_RANGE_END: u32 = 0xFFFF;
}

/// IPROTO command codes.
///
/// Describes only types, used in this crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Select = 1,
    Insert = 2,
    Replace = 3,
    Update = 4,
    Delete = 5,
    Auth = 7,
    Eval = 8,
    Upsert = 9,
    /// CALL request - returns arbitrary MessagePack
    Call = 10,
    Ping = 64,
}

/// Iterator, used in `SELECT` requests.
///
/// Besides the wire value, every iterator is recognized under two textual
/// aliases: a short word and a symbolic operator (e.g. `"gte"` and `">="`).
///
/// See details [here](https://www.tarantool.io/en/doc/latest/reference/reference_lua/box_index/pairs/).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum IteratorType {
    /// Key == x.
    #[default]
    Equal = 0,
    /// Key == x, in reverse order.
    ReversedEqual = 1,
    /// All tuples.
    All = 2,
    /// Key < x.
    LessThan = 3,
    /// Key <= x.
    LessThanOrEqual = 4,
    /// Key >= x.
    GreaterThanOrEqual = 5,
    /// Key > x.
    GreaterThan = 6,
    /// All bits of x are set in key.
    BitsAllSet = 7,
    /// At least one bit of x is set in key.
    BitsAnySet = 8,
    /// Key overlaps x (R-tree).
    RtreeOverlaps = 9,
    /// Nearest neighbor to x (R-tree).
    RtreeNeighbor = 10,
}

impl FromStr for IteratorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "eq" | "==" => Self::Equal,
            "reveq" | "==<" => Self::ReversedEqual,
            "all" | "*" => Self::All,
            "lt" | "<" => Self::LessThan,
            "lte" | "<=" => Self::LessThanOrEqual,
            "gte" | ">=" => Self::GreaterThanOrEqual,
            "gt" | ">" => Self::GreaterThan,
            "bitall" | "&=" => Self::BitsAllSet,
            "bitany" | "&" => Self::BitsAnySet,
            "overlaps" | "&&" => Self::RtreeOverlaps,
            "neighbor" | "<->" => Self::RtreeNeighbor,
            rest => return Err(Error::UnknownIterator(rest.into())),
        };
        Ok(value)
    }
}

impl TryFrom<u64> for IteratorType {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let iterator = match value {
            0 => Self::Equal,
            1 => Self::ReversedEqual,
            2 => Self::All,
            3 => Self::LessThan,
            4 => Self::LessThanOrEqual,
            5 => Self::GreaterThanOrEqual,
            6 => Self::GreaterThan,
            7 => Self::BitsAllSet,
            8 => Self::BitsAnySet,
            9 => Self::RtreeOverlaps,
            10 => Self::RtreeNeighbor,
            rest => return Err(Error::UnknownIterator(rest.to_string())),
        };
        Ok(iterator)
    }
}
