//! Predicators: the fixed-width payload carried by every arc.
//!
//! A predicator packs a relationship code, a direction, a modifier and a
//! 32-bit value into one 64-bit word:
//!
//! ```text
//! 63      56 55    48 47          34 33 32 31                          0
//! [  eph   ][  mod   ][     rel      ][dir][            value            ]
//! ```
//!
//! The low five bits of the modifier byte hold the stored modifier type. In
//! probes the three high bits carry a value condition (LTE, GTE, both for EQ)
//! and a negation flag. The ephemeral byte is never stored.
//!
//! Arcs are identified within a neighbor entry by their [`ArcKey`], the pair of
//! relationship and stored modifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArcError, Result};
use crate::types::ArcDir;

mod accumulate;
mod matcher;

pub use accumulate::{AccumulatorKind, AccumulatorPolicy, Max, Replace, SaturatingSum};
pub use matcher::MatchKind;

/// Value used by expiring arcs that never expire.
pub const TIME_EXPIRES_NEVER: u32 = 4_102_444_800;

const VAL_MASK: u64 = 0x0000_0000_ffff_ffff;
const DIR_SHIFT: u32 = 32;
const REL_SHIFT: u32 = 34;
const REL_BITS: u64 = 0x3fff;
const MOD_SHIFT: u32 = 48;
const MOD_TYPE_MASK: u8 = 0x1f;
const MOD_NEG_BIT: u8 = 0x20;
const MOD_LTE_BIT: u8 = 0x40;
const MOD_GTE_BIT: u8 = 0x80;

/// 14-bit relationship code.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
pub struct RelId(pub u16);

impl RelId {
    /// No relationship. Never stored; doubles as the query wildcard.
    pub const NONE: RelId = RelId(0);
    /// Matches any relationship in probes.
    pub const WILDCARD: RelId = RelId(0);
    /// First code of the system range.
    pub const SYSTEM_START: RelId = RelId(0x100);
    /// Generic system relationship.
    pub const RELATED: RelId = RelId(0x101);
    /// System relationship for similarity links.
    pub const SIMILAR: RelId = RelId(0x102);
    /// First code of the user range.
    pub const USER_START: RelId = RelId(0x200);
    /// Last code of the user range.
    pub const USER_END: RelId = RelId(0x3eff);
    /// First code of the exception range.
    pub const EXCEPTION_START: RelId = RelId(0x3f00);
    /// Largest encodable code.
    pub const MAX: RelId = RelId(0x3fff);

    /// Returns true for the wildcard / none code.
    pub const fn is_wildcard(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the code lies in the system or user range.
    pub const fn is_assignable(self) -> bool {
        self.0 >= Self::SYSTEM_START.0 && self.0 <= Self::USER_END.0
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            f.write_str("*")
        } else {
            write!(f, "{:#06x}", self.0)
        }
    }
}

/// Category of a modifier, taken from bits 2-3 of its code.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ModifierClass {
    /// Static and system-generated values.
    System,
    /// Plain numeric values.
    Basic,
    /// Values combined on repeated insertion.
    Accumulating,
    /// Timestamps.
    Time,
}

/// Stored modifier type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Modifier {
    /// Matches any modifier in probes.
    #[default]
    Wildcard = 0x00,
    /// No value semantics.
    Static = 0x01,
    /// Similarity score.
    Similarity = 0x12,
    /// Distance.
    Distance = 0x13,
    /// Locality-sensitive hash bits.
    Lsh = 0x04,
    /// Signed integer.
    Integer = 0x05,
    /// Unsigned integer.
    Unsigned = 0x06,
    /// Float.
    Float = 0x17,
    /// Unsigned counter, accumulating.
    Counter = 0x08,
    /// Float accumulator.
    Accumulator = 0x19,
    /// Unsigned aggregate, accumulating.
    IntAggregator = 0x0a,
    /// Float aggregate, accumulating.
    FloatAggregator = 0x1b,
    /// Creation timestamp.
    TimeCreated = 0x0c,
    /// Modification timestamp.
    TimeModified = 0x0d,
    /// Expiration timestamp.
    TimeExpires = 0x0e,
}

impl Modifier {
    const ALL: [Modifier; 15] = [
        Modifier::Wildcard,
        Modifier::Static,
        Modifier::Similarity,
        Modifier::Distance,
        Modifier::Lsh,
        Modifier::Integer,
        Modifier::Unsigned,
        Modifier::Float,
        Modifier::Counter,
        Modifier::Accumulator,
        Modifier::IntAggregator,
        Modifier::FloatAggregator,
        Modifier::TimeCreated,
        Modifier::TimeModified,
        Modifier::TimeExpires,
    ];

    /// Five-bit code stored in the predicator word.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a stored modifier type.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.code() == code)
    }

    /// Returns true if the value is interpreted as `f32`.
    pub const fn is_float(self) -> bool {
        self.code() & 0x10 != 0
    }

    /// Class of this modifier.
    pub const fn class(self) -> ModifierClass {
        match self.code() & 0x0c {
            0x04 => ModifierClass::Basic,
            0x08 => ModifierClass::Accumulating,
            0x0c => ModifierClass::Time,
            _ => ModifierClass::System,
        }
    }

    /// Returns true if re-adding an arc combines values instead of replacing them.
    pub const fn is_accumulating(self) -> bool {
        matches!(self.class(), ModifierClass::Accumulating)
    }

    /// Returns true for the probe wildcard.
    pub const fn is_wildcard(self) -> bool {
        matches!(self, Modifier::Wildcard)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modifier::Wildcard => "*",
            Modifier::Static => "static",
            Modifier::Similarity => "sim",
            Modifier::Distance => "dist",
            Modifier::Lsh => "lsh",
            Modifier::Integer => "int",
            Modifier::Unsigned => "uint",
            Modifier::Float => "float",
            Modifier::Counter => "cnt",
            Modifier::Accumulator => "acc",
            Modifier::IntAggregator => "intagg",
            Modifier::FloatAggregator => "fltagg",
            Modifier::TimeCreated => "tmc",
            Modifier::TimeModified => "tmm",
            Modifier::TimeExpires => "tmx",
        };
        f.write_str(name)
    }
}

/// Comparison applied to the value field of a probe.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ValueCondition {
    /// Any value matches.
    #[default]
    Any,
    /// Stored value must be less than or equal to the probe value.
    Lte,
    /// Stored value must be greater than or equal to the probe value.
    Gte,
    /// Stored value must equal the probe value.
    Eq,
}

impl ValueCondition {
    const fn bits(self) -> u8 {
        match self {
            ValueCondition::Any => 0,
            ValueCondition::Lte => MOD_LTE_BIT,
            ValueCondition::Gte => MOD_GTE_BIT,
            ValueCondition::Eq => MOD_LTE_BIT | MOD_GTE_BIT,
        }
    }

    const fn from_bits(byte: u8) -> Self {
        match byte & (MOD_LTE_BIT | MOD_GTE_BIT) {
            MOD_LTE_BIT => ValueCondition::Lte,
            MOD_GTE_BIT => ValueCondition::Gte,
            0 => ValueCondition::Any,
            _ => ValueCondition::Eq,
        }
    }
}

/// Raw 32-bit predicator value, interpreted according to its modifier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct PredValue(pub u32);

impl PredValue {
    /// Signed integer value.
    pub const fn int(v: i32) -> Self {
        PredValue(v as u32)
    }

    /// Unsigned integer value.
    pub const fn uint(v: u32) -> Self {
        PredValue(v)
    }

    /// Float value.
    pub fn float(v: f32) -> Self {
        PredValue(v.to_bits())
    }

    /// Value as signed integer.
    pub const fn as_int(self) -> i32 {
        self.0 as i32
    }

    /// Value as unsigned integer.
    pub const fn as_uint(self) -> u32 {
        self.0
    }

    /// Value as float.
    pub fn as_float(self) -> f32 {
        f32::from_bits(self.0)
    }
}

/// Index key of an arc within a neighbor entry.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArcKey {
    /// Relationship code.
    pub rel: RelId,
    /// Stored modifier type.
    pub modifier: Modifier,
}

/// Relationship, direction, modifier and value of one arc, or a probe over arcs.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Predicator {
    /// Relationship code; wildcard in probes matching any relationship.
    pub rel: RelId,
    /// Which cell of the owning vertex the arc lives in.
    pub dir: ArcDir,
    /// Stored modifier type; wildcard in probes matching any modifier.
    pub modifier: Modifier,
    /// Value, interpreted per modifier.
    pub value: PredValue,
    /// Probe-only value condition.
    pub condition: ValueCondition,
    /// Probe-only inversion of the value condition.
    pub negate: bool,
}

impl Predicator {
    /// Creates a predicator with no direction and no value condition.
    pub fn new(rel: RelId, modifier: Modifier, value: PredValue) -> Self {
        Self {
            rel,
            modifier,
            value,
            ..Self::default()
        }
    }

    /// Static arc with relationship `rel`.
    pub fn stat(rel: u16) -> Self {
        Self::new(RelId(rel), Modifier::Static, PredValue::default())
    }

    /// Probe matching relationship `rel` with any modifier and value.
    pub fn relationship(rel: u16) -> Self {
        Self::new(RelId(rel), Modifier::Wildcard, PredValue::default())
    }

    /// Probe matching every arc.
    pub fn wildcard() -> Self {
        Self::default()
    }

    /// Arc with relationship `rel` that expires at `tmx` (seconds).
    pub fn expiring(rel: u16, tmx: u32) -> Self {
        Self::new(RelId(rel), Modifier::TimeExpires, PredValue::uint(tmx))
    }

    /// Returns a copy with direction `dir`.
    pub fn with_dir(mut self, dir: ArcDir) -> Self {
        self.dir = dir;
        self
    }

    /// Returns a copy carrying value condition `condition`.
    pub fn with_condition(mut self, condition: ValueCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Returns a copy with the value condition inverted.
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Index key of this predicator.
    pub fn key(&self) -> ArcKey {
        ArcKey {
            rel: self.rel,
            modifier: self.modifier,
        }
    }

    /// Returns true if the probe matches every arc.
    pub fn is_full_wildcard(&self) -> bool {
        self.rel.is_wildcard() && self.modifier.is_wildcard()
    }

    /// Returns true if both relationship and modifier are concrete.
    pub fn is_specific(&self) -> bool {
        !self.rel.is_wildcard() && !self.modifier.is_wildcard()
    }

    /// Returns true if the probe constrains the value.
    pub fn has_value_condition(&self) -> bool {
        self.condition != ValueCondition::Any
    }

    /// Storable form: probe bits cleared, direction set to the cell side.
    pub fn stored(&self, side: ArcDir) -> Self {
        Self {
            dir: side,
            condition: ValueCondition::Any,
            negate: false,
            ..*self
        }
    }

    /// Returns true if relationship, modifier and value are equal, ignoring direction.
    pub fn same_data(&self, other: &Predicator) -> bool {
        self.rel == other.rel && self.modifier == other.modifier && self.value == other.value
    }

    /// Expiration timestamp of a [`Modifier::TimeExpires`] arc.
    pub fn expires_at(&self) -> Option<u32> {
        match self.modifier {
            Modifier::TimeExpires => Some(self.value.as_uint()),
            _ => None,
        }
    }

    /// Returns true if this arc carries an expiration deadline at or before `now`.
    pub fn is_expired(&self, now: u32) -> bool {
        self.expires_at().is_some_and(|tmx| tmx <= now)
    }

    /// Encodes the predicator as a 64-bit word.
    pub fn to_bits(&self) -> u64 {
        let mod_byte = self.modifier.code()
            | self.condition.bits()
            | if self.negate { MOD_NEG_BIT } else { 0 };
        (self.value.0 as u64)
            | (self.dir.bits() << DIR_SHIFT)
            | ((self.rel.0 as u64 & REL_BITS) << REL_SHIFT)
            | ((mod_byte as u64) << MOD_SHIFT)
    }

    /// Decodes a 64-bit word produced by [`Predicator::to_bits`].
    pub fn from_bits(bits: u64) -> Result<Self> {
        let mod_byte = ((bits >> MOD_SHIFT) & 0xff) as u8;
        let modifier = Modifier::from_code(mod_byte & MOD_TYPE_MASK).ok_or_else(|| {
            ArcError::Corruption(format!("unknown modifier code {:#04x}", mod_byte & MOD_TYPE_MASK))
        })?;
        Ok(Self {
            rel: RelId(((bits >> REL_SHIFT) & REL_BITS) as u16),
            dir: ArcDir::from_bits(bits >> DIR_SHIFT),
            modifier,
            value: PredValue((bits & VAL_MASK) as u32),
            condition: ValueCondition::from_bits(mod_byte),
            negate: mod_byte & MOD_NEG_BIT != 0,
        })
    }
}

impl fmt::Display for Predicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} ", self.rel, self.modifier)?;
        if self.modifier.is_float() {
            write!(f, "{})", self.value.as_float())
        } else if self.modifier == Modifier::Integer {
            write!(f, "{})", self.value.as_int())
        } else {
            write!(f, "{})", self.value.as_uint())
        }
    }
}
