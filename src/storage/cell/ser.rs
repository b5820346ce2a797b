//! Word-stream serialization of arc cells.
//!
//! A cell is written as a sequence of 64-bit words:
//!
//! ```text
//! empty     [0, END]
//! simple    [1, head, pred, END]
//! array     [2, item*, END]    item = [1, head, pred] | [3, head, pred, pred.., TERM]
//! counter   [4, count, END]
//! ```
//!
//! `END` is all ones and `TERM` is zero; neither is a valid predicator of a
//! stored arc since stored arcs always carry a relationship. The byte envelope
//! produced by [`ArcCell::encode`] wraps the words with a header and a CRC32.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{ArcError, Result};
use crate::predicator::Predicator;
use crate::storage::array::{ArcArray, ArcEntry};
use crate::storage::multi::MultiArc;
use crate::types::checksum::stream_crc32;
use crate::types::{ArcDir, VertexId};

use super::{ArcCell, CellType};

/// Stream tag of an empty cell.
pub const TAG_NO_ARCS: u64 = 0;
/// Stream tag of a single arc, as a cell or as an array item.
pub const TAG_SIMPLE: u64 = 1;
/// Stream tag of an array cell.
pub const TAG_ARRAY: u64 = 2;
/// Stream tag of a multi-arc chain inside an array.
pub const TAG_MULTIPLE_ARC: u64 = 3;
/// Stream tag of a degree counter.
pub const TAG_DEGREE_COUNTER: u64 = 4;
/// Terminates a cell stream.
pub const WORD_END: u64 = u64::MAX;
/// Terminates a multi-arc chain inside an array stream.
pub const WORD_TERM: u64 = 0;

const ENVELOPE_MAGIC: &[u8; 4] = b"ARCV";
const ENVELOPE_VERSION: u8 = 1;
const ENVELOPE_HEADER: usize = 4 + 1 + 1 + 8 + 4;

fn corrupt(msg: impl Into<String>) -> ArcError {
    ArcError::Corruption(msg.into())
}

/// Where a stream is being read into: the cell side fixes the direction of
/// every stored predicator and degree counters only exist on in-cells.
struct StreamReader<'a, I> {
    words: &'a mut I,
    side: ArcDir,
    capacity: usize,
    resolve: &'a mut dyn FnMut(VertexId) -> bool,
}

impl<I: Iterator<Item = u64>> StreamReader<'_, I> {
    fn next_word(&mut self, what: &str) -> Result<u64> {
        self.words
            .next()
            .ok_or_else(|| corrupt(format!("stream truncated before {what}")))
    }

    fn pred(&mut self, word: u64) -> Result<Predicator> {
        let pred = Predicator::from_bits(word)?;
        if pred.rel.is_wildcard() || pred.modifier.is_wildcard() {
            return Err(corrupt(format!("predicator {word:#018x} is not a stored arc")));
        }
        if pred.dir != self.side {
            return Err(corrupt(format!(
                "predicator {word:#018x} points {} in a {} cell",
                pred.dir, self.side
            )));
        }
        Ok(pred)
    }

    fn next_pred(&mut self) -> Result<Predicator> {
        let word = self.next_word("predicator")?;
        self.pred(word)
    }

    fn head(&mut self) -> Result<VertexId> {
        let head = VertexId(self.next_word("head")?);
        if !(self.resolve)(head) {
            return Err(corrupt(format!("unknown vertex {head}")));
        }
        Ok(head)
    }

    fn end(&mut self) -> Result<()> {
        match self.next_word("end marker")? {
            WORD_END => Ok(()),
            other => Err(corrupt(format!("expected end marker, found {other:#018x}"))),
        }
    }

    fn cell(&mut self) -> Result<ArcCell> {
        let tag = self.next_word("cell tag")?;
        let cell = match tag {
            TAG_NO_ARCS => ArcCell::Empty,
            TAG_SIMPLE => {
                let head = self.head()?;
                let pred = self.next_pred()?;
                ArcCell::Simple { head, pred }
            }
            TAG_ARRAY => return self.array(),
            TAG_DEGREE_COUNTER if self.side == ArcDir::In => {
                ArcCell::DegreeCounter(self.next_word("degree")?)
            }
            TAG_DEGREE_COUNTER => {
                return Err(corrupt(format!("degree counter in a {} cell", self.side)));
            }
            _ => return Err(corrupt(format!("invalid cell tag {tag:#x}"))),
        };
        self.end()?;
        Ok(cell)
    }

    fn chain(&mut self, head: VertexId) -> Result<MultiArc> {
        let mut preds: Vec<Predicator> = Vec::new();
        loop {
            let word = self.next_word("multi-arc item")?;
            if word == WORD_TERM {
                break;
            }
            let pred = self.pred(word)?;
            if preds.iter().any(|p| p.key() == pred.key()) {
                return Err(corrupt(format!("duplicate key in multi-arc toward {head}")));
            }
            if preds.len() == self.capacity {
                return Err(corrupt(format!(
                    "multi-arc toward {head} exceeds capacity {}",
                    self.capacity
                )));
            }
            preds.push(pred);
        }
        if preds.len() < 2 {
            return Err(corrupt(format!("multi-arc toward {head} has {} arc(s)", preds.len())));
        }
        Ok(MultiArc::from_vec(preds))
    }

    fn array(&mut self) -> Result<ArcCell> {
        let mut array = ArcArray::default();
        loop {
            let tag = self.next_word("array item")?;
            let (head, entry) = match tag {
                WORD_END => break,
                TAG_SIMPLE => {
                    let head = self.head()?;
                    (head, ArcEntry::Simple(self.next_pred()?))
                }
                TAG_MULTIPLE_ARC => {
                    let head = self.head()?;
                    (head, ArcEntry::Multi(self.chain(head)?))
                }
                _ => return Err(corrupt(format!("invalid array item tag {tag:#x}"))),
            };
            if array.lookup(head).is_some() {
                return Err(corrupt(format!("duplicate neighbor {head} in array")));
            }
            array.insert(head, entry);
        }
        if array.degree() < 2 {
            return Err(corrupt(format!("array with degree {}", array.degree())));
        }
        Ok(ArcCell::Array(Box::new(array)))
    }
}

impl ArcCell {
    /// Appends the word stream of this cell to `out` and returns the number of
    /// words written.
    pub fn serialize(&self, out: &mut Vec<u64>) -> usize {
        let start = out.len();
        match self {
            ArcCell::Empty => out.push(TAG_NO_ARCS),
            ArcCell::Simple { head, pred } => {
                out.extend([TAG_SIMPLE, head.0, pred.to_bits()]);
            }
            ArcCell::Array(array) => {
                out.push(TAG_ARRAY);
                for (head, entry) in array.iter() {
                    match entry {
                        ArcEntry::Simple(pred) => {
                            out.extend([TAG_SIMPLE, head.0, pred.to_bits()]);
                        }
                        ArcEntry::Multi(multi) => {
                            out.extend([TAG_MULTIPLE_ARC, head.0]);
                            out.extend(multi.as_slice().iter().map(Predicator::to_bits));
                            out.push(WORD_TERM);
                        }
                    }
                }
            }
            ArcCell::DegreeCounter(count) => {
                out.extend([TAG_DEGREE_COUNTER, *count]);
            }
        }
        out.push(WORD_END);
        out.len() - start
    }

    /// Word stream of this cell.
    pub fn to_words(&self) -> Vec<u64> {
        let mut words = Vec::new();
        self.serialize(&mut words);
        words
    }

    /// Reads one `side` cell from `words`, consuming through its end marker.
    ///
    /// `resolve` is asked about every neighbor and must return false for
    /// vertices that do not exist. Chains longer than `capacity`, predicators
    /// pointing the wrong way and representations that are not minimal are
    /// reported as [`ArcError::Corruption`].
    pub fn deserialize(
        words: &mut impl Iterator<Item = u64>,
        side: ArcDir,
        capacity: usize,
        resolve: &mut dyn FnMut(VertexId) -> bool,
    ) -> Result<ArcCell> {
        if !side.is_cell_side() {
            return Err(ArcError::InvalidArgument(format!("{side} does not select a cell")));
        }
        StreamReader {
            words,
            side,
            capacity,
            resolve,
        }
        .cell()
    }

    /// Reads a `side` cell that must occupy all of `words`.
    pub fn from_words(
        words: &[u64],
        side: ArcDir,
        capacity: usize,
        resolve: &mut dyn FnMut(VertexId) -> bool,
    ) -> Result<ArcCell> {
        let mut iter = words.iter().copied();
        let cell = Self::deserialize(&mut iter, side, capacity, resolve)?;
        match iter.next() {
            None => Ok(cell),
            Some(_) => Err(corrupt("trailing words after cell")),
        }
    }

    /// Wraps the word stream of this cell in a checksummed byte envelope.
    pub fn encode(&self, owner: VertexId, side: ArcDir) -> Bytes {
        let words = self.to_words();
        let mut buf = BytesMut::with_capacity(ENVELOPE_HEADER + words.len() * 8 + 4);
        buf.put_slice(ENVELOPE_MAGIC);
        buf.put_u8(ENVELOPE_VERSION);
        buf.put_u8(side.bits() as u8);
        buf.put_u64(owner.0);
        buf.put_u32(words.len() as u32);
        for word in &words {
            buf.put_u64(*word);
        }
        let crc = stream_crc32(owner, side, &buf[ENVELOPE_HEADER..]);
        buf.put_u32(crc);
        buf.freeze()
    }

    /// Decodes an envelope written by [`ArcCell::encode`] for the same owner and side.
    pub fn decode(
        data: &[u8],
        owner: VertexId,
        side: ArcDir,
        capacity: usize,
        resolve: &mut dyn FnMut(VertexId) -> bool,
    ) -> Result<ArcCell> {
        if data.len() < ENVELOPE_HEADER + 4 {
            return Err(corrupt("envelope shorter than header"));
        }
        let mut buf = data;
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if &magic != ENVELOPE_MAGIC {
            return Err(corrupt("bad envelope magic"));
        }
        let version = buf.get_u8();
        if version != ENVELOPE_VERSION {
            return Err(corrupt(format!("unsupported envelope version {version}")));
        }
        let side_bits = buf.get_u8();
        if u64::from(side_bits) != side.bits() {
            return Err(corrupt(format!("envelope side {side_bits} does not match {side}")));
        }
        let stored_owner = buf.get_u64();
        if stored_owner != owner.0 {
            return Err(corrupt(format!("envelope owner v{stored_owner} does not match {owner}")));
        }
        let count = buf.get_u32() as usize;
        if buf.remaining() != count * 8 + 4 {
            return Err(corrupt(format!(
                "envelope holds {} bytes for {count} words",
                buf.remaining()
            )));
        }
        let payload = &data[ENVELOPE_HEADER..ENVELOPE_HEADER + count * 8];
        let expected = stream_crc32(owner, side, payload);
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(buf.get_u64());
        }
        let crc = buf.get_u32();
        if crc != expected {
            return Err(corrupt(format!(
                "checksum mismatch: stored {crc:#010x}, computed {expected:#010x}"
            )));
        }
        Self::from_words(&words, side, capacity, resolve)
    }

    /// One-line diagnostic rendering: degree, representation and the word
    /// stream in hex.
    pub fn debug_dump(&self) -> String {
        let mut out = format!("degree={} type={:?} words=[", self.degree(), self.cell_type());
        for (i, word) in self.to_words().iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&hex::encode(word.to_be_bytes()));
        }
        out.push(']');
        out
    }

    /// Serializable summary of the cell, arcs ordered by neighbor.
    pub fn snapshot(&self) -> CellSnapshot {
        let mut arcs = Vec::new();
        let multi = |head: VertexId| self.entry(head).is_some_and(ArcEntry::is_multi);
        self.for_each_arc(|head, pred| {
            arcs.push(ArcRecord {
                head: head.0,
                rel: pred.rel.0,
                modifier: pred.modifier.to_string(),
                value: pred.value.0,
                multi: multi(head),
            });
        });
        arcs.sort_by_key(|arc| (arc.head, arc.rel, arc.modifier.clone()));
        CellSnapshot {
            kind: self.cell_type(),
            degree: self.degree(),
            arcs,
        }
    }
}

/// JSON-friendly view of one stored arc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcRecord {
    /// Neighbor id.
    pub head: u64,
    /// Relationship code.
    pub rel: u16,
    /// Modifier name.
    pub modifier: String,
    /// Raw value bits.
    pub value: u32,
    /// Whether the arc sits in a multi-arc chain.
    pub multi: bool,
}

/// JSON-friendly view of a cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    /// Representation.
    pub kind: CellType,
    /// Number of logical arcs.
    pub degree: u64,
    /// Materialized arcs.
    pub arcs: Vec<ArcRecord>,
}

impl CellSnapshot {
    /// Renders the snapshot as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| ArcError::InvalidArgument(format!("snapshot: {err}")))
    }

    /// Short text form used in logs: `type/degree`.
    pub fn summary(&self) -> String {
        format!("{:?}/{}", self.kind, self.degree)
    }
}
