// src/codec.rs

//! # Value Codec
//!
//! Composite values (list, set, sorted set) are stored as one self-describing
//! blob per key. There is no type tag: the shape of the bytes is the only
//! evidence of what a record holds, so decoders are strict and report exactly
//! how a buffer failed to match.
//!
//! Layouts (all integers big-endian):
//!
//! ```text
//! list / set : [u64 count] ( [u32 len] [bytes] ) * count
//! sorted set : [u64 count] ( [f64 score] [u32 len] [bytes] ) * count
//! counter    : decimal ASCII of an i64
//! ```
//!
//! Sorted sets are kept ordered by `(score asc, member asc)`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;

const COUNT_SIZE: usize = 8;
const LEN_SIZE: usize = 4;
const SCORE_SIZE: usize = 8;

/// Why a buffer could not be decoded as the requested shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Shorter than the 8-byte count header.
    MissingHeader { len: usize },
    /// The header (or an element length) claims more bytes than are present.
    Truncated { needed: usize, available: usize },
    /// Bytes left over after `count` elements.
    TrailingBytes { extra: usize },
    /// A set holds the same member twice.
    DuplicateMember,
    /// A sorted-set score is NaN.
    InvalidScore,
    /// Sorted-set elements are not in `(score, member)` order.
    Unsorted,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingHeader { len } => {
                write!(f, "buffer of {} bytes has no count header", len)
            }
            DecodeError::Truncated { needed, available } => {
                write!(f, "truncated: need {} bytes, {} available", needed, available)
            }
            DecodeError::TrailingBytes { extra } => write!(f, "{} trailing bytes", extra),
            DecodeError::DuplicateMember => f.write_str("duplicate set member"),
            DecodeError::InvalidScore => f.write_str("NaN score"),
            DecodeError::Unsorted => f.write_str("sorted set out of order"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// One sorted-set element.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub score: f64,
    pub member: Vec<u8>,
}

impl ScoredMember {
    pub fn new(score: f64, member: impl Into<Vec<u8>>) -> Self {
        ScoredMember {
            score,
            member: member.into(),
        }
    }
}

/// Total order used by the sorted-set encoding.
pub fn zset_order(a: &ScoredMember, b: &ScoredMember) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then_with(|| a.member.cmp(&b.member))
}

/// Sequential reader over a blob.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let mut b = [0u8; LEN_SIZE];
        b.copy_from_slice(self.take(LEN_SIZE)?);
        Ok(u32::from_be_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        let mut b = [0u8; COUNT_SIZE];
        b.copy_from_slice(self.take(COUNT_SIZE)?);
        Ok(u64::from_be_bytes(b))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn header(&mut self, min_element: usize) -> Result<(u64, usize), DecodeError> {
        if self.buf.len() < COUNT_SIZE {
            return Err(DecodeError::MissingHeader { len: self.buf.len() });
        }
        let count = self.u64()?;
        // never trust the header for allocation
        let cap = (count as usize).min(self.remaining() / min_element);
        Ok((count, cap))
    }

    fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(DecodeError::TrailingBytes { extra }),
        }
    }
}

/// Why a value could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A member does not fit the `u32` length prefix.
    MemberTooLarge { len: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::MemberTooLarge { len } => {
                write!(f, "member of {} bytes exceeds {} bytes", len, MAX_MEMBER_SIZE)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Largest member the length prefix can describe.
pub const MAX_MEMBER_SIZE: usize = u32::MAX as usize;

/// Length prefix for a member of `len` bytes.
pub fn member_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::MemberTooLarge { len })
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncodeError> {
    out.extend_from_slice(&member_len(bytes.len())?.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// Encode an ordered sequence of members (list or set layout).
pub fn encode_members<T: AsRef<[u8]>>(items: &[T]) -> Result<Vec<u8>, EncodeError> {
    let body: usize = items.iter().map(|i| LEN_SIZE + i.as_ref().len()).sum();
    let mut out = Vec::with_capacity(COUNT_SIZE + body);
    out.extend_from_slice(&(items.len() as u64).to_be_bytes());
    for item in items {
        put_bytes(&mut out, item.as_ref())?;
    }
    Ok(out)
}

/// Decode the list / set layout without any uniqueness check.
pub fn decode_members(buf: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
    let mut r = Reader::new(buf);
    let (count, cap) = r.header(LEN_SIZE)?;
    let mut items = Vec::with_capacity(cap);
    for _ in 0..count {
        items.push(r.bytes()?);
    }
    r.finish()?;
    Ok(items)
}

pub fn encode_list<T: AsRef<[u8]>>(items: &[T]) -> Result<Vec<u8>, EncodeError> {
    encode_members(items)
}

pub fn decode_list(buf: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
    decode_members(buf)
}

pub fn encode_set<T: AsRef<[u8]>>(members: &[T]) -> Result<Vec<u8>, EncodeError> {
    encode_members(members)
}

/// A set blob is a member sequence whose members are pairwise distinct.
pub fn decode_set(buf: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
    let members = decode_members(buf)?;
    let mut seen = std::collections::HashSet::with_capacity(members.len());
    for m in &members {
        if !seen.insert(m.as_slice()) {
            return Err(DecodeError::DuplicateMember);
        }
    }
    Ok(members)
}

/// Encode a sorted set. The caller must pass elements already in
/// [`zset_order`]; use [`zset_insert`] to keep them that way.
pub fn encode_zset(items: &[ScoredMember]) -> Result<Vec<u8>, EncodeError> {
    let body: usize = items
        .iter()
        .map(|i| SCORE_SIZE + LEN_SIZE + i.member.len())
        .sum();
    let mut out = Vec::with_capacity(COUNT_SIZE + body);
    out.extend_from_slice(&(items.len() as u64).to_be_bytes());
    for item in items {
        out.extend_from_slice(&item.score.to_bits().to_be_bytes());
        put_bytes(&mut out, &item.member)?;
    }
    Ok(out)
}

pub fn decode_zset(buf: &[u8]) -> Result<Vec<ScoredMember>, DecodeError> {
    let mut r = Reader::new(buf);
    let (count, cap) = r.header(SCORE_SIZE + LEN_SIZE)?;
    let mut items: Vec<ScoredMember> = Vec::with_capacity(cap);
    for _ in 0..count {
        let score = f64::from_bits(r.u64()?);
        if score.is_nan() {
            return Err(DecodeError::InvalidScore);
        }
        let member = r.bytes()?;
        let item = ScoredMember { score, member };
        if let Some(prev) = items.last() {
            if zset_order(prev, &item) != Ordering::Less {
                return Err(DecodeError::Unsorted);
            }
        }
        items.push(item);
    }
    r.finish()?;
    Ok(items)
}

/// Insert or update `member`, then re-sort. Returns true when the member is new.
pub fn zset_insert(items: &mut Vec<ScoredMember>, score: f64, member: &[u8]) -> bool {
    let added = match items.iter_mut().find(|i| i.member == member) {
        Some(existing) => {
            existing.score = score;
            false
        }
        None => {
            items.push(ScoredMember::new(score, member));
            true
        }
    };
    items.sort_by(zset_order);
    added
}

/// Counters are stored as decimal text.
pub fn encode_counter(n: i64) -> Vec<u8> {
    n.to_string().into_bytes()
}

/// `None` when the bytes are not a base-10 i64.
pub fn decode_counter(buf: &[u8]) -> Option<i64> {
    std::str::from_utf8(buf).ok()?.parse::<i64>().ok()
}

/// Resolve a possibly negative index (`-1` = last) against `len`.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

/// LRANGE-style window: negative indices resolve from the end, `start` is
/// clamped up to 0 and `stop` down to `len - 1`. `None` means empty.
pub fn clamp_range(len: usize, start: i64, stop: i64) -> Option<RangeInclusive<usize>> {
    if len == 0 {
        return None;
    }
    let n = len as i64;
    let s = (if start < 0 { n + start } else { start }).max(0);
    let e = (if stop < 0 { n + stop } else { stop }).min(n - 1);
    if s > e {
        None
    } else {
        Some(s as usize..=e as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_layout() {
        let buf = encode_list(&["ab", "c"]).unwrap();
        assert_eq!(
            buf,
            vec![0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 2, b'a', b'b', 0, 0, 0, 1, b'c']
        );
        assert_eq!(decode_list(&buf).unwrap(), vec![b"ab".to_vec(), b"c".to_vec()]);

        let empty: [&[u8]; 0] = [];
        assert_eq!(decode_list(&encode_list(&empty).unwrap()).unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn test_zero_length_member() {
        let buf = encode_list(&["", "x"]).unwrap();
        assert_eq!(decode_list(&buf).unwrap(), vec![Vec::new(), b"x".to_vec()]);
    }

    #[test]
    fn test_decode_errors() {
        // plain string shorter than the header
        assert_eq!(
            decode_list(b"hello"),
            Err(DecodeError::MissingHeader { len: 5 })
        );

        // header claims 3 elements, only one present
        let mut buf = encode_list(&["a"]).unwrap();
        buf[7] = 3;
        assert!(matches!(decode_list(&buf), Err(DecodeError::Truncated { .. })));

        // huge count must not allocate
        let mut buf = vec![0xff; 8];
        buf.extend_from_slice(&[0, 0, 0, 1, b'z']);
        assert!(matches!(decode_list(&buf), Err(DecodeError::Truncated { .. })));

        let mut buf = encode_list(&["a"]).unwrap();
        buf.push(9);
        assert_eq!(decode_list(&buf), Err(DecodeError::TrailingBytes { extra: 1 }));
    }

    #[test]
    fn test_set_rejects_duplicates() {
        let buf = encode_list(&["a", "b", "a"]).unwrap();
        assert!(decode_list(&buf).is_ok());
        assert_eq!(decode_set(&buf), Err(DecodeError::DuplicateMember));
    }

    #[test]
    fn test_zset_order_and_update() {
        let mut z = Vec::new();
        assert!(zset_insert(&mut z, 3.0, b"c"));
        assert!(zset_insert(&mut z, 1.0, b"a"));
        assert!(zset_insert(&mut z, 2.0, b"b"));
        assert!(zset_insert(&mut z, 2.0, b"aa"));
        let names: Vec<Vec<u8>> = z.iter().map(|i| i.member.clone()).collect();
        assert_eq!(
            names,
            vec![b"a".to_vec(), b"aa".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );

        // update moves the member
        assert!(!zset_insert(&mut z, 0.5, b"c"));
        assert_eq!(z[0].member, b"c".to_vec());

        let decoded = decode_zset(&encode_zset(&z).unwrap()).unwrap();
        assert_eq!(decoded, z);
    }

    #[test]
    fn test_zset_rejects_bad_blobs() {
        let z = vec![ScoredMember::new(2.0, "b"), ScoredMember::new(1.0, "a")];
        assert_eq!(decode_zset(&encode_zset(&z).unwrap()), Err(DecodeError::Unsorted));

        let z = vec![ScoredMember::new(f64::NAN, "a")];
        assert_eq!(decode_zset(&encode_zset(&z).unwrap()), Err(DecodeError::InvalidScore));

        // a list blob is not a sorted set
        assert!(decode_zset(&encode_list(&["a", "b"]).unwrap()).is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_member_length_prefix_bounds() {
        assert_eq!(member_len(0), Ok(0));
        assert_eq!(member_len(MAX_MEMBER_SIZE), Ok(u32::MAX));
        assert_eq!(
            member_len(MAX_MEMBER_SIZE + 1),
            Err(EncodeError::MemberTooLarge {
                len: MAX_MEMBER_SIZE + 1
            })
        );
    }

    #[test]
    fn test_counter() {
        assert_eq!(encode_counter(-42), b"-42".to_vec());
        assert_eq!(decode_counter(b"17"), Some(17));
        assert_eq!(decode_counter(b"1.5"), None);
        assert_eq!(decode_counter(b"abc"), None);
        assert_eq!(decode_counter(b"99999999999999999999"), None);
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(3, 0), Some(0));
        assert_eq!(resolve_index(3, -1), Some(2));
        assert_eq!(resolve_index(3, -3), Some(0));
        assert_eq!(resolve_index(3, -4), None);
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(0, 0), None);
    }

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(3, 0, -1), Some(0..=2));
        assert_eq!(clamp_range(3, -100, 100), Some(0..=2));
        assert_eq!(clamp_range(3, 1, 1), Some(1..=1));
        assert_eq!(clamp_range(3, 2, 1), None);
        assert_eq!(clamp_range(3, 5, 10), None);
        assert_eq!(clamp_range(0, 0, -1), None);
    }
}
