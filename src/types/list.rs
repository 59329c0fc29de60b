// src/types/list.rs

//! # List Type Support
//!
//! A list lives in a single record using the member layout from
//! [`crate::codec`]. Index 0 is the most recently left-pushed element.
//! Every mutation decodes the whole blob, edits it in memory and writes the
//! whole blob back inside one transaction. A list that becomes empty is
//! removed together with its TTL metadata.
//!
//! Supported commands:
//! - `LPUSH` / `RPUSH`
//! - `LPOP` / `RPOP`
//! - `LINDEX` / `LSET`
//! - `LRANGE` / `LLEN`

use super::{Access, decoded, encoded};
use crate::codec::{clamp_range, decode_list, encode_list, resolve_index};
use crate::context::Context;
use crate::engine::kv::{TxResult, abort};
use crate::engine::{Scope, Store};
use crate::error::{Error, Result};

/// Write `items` back, or drop the key when nothing is left.
fn write_back(scope: &Scope<'_>, key: &[u8], items: &[Vec<u8>]) -> TxResult<()> {
    if items.is_empty() {
        scope.purge(key)?;
    } else {
        scope.store(key, &encoded(encode_list(items))?)?;
    }
    Ok(())
}

impl Store {
    /// Execute LPUSH: push `value` to the head of the list.
    ///
    /// # Returns
    ///
    /// The new length of the list.
    ///
    /// # Errors
    ///
    /// `WrongType` if the key holds something that is not a list.
    pub fn lpush(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<u64> {
        self.push(ctx, key, value, true)
    }

    /// Execute RPUSH: push `value` to the tail of the list.
    pub fn rpush(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<u64> {
        self.push(ctx, key, value, false)
    }

    fn push(&self, ctx: &Context, key: &[u8], value: &[u8], head: bool) -> Result<u64> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut items = decoded(scope, key, Access::Write, decode_list)?.unwrap_or_default();
            if head {
                items.insert(0, value.to_vec());
            } else {
                items.push(value.to_vec());
            }
            scope.store(key, &encoded(encode_list(&items))?)?;
            Ok(items.len() as u64)
        })
    }

    /// Execute LPOP: remove and return the head element, `None` when the
    /// list is empty or missing.
    pub fn lpop(&self, ctx: &Context, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pop(ctx, key, true)
    }

    /// Execute RPOP: remove and return the tail element.
    pub fn rpop(&self, ctx: &Context, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pop(ctx, key, false)
    }

    fn pop(&self, ctx: &Context, key: &[u8], head: bool) -> Result<Option<Vec<u8>>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut items = match decoded(scope, key, Access::Write, decode_list)? {
                Some(items) => items,
                None => return Ok(None),
            };
            let popped = if head {
                if items.is_empty() {
                    None
                } else {
                    Some(items.remove(0))
                }
            } else {
                items.pop()
            };
            write_back(scope, key, &items)?;
            Ok(popped)
        })
    }

    /// Execute LINDEX. Negative indices count from the tail (`-1` = last).
    /// A missing key or an index outside the list yields `None`.
    pub fn lindex(&self, ctx: &Context, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let items = match decoded(scope, key, Access::Read, decode_list)? {
                Some(items) => items,
                None => return Ok(None),
            };
            Ok(resolve_index(items.len(), index).map(|i| items[i].clone()))
        })
    }

    /// Execute LSET: overwrite the element at `index`.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if the list does not exist
    /// - `IndexOutOfRange` if `index` does not resolve to an element
    pub fn lset(&self, ctx: &Context, key: &[u8], index: i64, value: &[u8]) -> Result<()> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let mut items = match decoded(scope, key, Access::Write, decode_list)? {
                Some(items) => items,
                None => return abort(Error::KeyNotFound),
            };
            let i = match resolve_index(items.len(), index) {
                Some(i) => i,
                None => return abort(Error::IndexOutOfRange),
            };
            items[i] = value.to_vec();
            scope.store(key, &encoded(encode_list(&items))?)
        })
    }

    /// Execute LRANGE over `[start, stop]`, both inclusive, with negative
    /// indices and clamping. Out-of-order bounds give an empty result.
    pub fn lrange(&self, ctx: &Context, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            let items = decoded(scope, key, Access::Read, decode_list)?.unwrap_or_default();
            Ok(match clamp_range(items.len(), start, stop) {
                Some(range) => items[range].to_vec(),
                None => Vec::new(),
            })
        })
    }

    /// Execute LLEN: 0 for a missing key.
    pub fn llen(&self, ctx: &Context, key: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        self.run(ctx, |scope| {
            Ok(decoded(scope, key, Access::Read, decode_list)?
                .map(|items| items.len() as u64)
                .unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::encode_list;
    use crate::config::Config;
    use crate::context::Context;
    use crate::engine::Store;
    use crate::error::Error;
    use anyhow::Result;

    fn make_store() -> Store {
        Store::open(Config::temporary()).expect("failed to open temporary store")
    }

    fn strs(items: Vec<Vec<u8>>) -> Vec<String> {
        items
            .into_iter()
            .map(|i| String::from_utf8(i).expect("utf8"))
            .collect()
    }

    /// Basic tests for List commands: LPUSH, RPUSH, LPOP, RPOP, LRANGE
    #[test]
    fn test_list_basic() -> Result<()> {
        let store = make_store();
        let ctx = Context::new(0);

        assert_eq!(store.lpush(&ctx, b"L", b"a")?, 1);
        assert_eq!(store.lpush(&ctx, b"L", b"b")?, 2); // b, a
        assert_eq!(store.rpush(&ctx, b"L", b"c")?, 3); // b, a, c

        assert_eq!(strs(store.lrange(&ctx, b"L", 0, 2)?), vec!["b", "a", "c"]);
        assert_eq!(strs(store.lrange(&ctx, b"L", 1, 1)?), vec!["a"]);
        assert_eq!(store.llen(&ctx, b"L")?, 3);

        assert_eq!(store.lpop(&ctx, b"L")?, Some(b"b".to_vec()));
        assert_eq!(store.rpop(&ctx, b"L")?, Some(b"c".to_vec()));
        assert_eq!(strs(store.lrange(&ctx, b"L", 0, -1)?), vec!["a"]);

        // Exhaust: the key disappears with its last element
        assert_eq!(store.lpop(&ctx, b"L")?, Some(b"a".to_vec()));
        assert!(!store.exists(&ctx, b"L")?);
        assert_eq!(store.lpop(&ctx, b"L")?, None);
        assert_eq!(store.rpop(&ctx, b"L")?, None);
        assert_eq!(store.llen(&ctx, b"L")?, 0);
        Ok(())
    }

    #[test]
    fn test_lrange_clamping() -> Result<()> {
        let store = make_store();
        let ctx = Context::new(0);
        for v in ["a", "b", "c", "d"] {
            store.rpush(&ctx, b"L", v.as_bytes())?;
        }
        assert_eq!(strs(store.lrange(&ctx, b"L", -2, -1)?), vec!["c", "d"]);
        assert_eq!(strs(store.lrange(&ctx, b"L", -100, 1)?), vec!["a", "b"]);
        assert_eq!(strs(store.lrange(&ctx, b"L", 2, 100)?), vec!["c", "d"]);
        assert!(store.lrange(&ctx, b"L", 3, 1)?.is_empty());
        assert!(store.lrange(&ctx, b"missing", 0, -1)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_lindex_and_lset() -> Result<()> {
        let store = make_store();
        let ctx = Context::new(0);
        for v in ["a", "b", "c"] {
            store.rpush(&ctx, b"L", v.as_bytes())?;
        }
        assert_eq!(store.lindex(&ctx, b"L", 0)?, Some(b"a".to_vec()));
        assert_eq!(store.lindex(&ctx, b"L", -1)?, Some(b"c".to_vec()));
        assert_eq!(store.lindex(&ctx, b"L", 3)?, None);
        assert_eq!(store.lindex(&ctx, b"L", -4)?, None);
        assert_eq!(store.lindex(&ctx, b"missing", 0)?, None);

        store.lset(&ctx, b"L", -2, b"B")?;
        assert_eq!(store.lindex(&ctx, b"L", 1)?, Some(b"B".to_vec()));
        assert!(matches!(
            store.lset(&ctx, b"L", 5, b"x"),
            Err(Error::IndexOutOfRange)
        ));
        assert!(matches!(
            store.lset(&ctx, b"missing", 0, b"x"),
            Err(Error::KeyNotFound)
        ));
        Ok(())
    }

    #[test]
    fn test_list_wrong_type_and_corruption() -> Result<()> {
        let store = make_store();
        let ctx = Context::new(0);

        store.set(&ctx, b"s", b"hello")?;
        assert!(matches!(store.lpush(&ctx, b"s", b"x"), Err(Error::WrongType)));
        assert!(matches!(store.lrange(&ctx, b"s", 0, -1), Err(Error::WrongType)));
        assert_eq!(store.get(&ctx, b"s")?, b"hello".to_vec());

        // header claims three elements, only one is present
        let mut blob = encode_list(&["a"])?;
        blob[7] = 3;
        store.set(&ctx, b"broken", &blob)?;
        assert!(matches!(
            store.lrange(&ctx, b"broken", 0, -1),
            Err(Error::Corrupt { .. })
        ));
        assert!(matches!(
            store.lindex(&ctx, b"broken", 0),
            Err(Error::Corrupt { .. })
        ));
        assert!(matches!(store.lpush(&ctx, b"broken", b"x"), Err(Error::WrongType)));
        Ok(())
    }
}
