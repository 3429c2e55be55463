//! Invertible cache keys.
//!
//! A key is the list `[bucket, tool, args...]` joined by the ASCII unit
//! separator. Each field is escaped first (`\` as `\\`, the separator as
//! `\u`), so arguments may contain either character and still decode to the
//! exact argument list that produced the key.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::core::command::{Command, ATTRIBUTE_FLAG, FULL_RECORD_FLAG};
use crate::core::error::QueryError;
use crate::util::clock::bucket_marker;

/// Field separator (ASCII unit separator, U+001F).
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Bucket marker used when the lifetime is zero.
pub const NO_EXPIRY: &str = "0";

const ESCAPE: char = '\\';
const ESCAPED_SEPARATOR: char = 'u';

/// Opaque cache key for one command in one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

/// The parts recovered from a [`CacheKey`].
#[derive(Debug, Clone)]
pub struct DecodedKey {
    /// Bucket marker: [`NO_EXPIRY`] or an RFC 3339 timestamp.
    pub bucket: String,
    /// Command equivalent to the one that produced the key. Only tool,
    /// extra args and attributes are populated; the rendered argument list
    /// matches the original.
    pub command: Command,
}

impl CacheKey {
    /// Key for `command` at `now`. Commands with equal tool and arguments
    /// produce equal keys for every `now` in the same bucket of width
    /// `lifetime`; a zero lifetime uses the fixed [`NO_EXPIRY`] bucket.
    #[must_use]
    pub fn encode(command: &Command, now: SystemTime, lifetime: Duration) -> Self {
        let bucket = if lifetime.is_zero() {
            NO_EXPIRY.to_string()
        } else {
            bucket_marker(now, lifetime)
        };
        let mut key = String::new();
        push_field(&mut key, &bucket);
        key.push(KEY_SEPARATOR);
        push_field(&mut key, command.tool());
        for arg in command.make_args() {
            key.push(KEY_SEPARATOR);
            push_field(&mut key, &arg);
        }
        Self(key)
    }

    /// Wrap a raw key string received from a peer.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the bucket marker and command.
    ///
    /// # Errors
    ///
    /// [`QueryError::CacheDecode`] when the key has fewer than two fields or
    /// contains an invalid escape sequence.
    pub fn decode(&self) -> Result<DecodedKey, QueryError> {
        let mut fields = self
            .0
            .split(KEY_SEPARATOR)
            .map(|field| {
                unescape(field)
                    .ok_or_else(|| QueryError::decode(&self.0, "invalid escape sequence"))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();
        let (Some(bucket), Some(tool)) = (fields.next(), fields.next()) else {
            return Err(QueryError::decode(&self.0, "expected at least 2 fields"));
        };
        let mut args: Vec<String> = fields.collect();
        let attributes = match args.iter().position(|a| a == ATTRIBUTE_FLAG) {
            Some(at) => {
                let attributes = args.split_off(at + 1);
                args.pop();
                attributes
            }
            None => {
                if args.last().map(String::as_str) == Some(FULL_RECORD_FLAG) {
                    args.pop();
                }
                Vec::new()
            }
        };
        Ok(DecodedKey {
            bucket,
            command: Command::from_raw(tool, args, attributes),
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_field(out: &mut String, field: &str) {
    for c in field.chars() {
        match c {
            ESCAPE => out.extend([ESCAPE, ESCAPE]),
            KEY_SEPARATOR => out.extend([ESCAPE, ESCAPED_SEPARATOR]),
            c => out.push(c),
        }
    }
}

fn unescape(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next()? {
            ESCAPE => out.push(ESCAPE),
            ESCAPED_SEPARATOR => out.push(KEY_SEPARATOR),
            _ => return None,
        }
    }
    Some(out)
}
