//! Byte-level token encoding.
//!
//! Wire format, version 1, all integers big-endian:
//!
//! ```text
//! u8   version (= 1)
//! u16  username length, then UTF-8 bytes
//! u16  group count, then per group: u16 length + UTF-8 bytes (sorted)
//! i64  issued_at_ms
//! i64  expires_at_ms
//! u16  signature length, then signature bytes
//! ```
//!
//! The signed payload is the same layout without the signature field, so
//! signer and verifier agree on the exact bytes without a second format.

use std::collections::BTreeSet;

use crate::error::MalformedToken;
use crate::identity::Identity;
use crate::token::AccessToken;

pub const TOKEN_VERSION: u8 = 1;

/// Serializes values of `T` to bytes and back.
pub trait Codec<T> {
    type Error;

    fn encode(&self, value: &T) -> Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<T, Self::Error>;
}

/// Codec for [`AccessToken`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessTokenCodec;

impl Codec<AccessToken> for AccessTokenCodec {
    type Error = MalformedToken;

    fn encode(&self, token: &AccessToken) -> Vec<u8> {
        let mut buf = signing_payload(token.identity());
        put_bytes(&mut buf, token.signature());
        buf
    }

    fn decode(&self, bytes: &[u8]) -> Result<AccessToken, MalformedToken> {
        if bytes.is_empty() {
            return Err(MalformedToken::Empty);
        }

        let mut reader = Reader::new(bytes);
        let version = reader.u8("version")?;
        if version != TOKEN_VERSION {
            return Err(MalformedToken::UnsupportedVersion(version));
        }

        let username = reader.string("username")?;
        let group_count = reader.u16("group count")?;
        let mut groups = BTreeSet::new();
        for _ in 0..group_count {
            let group = reader.string("group")?;
            if groups.contains(&group) {
                return Err(MalformedToken::DuplicateGroup(group));
            }
            groups.insert(group);
        }
        let issued_at_ms = reader.i64("issued_at")?;
        let expires_at_ms = reader.i64("expires_at")?;
        let signature = reader.bytes("signature")?.to_vec();

        if reader.remaining() > 0 {
            return Err(MalformedToken::TrailingBytes(reader.remaining()));
        }

        let identity = Identity::new(username, groups, issued_at_ms, expires_at_ms)?;
        Ok(AccessToken::from_parts(identity, signature))
    }
}

/// Bytes the token signature is computed over.
pub(crate) fn signing_payload(identity: &Identity) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + identity.username().len());
    buf.push(TOKEN_VERSION);
    put_bytes(&mut buf, identity.username().as_bytes());
    // Identity bounds the group count and every length to u16.
    buf.extend_from_slice(&(identity.groups().len() as u16).to_be_bytes());
    for group in identity.groups() {
        put_bytes(&mut buf, group.as_bytes());
    }
    buf.extend_from_slice(&identity.issued_at_ms().to_be_bytes());
    buf.extend_from_slice(&identity.expires_at_ms().to_be_bytes());
    buf
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

struct Reader<'a> {
    rest: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], MalformedToken> {
        if self.rest.len() < len {
            return Err(MalformedToken::Truncated(field));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], MalformedToken> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, MalformedToken> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, MalformedToken> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, MalformedToken> {
        Ok(i64::from_be_bytes(self.array(field)?))
    }

    fn bytes(&mut self, field: &'static str) -> Result<&'a [u8], MalformedToken> {
        let len = self.u16(field)? as usize;
        self.take(len, field)
    }

    fn string(&mut self, field: &'static str) -> Result<String, MalformedToken> {
        let raw = self.bytes(field)?;
        String::from_utf8(raw.to_vec()).map_err(|_| MalformedToken::InvalidUtf8(field))
    }
}
