//! Region-prefixed bearer tokens
//!
//! A token is `<tag>.<raw>` where `<tag>` is the fixed-width tag of the region
//! whose store holds the token row and `<raw>` is the stored random value,
//! unchanged. Any node can route a request from the token alone. The codec
//! never looks inside `<raw>`; existence and expiry are the store's business.

use crate::crypto;
use crate::domain::{Region, REGION_TAG_WIDTH};
use crate::error::AppError;
use thiserror::Error;

pub const TOKEN_SEPARATOR: u8 = b'.';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a region-prefixed token at all
    #[error("malformed token")]
    Malformed,
    /// Well-formed tag, but no region by that name is known
    #[error("unknown region tag '{0}'")]
    UnknownRegion(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AppError::MalformedToken,
            TokenError::UnknownRegion(tag) => AppError::UnknownRegion(tag),
        }
    }
}

/// Prefix of a token, before checking it against the known regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionTag<'a> {
    Known(Region),
    Unknown(&'a str),
}

/// A successfully decoded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedToken<'a> {
    pub region: Region,
    pub raw: &'a str,
}

/// A freshly minted token: `raw` goes to the store, `token` goes to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedToken {
    pub raw: String,
    pub token: String,
}

pub fn encode(region: Region, raw: &str) -> String {
    let mut token = String::with_capacity(REGION_TAG_WIDTH + 1 + raw.len());
    token.push_str(region.tag());
    token.push(TOKEN_SEPARATOR as char);
    token.push_str(raw);
    token
}

/// Split a token into its region tag and raw value.
pub fn split(token: &str) -> Result<(RegionTag<'_>, &str), TokenError> {
    if token.as_bytes().get(REGION_TAG_WIDTH) != Some(&TOKEN_SEPARATOR) {
        return Err(TokenError::Malformed);
    }
    // The separator is ASCII, so both halves sit on char boundaries.
    let (tag, rest) = token.split_at(REGION_TAG_WIDTH);
    if !tag
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(TokenError::Malformed);
    }

    let raw = &rest[1..];
    match Region::from_tag(tag) {
        Some(region) => Ok((RegionTag::Known(region), raw)),
        None => Ok((RegionTag::Unknown(tag), raw)),
    }
}

pub fn decode(token: &str) -> Result<DecodedToken<'_>, TokenError> {
    match split(token)? {
        (RegionTag::Known(region), raw) => Ok(DecodedToken { region, raw }),
        (RegionTag::Unknown(tag), _) => Err(TokenError::UnknownRegion(tag.to_string())),
    }
}

/// Mint a new attacker-unguessable token owned by `region`.
pub fn mint_token(region: Region) -> MintedToken {
    let raw = crypto::random_token_value();
    let token = encode(region, &raw);
    MintedToken { raw, token }
}
