//! Composite Key Encoding
//!
//! Key encoding is PROTOCOL. These functions define the canonical byte layout
//! for every state key handed to the sorted KV store. Never inline key
//! construction in business logic.
//!
//! # Key Design Principles
//!
//! 1. **Deterministic** - Same input always produces same key
//! 2. **Sortable** - Byte order equals logical order:
//!    (scope asc, table asc, key type asc, key value asc, primary key asc)
//! 3. **Fixed-width fields** - No delimiters needed; widths follow the tag
//! 4. **Range-scannable** - Prefix constructors bound whole (scope, table)
//!    ranges with plain byte comparison
//!
//! # Format Conventions
//!
//! - Composite key: `scope(8 BE) ++ table(8 BE) ++ key_type(1) ++
//!   key_bytes ++ primary(8 BE, secondary kinds only)`
//! - Full key: `db_type(1) ++ contract(8 BE) ++ composite_key`
//! - Unsigned integers are big-endian (sorts numerically)
//! - Floats are sign-folded so unsigned byte order equals numeric order,
//!   and `-0.0` encodes identically to `+0.0`

use crate::errors::{StateError, StateResult};
use crate::types::{ContractId, Float128, PrimaryKey, Scope, TableId, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// KEY TYPE TAGS (FIXED - DO NOT CHANGE)
// =============================================================================
// These discriminants are protocol. Reordering or renumbering them changes
// the sort order of every persisted key. `Table` must keep the maximum value
// so a table key upper-bounds every other key of the same (scope, table).
// =============================================================================

/// One-byte key-type tag inside a composite key
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyType {
    /// Primary-key row entry
    Primary = 0x00,
    /// Primary-to-secondary mapping entry
    PrimaryToSec = 0x01,
    /// Secondary index over u64
    SecU64 = 0x02,
    /// Secondary index over u128
    SecU128 = 0x03,
    /// Secondary index over 256-bit values
    SecU256 = 0x04,
    /// Secondary index over IEEE-754 binary64
    SecF64 = 0x05,
    /// Secondary index over IEEE-754 binary128
    SecF128 = 0x06,
    /// No trailing key component; exclusive upper bound for a whole table
    Table = 0xFF,
}

impl KeyType {
    /// Parse a tag byte, rejecting unknown values
    pub fn from_byte(b: u8) -> Option<KeyType> {
        match b {
            0x00 => Some(KeyType::Primary),
            0x01 => Some(KeyType::PrimaryToSec),
            0x02 => Some(KeyType::SecU64),
            0x03 => Some(KeyType::SecU128),
            0x04 => Some(KeyType::SecU256),
            0x05 => Some(KeyType::SecF64),
            0x06 => Some(KeyType::SecF128),
            0xFF => Some(KeyType::Table),
            _ => None,
        }
    }

    /// Whether this tag denotes a secondary index kind (carries a trailing
    /// primary key)
    pub fn is_secondary(self) -> bool {
        matches!(
            self,
            KeyType::SecU64
                | KeyType::SecU128
                | KeyType::SecU256
                | KeyType::SecF64
                | KeyType::SecF128
        )
    }
}

/// Store discriminator for full keys produced by this state layer
pub const DB_TYPE_STATE: u8 = 0x01;

/// scope(8) + table(8)
pub const PREFIX_LEN: usize = 16;
/// scope(8) + table(8) + key_type(1)
pub const PREFIX_TYPE_LEN: usize = 17;
/// scope(8) + table(8) + key_type(1) + primary(8)
pub const PRIMARY_KEY_LEN: usize = 25;
/// db_type(1) + contract(8)
pub const FULL_KEY_HEADER_LEN: usize = 9;

// =============================================================================
// SECONDARY KEY VALUES
// =============================================================================

/// A secondary index key value; each variant maps 1:1 to a [`KeyType`] tag
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SecondaryKey {
    U64(u64),
    U128(u128),
    U256(U256),
    F64(f64),
    F128(Float128),
}

impl SecondaryKey {
    /// The key-type tag this value encodes under
    pub fn key_type(&self) -> KeyType {
        match self {
            SecondaryKey::U64(_) => KeyType::SecU64,
            SecondaryKey::U128(_) => KeyType::SecU128,
            SecondaryKey::U256(_) => KeyType::SecU256,
            SecondaryKey::F64(_) => KeyType::SecF64,
            SecondaryKey::F128(_) => KeyType::SecF128,
        }
    }

    /// Encoded width in bytes of the key value alone
    pub fn encoded_len(&self) -> usize {
        match self {
            SecondaryKey::U64(_) | SecondaryKey::F64(_) => 8,
            SecondaryKey::U128(_) | SecondaryKey::F128(_) => 16,
            SecondaryKey::U256(_) => 32,
        }
    }

    /// Append the order-preserving encoding of the key value
    fn encode_into(&self, out: &mut Vec<u8>) {
        match *self {
            SecondaryKey::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
            SecondaryKey::U128(v) => out.extend_from_slice(&v.to_be_bytes()),
            SecondaryKey::U256(v) => {
                out.extend_from_slice(&v.hi.to_be_bytes());
                out.extend_from_slice(&v.lo.to_be_bytes());
            }
            SecondaryKey::F64(v) => out.extend_from_slice(&fold_f64(v).to_be_bytes()),
            SecondaryKey::F128(v) => {
                out.extend_from_slice(&fold_f128_bits(v.to_bits()).to_be_bytes())
            }
        }
    }

    /// Decode a key value of the given kind from exactly-sized bytes
    fn decode(kind: KeyType, bytes: &[u8]) -> StateResult<SecondaryKey> {
        let expect = match kind {
            KeyType::SecU64 | KeyType::SecF64 => 8,
            KeyType::SecU128 | KeyType::SecF128 => 16,
            KeyType::SecU256 => 32,
            _ => {
                return Err(StateError::BadCompositeKey(format!(
                    "{kind:?} is not a secondary key type"
                )))
            }
        };
        if bytes.len() != expect {
            return Err(StateError::BadCompositeKey(format!(
                "secondary key value for {kind:?}: expected {expect} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(match kind {
            KeyType::SecU64 => SecondaryKey::U64(u64::from_be_bytes(bytes.try_into().unwrap())),
            KeyType::SecU128 => SecondaryKey::U128(u128::from_be_bytes(bytes.try_into().unwrap())),
            KeyType::SecU256 => SecondaryKey::U256(U256::new(
                u128::from_be_bytes(bytes[..16].try_into().unwrap()),
                u128::from_be_bytes(bytes[16..].try_into().unwrap()),
            )),
            KeyType::SecF64 => SecondaryKey::F64(unfold_f64(u64::from_be_bytes(
                bytes.try_into().unwrap(),
            ))),
            KeyType::SecF128 => SecondaryKey::F128(Float128::from_bits(unfold_f128_bits(
                u128::from_be_bytes(bytes.try_into().unwrap()),
            ))),
            _ => unreachable!(),
        })
    }
}

// =============================================================================
// ORDER-PRESERVING FLOAT TRANSFORMS
// =============================================================================

const SIGN_F64: u64 = 1 << 63;
const SIGN_F128: u128 = 1 << 127;

/// Sign-fold a binary64 value so unsigned byte comparison of the result
/// equals numeric comparison. `-0.0` is canonicalized to `+0.0` first so
/// both zeroes encode identically.
fn fold_f64(v: f64) -> u64 {
    let v = if v == 0.0 { 0.0 } else { v };
    let bits = v.to_bits();
    if bits & SIGN_F64 == 0 {
        bits | SIGN_F64
    } else {
        !bits
    }
}

fn unfold_f64(folded: u64) -> f64 {
    if folded & SIGN_F64 != 0 {
        f64::from_bits(folded ^ SIGN_F64)
    } else {
        f64::from_bits(!folded)
    }
}

/// Same fold as [`fold_f64`], applied to a raw binary128 bit pattern
fn fold_f128_bits(bits: u128) -> u128 {
    // canonicalize -0.0 (sign bit only) to +0.0
    let bits = if bits == SIGN_F128 { 0 } else { bits };
    if bits & SIGN_F128 == 0 {
        bits | SIGN_F128
    } else {
        !bits
    }
}

fn unfold_f128_bits(folded: u128) -> u128 {
    if folded & SIGN_F128 != 0 {
        folded ^ SIGN_F128
    } else {
        !folded
    }
}

// =============================================================================
// COMPOSITE KEY CONSTRUCTORS
// =============================================================================

/// Inclusive lower bound for the whole (scope, table) range
#[inline]
pub fn prefix_key(scope: Scope, table: TableId) -> [u8; PREFIX_LEN] {
    let mut key = [0u8; PREFIX_LEN];
    key[..8].copy_from_slice(&scope.to_be_bytes());
    key[8..].copy_from_slice(&table.to_be_bytes());
    key
}

/// Prefix through the key-type tag; exclusive upper bound for everything of
/// a *smaller* tag under the same (scope, table)
#[inline]
pub fn prefix_type_key(scope: Scope, table: TableId, key_type: KeyType) -> [u8; PREFIX_TYPE_LEN] {
    let mut key = [0u8; PREFIX_TYPE_LEN];
    key[..8].copy_from_slice(&scope.to_be_bytes());
    key[8..16].copy_from_slice(&table.to_be_bytes());
    key[16] = key_type as u8;
    key
}

/// Exclusive upper bound for the *entire* (scope, table) range.
///
/// `KeyType::Table` carries the maximum tag byte, so this key sorts after
/// every primary and secondary key of the same table.
#[inline]
pub fn table_key(scope: Scope, table: TableId) -> [u8; PREFIX_TYPE_LEN] {
    prefix_type_key(scope, table, KeyType::Table)
}

/// Key for a primary-key row entry
#[inline]
pub fn primary_key(scope: Scope, table: TableId, primary: PrimaryKey) -> [u8; PRIMARY_KEY_LEN] {
    let mut key = [0u8; PRIMARY_KEY_LEN];
    key[..8].copy_from_slice(&scope.to_be_bytes());
    key[8..16].copy_from_slice(&table.to_be_bytes());
    key[16] = KeyType::Primary as u8;
    key[17..].copy_from_slice(&primary.to_be_bytes());
    key
}

/// Key for a secondary index entry: the order-preserving key value followed
/// by the owning row's primary key as tiebreaker
pub fn secondary_key(
    scope: Scope,
    table: TableId,
    key: SecondaryKey,
    primary: PrimaryKey,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_TYPE_LEN + key.encoded_len() + 8);
    out.extend_from_slice(&scope.to_be_bytes());
    out.extend_from_slice(&table.to_be_bytes());
    out.push(key.key_type() as u8);
    key.encode_into(&mut out);
    out.extend_from_slice(&primary.to_be_bytes());
    out
}

/// Key for a primary-to-secondary mapping entry: locates the secondary key
/// value of a row given its primary key, per secondary index kind
pub fn primary_to_sec_key(
    scope: Scope,
    table: TableId,
    key: SecondaryKey,
    primary: PrimaryKey,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_TYPE_LEN + 1 + 8 + key.encoded_len());
    out.extend_from_slice(&scope.to_be_bytes());
    out.extend_from_slice(&table.to_be_bytes());
    out.push(KeyType::PrimaryToSec as u8);
    out.push(key.key_type() as u8);
    out.extend_from_slice(&primary.to_be_bytes());
    key.encode_into(&mut out);
    out
}

// =============================================================================
// COMPOSITE KEY PARSERS
// =============================================================================

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().unwrap())
}

fn read_prefix(key: &[u8]) -> StateResult<(Scope, TableId)> {
    if key.len() < PREFIX_LEN {
        return Err(StateError::BadCompositeKey(format!(
            "key too short for (scope, table) prefix: {} bytes",
            key.len()
        )));
    }
    Ok((read_u64(&key[..8]), read_u64(&key[8..16])))
}

/// Read and validate the key-type tag of a composite key
pub fn extract_key_type(key: &[u8]) -> StateResult<KeyType> {
    if key.len() < PREFIX_TYPE_LEN {
        return Err(StateError::BadCompositeKey(format!(
            "key too short for key-type tag: {} bytes",
            key.len()
        )));
    }
    KeyType::from_byte(key[16])
        .ok_or_else(|| StateError::BadCompositeKey(format!("unknown key-type tag {:#04x}", key[16])))
}

/// Read the secondary-index kind tag of a primary-to-secondary key
pub fn extract_primary_to_sec_key_type(key: &[u8]) -> StateResult<KeyType> {
    if extract_key_type(key)? != KeyType::PrimaryToSec {
        return Err(StateError::BadCompositeKey(
            "not a primary-to-secondary key".to_string(),
        ));
    }
    if key.len() < PREFIX_TYPE_LEN + 1 {
        return Err(StateError::BadCompositeKey(
            "primary-to-secondary key truncated before kind tag".to_string(),
        ));
    }
    let kind = KeyType::from_byte(key[17]).ok_or_else(|| {
        StateError::BadCompositeKey(format!("unknown secondary kind tag {:#04x}", key[17]))
    })?;
    if !kind.is_secondary() {
        return Err(StateError::BadCompositeKey(format!(
            "{kind:?} is not a secondary key type"
        )));
    }
    Ok(kind)
}

/// Split a composite key into its prefix-through-type slice and the tag
pub fn prefix_thru_key_type(key: &[u8]) -> StateResult<(&[u8], KeyType)> {
    let key_type = extract_key_type(key)?;
    Ok((&key[..PREFIX_TYPE_LEN], key_type))
}

/// Inverse of [`primary_key`]
pub fn parse_primary_key(key: &[u8]) -> StateResult<(Scope, TableId, PrimaryKey)> {
    let (scope, table) = read_prefix(key)?;
    if extract_key_type(key)? != KeyType::Primary {
        return Err(StateError::BadCompositeKey("not a primary key".to_string()));
    }
    if key.len() != PRIMARY_KEY_LEN {
        return Err(StateError::BadCompositeKey(format!(
            "primary key: expected {PRIMARY_KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok((scope, table, read_u64(&key[17..])))
}

/// Inverse of [`secondary_key`]
pub fn parse_secondary_key(key: &[u8]) -> StateResult<(Scope, TableId, SecondaryKey, PrimaryKey)> {
    let (scope, table) = read_prefix(key)?;
    let kind = extract_key_type(key)?;
    if !kind.is_secondary() {
        return Err(StateError::BadCompositeKey(format!(
            "{kind:?} is not a secondary key type"
        )));
    }
    if key.len() < PREFIX_TYPE_LEN + 8 {
        return Err(StateError::BadCompositeKey(
            "secondary key truncated before trailing primary key".to_string(),
        ));
    }
    let value_bytes = &key[PREFIX_TYPE_LEN..key.len() - 8];
    let value = SecondaryKey::decode(kind, value_bytes)?;
    let primary = read_u64(&key[key.len() - 8..]);
    Ok((scope, table, value, primary))
}

/// Inverse of [`table_key`]
pub fn parse_table_key(key: &[u8]) -> StateResult<(Scope, TableId)> {
    let (scope, table) = read_prefix(key)?;
    if extract_key_type(key)? != KeyType::Table {
        return Err(StateError::BadCompositeKey("not a table key".to_string()));
    }
    if key.len() != PREFIX_TYPE_LEN {
        return Err(StateError::BadCompositeKey(format!(
            "table key: expected {PREFIX_TYPE_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok((scope, table))
}

/// Inverse of [`prefix_key`]
pub fn parse_prefix_key(key: &[u8]) -> StateResult<(Scope, TableId)> {
    if key.len() != PREFIX_LEN {
        return Err(StateError::BadCompositeKey(format!(
            "prefix key: expected {PREFIX_LEN} bytes, got {}",
            key.len()
        )));
    }
    read_prefix(key)
}

/// Extract the trailing primary key of a secondary entry found by a range
/// scan.
///
/// Returns `Ok(None)` when `key` does not start with `secondary_prefix`,
/// meaning the scan walked out of its bucket; that is a normal miss, not a
/// format error. A matching prefix with a malformed suffix IS a format error.
pub fn trailing_primary_key(
    key: &[u8],
    secondary_prefix: &[u8],
) -> StateResult<Option<PrimaryKey>> {
    if !key.starts_with(secondary_prefix) {
        return Ok(None);
    }
    let suffix = &key[secondary_prefix.len()..];
    if suffix.len() != 8 {
        return Err(StateError::BadCompositeKey(format!(
            "trailing primary key: expected 8 bytes after prefix, got {}",
            suffix.len()
        )));
    }
    Ok(Some(read_u64(suffix)))
}

// =============================================================================
// FULL KEYS
// =============================================================================

/// Truncation boundary for [`full_key_prefix`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FullKeyBoundary {
    /// db_type + contract + scope + table (before the key-type tag)
    PreType,
    /// ... + key_type tag
    AtType,
    /// ... + secondary kind tag of a primary-to-secondary key
    AtPrimaryToSecType,
    /// ... + the primary key of a primary-to-secondary key
    AtPrimaryToSecPrimaryKey,
}

impl FullKeyBoundary {
    fn len(self) -> usize {
        match self {
            FullKeyBoundary::PreType => FULL_KEY_HEADER_LEN + PREFIX_LEN,
            FullKeyBoundary::AtType => FULL_KEY_HEADER_LEN + PREFIX_TYPE_LEN,
            FullKeyBoundary::AtPrimaryToSecType => FULL_KEY_HEADER_LEN + PREFIX_TYPE_LEN + 1,
            FullKeyBoundary::AtPrimaryToSecPrimaryKey => {
                FULL_KEY_HEADER_LEN + PREFIX_TYPE_LEN + 1 + 8
            }
        }
    }
}

/// Prefix a composite key with the store discriminator and owning contract
pub fn full_key(composite_key: &[u8], contract: ContractId) -> Vec<u8> {
    let mut out = Vec::with_capacity(FULL_KEY_HEADER_LEN + composite_key.len());
    out.push(DB_TYPE_STATE);
    out.extend_from_slice(&contract.to_be_bytes());
    out.extend_from_slice(composite_key);
    out
}

/// Truncate a full key to one of the documented boundaries
pub fn full_key_prefix(key: &[u8], boundary: FullKeyBoundary) -> StateResult<Vec<u8>> {
    let len = boundary.len();
    if key.len() < len {
        return Err(StateError::InvalidPrefix(format!(
            "full key has {} bytes, boundary {boundary:?} needs {len}",
            key.len()
        )));
    }
    if matches!(
        boundary,
        FullKeyBoundary::AtPrimaryToSecType | FullKeyBoundary::AtPrimaryToSecPrimaryKey
    ) && key[FULL_KEY_HEADER_LEN + PREFIX_LEN] != KeyType::PrimaryToSec as u8
    {
        return Err(StateError::InvalidPrefix(format!(
            "boundary {boundary:?} requires a primary-to-secondary key"
        )));
    }
    Ok(key[..len].to_vec())
}

/// Decompose a full key into its store discriminator, owning contract, and
/// composite-key suffix (empty for a bare contract prefix)
pub fn parse_full_key(key: &[u8]) -> StateResult<(u8, ContractId, &[u8])> {
    if key.len() < FULL_KEY_HEADER_LEN {
        return Err(StateError::BadCompositeKey(format!(
            "full key too short: {} bytes",
            key.len()
        )));
    }
    let db_type = key[0];
    let contract = read_u64(&key[1..9]);
    Ok((db_type, contract, &key[FULL_KEY_HEADER_LEN..]))
}

// =============================================================================
// TESTS
// =============================================================================
