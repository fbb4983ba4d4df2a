//! Canonical CBOR encoding of the sensitive subset.
//!
//! Follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (amounts are integer minor units)
//!
//! The integrity hash committed to the ledger is computed over these bytes,
//! so any change here invalidates every existing commitment.

use ciborium::value::Value;

use crate::event::{LineItem, PaymentInstrument};
use crate::payload::SensitiveSubset;

/// Sensitive subset field keys.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const EVENT_ID: u64 = 0;
    pub const AMOUNT: u64 = 1;
    pub const CURRENCY: u64 = 2;
    pub const PAYER_CONTACT: u64 = 3;
    pub const INSTRUMENT: u64 = 4;
    pub const LINE_ITEMS: u64 = 5;
    pub const METADATA: u64 = 6;

    pub const INSTRUMENT_BRAND: u64 = 0;
    pub const INSTRUMENT_LAST4: u64 = 1;

    pub const ITEM_DESCRIPTION: u64 = 0;
    pub const ITEM_UNIT_AMOUNT: u64 = 1;
    pub const ITEM_QUANTITY: u64 = 2;
}

/// Encode the sensitive subset to canonical CBOR bytes.
pub fn canonical_sensitive_bytes(subset: &SensitiveSubset<'_>) -> Vec<u8> {
    let value = subset_to_cbor_value(subset);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

fn subset_to_cbor_value(subset: &SensitiveSubset<'_>) -> Value {
    let payer_contact = match subset.payer_contact {
        Some(contact) => Value::Text(contact.to_owned()),
        None => Value::Null,
    };

    let instrument = match subset.instrument {
        Some(instrument) => instrument_to_cbor_value(instrument),
        None => Value::Null,
    };

    let line_items = subset
        .line_items
        .iter()
        .map(line_item_to_cbor_value)
        .collect();

    let metadata = subset
        .metadata
        .iter()
        .map(|(k, v)| (Value::Text(k.clone()), Value::Text(v.clone())))
        .collect();

    Value::Map(vec![
        (key(keys::EVENT_ID), Value::Text(subset.event_id.as_str().to_owned())),
        (key(keys::AMOUNT), Value::Integer(subset.amount.into())),
        (key(keys::CURRENCY), Value::Text(subset.currency.to_owned())),
        (key(keys::PAYER_CONTACT), payer_contact),
        (key(keys::INSTRUMENT), instrument),
        (key(keys::LINE_ITEMS), Value::Array(line_items)),
        (key(keys::METADATA), Value::Map(metadata)),
    ])
}

fn instrument_to_cbor_value(instrument: &PaymentInstrument) -> Value {
    Value::Map(vec![
        (key(keys::INSTRUMENT_BRAND), Value::Text(instrument.brand.clone())),
        (key(keys::INSTRUMENT_LAST4), Value::Text(instrument.last4.clone())),
    ])
}

fn line_item_to_cbor_value(item: &LineItem) -> Value {
    Value::Map(vec![
        (key(keys::ITEM_DESCRIPTION), Value::Text(item.description.clone())),
        (key(keys::ITEM_UNIT_AMOUNT), Value::Integer(item.unit_amount.into())),
        (key(keys::ITEM_QUANTITY), Value::Integer(item.quantity.into())),
    ])
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        // Floats and tags are never produced by subset_to_cbor_value.
        _ => unreachable!("unsupported CBOR value in canonical encoding"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
