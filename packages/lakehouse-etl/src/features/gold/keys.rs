//! Surrogate key assignment for gold dimensions

use crate::config::SurrogateKeys;
use crate::shared::frame::{Frame, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Positive 63-bit key from SHA-256 of the natural key's text
pub fn stable_key(natural: &Value) -> i64 {
    let digest = Sha256::digest(natural.to_text().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let key = (u64::from_be_bytes(bytes) & (i64::MAX as u64)) as i64;
    key.max(1)
}

/// Append `key_column` computed from `natural_column`.
///
/// Ordinal keys number distinct natural values by first appearance from 1;
/// rows sharing a natural value share a key. Null naturals get a null key.
pub fn assign(strategy: SurrogateKeys, frame: Frame, natural_column: &str, key_column: &str) -> Frame {
    let mut ordinals: HashMap<Value, i64> = HashMap::new();
    frame.with_column(key_column, |f, i| {
        let natural = match f.value(i, natural_column) {
            Some(v) if !v.is_null() => v.clone(),
            _ => return Value::Null,
        };
        match strategy {
            SurrogateKeys::StableHash => Value::Int(stable_key(&natural)),
            SurrogateKeys::Ordinal => {
                let next = ordinals.len() as i64 + 1;
                Value::Int(*ordinals.entry(natural).or_insert(next))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(values: &[&str]) -> Frame {
        Frame::from_rows(
            vec!["code".into()],
            values.iter().map(|v| vec![Value::str(*v)]).collect(),
        )
    }

    #[test]
    fn test_ordinal_first_seen() {
        let f = assign(SurrogateKeys::Ordinal, codes(&["b", "a", "b"]), "code", "id");
        assert_eq!(
            f.column_values("id"),
            vec![Value::Int(1), Value::Int(2), Value::Int(1)]
        );
    }

    #[test]
    fn test_stable_hash_independent_of_position() {
        let a = assign(SurrogateKeys::StableHash, codes(&["x", "y"]), "code", "id");
        let b = assign(SurrogateKeys::StableHash, codes(&["y", "x"]), "code", "id");
        assert_eq!(a.value(0, "id"), b.value(1, "id"));
        match a.value(0, "id") {
            Some(Value::Int(k)) => assert!(*k > 0),
            other => panic!("unexpected key {:?}", other),
        }
    }

    #[test]
    fn test_null_natural_gets_null_key() {
        let f = Frame::from_rows(vec!["code".into()], vec![vec![Value::Null]]);
        let f = assign(SurrogateKeys::Ordinal, f, "code", "id");
        assert_eq!(f.value(0, "id"), Some(&Value::Null));
    }
}
