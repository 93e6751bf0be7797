//! JSON payloads exchanged with mini-app scripts.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Reply to a successful `setItems`.
pub const SAVE_SUCCESS: &str = "Items saved successfully.";
/// Reply to a successful `removeItems`.
pub const REMOVE_ITEMS_SUCCESS: &str = "Items removed successfully.";
/// Reply to a successful `clearAll`.
pub const CLEAR_SUCCESS: &str = "Storage removed successfully.";
/// Error posted for a payload that cannot be decoded.
pub const ERR_WRONG_JSON_FORMAT: &str = "Can not parse secure storage json object.";

/// Command envelope: `{"action": ..., "param": {...}, "id": ...}`.
///
/// Only `param` is read; the callback id travels separately.
#[derive(Debug, Deserialize)]
struct Command<P> {
    param: P,
}

/// Parameters of `setItems`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetItemsParam {
    /// Records to write. Values must be JSON strings.
    pub secure_storage_items: BTreeMap<String, String>,
}

/// Parameters of `getItem`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemParam {
    /// Key to read.
    pub secure_storage_key: String,
}

/// Parameters of `removeItems`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemsParam {
    /// Keys to delete.
    pub secure_storage_key_list: Vec<String>,
}

/// Reply to `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSize {
    /// Bytes used by the database file.
    pub used_space: u64,
    /// Size budget in bytes.
    pub max_space: u64,
}

/// Decodes the `param` object of a command payload.
///
/// # Errors
///
/// Returns an error if the payload is not a JSON object with a `param` of the
/// expected shape.
pub fn decode<P: DeserializeOwned>(payload: &str) -> serde_json::Result<P> {
    serde_json::from_str::<Command<P>>(payload).map(|command| command.param)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_decode_set_items() {
        let payload = r#"{
            "action": "setSecureStorageItems",
            "param": {"secureStorageItems": {"a": "1", "b": "2"}},
            "id": "cb-1"
        }"#;
        let param: SetItemsParam = decode(payload).expect("decode");
        assert_eq!(param.secure_storage_items.len(), 2);
        assert_eq!(param.secure_storage_items.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_decode_get_item() {
        let param: GetItemParam =
            decode(r#"{"param": {"secureStorageKey": "a"}}"#).expect("decode");
        assert_eq!(param.secure_storage_key, "a");
    }

    #[test]
    fn test_decode_remove_items() {
        let param: RemoveItemsParam =
            decode(r#"{"param": {"secureStorageKeyList": ["a", "b"]}}"#).expect("decode");
        assert_eq!(param.secure_storage_key_list, vec!["a", "b"]);
    }

    #[test_case("" ; "empty payload")]
    #[test_case("null" ; "json null")]
    #[test_case("{}" ; "missing param")]
    #[test_case(r#"{"param": {}}"# ; "missing items")]
    #[test_case(r#"{"param": {"secureStorageItems": {"a": 1}}}"# ; "non string value")]
    #[test_case(r#"{"param": {"secureStorageItems": ["a"]}}"# ; "items not an object")]
    #[test_case("{not json" ; "broken json")]
    fn test_malformed_set_items(payload: &str) {
        assert!(decode::<SetItemsParam>(payload).is_err());
    }

    #[test]
    fn test_storage_size_wire_format() {
        let size = StorageSize {
            used_space: 8192,
            max_space: 5_242_880,
        };
        assert_eq!(
            serde_json::to_string(&size).expect("serialize"),
            r#"{"usedSpace":8192,"maxSpace":5242880}"#
        );
    }
}
