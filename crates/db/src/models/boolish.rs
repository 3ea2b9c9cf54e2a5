//! Lenient boolean deserialization for the `is_done` request field.
//!
//! Clients send `true`, `1`, `"1"` or `"true"` interchangeably; storage is
//! always a strict boolean.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Boolish {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Boolish {
    fn value(self) -> bool {
        match self {
            Boolish::Bool(b) => b,
            Boolish::Int(n) => n != 0,
            Boolish::Str(s) => matches!(s.as_str(), "1" | "true" | "on" | "yes"),
        }
    }
}

pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Boolish>::deserialize(deserializer)?.map(Boolish::value))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "super::deserialize_opt")]
        is_done: Option<bool>,
    }

    fn parse(value: serde_json::Value) -> Option<bool> {
        serde_json::from_value::<Payload>(value).unwrap().is_done
    }

    #[test]
    fn truthy_forms_normalize_to_true() {
        for value in [json!(true), json!(1), json!("1"), json!("true")] {
            assert_eq!(parse(json!({ "is_done": value })), Some(true));
        }
    }

    #[test]
    fn falsy_forms_normalize_to_false() {
        for value in [json!(false), json!(0), json!("0"), json!("false")] {
            assert_eq!(parse(json!({ "is_done": value })), Some(false));
        }
    }

    #[test]
    fn omitted_field_stays_none() {
        assert_eq!(parse(json!({})), None);
    }
}
