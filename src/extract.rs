//! Best-effort recovery of a JSON array from verbose model output.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Byte span `first_open..=last_close`, if both exist in that order.
fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

/// Extract a JSON array from text that may have prose around it.
///
/// The first `[` through the last `]` is parsed as an array. Without such a
/// span, the first `{` through the last `}` is parsed as a single object and
/// returned as a one-element array. Element schemas are not checked.
pub fn extract_array(raw: &str) -> Result<Vec<Value>> {
    if let Some(candidate) = span(raw, '[', ']') {
        return serde_json::from_str::<Vec<Value>>(candidate)
            .map_err(|e| Error::Parse(format!("invalid JSON array: {}", e)));
    }

    if let Some(candidate) = span(raw, '{', '}') {
        let object = serde_json::from_str::<serde_json::Map<String, Value>>(candidate)
            .map_err(|e| Error::Parse(format!("invalid JSON object: {}", e)))?;
        tracing::debug!("No JSON array in model output; wrapping single object");
        return Ok(vec![Value::Object(object)]);
    }

    Err(Error::Parse(
        "no JSON array or object found in model output".to_string(),
    ))
}

/// Extract and deserialize records into `T`.
///
/// Fails with [`Error::Parse`] naming the index of the first record that
/// does not match `T`.
pub fn extract_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    extract_array(raw)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value(value)
                .map_err(|e| Error::Parse(format!("record {} does not match: {}", i, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn array_with_surrounding_prose() {
        let items = extract_array(r#"prefix text [ {"a":1} ] suffix"#).unwrap();
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn bare_object_is_wrapped() {
        let items = extract_array(r#"{"a":1}"#).unwrap();
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn object_with_prose_is_wrapped() {
        let items = extract_array("Here you go:\n{\"question\": \"What is a mutex?\"}\nThanks").unwrap();
        assert_eq!(items, vec![json!({"question": "What is a mutex?"})]);
    }

    #[test]
    fn no_json_is_parse_failure() {
        let err = extract_array("no json here").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn reversed_brackets_are_not_a_span() {
        let err = extract_array("] nothing [").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn malformed_array_is_parse_failure() {
        let err = extract_array(r#"[{"a":1},]"#).unwrap_err();
        assert!(err.to_string().contains("invalid JSON array"));
    }

    #[test]
    fn fenced_code_block() {
        let raw = "```json\n[\n  {\"q\": \"1\"},\n  {\"q\": \"2\"}\n]\n```";
        let items = extract_array(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["q"], "2");
    }

    #[test]
    fn embedded_array_matches_isolated_parse() {
        let arrays = [
            r#"[]"#,
            r#"[1, "two", null, true]"#,
            r#"[{"nested": [1, [2, 3]], "s": "a ] b"}, {"x": {"y": []}}]"#,
            r#"[{"unicode": "naïve – ü", "escaped": "quote \" and \\ backslash"}]"#,
        ];
        let wrappers = [
            ("", ""),
            ("Sure! Here are the questions:\n", "\nLet me know if you need more."),
            ("no brackets before ", " and none after"),
        ];

        for array in arrays {
            let expected: Vec<Value> = serde_json::from_str(array).unwrap();
            for (before, after) in wrappers {
                let raw = format!("{}{}{}", before, array, after);
                assert_eq!(extract_array(&raw).unwrap(), expected, "input: {}", raw);
            }
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Question {
        question: String,
        difficulty: String,
    }

    #[test]
    fn typed_records() {
        let raw = r#"Output: [{"question":"Q1","difficulty":"easy"},{"question":"Q2","difficulty":"hard"}]"#;
        let records: Vec<Question> = extract_records(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].difficulty, "hard");
    }

    #[test]
    fn typed_records_report_mismatch_index() {
        let raw = r#"[{"question":"Q1","difficulty":"easy"},{"question":"Q2"}]"#;
        let err = extract_records::<Question>(raw).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }
}
