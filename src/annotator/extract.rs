//! Reply-text extraction strategies.
//!
//! The provider family delivers the model's JSON reply inside one of
//! several envelope shapes. Each known shape gets a named, total strategy
//! from raw payload to "text or not applicable"; strategies are applied
//! in a fixed priority order and the first applicable one wins. A payload
//! no strategy applies to is a parse failure, never a silent default.

use serde_json::Value;

/// A named envelope-shape reader.
#[derive(Clone, Copy)]
pub struct ExtractionStrategy {
    pub name: &'static str,
    apply: fn(&Value) -> Option<String>,
}

impl ExtractionStrategy {
    pub fn apply(&self, payload: &Value) -> Option<String> {
        (self.apply)(payload)
    }
}

/// Known envelope shapes, in priority order:
/// 1. completion envelope: `choices[0].message.content`
/// 2. structured-output convenience field: `output_text`
/// 3. structured-output nested field: `output.text`
/// 4. structured-output choices list: `output.choices[0].message.content[0].text`
/// 5. structured-output item array: `output[]` where a `message`-typed
///    item holds a content list with a `text` chunk
pub const STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy {
        name: "completion_choices",
        apply: completion_choices,
    },
    ExtractionStrategy {
        name: "output_text",
        apply: output_text,
    },
    ExtractionStrategy {
        name: "output_dot_text",
        apply: output_dot_text,
    },
    ExtractionStrategy {
        name: "output_choices",
        apply: output_choices,
    },
    ExtractionStrategy {
        name: "output_message_items",
        apply: output_message_items,
    },
];

/// Apply the strategies in order; returns the winning strategy's name and
/// the text it produced, or `None` if the payload matches no known shape.
pub fn extract_reply_text(payload: &Value) -> Option<(&'static str, String)> {
    STRATEGIES
        .iter()
        .find_map(|s| s.apply(payload).map(|text| (s.name, text)))
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn completion_choices(v: &Value) -> Option<String> {
    non_empty(v.get("choices")?.get(0)?.get("message")?.get("content")?.as_str()?)
}

fn output_text(v: &Value) -> Option<String> {
    non_empty(v.get("output_text")?.as_str()?)
}

fn output_dot_text(v: &Value) -> Option<String> {
    non_empty(v.get("output")?.get("text")?.as_str()?)
}

fn output_choices(v: &Value) -> Option<String> {
    non_empty(
        v.get("output")?
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .get(0)?
            .get("text")?
            .as_str()?,
    )
}

fn output_message_items(v: &Value) -> Option<String> {
    for item in v.get("output")?.as_array()? {
        if item.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        for chunk in item.get("content")?.as_array()? {
            if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                return non_empty(text);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_envelope() {
        let v = json!({"choices": [{"message": {"content": "{\"label\":1}"}}]});
        let (name, text) = extract_reply_text(&v).unwrap();
        assert_eq!(name, "completion_choices");
        assert_eq!(text, "{\"label\":1}");
    }

    #[test]
    fn convenience_output_text() {
        let v = json!({"output_text": "{\"label\":0}"});
        assert_eq!(
            extract_reply_text(&v),
            Some(("output_text", "{\"label\":0}".to_string()))
        );
    }

    #[test]
    fn nested_output_text() {
        let v = json!({"output": {"text": "{}"}});
        assert_eq!(extract_reply_text(&v), Some(("output_dot_text", "{}".to_string())));
    }

    #[test]
    fn deep_output_choices() {
        let v = json!({
            "output": {"choices": [{"message": {"content": [{"text": "deep"}]}}]}
        });
        assert_eq!(extract_reply_text(&v), Some(("output_choices", "deep".to_string())));
    }

    #[test]
    fn typed_message_items() {
        let v = json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [{"text": "item"}]}
            ]
        });
        assert_eq!(
            extract_reply_text(&v),
            Some(("output_message_items", "item".to_string()))
        );
    }

    #[test]
    fn priority_order_prefers_completion_shape() {
        let v = json!({
            "choices": [{"message": {"content": "first"}}],
            "output_text": "second"
        });
        assert_eq!(extract_reply_text(&v).unwrap().1, "first");
    }

    #[test]
    fn empty_strings_are_not_applicable() {
        // An empty convenience field falls through to the next shape.
        let v = json!({"output_text": "", "output": {"text": "fallback"}});
        assert_eq!(extract_reply_text(&v).unwrap().1, "fallback");
    }

    #[test]
    fn unknown_shape_is_none() {
        assert_eq!(extract_reply_text(&json!({"data": 42})), None);
        assert_eq!(extract_reply_text(&json!(null)), None);
    }
}
