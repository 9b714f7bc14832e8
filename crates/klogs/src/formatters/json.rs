//! JSON Line Formatter (§4.B): validate/parse JSON objects, project compound keys.

use serde_json::Value;

use crate::config::Config;

use super::{Found, LineFormatter};

pub struct JsonFormatter {
    key_split: String,
}

pub fn new_formatter(config: &Config) -> Box<dyn LineFormatter> {
    Box::new(JsonFormatter { key_split: config.key_split.clone() })
}

impl LineFormatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn validate<'a>(&self, line: &'a [u8]) -> Option<&'a [u8]> {
        let trimmed = trim_ascii_whitespace(line);
        if trimmed.is_empty() {
            return None;
        }
        if *trimmed.first()? == b'{' && *trimmed.last()? == b'}' {
            Some(trimmed)
        } else {
            None
        }
    }

    fn get_value(&self, line: &[u8], key: &str) -> String {
        let Ok(text) = std::str::from_utf8(line) else {
            return String::new();
        };
        let Ok(root) = serde_json::from_str::<Value>(text) else {
            return String::new();
        };

        let segments = searchable_key(key, &self.key_split);
        let mut current = &root;
        for segment in &segments {
            match current.as_object().and_then(|obj| obj.get(*segment)) {
                Some(next) => current = next,
                None => return String::new(),
            }
        }

        stringify(current)
    }

    fn format_found_values(&self, values: &[Found]) -> String {
        let mut buffer = String::from("{");
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                buffer.push_str(", ");
            }
            buffer.push_str(&format!("\"{}\":\"{}\"", v.key, v.value));
        }
        buffer.push('}');
        buffer
    }

    fn append_values(&self, line: &[u8], values: &[Found]) -> String {
        let text = String::from_utf8_lossy(line);
        let without_brace = text.strip_suffix('}').unwrap_or(&text);

        let mut buffer = String::from(without_brace);
        for v in values {
            buffer.push_str(", ");
            buffer.push_str(&format!("\"{}\":\"{}\"", v.key, v.value));
        }
        buffer.push('}');
        buffer
    }
}

fn searchable_key<'a>(key: &'a str, split_on: &str) -> Vec<&'a str> {
    if split_on.is_empty() {
        vec![key]
    } else {
        key.split(split_on).collect()
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |p| p + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(key_split: &str) -> JsonFormatter {
        JsonFormatter { key_split: key_split.to_string() }
    }

    #[test]
    fn validates_trimmed_object() {
        let f = formatter("");
        assert_eq!(f.validate(b"  {\"a\":1}  "), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn rejects_non_object_lines() {
        let f = formatter("");
        assert!(f.validate(b"[1,2,3]").is_none());
        assert!(f.validate(b"plain text").is_none());
        assert!(f.validate(b"").is_none());
    }

    #[test]
    fn get_value_top_level() {
        let f = formatter("");
        assert_eq!(f.get_value(b"{\"a\":\"1\",\"b\":2}", "a"), "1");
        assert_eq!(f.get_value(b"{\"a\":\"1\",\"b\":2}", "b"), "2");
        assert_eq!(f.get_value(b"{\"a\":\"1\"}", "missing"), "");
    }

    #[test]
    fn get_value_descends_compound_keys() {
        let f = formatter(".");
        assert_eq!(f.get_value(b"{\"a\":{\"b\":\"1\"}}", "a.b"), "1");
        assert_eq!(f.get_value(b"{\"a\":{\"b\":\"1\"}}", "a.c"), "");
    }

    #[test]
    fn get_value_stringifies_scalars() {
        let f = formatter("");
        assert_eq!(f.get_value(b"{\"n\":null}", "n"), "null");
        assert_eq!(f.get_value(b"{\"b\":true}", "b"), "true");
        assert_eq!(f.get_value(b"{\"n\":42}", "n"), "42");
    }

    #[test]
    fn format_found_values_comma_space_separated() {
        let f = formatter("");
        let values = vec![
            Found { key: "k1".into(), value: "v1".into() },
            Found { key: "k2".into(), value: "v2".into() },
        ];
        assert_eq!(f.format_found_values(&values), "{\"k1\":\"v1\", \"k2\":\"v2\"}");
    }

    #[test]
    fn append_values_splices_before_closing_brace() {
        let f = formatter("");
        let extras = vec![Found { key: "env".into(), value: "prod".into() }];
        assert_eq!(
            f.append_values(b"{\"msg\":\"ok\"}", &extras),
            "{\"msg\":\"ok\", \"env\":\"prod\"}"
        );
    }
}
