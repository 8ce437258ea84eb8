// Sanitization layer. Runs after validation and before persistence; never fails.

use ammonia::Builder;
use once_cell::sync::Lazy;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet};

/// Tags removed together with their content in every mode
const FORBIDDEN_TAGS: [&str; 9] = ["script", "style", "iframe", "object", "embed", "form", "input", "button", "textarea"];

const RICH_TAGS: [&str; 20] = [
    "p", "br", "b", "i", "em", "strong", "u", "s", "ul", "ol", "li", "a", "h1", "h2", "h3", "h4", "blockquote", "code",
    "pre", "span",
];

static PLAIN: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::empty();
    builder.clean_content_tags(FORBIDDEN_TAGS.iter().copied().collect());
    builder
});

static RICH: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(RICH_TAGS.iter().copied().collect())
        .clean_content_tags(FORBIDDEN_TAGS.iter().copied().collect())
        .generic_attributes(HashSet::new())
        .tag_attributes(HashMap::from([("a", HashSet::from(["href", "title"]))]))
        .url_schemes(HashSet::from(["http", "https", "mailto"]));
    builder
});

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOptions {
    pub trim: bool,
    /// Keep the rich-text allow-list instead of stripping all markup
    pub rich_text: bool,
    /// Numeric strings become numbers, "true"/"false" become booleans
    pub coerce: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            trim: true,
            rich_text: false,
            coerce: false,
        }
    }
}

/// Per-field options for a whole form record
#[derive(Debug, Clone, Default)]
pub struct FieldSanitizeOptions {
    pub base: SanitizeOptions,
    pub rich_text_fields: HashSet<String>,
}

impl FieldSanitizeOptions {
    pub fn with_rich_text<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rich_text_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    fn for_field(&self, name: &str) -> SanitizeOptions {
        SanitizeOptions {
            rich_text: self.base.rich_text || self.rich_text_fields.contains(name),
            ..self.base.clone()
        }
    }
}

pub fn sanitize(value: &Value, options: &SanitizeOptions) -> Value {
    match value {
        Value::String(s) => sanitize_string(s, options),
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize(v, options)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (sanitize_text(k, &SanitizeOptions::default()), sanitize(v, options)))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub fn sanitize_form(record: &Map<String, Value>, options: &FieldSanitizeOptions) -> Map<String, Value> {
    record
        .iter()
        .map(|(key, value)| (key.clone(), sanitize(value, &options.for_field(key))))
        .collect()
}

/// Markup cleaning for a single string, without coercion
pub fn sanitize_text(input: &str, options: &SanitizeOptions) -> String {
    let input = if options.trim { input.trim() } else { input };
    if !input.contains(['<', '>', '&']) {
        return input.to_string();
    }

    let builder = if options.rich_text { &*RICH } else { &*PLAIN };
    let cleaned = builder.clean(input).to_string();
    if options.trim {
        cleaned.trim().to_string()
    } else {
        cleaned
    }
}

/// Readable form of stored plain text for non-HTML sinks (spreadsheets, labels).
///
/// Plain-text values are stored with the entities the cleaner emits so that cleaning stays
/// idempotent; anything rendered outside HTML decodes them here. `&amp;` goes last so
/// `&amp;lt;` comes back as the literal `&lt;` the user typed.
pub fn unescape_text(stored: &str) -> String {
    if !stored.contains('&') {
        return stored.to_string();
    }
    stored
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn sanitize_string(input: &str, options: &SanitizeOptions) -> Value {
    let text = sanitize_text(input, options);
    if options.coerce {
        if let Some(value) = coerce(&text) {
            return value;
        }
    }
    Value::String(text)
}

fn coerce(text: &str) -> Option<Value> {
    match text {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "" => return None,
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Number(Number::from(i)));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_markup_by_default() {
        let out = sanitize(&json!("  <b>Lyceum</b> <script>alert(1)</script>No. 5 "), &SanitizeOptions::default());
        assert_eq!(out, json!("Lyceum No. 5"));
    }

    #[test]
    fn rich_text_keeps_allow_list_only() {
        let options = SanitizeOptions {
            rich_text: true,
            ..Default::default()
        };
        let out = sanitize_text(
            r#"<p onclick="steal()">Hi <a href="javascript:alert(1)">x</a><iframe src="x"></iframe><strong>there</strong></p>"#,
            &options,
        );
        assert!(out.contains("<p>"));
        assert!(out.contains("<strong>there</strong>"));
        assert!(!out.contains("onclick"));
        assert!(!out.contains("javascript"));
        assert!(!out.contains("iframe"));
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let inputs = [
            "plain text",
            "  padded  ",
            "<div>nested <i>markup</i></div>",
            "Tom & Jerry <3",
            "<img src=x onerror=alert(1)>caption",
            "<form><input value=1></form>after",
        ];
        for rich_text in [false, true] {
            let options = SanitizeOptions {
                rich_text,
                ..Default::default()
            };
            for input in inputs {
                let once = sanitize_text(input, &options);
                assert_eq!(sanitize_text(&once, &options), once, "input {:?}", input);
            }
        }
    }

    #[test]
    fn stored_plain_text_reads_back_as_typed() {
        let options = SanitizeOptions::default();
        for typed in ["Tom & Jerry", "a < b > c", "AT&amp;T docs", "5 > 3 & 2 < 4"] {
            let stored = sanitize_text(typed, &options);
            assert_eq!(unescape_text(&stored), typed, "stored as {:?}", stored);
        }
        assert_eq!(unescape_text("no entities"), "no entities");
    }

    #[test]
    fn coercion_is_opt_in() {
        let value = json!({"count": "42", "ratio": "0.5", "flag": "true", "name": "42 Street"});
        let untouched = sanitize(&value, &SanitizeOptions::default());
        assert_eq!(untouched["count"], json!("42"));

        let options = SanitizeOptions {
            coerce: true,
            ..Default::default()
        };
        let coerced = sanitize(&value, &options);
        assert_eq!(coerced["count"], json!(42));
        assert_eq!(coerced["ratio"], json!(0.5));
        assert_eq!(coerced["flag"], json!(true));
        assert_eq!(coerced["name"], json!("42 Street"));
    }

    #[test]
    fn form_records_honor_rich_text_fields() {
        let mut record = Map::new();
        record.insert("Title".into(), json!("<em>Annual</em> report"));
        record.insert("Body".into(), json!("<em>Annual</em> report"));
        record.insert("Tags".into(), json!(["<b>a</b>", 3]));

        let options = FieldSanitizeOptions::default().with_rich_text(["Body"]);
        let out = sanitize_form(&record, &options);
        assert_eq!(out["Title"], json!("Annual report"));
        assert_eq!(out["Body"], json!("<em>Annual</em> report"));
        assert_eq!(out["Tags"], json!(["a", 3]));
    }
}
