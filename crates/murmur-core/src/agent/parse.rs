//! Structured reply parsing.
//!
//! Models answer with an XML-ish block of flat child tags:
//!
//! ```xml
//! <response>
//!   <thought>User greeted me</thought>
//!   <actions>REPLY</actions>
//!   <text>Hello!</text>
//! </response>
//! ```
//!
//! Only one level of nesting is read. Text outside the block is ignored.

use std::collections::HashMap;

/// Parse the first `<response>` block into a tag -> text map.
///
/// Falls back to scanning the whole input when no `<response>` wrapper is
/// present. Returns `None` if no complete child tag is found.
pub fn parse_key_value_xml(text: &str) -> Option<HashMap<String, String>> {
    let body = response_body(text).unwrap_or(text);
    let mut map = HashMap::new();
    let mut rest = body;

    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('>') else {
            break;
        };
        let tag = &after_open[..close];
        // skip closing tags, comments, self-closing tags and declarations
        if tag.starts_with('/') || tag.starts_with('!') || tag.starts_with('?') || tag.ends_with('/') {
            rest = &after_open[close + 1..];
            continue;
        }
        let name = tag.split_whitespace().next().unwrap_or_default();
        if name.is_empty() {
            rest = &after_open[close + 1..];
            continue;
        }

        let inner_start = &after_open[close + 1..];
        let end_tag = format!("</{name}>");
        match inner_start.find(&end_tag) {
            Some(end) => {
                let value = unwrap_cdata(inner_start[..end].trim());
                map.entry(name.to_string())
                    .or_insert_with(|| unescape(value));
                rest = &inner_start[end + end_tag.len()..];
            }
            None => {
                rest = inner_start;
            }
        }
    }

    (!map.is_empty()).then_some(map)
}

fn response_body(text: &str) -> Option<&str> {
    let start = text.find("<response>")? + "<response>".len();
    let end = text[start..].find("</response>")? + start;
    Some(&text[start..end])
}

fn unwrap_cdata(value: &str) -> &str {
    value
        .strip_prefix("<![CDATA[")
        .and_then(|v| v.strip_suffix("]]>"))
        .unwrap_or(value)
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lenient boolean: `true/false`, `yes/no`, `1/0`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_block() {
        let raw = "Sure!\n<response>\n  <thought>greeting</thought>\n  <actions>REPLY, SEND_IMAGE</actions>\n  <text>Hi &amp; welcome</text>\n</response>\ntrailing";
        let map = parse_key_value_xml(raw).unwrap();
        assert_eq!(map["thought"], "greeting");
        assert_eq!(parse_list(&map["actions"]), vec!["REPLY", "SEND_IMAGE"]);
        assert_eq!(map["text"], "Hi & welcome");
    }

    #[test]
    fn parses_without_wrapper() {
        let map = parse_key_value_xml("<thought>x</thought><isFinish>yes</isFinish>").unwrap();
        assert_eq!(map["thought"], "x");
        assert_eq!(parse_bool(&map["isFinish"]), Some(true));
    }

    #[test]
    fn empty_tags_and_cdata() {
        let map = parse_key_value_xml(
            "<response><providers></providers><text><![CDATA[a <b> c]]></text></response>",
        )
        .unwrap();
        assert_eq!(map["providers"], "");
        assert_eq!(map["text"], "a <b> c");
    }

    #[test]
    fn unclosed_tag_is_ignored() {
        let map = parse_key_value_xml("<response><text>ok</text><thought>cut off</response>").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["text"], "ok");
    }

    #[test]
    fn garbage_returns_none() {
        assert!(parse_key_value_xml("just some prose").is_none());
        assert!(parse_key_value_xml("").is_none());
    }

    #[test]
    fn list_and_bool_helpers() {
        assert!(parse_list(" , ").is_empty());
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
