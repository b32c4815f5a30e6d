//! `index.md` front matter + body codec (spec.md §6).
//!
//! A page is three YAML-ish front-matter lines (`title`, `created`,
//! `modified`, plus an optional `tags`) between `---` fences, two blank
//! lines, then the body verbatim exactly as it sits on disk (neither
//! blank line is swallowed on read). Missing or malformed front matter
//! falls back to a default title and current timestamps rather than
//! erroring — the codec is read-resilient by design, matching the record
//! log's skip-and-warn posture toward corrupt lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub title: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub tags: Option<Vec<String>>,
}

impl FrontMatter {
    pub fn default_for(fallback_title: &str) -> Self {
        let now = Utc::now();
        FrontMatter {
            title: fallback_title.to_string(),
            created: now,
            modified: now,
            tags: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Serialize)]
struct YamlFrontMatter<'a> {
    title: &'a str,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
}

/// Renders `front_matter` and `body` as a complete `index.md` document.
pub fn encode(front_matter: &FrontMatter, body: &str) -> String {
    let yaml_fm = YamlFrontMatter {
        title: &front_matter.title,
        created: front_matter.created,
        modified: front_matter.modified,
        tags: front_matter.tags.as_deref(),
    };
    let yaml = serde_yaml::to_string(&yaml_fm).unwrap_or_default();

    let mut out = String::with_capacity(yaml.len() + body.len() + 16);
    out.push_str("---\n");
    out.push_str(&yaml);
    out.push_str("---\n\n\n");
    out.push_str(body);
    out
}

/// Parses an `index.md` document, falling back to `fallback_title` and
/// `Utc::now()` for any field that is missing or unparsable.
pub fn decode(raw: &str, fallback_title: &str) -> (FrontMatter, String) {
    let trimmed = raw.trim_start_matches(['\u{FEFF}', '\u{200B}']);
    let leading_ws = trimmed.len() - trimmed.trim_start().len();
    let source = &trimmed[leading_ws..];

    let Some((yaml_lines, body)) = split_front_matter(source) else {
        return (FrontMatter::default_for(fallback_title), raw.to_string());
    };

    let yaml_text = yaml_lines.join("\n");
    let raw_fm: RawFrontMatter = match serde_yaml::from_str(&yaml_text) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!(%error, "malformed index.md front matter, using defaults");
            return (FrontMatter::default_for(fallback_title), raw.to_string());
        }
    };

    let front_matter = FrontMatter {
        title: raw_fm
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_title.to_string()),
        created: raw_fm.created.unwrap_or_else(Utc::now),
        modified: raw_fm.modified.unwrap_or_else(Utc::now),
        tags: raw_fm.tags,
    };
    (front_matter, body.to_string())
}

/// Splits `source` into its front-matter YAML lines and the body that
/// follows, if `source` opens with a `---` fence and a matching closing
/// fence is found. Everything after the closing fence's own line is
/// returned as the body exactly as written, blank lines included.
fn split_front_matter(source: &str) -> Option<(Vec<&str>, &str)> {
    let mut lines = source.split('\n').enumerate();
    let (_, first) = lines.next()?;
    if first.trim() != "---" {
        return None;
    }

    let mut offset = first.len() + 1;
    let mut yaml_lines = Vec::new();
    let mut closed = false;
    for (_, line) in lines {
        offset += line.len() + 1;
        if line.trim() == "---" {
            closed = true;
            break;
        }
        yaml_lines.push(line);
    }
    if !closed {
        return None;
    }

    let body = &source[offset.min(source.len())..];
    Some((yaml_lines, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_well_formed_page_when_round_tripping_then_fields_survive() {
        let created = Utc::now();
        let fm = FrontMatter {
            title: "Meeting notes".to_string(),
            created,
            modified: created,
            tags: Some(vec!["work".to_string(), "q3".to_string()]),
        };
        let encoded = encode(&fm, "Body text.\n");
        let (decoded, body) = decode(&encoded, "fallback");
        assert_eq!(decoded.title, "Meeting notes");
        assert_eq!(decoded.tags, Some(vec!["work".to_string(), "q3".to_string()]));
        assert_eq!(body, "\n\nBody text.\n");
    }

    #[test]
    fn given_body_when_round_tripping_then_two_leading_blank_lines_survive() {
        let fm = FrontMatter::default_for("T");
        let encoded = encode(&fm, "# C");
        let (_, body) = decode(&encoded, "T");
        assert_eq!(body, "\n\n# C");
    }

    #[test]
    fn given_missing_front_matter_when_decoding_then_defaults_and_keeps_whole_body() {
        let (fm, body) = decode("just a plain note, no fences", "42");
        assert_eq!(fm.title, "42");
        assert_eq!(body, "just a plain note, no fences");
    }

    #[test]
    fn given_unclosed_fence_when_decoding_then_falls_back_to_defaults() {
        let (fm, body) = decode("---\ntitle: Broken\nno closing fence here", "7");
        assert_eq!(fm.title, "7");
        assert_eq!(body, "---\ntitle: Broken\nno closing fence here");
    }

    #[test]
    fn given_malformed_yaml_when_decoding_then_falls_back_to_defaults() {
        let (fm, _) = decode("---\ntitle: [unterminated\n---\n\nbody", "99");
        assert_eq!(fm.title, "99");
    }

    #[test]
    fn given_missing_title_key_when_decoding_then_uses_fallback_but_keeps_timestamps() {
        let created = "2024-01-01T00:00:00Z";
        let raw = format!("---\ncreated: {created}\nmodified: {created}\n---\n\nbody text");
        let (fm, body) = decode(&raw, "untitled-5");
        assert_eq!(fm.title, "untitled-5");
        assert_eq!(fm.created.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(body, "\nbody text");
    }

    #[test]
    fn given_no_tags_when_encoding_then_tags_line_is_omitted() {
        let fm = FrontMatter::default_for("x");
        let encoded = encode(&fm, "body");
        assert!(!encoded.contains("tags"));
    }
}
