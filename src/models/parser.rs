//! Parser for `ollama list` output
//!
//! The column layout of `ollama list` has changed between releases (with or
//! without an ID column, with or without a date, with or without a tag). Each
//! known layout is a pure matcher tried in priority order; a line no matcher
//! recognises still yields a record through a whitespace-split fallback, so a
//! reformatted line never drops out of the inventory.
//!
//! ```text
//! NAME                ID              SIZE      MODIFIED
//! llama3:8b           365c0bd3c000    4.7 GB    2 weeks ago
//! qwen2:7b  4.4GB  2024-05-01
//! mistral  4.1GB
//! ```

use super::record::ModelRecord;
use regex::Regex;
use std::sync::LazyLock;

const NAME: &str = r"[A-Za-z0-9_./-]+";
const TAG: &str = r"[^\s]+";
const SIZE: &str = r"[0-9][0-9.]*\s?(?:[KMGT]i?)?B?";
const DIGEST: &str = r"[0-9a-f]{12,64}";

/// Fields pulled out of one listing line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMatch {
    pub name: String,
    pub tag: String,
    pub id: String,
    pub size: String,
    pub modified_date: String,
}

impl RowMatch {
    fn into_record(self) -> ModelRecord {
        ModelRecord::new(self.name, self.tag, self.size, self.modified_date).with_id(self.id)
    }
}

/// A layout recogniser: `Some` when the line has exactly this shape
pub type Matcher = fn(&str) -> Option<RowMatch>;

/// Known layouts, most specific first
pub const MATCHERS: &[(&str, Matcher)] = &[
    ("digest", match_digest),
    ("tagged_size_date", match_tagged_size_date),
    ("tagged_size", match_tagged_size),
    ("size_date", match_size_date),
    ("size", match_size),
];

fn compile(pattern: String) -> Regex {
    // Patterns are assembled from the constants above and covered by tests
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid listing pattern {pattern}: {e}"))
}

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(format!(
        r"^({NAME})(?::({TAG}))?\s+({DIGEST})\s+({SIZE})(?:\s+(.+))?$"
    ))
});
static TAGGED_SIZE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"^({NAME}):({TAG})\s+({SIZE})\s+(.+)$")));
static TAGGED_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"^({NAME}):({TAG})\s+({SIZE})$")));
static SIZE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"^({NAME})\s+({SIZE})\s+(.+)$")));
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| compile(format!(r"^({NAME})\s+({SIZE})$")));

static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"^[KMGT]?i?B$".to_string()));

/// A spaced size with no date backtracks into `size = "4.4", date = "GB"`
fn is_bare_unit(date: &str) -> bool {
    UNIT_RE.is_match(date)
}

fn group(caps: &regex::Captures<'_>, index: usize) -> String {
    caps.get(index)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// `name[:tag]  <hex id>  size  [date]` as printed by current daemons
pub fn match_digest(line: &str) -> Option<RowMatch> {
    let caps = DIGEST_RE.captures(line)?;
    Some(RowMatch {
        name: group(&caps, 1),
        tag: group(&caps, 2),
        id: group(&caps, 3),
        size: group(&caps, 4),
        modified_date: group(&caps, 5),
    })
}

/// `name:tag  size  date`
pub fn match_tagged_size_date(line: &str) -> Option<RowMatch> {
    let caps = TAGGED_SIZE_DATE_RE.captures(line)?;
    if is_bare_unit(&group(&caps, 4)) {
        return None;
    }
    Some(RowMatch {
        name: group(&caps, 1),
        tag: group(&caps, 2),
        size: group(&caps, 3),
        modified_date: group(&caps, 4),
        ..Default::default()
    })
}

/// `name:tag  size`
pub fn match_tagged_size(line: &str) -> Option<RowMatch> {
    let caps = TAGGED_SIZE_RE.captures(line)?;
    Some(RowMatch {
        name: group(&caps, 1),
        tag: group(&caps, 2),
        size: group(&caps, 3),
        ..Default::default()
    })
}

/// `name  size  date`
pub fn match_size_date(line: &str) -> Option<RowMatch> {
    let caps = SIZE_DATE_RE.captures(line)?;
    if is_bare_unit(&group(&caps, 3)) {
        return None;
    }
    Some(RowMatch {
        name: group(&caps, 1),
        size: group(&caps, 2),
        modified_date: group(&caps, 3),
        ..Default::default()
    })
}

/// `name  size`
pub fn match_size(line: &str) -> Option<RowMatch> {
    let caps = SIZE_RE.captures(line)?;
    Some(RowMatch {
        name: group(&caps, 1),
        size: group(&caps, 2),
        ..Default::default()
    })
}

/// Permissive split used when no layout matches; total over non-empty lines
pub fn fallback_split(line: &str) -> RowMatch {
    let mut tokens = line.split_whitespace();
    let first = tokens.next().unwrap_or_default();
    let (name, tag) = first.split_once(':').unwrap_or((first, ""));
    let size = tokens.next().unwrap_or_default();
    let modified_date = tokens.collect::<Vec<_>>().join(" ");

    RowMatch {
        name: name.to_string(),
        tag: tag.to_string(),
        id: String::new(),
        size: size.to_string(),
        modified_date,
    }
}

/// Whether the line is the column header (first column is exactly `NAME`)
pub fn is_header(line: &str) -> bool {
    line.split_whitespace().next() == Some("NAME")
}

/// Parse one trimmed, non-empty, non-header line
pub fn parse_line(line: &str) -> ModelRecord {
    for (layout, matcher) in MATCHERS {
        if let Some(row) = matcher(line) {
            tracing::trace!(layout = %layout, line = %line, "Matched listing layout");
            return row.into_record();
        }
    }

    tracing::debug!(line = %line, "No listing layout matched, using whitespace split");
    fallback_split(line).into_record()
}

/// Convert raw `ollama list` output into records, one per data line
pub fn parse_inventory(raw: &str) -> Vec<ModelRecord> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_header(line))
        .map(parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_four_columns() {
        let records = parse_inventory("NAME\nllama3:8b  1.2GB  2024-01-01");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.name(), "llama3");
        assert_eq!(r.tag(), "8b");
        assert_eq!(r.full_name(), "llama3:8b");
        assert_eq!(r.size(), "1.2GB");
        assert_eq!(r.modified_date(), "2024-01-01");
        assert_eq!(r.id(), "");
    }

    #[test]
    fn test_current_layout_with_digest() {
        let raw = "NAME                ID              SIZE      MODIFIED\n\
                   llama3:latest       365c0bd3c000    4.7 GB    2 weeks ago\n\
                   nomic-embed-text:latest    0a109f422b47    274 MB    3 months ago\n";
        let records = parse_inventory(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_name(), "llama3:latest");
        assert_eq!(records[0].id(), "365c0bd3c000");
        assert_eq!(records[0].size(), "4.7 GB");
        assert_eq!(records[0].modified_date(), "2 weeks ago");
        assert_eq!(records[1].name(), "nomic-embed-text");
        assert_eq!(records[1].size(), "274 MB");
    }

    #[test]
    fn test_namespaced_model_name() {
        let records =
            parse_inventory("hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF:Q4_K_M  a1b2c3d4e5f6  807 MB  5 days ago");
        assert_eq!(records[0].name(), "hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF");
        assert_eq!(records[0].tag(), "Q4_K_M");
        assert_eq!(records[0].id(), "a1b2c3d4e5f6");
    }

    #[test]
    fn test_tagged_size_only() {
        let row = match_tagged_size("phi3:mini  2.2GB").unwrap();
        assert_eq!(row.name, "phi3");
        assert_eq!(row.tag, "mini");
        assert_eq!(row.size, "2.2GB");
        assert_eq!(row.modified_date, "");
    }

    #[test]
    fn test_untagged_size_date() {
        let records = parse_inventory("mistral  4.1GB  2024-03-02 10:11:12");
        let r = &records[0];
        assert_eq!(r.full_name(), "mistral");
        assert_eq!(r.tag(), "");
        assert_eq!(r.size(), "4.1GB");
        assert_eq!(r.modified_date(), "2024-03-02 10:11:12");
    }

    #[test]
    fn test_untagged_size_only() {
        let row = match_size("gemma  1.7GB").unwrap();
        assert_eq!(row.name, "gemma");
        assert_eq!(row.size, "1.7GB");
        assert!(match_size_date("gemma  1.7GB").is_none());
    }

    #[test]
    fn test_spaced_size_without_date() {
        let records = parse_inventory("qwen2:7b  4.4 GB\nmistral  4.1 GB");
        assert_eq!(records[0].size(), "4.4 GB");
        assert_eq!(records[0].modified_date(), "");
        assert_eq!(records[1].size(), "4.1 GB");
        assert_eq!(records[1].modified_date(), "");
    }

    #[test]
    fn test_priority_order() {
        // A tagged line with a date must not be claimed by the tag-less layouts
        let line = "llama3:8b  1.2GB  yesterday";
        assert!(match_size_date(line).is_none());
        assert!(match_tagged_size_date(line).is_some());

        // Without an ID column the digest layout stays out of the way
        assert!(match_digest(line).is_none());
    }

    #[test]
    fn test_fallback_keeps_unrecognised_line() {
        let records = parse_inventory("weird:model  ???  sometime last year");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.name(), "weird");
        assert_eq!(r.tag(), "model");
        assert_eq!(r.size(), "???");
        assert_eq!(r.modified_date(), "sometime last year");
    }

    #[test]
    fn test_fallback_single_token() {
        let row = fallback_split("lonely");
        assert_eq!(row.name, "lonely");
        assert_eq!(row.tag, "");
        assert_eq!(row.size, "");
        assert_eq!(row.modified_date, "");
    }

    #[test]
    fn test_name_prefixed_model_is_not_header() {
        assert!(is_header("NAME    ID    SIZE    MODIFIED"));
        assert!(is_header("  NAME"));
        assert!(!is_header("NAMEbot:latest  1.2GB  2024-01-01"));

        let records = parse_inventory("NAME  SIZE  MODIFIED\nNAMEbot:latest  1.2GB  2024-01-01\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_name(), "NAMEbot:latest");
    }

    #[test]
    fn test_header_and_blank_lines_skipped() {
        let raw = "\n   \nNAME    SIZE    MODIFIED\n\nqwen2:7b  4.4 GB  now\n\n";
        let records = parse_inventory(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_name(), "qwen2:7b");
    }

    #[test]
    fn test_empty_listing() {
        assert!(parse_inventory("NAME    ID    SIZE    MODIFIED\n").is_empty());
        assert!(parse_inventory("").is_empty());
    }

    #[test]
    fn test_crlf_output() {
        let records = parse_inventory("NAME\r\nllama3:8b  1.2GB  2024-01-01\r\n");
        assert_eq!(records[0].modified_date(), "2024-01-01");
    }

    #[test]
    fn test_every_matcher_compiles() {
        for (_, matcher) in MATCHERS {
            let _ = matcher("x");
        }
    }
}
