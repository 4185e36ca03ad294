//! Template change classification.
//!
//! Compares the template text an asset was deployed from with the current
//! template and grades how much changed. The grade feeds the decision
//! engine's explanation; it never picks an action on its own.
//!
//! | level    | meaning                                                  |
//! |----------|----------------------------------------------------------|
//! | `none`   | identical after newline normalization                    |
//! | `low`    | only front-matter lines changed                          |
//! | `medium` | body changed, under 30% of lines, same section headings  |
//! | `high`   | 30% or more of lines, or a section heading added/removed |

use crate::frontmatter;
use crate::hash::normalize_newlines;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

/// Fraction of touched lines at which a change is graded `high`.
pub const HIGH_CHANGE_RATIO: f64 = 0.30;

/// Fraction of a section's lines at which it is reported as rewritten.
const REWRITE_RATIO: f64 = 0.5;

// ---------------------------------------------------------------------------
// ChangeLevel / ChangeReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeLevel {
    None,
    Low,
    Medium,
    High,
}

impl ChangeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeLevel::None => "none",
            ChangeLevel::Low => "low",
            ChangeLevel::Medium => "medium",
            ChangeLevel::High => "high",
        }
    }
}

impl fmt::Display for ChangeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub level: ChangeLevel,
    pub changed_line_count: usize,
    pub total_line_count: usize,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub fn classify(old: &str, new: &str) -> ChangeReport {
    let old = normalize_newlines(old);
    let new = normalize_newlines(new);
    let total = old.lines().count().max(new.lines().count());

    if old == new {
        return ChangeReport {
            level: ChangeLevel::None,
            changed_line_count: 0,
            total_line_count: total,
            summary: "no changes".to_string(),
        };
    }

    let old_split = frontmatter::split(&old);
    let new_split = frontmatter::split(&new);

    // Adding or dropping the whole block also touches its two fences.
    let fences = if old_split.front_matter.is_some() != new_split.front_matter.is_some() {
        2
    } else {
        0
    };
    let fm_changed = fences
        + changed_lines(
            old_split.front_matter.unwrap_or(""),
            new_split.front_matter.unwrap_or(""),
        );
    let body_changed = changed_lines(old_split.body, new_split.body);
    let changed = fm_changed + body_changed;

    if body_changed == 0 {
        let keys = changed_front_matter_keys(old_split.front_matter, new_split.front_matter);
        let detail = if keys.is_empty() {
            "front matter changed".to_string()
        } else {
            format!("{} changed", keys.join(", "))
        };
        return ChangeReport {
            level: ChangeLevel::Low,
            changed_line_count: changed,
            total_line_count: total,
            summary: format!("metadata only ({detail})"),
        };
    }

    let old_sections = sections(old_split.body);
    let new_sections = sections(new_split.body);
    let structure = StructureDiff::between(&old_sections, &new_sections);

    let ratio = changed as f64 / total.max(1) as f64;
    let level = if structure.is_structural() || ratio >= HIGH_CHANGE_RATIO {
        ChangeLevel::High
    } else {
        ChangeLevel::Medium
    };

    let mut summary = format!("{changed} of {total} lines changed");
    for part in structure.describe(&old_sections, &new_sections) {
        summary.push_str(", ");
        summary.push_str(&part);
    }

    ChangeReport {
        level,
        changed_line_count: changed,
        total_line_count: total,
        summary,
    }
}

/// Number of lines touched by a line-level diff. A run of deletions followed
/// by insertions counts as `max(deleted, inserted)` modified lines.
fn changed_lines(old: &str, new: &str) -> usize {
    if old == new {
        return 0;
    }
    let patch = diffy::create_patch(old, new);
    let mut changed = 0;
    for hunk in patch.hunks() {
        let (mut deleted, mut inserted) = (0usize, 0usize);
        for line in hunk.lines() {
            match line {
                diffy::Line::Delete(_) => deleted += 1,
                diffy::Line::Insert(_) => inserted += 1,
                diffy::Line::Context(_) => {
                    changed += deleted.max(inserted);
                    deleted = 0;
                    inserted = 0;
                }
            }
        }
        changed += deleted.max(inserted);
    }
    changed
}

fn changed_front_matter_keys(old: Option<&str>, new: Option<&str>) -> Vec<String> {
    let parse = |fm: Option<&str>| -> Option<serde_yaml::Mapping> {
        match serde_yaml::from_str::<serde_yaml::Value>(fm.unwrap_or("")).ok()? {
            serde_yaml::Value::Mapping(m) => Some(m),
            serde_yaml::Value::Null => Some(serde_yaml::Mapping::new()),
            _ => None,
        }
    };
    let (Some(old), Some(new)) = (parse(old), parse(new)) else {
        return Vec::new();
    };

    let keys: BTreeSet<String> = old
        .keys()
        .chain(new.keys())
        .filter_map(|k| k.as_str().map(str::to_string))
        .collect();
    keys.into_iter()
        .filter(|k| old.get(k.as_str()) != new.get(k.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*\s*$").unwrap())
}

#[derive(Debug)]
struct Section {
    /// `None` for text before the first heading.
    title: Option<String>,
    text: String,
}

impl Section {
    fn label(&self) -> &str {
        self.title.as_deref().unwrap_or("preamble")
    }
}

/// Split a Markdown body at its headings. Lines inside fenced code blocks
/// never start a section.
fn sections(body: &str) -> Vec<Section> {
    let mut out = vec![Section {
        title: None,
        text: String::new(),
    }];
    let mut in_fence = false;
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence {
            if let Some(caps) = heading_re().captures(line) {
                out.push(Section {
                    title: Some(caps[1].to_string()),
                    text: String::new(),
                });
                continue;
            }
        }
        if let Some(current) = out.last_mut() {
            current.text.push_str(line);
            current.text.push('\n');
        }
    }
    out
}

struct StructureDiff {
    added: Vec<String>,
    removed: Vec<String>,
}

impl StructureDiff {
    fn between(old: &[Section], new: &[Section]) -> Self {
        let titles = |s: &[Section]| -> BTreeSet<String> {
            s.iter().filter_map(|s| s.title.clone()).collect()
        };
        let (old_titles, new_titles) = (titles(old), titles(new));
        Self {
            added: new_titles.difference(&old_titles).cloned().collect(),
            removed: old_titles.difference(&new_titles).cloned().collect(),
        }
    }

    fn is_structural(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    fn describe(&self, old: &[Section], new: &[Section]) -> Vec<String> {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("sections added: {}", self.added.join(", ")));
        }
        if !self.removed.is_empty() {
            parts.push(format!("sections removed: {}", self.removed.join(", ")));
        }
        for section in old {
            let Some(counterpart) = new.iter().find(|n| n.title == section.title) else {
                continue;
            };
            if section.text == counterpart.text {
                continue;
            }
            let lines = section
                .text
                .lines()
                .count()
                .max(counterpart.text.lines().count())
                .max(1);
            let touched = changed_lines(&section.text, &counterpart.text);
            let verb = if touched as f64 / lines as f64 >= REWRITE_RATIO {
                "rewritten"
            } else {
                "edited"
            };
            parts.push(format!("{} section {verb}", section.label()));
        }
        parts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
