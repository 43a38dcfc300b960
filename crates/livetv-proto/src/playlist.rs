//! Extended-M3U playlist parser.
//!
//! `parse` is total: unknown directives, comments, blank lines and anything
//! else it does not recognise are skipped, never reported.

use std::sync::OnceLock;

use regex::Regex;

use crate::protocol::{Channel, DEFAULT_GROUP};

/// Marker that opens a channel metadata line.
pub const METADATA_MARKER: &str = "#EXTINF";

const EXTINF_PREFIX: &str = "#EXTINF:";

fn group_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)group-title="([^"]+)""#).expect("static regex"))
}

fn tvg_logo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)tvg-logo="([^"]+)""#).expect("static regex"))
}

/// Fields collected from metadata lines until the next address line.
struct Pending {
    group: String,
    name: String,
    logo: String,
}

impl Pending {
    fn reset() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            name: String::new(),
            logo: String::new(),
        }
    }

    fn absorb(&mut self, line: &str) {
        if let Some(m) = group_title_re().captures(line).and_then(|c| c.get(1)) {
            self.group = m.as_str().to_string();
        }
        if let Some(name) = display_name(line) {
            self.name = name.to_string();
        }
        if let Some(m) = tvg_logo_re().captures(line).and_then(|c| c.get(1)) {
            self.logo = m.as_str().to_string();
        }
    }
}

/// Text after the first comma that is not inside a quoted attribute value.
/// With unbalanced quotes the first comma on the line is used instead.
fn display_name(line: &str) -> Option<&str> {
    let mut in_quotes = false;
    let mut comma = None;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                comma = Some(idx);
                break;
            }
            _ => {}
        }
    }
    let idx = match comma {
        Some(idx) => idx,
        None if in_quotes => line.find(',')?,
        None => return None,
    };
    let rest = &line[idx + 1..];
    if rest.is_empty() {
        None
    } else {
        Some(rest.trim())
    }
}

/// True when `text` contains at least one channel metadata line marker.
pub fn has_metadata(text: &str) -> bool {
    text.contains(METADATA_MARKER)
}

/// Parse playlist text into channels ordered by `(group, name)`.
pub fn parse(text: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut pending = Pending::reset();
    let mut next_id = 0usize;

    for line in text.lines() {
        let line = line.trim();

        if line.starts_with(EXTINF_PREFIX) {
            pending.absorb(line);
            continue;
        }

        if !line.starts_with("http") {
            continue;
        }

        let id = next_id;
        next_id += 1;
        let done = std::mem::replace(&mut pending, Pending::reset());
        let name = if done.name.is_empty() {
            format!("Channel {}", id + 1)
        } else {
            done.name
        };
        let group = if done.group.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            done.group
        };

        channels.push(Channel {
            id,
            name,
            group,
            url: line.to_string(),
            logo: done.logo,
        });
    }

    // Stable: duplicates of (group, name) keep their parse order.
    channels.sort_by(|a, b| a.group.cmp(&b.group).then_with(|| a.name.cmp(&b.name)));
    channels
}
