//! Page templates with named slots.
//!
//! A template is ordinary HTML containing exactly one of each slot marker:
//!
//! ```text
//! <title>{{title:Home}}</title>
//! <span>{{updated}}</span>
//! {{content}}
//! ```
//!
//! Text after a `:` is the slot's default, used when no value is supplied.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// The substitution points a page template must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Title,
    Updated,
    Content,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Title, Slot::Updated, Slot::Content];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::Title => "title",
            Slot::Updated => "updated",
            Slot::Content => "content",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }

    fn index(&self) -> usize {
        match self {
            Slot::Title => 0,
            Slot::Updated => 1,
            Slot::Content => 2,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot { slot: Slot, default: String },
}

/// Values substituted into a [`Template`].
///
/// `title` and `updated` are plain text and get HTML-escaped; `content` is
/// inserted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotValues {
    pub title: Option<String>,
    pub updated: Option<String>,
    pub content: Option<String>,
}

/// A parsed page template. Every slot occurs exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

fn slot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_]+)\s*(?::([^}]*))?\}\}").expect("slot pattern is valid")
    })
}

impl Template {
    /// Parse template source, validating that each slot appears once.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut seen = [0usize; 3];
        let mut cursor = 0;

        for caps in slot_pattern().captures_iter(source) {
            let whole = caps.get(0).expect("group 0 always present");
            let name = &caps[1];
            let slot = Slot::from_name(name)
                .ok_or_else(|| Error::Template(format!("unknown slot '{{{{{name}}}}}'")))?;
            seen[slot.index()] += 1;

            if whole.start() > cursor {
                segments.push(Segment::Literal(source[cursor..whole.start()].to_string()));
            }
            segments.push(Segment::Slot {
                slot,
                default: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            });
            cursor = whole.end();
        }
        if cursor < source.len() {
            segments.push(Segment::Literal(source[cursor..].to_string()));
        }

        for slot in Slot::ALL {
            match seen[slot.index()] {
                1 => {}
                0 => return Err(Error::Template(format!("missing slot '{slot}'"))),
                n => {
                    return Err(Error::Template(format!(
                        "slot '{slot}' appears {n} times, expected once"
                    )))
                }
            }
        }

        Ok(Self { segments })
    }

    /// Substitute `values` into the template.
    pub fn render(&self, values: &SlotValues) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot { slot, default } => match slot {
                    Slot::Title => {
                        let text = values.title.as_deref().unwrap_or(default);
                        out.push_str(&html_escape::encode_text(text));
                    }
                    Slot::Updated => {
                        let text = values.updated.as_deref().unwrap_or(default);
                        out.push_str(&html_escape::encode_text(text));
                    }
                    Slot::Content => {
                        out.push_str(values.content.as_deref().unwrap_or(default));
                    }
                },
            }
        }
        out
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}
