//! Cross-source entity resolution.
//!
//! The two sources spell the same venue differently: full-width vs
//! half-width letters, marketing prefixes such as `那須高原ペットと泊まれる宿`,
//! bracketed annotations and decorative symbols. [`normalize`] reduces a
//! name to a comparison key, and [`group_records`] buckets store records by
//! that key so their reviews can be scored together.
//!
//! | Input | Key |
//! |-------|-----|
//! | `ペンション ありの塔` | `ありの塔` |
//! | `ﾍﾟｯﾄと泊まれる宿 ありの塔` | `ありの塔` |
//! | `Pet Resort Nasu (旧:ホテル)` | `petresortnasu` |
//! | `ホテル` | (empty, excluded) |

pub mod width;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{ReviewRecord, SourceRecord};
use crate::sources::Source;

/// Noise phrases stripped from either end of a name, most specific first.
const NOISE_PHRASES: &[&str] = &[
    "那須高原ペットと泊まれる宿",
    "ペットと泊まれる宿",
    "犬と遊べるペンション",
    "那須温泉",
    "ホテル",
    "ぺんしょん",
    "ペンション",
    "旅館",
    "温泉",
    "高原",
    "の宿",
    "ｉｎｎ",
    "イン",
    "りぞーと",
    "リゾート",
];

const NOISE_PASSES: usize = 3;

const REMOVED_SYMBOLS: &[char] = &[
    '・', '＆', '&', '～', '~', '★', '☆', '＊', '*', '！', '!', '？', '?', '／', '/', '♪', '\'',
    '’', '＇', '-', '－', '‐', ' ', '\u{3000}',
];

static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(][^（）()]*[）)]").expect("valid annotation regex"));

static NOISE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = NOISE_PHRASES
        .iter()
        .map(|phrase| regex::escape(phrase))
        .flat_map(|phrase| [format!("^{}", phrase), format!("{}$", phrase)])
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternatives).expect("valid noise regex")
});

/// Apply `step` until it stops changing the input or `max_passes` is reached.
fn rewrite_until_stable(input: String, max_passes: usize, step: impl Fn(&str) -> String) -> String {
    let mut current = input;
    for _ in 0..max_passes {
        let next = step(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Reduce a venue name to its comparison key.
///
/// Absent, empty and all-noise names yield `""`. Katakana stay full-width;
/// letters and digits come back as lower-case ASCII.
pub fn normalize(name: Option<&str>) -> String {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        return String::new();
    };

    let wide = width::widen(name).to_lowercase();
    let unbracketed = ANNOTATION.replace_all(&wide, "");
    let compact: String = unbracketed
        .chars()
        .filter(|c| !REMOVED_SYMBOLS.contains(c) && !c.is_whitespace())
        .collect();

    let stripped = rewrite_until_stable(compact, NOISE_PASSES, |s| {
        NOISE.replace_all(s, "").into_owned()
    });
    width::narrow(&stripped)
}

/// Store records believed to describe the same physical venue.
#[derive(Debug, Clone)]
pub struct EntityGroup<'a> {
    pub normalized_key: String,
    /// Members in store order.
    pub members: Vec<&'a SourceRecord>,
    pub representative_name: String,
}

impl<'a> EntityGroup<'a> {
    /// Distinct sources contributing to this group, sorted by identifier.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.members.iter().map(|m| m.source).collect();
        sources.sort_by_key(|source| source.as_str());
        sources.dedup();
        sources
    }

    /// The union of all members' scorable reviews.
    pub fn reviews(&self) -> Vec<ReviewRecord> {
        self.members
            .iter()
            .flat_map(|member| member.review_records())
            .collect()
    }
}

/// Group records by normalized name, in first-encounter order.
///
/// Records whose name normalizes to the empty string are logged and left
/// out. The representative name is taken from the first member of the
/// highest-priority source.
pub fn group_records<'a, I>(records: I) -> Vec<EntityGroup<'a>>
where
    I: IntoIterator<Item = &'a SourceRecord>,
{
    let mut groups: Vec<(String, Vec<&'a SourceRecord>)> = Vec::new();

    for record in records {
        let key = normalize(Some(&record.hotel_name));
        if key.is_empty() {
            warn!(
                unique_id = %record.unique_id,
                hotel_name = %record.hotel_name,
                "Name normalizes to nothing; excluded from scoring"
            );
            continue;
        }
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(record),
            None => groups.push((key, vec![record])),
        }
    }

    groups
        .into_iter()
        .map(|(normalized_key, members)| {
            let representative_name = members
                .iter()
                .min_by_key(|m| m.source.priority())
                .map(|m| m.hotel_name.clone())
                .unwrap_or_default();
            debug!(key = %normalized_key, members = members.len(), name = %representative_name, "Resolved entity");
            EntityGroup {
                normalized_key,
                members,
                representative_name,
            }
        })
        .collect()
}
