use chrono::{Datelike, DateTime, Duration, TimeZone, Utc};
use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use log::{debug, trace};

use crate::{display_order, Note};

/// Reduces rich-text markup to plain text for searching and terminal output.
///
/// Tags are dropped (block-level closers become a space) and the common
/// character entities are decoded. Runs of whitespace collapse to one space.
pub fn strip_markup(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for ch in markup.chars() {
        match (in_tag, ch) {
            (false, '<') => {
                in_tag = true;
                tag.clear();
            }
            (true, '>') => {
                in_tag = false;
                if breaks_line(&tag) {
                    text.push(' ');
                }
            }
            (true, c) => tag.push(c),
            (false, c) => text.push(c),
        }
    }

    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn breaks_line(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(
        name.as_str(),
        "br" | "p" | "div" | "li" | "ol" | "ul" | "h1" | "h2" | "h3" | "blockquote" | "pre"
    )
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" decodes to "&lt;" rather than "<"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Notes matching `query`, best match first.
///
/// Matching is fuzzy over the plain-text content. An empty query returns
/// every note in display order.
pub fn search_notes<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let query = query.trim();
    let ordered = display_order(notes);
    if query.is_empty() {
        return ordered;
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut scored: Vec<(i64, &Note)> = ordered
        .into_iter()
        .filter_map(|note| {
            let score = matcher.fuzzy_match(&strip_markup(&note.content), query)?;
            trace!("Note {} matched with score {}", note.id, score);
            Some((score, note))
        })
        .collect();

    // Stable sort keeps display order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    debug!("Search for '{}' matched {} notes", query, scored.len());
    scored.into_iter().map(|(_, note)| note).collect()
}

/// Human-friendly timestamp relative to `now`, in `now`'s time zone.
pub fn format_relative_date<Tz: TimeZone>(timestamp: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = timestamp.with_timezone(&now.timezone());
    let day = local.date_naive();
    let today = now.date_naive();
    let time = local.format("%-I:%M %p");

    if day == today {
        format!("Today at {}", time)
    } else if today.pred_opt() == Some(day) {
        format!("Yesterday at {}", time)
    } else if local.year() == now.year() {
        format!("{} at {}", local.format("%b %-d"), time)
    } else {
        format!("{} at {}", local.format("%b %-d, %Y"), time)
    }
}

/// Time a deleted note has left before the sweeper evicts it, never negative.
pub fn time_until_expiry(deleted_at: DateTime<Utc>, now: DateTime<Utc>, retention: Duration) -> Duration {
    let left = deleted_at + retention - now;
    left.max(Duration::zero())
}

/// Plain text of `content`, cut to `width` characters with an ellipsis.
pub fn preview(content: &str, width: usize) -> String {
    let text = strip_markup(content);
    if text.chars().count() <= width {
        return text;
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}
