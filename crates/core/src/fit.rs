//! Fitting text into social media post limits.
//!
//! Two operations:
//!
//! - [`split`] cuts a long description into chunks of at most `budget`
//!   characters, preferring sentence ends, then clause ends, then word
//!   boundaries, and only hard-cutting a single word longer than the budget.
//! - [`trim`] shortens a finished post to the platform limit at a word
//!   boundary while keeping its trailing hashtag block intact.
//!
//! Lengths are counted in Unicode scalar values.

use crate::{DigestorError, Result};

/// Hard character limit of a single post.
pub const POST_LIMIT: usize = 280;

/// Default chunk budget used before revision.
pub const CHUNK_BUDGET: usize = 220;

/// Marker character opening a hashtag.
pub const HASHTAG_MARKER: char = '#';

const SENTENCE_ENDS: &[char] = &['.', '!', '?', '…'];
const CLAUSE_ENDS: &[char] = &[',', ';', ':', '—', '–'];
const CLOSERS: &[char] = &['"', '\'', ')', ']', '”', '’'];

/// Splits text into chunks of at most `budget` characters.
///
/// Text that already fits is returned unchanged as the only chunk. Longer
/// text is consumed greedily: each chunk ends at the last sentence end in
/// the window if that keeps the chunk at least half full, else at the last
/// clause end under the same rule, else at the last word boundary, else
/// (a single word longer than the budget) at exactly `budget` characters.
/// Whitespace at chunk boundaries is dropped; nothing else is.
///
/// A budget of zero is treated as one. Empty or whitespace-only text yields
/// no chunks.
///
/// # Example
///
/// ```rust
/// use digestor_core::split;
///
/// assert_eq!(split("short text", 220), vec!["short text"]);
///
/// let chunks = split("One sentence here. Another sentence follows.", 25);
/// assert_eq!(chunks, vec!["One sentence here.", "Another sentence follows."]);
/// ```
pub fn split(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);

    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= budget {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        if char_len(rest) <= budget {
            chunks.push(rest.trim_end().to_string());
            break;
        }

        let cut = break_point(rest, budget);
        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    chunks
}

/// Byte offset where the next chunk of `text` should end.
///
/// `text` starts with a non-whitespace character and is longer than `budget`.
fn break_point(text: &str, budget: usize) -> usize {
    let min_fill = budget.div_ceil(2);
    let mut sentence = None;
    let mut clause = None;
    let mut word = None;
    let mut hard_cut = text.len();

    let mut previous: Option<char> = None;
    let mut before_previous: Option<char> = None;

    for (count, (offset, ch)) in text.char_indices().enumerate() {
        if count > budget {
            break;
        }
        if count == budget {
            hard_cut = offset;
        }

        if ch.is_whitespace() && count > 0 {
            word = Some(offset);
            let ends_with = |set: &[char]| {
                previous.is_some_and(|p| set.contains(&p))
                    || (previous.is_some_and(|p| CLOSERS.contains(&p)) && before_previous.is_some_and(|b| set.contains(&b)))
            };
            if count >= min_fill && ends_with(SENTENCE_ENDS) {
                sentence = Some(offset);
            } else if count >= min_fill && ends_with(CLAUSE_ENDS) {
                clause = Some(offset);
            }
        }

        before_previous = previous;
        previous = Some(ch);
    }

    sentence.or(clause).or(word).unwrap_or(hard_cut)
}

/// Shortens a post to at most `limit` characters, keeping trailing hashtags.
///
/// The trailing hashtag block is the maximal run of whitespace-separated
/// tokens at the end of the text that all start with [`HASHTAG_MARKER`]. It
/// is kept verbatim together with the whitespace that precedes it, and the
/// text before it is cut back to the last word boundary that fits. Text
/// already within the limit is returned unchanged.
///
/// # Errors
///
/// Returns [`DigestorError::PreconditionError`] when the hashtag block alone
/// exceeds the limit, or when no word boundary exists early enough to bring
/// the text within the limit.
///
/// # Example
///
/// ```rust
/// use digestor_core::trim;
///
/// let post = format!("{}#CyberSecurity", "A ".repeat(200));
/// let trimmed = trim(&post, 280).unwrap();
/// assert!(trimmed.chars().count() <= 280);
/// assert!(trimmed.ends_with(" #CyberSecurity"));
/// ```
pub fn trim(text: &str, limit: usize) -> Result<String> {
    if char_len(text) <= limit {
        return Ok(text.to_string());
    }

    let text = text.trim_end();
    let block_start = hashtag_block_start(text).unwrap_or(text.len());
    let (prefix, hashtags) = text.split_at(block_start);
    let hashtag_len = char_len(hashtags);

    if hashtag_len > limit {
        return Err(DigestorError::PreconditionError(format!(
            "hashtag block of {} characters exceeds the limit of {}",
            hashtag_len, limit
        )));
    }

    let budget = limit - hashtag_len;
    let shortened = cut_at_word_boundary(prefix, budget).ok_or_else(|| {
        DigestorError::PreconditionError(format!("no word boundary within the first {} characters", budget))
    })?;

    Ok(format!("{}{}", shortened, hashtags))
}

/// Byte offset where the trailing hashtag block, including its leading whitespace, begins.
fn hashtag_block_start(text: &str) -> Option<usize> {
    let mut start = None;
    let mut end = text.len();

    loop {
        let head = &text[..end];
        let token_start = head.rfind(char::is_whitespace).map_or(0, |i| i + next_char_len(head, i));
        let token = &head[token_start..];

        if !is_hashtag(token) {
            break;
        }

        let separator_start = head[..token_start].trim_end().len();
        start = Some(separator_start);
        if separator_start == 0 {
            break;
        }
        end = separator_start;
    }

    start
}

fn is_hashtag(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some(HASHTAG_MARKER) && chars.next().is_some()
}

/// Longest prefix of `text` within `budget` characters ending at a word boundary.
fn cut_at_word_boundary(text: &str, budget: usize) -> Option<&str> {
    if char_len(text) <= budget {
        return Some(text);
    }

    let mut boundary = None;
    for (count, (offset, ch)) in text.char_indices().enumerate() {
        if count > budget {
            break;
        }
        if ch.is_whitespace() {
            boundary = Some(offset);
        }
    }

    boundary.map(|offset| text[..offset].trim_end()).filter(|cut| !cut.is_empty())
}

fn next_char_len(text: &str, offset: usize) -> usize {
    text[offset..].chars().next().map_or(1, char::len_utf8)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
