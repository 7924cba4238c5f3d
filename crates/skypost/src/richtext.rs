//! Facet detection in raw post text
//!
//! Finds the three kinds of span a post can annotate: links, `@handle`
//! mentions and `#tag`s. Every offset is a byte offset into the UTF-8 text,
//! which is what facet indices on the wire are measured in.
//!
//! The matchers are hand-written rather than regex-driven so the byte
//! semantics stay explicit. They follow the usual leftmost-first, greedy,
//! backtracking reading of these patterns:
//!
//! ```text
//! link    = https?://(www.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b
//!           ([-a-zA-Z0-9()@:%_+.~#?&/=]*[-a-zA-Z0-9@%_+~#/=])?
//! mention = @([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?
//! tag     = #\w+
//! ```
//!
//! Links and mentions must start the text or follow a non-word character.
//! That character belongs to the match for the purpose of non-overlap, so
//! `a.com b.com` style runs separated by a single space are all found, while
//! the reported span never includes it.
//!
//! Each scanner is independent. Their results are not reconciled against
//! each other: a `#fragment` inside a link is reported both as part of the
//! link and as a tag.

use std::ops::Range;

/// A span found by one of the scanners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'t> {
    /// Byte range of the facet in the scanned text
    pub range: Range<usize>,
    /// Captured value: the URI, the handle without `@`, or the tag without `#`
    pub value: &'t str,
}

/// Output of all three scanners over the same text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detected<'t> {
    /// Links in text order
    pub links: Vec<Candidate<'t>>,
    /// Mentions in text order
    pub mentions: Vec<Candidate<'t>>,
    /// Tags in text order
    pub tags: Vec<Candidate<'t>>,
}

/// Run every scanner over `text`.
pub fn detect(text: &str) -> Detected<'_> {
    Detected {
        links: scan_links(text),
        mentions: scan_mentions(text),
        tags: scan_tags(text),
    }
}

/// Find `http://` and `https://` links.
pub fn scan_links(text: &str) -> Vec<Candidate<'_>> {
    scan_bounded(text.as_bytes(), match_link)
        .into_iter()
        .map(|range| Candidate {
            value: &text[range.clone()],
            range,
        })
        .collect()
}

/// Find `@handle` mentions. The range covers the `@`, the value does not.
pub fn scan_mentions(text: &str) -> Vec<Candidate<'_>> {
    scan_bounded(text.as_bytes(), match_mention)
        .into_iter()
        .map(|range| Candidate {
            value: &text[range.start + 1..range.end],
            range,
        })
        .collect()
}

/// Find `#tag`s. Neither the range nor the value includes the `#`.
pub fn scan_tags(text: &str) -> Vec<Candidate<'_>> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == b'#' {
            let start = pos + 1;
            let run = run_len(&bytes[start..], is_word);
            if run > 0 {
                let range = start..start + run;
                found.push(Candidate {
                    value: &text[range.clone()],
                    range,
                });
                pos = start + run;
                continue;
            }
        }
        pos += 1;
    }
    found
}

/// ASCII `\w`. Bytes of multi-byte characters are never word bytes.
#[inline]
fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[inline]
fn run_len(bytes: &[u8], class: impl Fn(u8) -> bool) -> usize {
    bytes.iter().take_while(|b| class(**b)).count()
}

/// `\b` at `pos`: exactly one side is a word byte.
fn word_boundary(bytes: &[u8], pos: usize) -> bool {
    let before = pos > 0 && is_word(bytes[pos - 1]);
    let after = bytes.get(pos).is_some_and(|b| is_word(*b));
    before != after
}

/// Drive a matcher over every position that starts the text or follows a
/// non-word byte not already consumed by the previous match.
fn scan_bounded(bytes: &[u8], matcher: fn(&[u8], usize) -> Option<usize>) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut consumed = 0;
    let mut start = 0;
    while start < bytes.len() {
        let allowed = start == 0 || (start > consumed && !is_word(bytes[start - 1]));
        if allowed {
            if let Some(end) = matcher(bytes, start) {
                found.push(start..end);
                consumed = end;
                start = end + 1;
                continue;
            }
        }
        start += 1;
    }
    found
}

fn is_domain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'@' | b':' | b'%' | b'.' | b'_' | b'+' | b'~' | b'#' | b'=')
}

fn is_final_label(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'(' | b')')
}

fn is_path(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'(' | b')' | b'@' | b':' | b'%' | b'_' | b'+' | b'.' | b'~' | b'#' | b'?' | b'&' | b'/' | b'='
        )
}

fn is_path_end(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'@' | b'%' | b'_' | b'+' | b'~' | b'#' | b'/' | b'=')
}

const MAX_DOMAIN_LEN: usize = 256;
const MAX_FINAL_LABEL_LEN: usize = 6;

fn match_link(bytes: &[u8], start: usize) -> Option<usize> {
    let rest = &bytes[start..];
    let scheme = if rest.starts_with(b"https://") {
        8
    } else if rest.starts_with(b"http://") {
        7
    } else {
        return None;
    };
    // `www.` needs no special casing: every byte of it is a domain byte, so
    // the match ends at the same place with or without it.
    let host = start + scheme;
    let domain_run = run_len(&bytes[host..], is_domain).min(MAX_DOMAIN_LEN);
    for domain in (1..=domain_run).rev() {
        let dot = host + domain;
        if bytes.get(dot) != Some(&b'.') {
            continue;
        }
        let label = dot + 1;
        let label_run = run_len(&bytes[label..], is_final_label).min(MAX_FINAL_LABEL_LEN);
        for len in (1..=label_run).rev() {
            let end = label + len;
            if word_boundary(bytes, end) {
                return Some(end + path_len(&bytes[end..]));
            }
        }
    }
    None
}

/// Longest run of path bytes that ends on a path-end byte, or zero.
fn path_len(bytes: &[u8]) -> usize {
    let run = run_len(bytes, is_path);
    bytes[..run]
        .iter()
        .rposition(|b| is_path_end(*b))
        .map_or(0, |last| last + 1)
}

const MAX_LABEL_LEN: usize = 63;

fn is_label(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

fn match_mention(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'@') {
        return None;
    }
    // every position right after a complete `label.` group, in order
    let mut group_ends = Vec::new();
    let mut pos = start + 1;
    loop {
        let seg = run_len(&bytes[pos..], is_label);
        let label = &bytes[pos..pos + seg];
        let valid = (1..=MAX_LABEL_LEN).contains(&seg)
            && label[0].is_ascii_alphanumeric()
            && label[seg - 1].is_ascii_alphanumeric();
        if !valid || bytes.get(pos + seg) != Some(&b'.') {
            break;
        }
        pos += seg + 1;
        group_ends.push(pos);
    }
    group_ends
        .iter()
        .rev()
        .find_map(|&tld| final_label_len(&bytes[tld..]).map(|len| tld + len))
}

/// Greedy length of a final handle label at the head of `bytes`.
fn final_label_len(bytes: &[u8]) -> Option<usize> {
    if !bytes.first()?.is_ascii_alphabetic() {
        return None;
    }
    let tail = run_len(&bytes[1..], is_label).min(MAX_LABEL_LEN - 1);
    let kept = bytes[1..=tail]
        .iter()
        .rposition(|b| b.is_ascii_alphanumeric())
        .map_or(0, |last| last + 1);
    Some(1 + kept)
}
