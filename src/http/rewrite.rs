//! Absolute-URI to origin-form rewriting of the outbound request.
//!
//! The rewrite works on raw bytes so that everything outside the replaced
//! region reaches the upstream byte-identical.

use memchr::memmem;

use crate::config::RewriteMode;
use crate::http::request::RequestLine;

/// Rewrite `raw` so the request line carries `origin` instead of the
/// absolute-URI target.
///
/// `FirstOccurrence` and `AllOccurrences` search for `"<method> <target>"`
/// textually; with `AllOccurrences` a body containing the same text is
/// rewritten as well. `RequestLine` replaces the target token by position.
pub fn rewrite_request(raw: &[u8], line: &RequestLine, origin: &str, mode: RewriteMode) -> Vec<u8> {
    let needle = line.method_and_target();
    let replacement = line.method_with(origin);

    match mode {
        RewriteMode::FirstOccurrence => replace(raw, &needle, &replacement, 1),
        RewriteMode::AllOccurrences => replace(raw, &needle, &replacement, usize::MAX),
        RewriteMode::RequestLine => {
            let start = line.offset;
            let end = start + needle.len();
            if raw.get(start..end) == Some(&needle[..]) {
                let mut out = Vec::with_capacity(raw.len() - needle.len() + replacement.len());
                out.extend_from_slice(&raw[..start]);
                out.extend_from_slice(&replacement);
                out.extend_from_slice(&raw[end..]);
                out
            } else {
                // `line` was parsed from a different buffer.
                replace(raw, &needle, &replacement, 1)
            }
        }
    }
}

fn replace(haystack: &[u8], needle: &[u8], replacement: &[u8], limit: usize) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }

    let finder = memmem::Finder::new(needle);
    let mut out = Vec::with_capacity(haystack.len() + replacement.len());
    let mut rest = haystack;
    let mut replaced = 0;

    while replaced < limit {
        match finder.find(rest) {
            Some(pos) => {
                out.extend_from_slice(&rest[..pos]);
                out.extend_from_slice(replacement);
                rest = &rest[pos + needle.len()..];
                replaced += 1;
            }
            None => break,
        }
    }

    out.extend_from_slice(rest);
    out
}
