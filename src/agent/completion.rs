//! Completion marker detection.

pub const SUMMARY_OPEN: &str = "<task_summary>";
pub const SUMMARY_CLOSE: &str = "</task_summary>";

/// Pull the summary out of assistant text, if the agent declared itself done.
///
/// The summary is the trimmed text of the first non-blank
/// `<task_summary>…</task_summary>` block. A missing closing tag takes the
/// rest of the text. Blank blocks are skipped; if every block is blank the
/// agent is not done.
pub fn extract_completion_signal(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(open) = rest.find(SUMMARY_OPEN) {
        let body = &rest[open + SUMMARY_OPEN.len()..];
        let (inner, after) = match body.find(SUMMARY_CLOSE) {
            Some(end) => (&body[..end], &body[end + SUMMARY_CLOSE.len()..]),
            None => (body, ""),
        };

        let summary = inner.trim();
        if !summary.is_empty() {
            return Some(summary.to_string());
        }
        rest = after;
    }
    None
}
