//! Text helpers for messages going back into Slack.

/// Slack message length limit for `chat.postMessage`.
pub const SLACK_MAX_LEN: usize = 4000;

/// Split a long message into chunks of at most `max` characters.
///
/// Prefers the last newline inside the window; falls back to a hard cut
/// when a single line is longer than `max`. Only the one newline at a split
/// point is dropped; blank lines after it are kept.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset of the first char past the window.
        let window_end = remaining
            .char_indices()
            .nth(max)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..window_end];

        let split_at = match window.rfind('\n') {
            Some(0) | None => window_end,
            Some(i) => i,
        };

        chunks.push(remaining[..split_at].to_string());
        let rest = &remaining[split_at..];
        remaining = rest.strip_prefix('\n').unwrap_or(rest);
    }

    chunks
}

/// Escape the three characters Slack's mrkdwn treats as control sequences.
pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
