/// Repair unterminated markdown constructs in a cumulative answer buffer.
///
/// While an answer is still streaming the buffer routinely ends mid-construct
/// (an open code fence, a dangling `*`), which markdown renderers handle
/// badly. This pass closes whatever is open so every intermediate state is
/// renderable. It is pure and total: no input can make it fail, and re-running
/// it on its own output yields the same string, so the synthetic closers do
/// not flicker as the buffer grows.
pub fn sanitize_markdown(content: &str) -> String {
    let mut sanitized = content.trim().to_string();

    // Unterminated code fence: an odd number of ``` markers means the last
    // fence is still open.
    if count_occurrences(&sanitized, "```") % 2 != 0 {
        sanitized.push_str("\n```");
    }

    // Unbalanced emphasis. A lone trailing `*` is a bold/italic opener that
    // will never be closed on screen, so it is stripped; anywhere else the
    // construct is closed by appending the missing marker.
    if sanitized.matches('*').count() % 2 != 0 {
        if sanitized.ends_with('*') && !sanitized.ends_with("**") {
            sanitized.pop();
        } else {
            sanitized.push('*');
        }
    }

    if sanitized.matches('_').count() % 2 != 0 {
        sanitized.push('_');
    }

    // A header line with no content ("#", "##  ", ...) renders as a bare
    // marker; give it a trailing space so it has renderable content.
    if sanitized.lines().any(is_empty_header) {
        sanitized = sanitized
            .lines()
            .map(|line| {
                if is_empty_header(line) {
                    format!("{line} ")
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    sanitized
}

fn is_empty_header(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '#')
}

/// Non-overlapping occurrence count, the same counting the balancing rules
/// are defined over.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
