//! Pull the story section out of a daily note.

/// Heading line that introduces the story in a daily note.
pub const STORY_HEADING: &str = "## 5 minute story";

/// Extract the text under [`STORY_HEADING`].
pub fn extract_story(note: &str) -> Option<String> {
    extract_section(note, STORY_HEADING)
}

/// Return the trimmed body under the first line equal to `heading`.
///
/// The body ends before the next line starting with `#`, or at end of text.
/// The heading comparison is exact (case and whitespace); a trailing `\r` is
/// treated as part of the line ending.  A `#` elsewhere on a line does not
/// end the body.  Returns `None` when the heading is missing or the body is
/// blank.
pub fn extract_section(note: &str, heading: &str) -> Option<String> {
    let mut offset = 0;
    let mut start = None;
    let mut end = note.len();

    for line in note.split_inclusive('\n') {
        let next = offset + line.len();
        match start {
            None if line_content(line) == heading => start = Some(next),
            Some(_) if line.starts_with('#') => {
                end = offset;
                break;
            }
            _ => {}
        }
        offset = next;
    }

    let body = note[start?..end].trim();
    (!body.is_empty()).then(|| body.to_string())
}

fn line_content(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
