//! Noise filter applied after sanitization, per accumulated text block.

/// Known TUI chrome line patterns for a popular agent's prompt banner and
/// hint bar.
///
/// Treated as data per the design notes: a short, anchored pattern list
/// that may need to evolve without touching the filter's logic.
const CHROME_PATTERNS: &[&str] = &[
    "─────────────────────────────────",
    "? for shortcuts",
    "Try \"",
    "Bypassing Permissions",
];

/// Removes TUI chrome, collapses excess blank lines and spaces, and
/// strips lines made entirely of box-drawing, braille, or spinner glyphs.
#[must_use]
pub fn filter(text: &str) -> String {
    let without_chrome_lines: Vec<&str> = text
        .lines()
        .filter(|line| !is_decorative_line(line) && !is_known_chrome_line(line))
        .collect();
    let collapsed_spaces = collapse_spaces(&without_chrome_lines.join("\n"));
    collapse_blank_lines(&collapsed_spaces)
}

fn is_decorative_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.chars().all(is_decorative_glyph)
}

fn is_decorative_glyph(c: char) -> bool {
    let cp = c as u32;
    (0x2500..=0x257F).contains(&cp) // box drawing
        || (0x2800..=0x28FF).contains(&cp) // braille
        || matches!(c, '⠋' | '⠙' | '⠹' | '⠸' | '⠼' | '⠴' | '⠦' | '⠧' | '⠇' | '⠏')
        || c.is_whitespace()
}

fn is_known_chrome_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    CHROME_PATTERNS
        .iter()
        .any(|pattern| trimmed.starts_with(pattern))
}

/// Collapses runs of 3+ blank lines down to 2.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim_end_matches('\n').to_string() + if text.ends_with('\n') { "\n" } else { "" }
}

/// Collapses runs of 2+ spaces to 1, except inside fenced code blocks
/// (detected by matching ``` pairs).
fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;
    for line in text.split('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            out.push_str(line);
        } else if in_fence {
            out.push_str(line);
        } else {
            out.push_str(&collapse_spaces_in_line(line));
        }
        out.push('\n');
    }
    out.trim_end_matches('\n').to_string() + if text.ends_with('\n') { "\n" } else { "" }
}

fn collapse_spaces_in_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut space_run = 0;
    for c in line.chars() {
        if c == ' ' {
            space_run += 1;
            if space_run <= 1 {
                out.push(c);
            }
        } else {
            space_run = 0;
            out.push(c);
        }
    }
    out
}
