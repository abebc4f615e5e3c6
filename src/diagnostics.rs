//! Shared diagnostics collector.
//!
//! Every pass holds a `&mut Diagnostics` and reports into it rather than
//! returning `Result` on the first error. The driver checks `has_errors()`
//! after each pass and skips the rest of the pipeline if it is non-empty.

use std::path::{Path, PathBuf};

/// A half-open byte range plus the 1-indexed source line it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub start: usize,
    pub end: usize,
    pub line: u32,
}

impl Position {
    pub fn new(start: usize, end: usize, line: u32) -> Self {
        Position { start, end, line }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub position: Position,
}

/// Maximum number of characters scanned backward/forward when rendering an
/// error excerpt. Hitting the cap (rather than a newline) triggers an
/// ellipsis on that side.
const MAX_LINE_PADDING: usize = 30;

#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    file_path: PathBuf,
}

impl Diagnostics {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Diagnostics {
            errors: Vec::new(),
            file_path: file_path.into(),
        }
    }

    pub fn report(&mut self, message: impl Into<String>, position: Position) {
        self.errors.push(Diagnostic {
            message: message.into(),
            position,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Render every collected diagnostic against `source` and print to stderr.
    pub fn print(&self, source: &str) {
        for diagnostic in &self.errors {
            eprint!("{}", render(diagnostic, source, &self.file_path));
        }
    }
}

fn file_basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Render a single diagnostic as a two-line excerpt with a caret bar, matching
/// the original compiler's column-budgeted excerpt algorithm exactly.
fn render(diagnostic: &Diagnostic, source: &str, file_path: &Path) -> String {
    let bytes = source.as_bytes();
    let Position { start, end, line } = diagnostic.position;
    let end = end.min(bytes.len().saturating_sub(1));

    let mut leading = Vec::new();
    let mut leading_hit_cap = true;
    {
        let mut i = start;
        while leading.len() < MAX_LINE_PADDING {
            if i == 0 {
                leading_hit_cap = false;
                break;
            }
            let prev = i - 1;
            if bytes[prev] == b'\n' {
                leading_hit_cap = false;
                break;
            }
            leading.push(bytes[prev]);
            i = prev;
        }
    }
    leading.reverse();

    let mut trailing = Vec::new();
    let mut trailing_hit_cap = true;
    {
        let mut i = end + 1;
        while trailing.len() < MAX_LINE_PADDING {
            if i >= bytes.len() || bytes[i] == b'\n' {
                trailing_hit_cap = false;
                break;
            }
            trailing.push(bytes[i]);
            i += 1;
        }
    }

    let mut excerpt = String::new();
    if leading_hit_cap {
        excerpt.push_str("...");
    }
    excerpt.push_str(&String::from_utf8_lossy(&leading));
    excerpt.push_str(&String::from_utf8_lossy(&bytes[start..=end]));
    excerpt.push_str(&String::from_utf8_lossy(&trailing));
    if trailing_hit_cap {
        excerpt.push_str("...");
    }

    let line_info = format!("Line {}: ", line);
    let leading_padding = if leading_hit_cap {
        3 + leading.len()
    } else {
        leading.len()
    };
    let padding_amount = line_info.len() + leading_padding - 1;
    let caret_count = end - start + 1;
    let carets = "^".repeat(caret_count);

    format!(
        "ERROR: {message} at file: '{file}', line: {line}\n{line_info}{excerpt}\n{pad}{carets}\n\n",
        message = diagnostic.message,
        file = file_basename(file_path),
        line = line,
        line_info = line_info,
        excerpt = excerpt,
        pad = " ".repeat(padding_amount),
        carets = carets,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_errors_initially() {
        let diags = Diagnostics::new("test.an");
        assert!(!diags.has_errors());
        assert!(diags.errors().is_empty());
    }

    #[test]
    fn report_accumulates() {
        let mut diags = Diagnostics::new("test.an");
        diags.report("oops", Position::new(0, 0, 1));
        diags.report("oops again", Position::new(2, 2, 1));
        assert!(diags.has_errors());
        assert_eq!(diags.errors().len(), 2);
    }

    #[test]
    fn render_short_line_no_ellipsis() {
        let mut diags = Diagnostics::new("test.an");
        let source = "let x = @;";
        let at = source.find('@').unwrap();
        diags.report("Unknown Character '@'", Position::new(at, at, 1));
        let rendered = render(&diags.errors()[0], source, Path::new("test.an"));
        assert!(rendered.contains("ERROR: Unknown Character '@' at file: 'test.an', line: 1"));
        assert!(!rendered.contains("..."));
        assert!(rendered.contains('^'));
        assert!(!rendered.contains("^^"));
    }

    #[test]
    fn render_long_line_gets_ellipsis() {
        let mut diags = Diagnostics::new("test.an");
        let padding = "x".repeat(40);
        let source = format!("{padding}@{padding}");
        let at = padding.len();
        diags.report("Unknown Character '@'", Position::new(at, at, 1));
        let rendered = render(&diags.errors()[0], &source, Path::new("test.an"));
        let occurrences = rendered.matches("...").count();
        assert_eq!(occurrences, 2);
    }

    #[test]
    fn caret_span_covers_multi_char_token() {
        let mut diags = Diagnostics::new("test.an");
        let source = "return ...;";
        diags.report("Unexpected '.'", Position::new(7, 9, 1));
        let rendered = render(&diags.errors()[0], source, Path::new("test.an"));
        let caret_line = rendered.lines().nth(2).unwrap();
        assert_eq!(caret_line.matches('^').count(), 3);
    }
}
