//! Error reporting sinks.
//!
//! Every stage reports through an [`ErrorReporter`]. Reporting never aborts on
//! its own: the scanner and the typer keep going, while the parser bails out
//! through [`SyntaxError`](crate::error::SyntaxError) after reporting.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt::Write,
    rc::Rc,
};

use crate::token::Position;

pub trait ErrorReporter {
    fn report(&self, pos: &Position, message: &str);
}

/// Prints each report to standard output, with the offending source line and
/// a caret underline.
#[derive(Default)]
pub struct DefaultErrorReporter {
    sources: RefCell<HashMap<Rc<str>, Rc<str>>>,
    count: Cell<usize>,
}

impl DefaultErrorReporter {
    pub fn new() -> DefaultErrorReporter {
        DefaultErrorReporter::default()
    }

    /// Registers the text of a file so reports against it can quote it.
    pub fn add_source(&self, file: Rc<str>, text: Rc<str>) {
        self.sources.borrow_mut().insert(file, text);
    }

    pub fn error_count(&self) -> usize {
        self.count.get()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

impl ErrorReporter for DefaultErrorReporter {
    fn report(&self, pos: &Position, message: &str) {
        self.count.set(self.count.get() + 1);
        let sources = self.sources.borrow();
        let source = sources.get(&pos.file).map(|s| &**s);
        println!("{}", render(pos, message, source));
    }
}

/// A reporter that keeps every diagnostic in memory.
#[derive(Default)]
pub struct CollectingReporter {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Position,
    pub message: String,
}

impl CollectingReporter {
    pub fn new() -> CollectingReporter {
        CollectingReporter::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.borrow().is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics
            .borrow()
            .iter()
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, pos: &Position, message: &str) {
        tracing::trace!(%pos, msg = message, "collected diagnostic");
        self.diagnostics.borrow_mut().push(Diagnostic {
            pos: pos.clone(),
            message: message.to_owned(),
        });
    }
}

/// Forwards to another reporter, counting what passes through.
pub struct CountingReporter<'r> {
    inner: &'r dyn ErrorReporter,
    count: Cell<usize>,
}

impl<'r> CountingReporter<'r> {
    pub fn new(inner: &'r dyn ErrorReporter) -> CountingReporter<'r> {
        CountingReporter {
            inner,
            count: Cell::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }
}

impl ErrorReporter for CountingReporter<'_> {
    fn report(&self, pos: &Position, message: &str) {
        self.count.set(self.count.get() + 1);
        self.inner.report(pos, message);
    }
}

/// Renders a diagnostic. Without the source text only the header and the
/// location are rendered.
pub fn render(pos: &Position, message: &str, source: Option<&str>) -> String {
    let mut out = String::with_capacity(128);
    let w = |out: &mut String, args: std::fmt::Arguments<'_>| {
        out.write_fmt(args).expect("string write should be infallible");
    };

    w(&mut out, format_args!("error: {message}\n"));
    let Some(src) = source else {
        w(&mut out, format_args!("--> {pos}"));
        return out;
    };

    let start = floor_char_boundary(src, pos.start);
    let line_start = src[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = src[start..].find('\n').map_or(src.len(), |i| start + i);
    let line_number = src[..line_start].matches('\n').count() + 1;
    let col = src[line_start..start].chars().count();
    let end = floor_char_boundary(src, pos.end.clamp(start, line_end));
    let underline_len = src[start..end].chars().count().max(1);

    let width = line_number.to_string().len().max(2);
    let gutter = format!("{:width$} |", "");
    let line = src[line_start..line_end].trim_end();

    w(
        &mut out,
        format_args!("--> {}:{line_number}:{}\n", pos.file, col + 1),
    );
    w(&mut out, format_args!("{gutter}\n"));
    w(&mut out, format_args!("{line_number:width$} | {line}\n"));
    w(
        &mut out,
        format_args!("{gutter} {}{}", " ".repeat(col), "^".repeat(underline_len)),
    );
    out
}

fn floor_char_boundary(src: &str, mut i: usize) -> usize {
    i = i.min(src.len());
    while !src.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn pos(start: usize, end: usize) -> Position {
        Position::new(start, end, "main.phs".into())
    }

    #[test]
    fn test_render_with_source() {
        let src = "var a = 1\nvar x = @\n";
        let rendered = render(&pos(18, 19), "Unexpected character: @", Some(src));
        assert_eq!(
            rendered,
            indoc! {"
                error: Unexpected character: @
                --> main.phs:2:9
                   |
                 2 | var x = @
                   |         ^"}
        );
    }

    #[test]
    fn test_render_underlines_the_whole_span() {
        let src = "foo(bar)";
        let rendered = render(&pos(4, 7), "Undeclared variable: bar", Some(src));
        assert!(rendered.ends_with("   |     ^^^"), "{rendered}");
    }

    #[test]
    fn test_render_without_source() {
        let rendered = render(&pos(3, 4), "boom", None);
        assert_eq!(rendered, "error: boom\n--> main.phs:3..4");
    }

    #[test]
    fn test_collecting_reporter_counts() {
        let reporter = CollectingReporter::new();
        assert!(!reporter.has_errors());
        reporter.report(&pos(0, 1), "first");
        reporter.report(&pos(1, 2), "second");
        assert_eq!(reporter.error_count(), 2);
        assert_eq!(reporter.messages(), ["first", "second"]);
    }

    #[test]
    fn test_counting_reporter_forwards() {
        let inner = CollectingReporter::new();
        let counting = CountingReporter::new(&inner);
        counting.report(&pos(0, 1), "only");
        assert_eq!(counting.count(), 1);
        assert_eq!(inner.messages(), ["only"]);
    }
}
