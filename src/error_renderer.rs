//! Error rendering using ariadne
//!
//! Errors from the engine carry a byte span into the script that produced
//! them. These helpers print the script with the failing region underlined.
//! Errors without a span (for example the time budget) render as a single
//! line.

use std::io::Write;

use ariadne::{Color, Label, Report, ReportKind, Source};
use formula_core::errors::InvalidExpression;

const SOURCE_ID: &str = "<formula>";

/// Render an error with formatting to stderr
///
/// # Example
/// ```no_run
/// use formula::{Engine, render_error};
///
/// let source = "1 +";
/// if let Err(e) = Engine::default().evaluate(source, &[]) {
///     render_error(&e, source);
/// }
/// ```
pub fn render_error(error: &InvalidExpression, source: &str) {
    render_error_to_writer(error, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(
    error: &InvalidExpression,
    source: &str,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    render_error_to_writer(error, source, writer, true)
}

/// Render an error to a String (useful for logs and web UIs)
pub fn render_error_to_string(error: &InvalidExpression, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &InvalidExpression, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &InvalidExpression,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    let Some(span) = error.span() else {
        return writeln!(writer, "{}: {}", error.type_name(), error.message());
    };
    // Spans are byte offsets; ariadne counts characters by default.
    let config = ariadne::Config::default()
        .with_color(use_color)
        .with_index_type(ariadne::IndexType::Byte);
    let range = span.0.start.min(source.len())..span.0.end.min(source.len());

    Report::build(ReportKind::Error, (SOURCE_ID, range.clone()))
        .with_code(error.type_name())
        .with_message(error.message())
        .with_config(config)
        .with_label(
            Label::new((SOURCE_ID, range))
                .with_message(error.message())
                .with_color(Color::Red),
        )
        .finish()
        .write((SOURCE_ID, Source::from(source)), &mut *writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;

    #[test]
    fn test_render_parse_error() {
        let source = "1 + + ";
        let err = Engine::default().evaluate(source, &[]).unwrap_err();
        let output = render_error_to_string_no_color(&err, source);

        assert!(output.contains("ExpressionSyntaxError"));
        assert!(output.contains("1 + +"));
    }

    #[test]
    fn test_render_eval_error_points_at_source() {
        let source = "x = 1\ny = x / 0";
        let err = Engine::default().evaluate(source, &[]).unwrap_err();
        let output = render_error_to_string_no_color(&err, source);

        assert!(output.contains("division by zero"));
        assert!(output.contains("y = x / 0"));
        assert!(output.lines().count() > 1);
    }

    #[test]
    fn test_render_error_without_span() {
        let err = InvalidExpression::limit("Execution exceeded time limit of 0 seconds");
        let output = render_error_to_string_no_color(&err, "1");
        assert_eq!(
            output,
            "InvalidExpression: Execution exceeded time limit of 0 seconds\n"
        );
    }
}
