//! Builds syntax trees from source snippets.
//!
//! Desugarings that are simpler to write as source than as trees (promoted
//! constructor parameters, enum case factories) go through here. Snippets
//! are scanned as a `<generated>` file.

use crate::{
    ast::{Expr, Stmt, StmtKind},
    error::SyntaxError,
    lexer, parser,
    report::ErrorReporter,
    token::Position,
};

const GENERATED_FILE: &str = "<generated>";

/// Parses `code` into top-level declarations. Failures are reported against
/// `pos`, the location the snippet stands in for.
pub fn generate(
    code: &str,
    pos: &Position,
    reporter: &dyn ErrorReporter,
) -> Result<Vec<Stmt>, SyntaxError> {
    snippet(code, reporter).map_err(|e| report_at(pos, e, reporter))
}

/// Parses `code`, which must hold exactly one statement.
pub fn generate_stmt(
    code: &str,
    pos: &Position,
    reporter: &dyn ErrorReporter,
) -> Result<Stmt, SyntaxError> {
    snippet_stmt(code, reporter).map_err(|e| report_at(pos, e, reporter))
}

/// Parses `code`, which must hold exactly one expression.
pub fn generate_expr(
    code: &str,
    pos: &Position,
    reporter: &dyn ErrorReporter,
) -> Result<Expr, SyntaxError> {
    let stmt = snippet_stmt(code, reporter).map_err(|e| report_at(pos, e, reporter))?;
    match stmt.kind {
        StmtKind::Expr(expr) => Ok(expr),
        _ => Err(report_at(
            pos,
            syntax_error(stmt.pos, "Expected an expression"),
            reporter,
        )),
    }
}

fn snippet(code: &str, reporter: &dyn ErrorReporter) -> Result<Vec<Stmt>, SyntaxError> {
    let tokens = lexer::scan(code, GENERATED_FILE.into(), reporter);
    parser::parse_unreported(&tokens, reporter)
}

pub(crate) fn snippet_stmt(code: &str, reporter: &dyn ErrorReporter) -> Result<Stmt, SyntaxError> {
    let mut stmts = snippet(code, reporter)?;
    match stmts.len() {
        1 => Ok(stmts.remove(0)),
        len => {
            let pos = Position::new(0, code.len(), GENERATED_FILE.into());
            let message = format!("Expected a single statement, found {len}");
            Err(syntax_error(pos, &message))
        }
    }
}

fn syntax_error(pos: Position, message: &str) -> SyntaxError {
    SyntaxError {
        pos,
        message: message.to_owned(),
    }
}

fn report_at(pos: &Position, error: SyntaxError, reporter: &dyn ErrorReporter) -> SyntaxError {
    let error = SyntaxError {
        pos: pos.clone(),
        ..error
    };
    reporter.report(&error.pos, &error.message);
    error
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        ast::{ExprKind, Literal},
        report::CollectingReporter,
    };

    fn anchor() -> Position {
        Position::new(10, 20, "main.phs".into())
    }

    #[test]
    fn test_generate_stmt() {
        let reporter = CollectingReporter::new();
        let stmt = generate_stmt("this.x = x", &anchor(), &reporter).unwrap();
        let StmtKind::Expr(expr) = stmt.kind else {
            panic!("expected an expression statement");
        };
        assert!(matches!(expr.kind, ExprKind::Set { .. }));
        assert_eq!(&*expr.pos.file, GENERATED_FILE);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn test_generate_expr() {
        let reporter = CollectingReporter::new();
        let expr = generate_expr("\"a\"", &anchor(), &reporter).unwrap();
        assert_eq!(expr.kind, ExprKind::Literal(Literal::String("a".into())));
    }

    #[test]
    fn test_generate_many() {
        let reporter = CollectingReporter::new();
        let stmts = generate("var a = 1\nvar b = 2", &anchor(), &reporter).unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_single_statement_required() {
        let reporter = CollectingReporter::new();
        let error = generate_stmt("a\nb", &anchor(), &reporter).unwrap_err();
        assert_eq!(error.message, "Expected a single statement, found 2");
        assert_eq!(error.pos, anchor());
        assert_eq!(reporter.messages(), ["Expected a single statement, found 2"]);
    }

    #[test]
    fn test_expression_required() {
        let reporter = CollectingReporter::new();
        let error = generate_expr("var a = 1", &anchor(), &reporter).unwrap_err();
        assert_eq!(error.message, "Expected an expression");
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn test_syntax_errors_are_reported_once() {
        let reporter = CollectingReporter::new();
        let error = generate_stmt("var = 1", &anchor(), &reporter).unwrap_err();
        assert_eq!(error.message, "Expected a variable name");
        assert_eq!(reporter.error_count(), 1);
    }
}
