use crate::{
    context::Context,
    parser,
    report::{CollectingReporter, Diagnostic},
    typer,
    util::fmt::tree,
};

pub fn format_errors(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(|d| d.message.clone()).collect()
}

#[track_caller]
pub fn assert_errors(actual: &[Diagnostic], expected: &[&str]) {
    let errors = format_errors(actual);
    ::pretty_assertions::assert_eq!(errors, expected);
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    TyperProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

const TEST_FILE: &str = "test.phs";

#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let reporter = CollectingReporter::new();

    match test {
        Test::ParserProgram(input) => {
            let stmts = parser::parse_source(input, TEST_FILE.into(), &reporter).unwrap_or_default();
            let tree = tree::print_program_string(&stmts, None);
            (tree, format_errors(&reporter.take()))
        }
        Test::TyperProgram(input) => {
            let stmts = parser::parse_source(input, TEST_FILE.into(), &reporter).unwrap_or_default();
            let mut context = Context::default();
            let typed = typer::type_program(&stmts, &mut context, &reporter);
            let tree = tree::print_program_string(&stmts, Some(&typed.table));
            (tree, format_errors(&reporter.take()))
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

/// Declares tree tests. Each test names its input (`program`) and any number
/// of assertions (`tree_ok`, `tree_error`, `expected_errors`):
///
/// ```ignore
/// tree_tests! {
///     use parser;
///
///     fn test_name() {
///         let program = "1 + 2";
///         let tree_ok = "...";
///     }
/// }
/// ```
macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(typer, program), $source:expr) => {
        crate::util::test_utils::Test::TyperProgram($source)
    };
}
pub(crate) use tree_tests;
