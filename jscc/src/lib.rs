#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Conditional Comments Preprocessor
//!
//! This library preprocesses JavaScript-like source text driven by directives
//! written inside comments. Because directives are comments, unprocessed
//! sources stay valid for linters and editors.
//!
//! ## Features
//!
//! - Conditional blocks (`#if`, `#ifset`, `#ifnset`, `#elif`, `#else`, `#endif`)
//! - Compile-time variables (`#set`, `#unset`) with `$_NAME` substitution
//! - `#error` to abort on unsupported configurations
//! - Comment-aware scanning: strings, templates and regexes never hide or fake a directive
//! - Dead code removed or blanked, with a position map back to the input
//!
//! ## Example
//!
//! ```rust
//! use jscc::{preprocess, Options};
//!
//! let code = "//#if _DEBUG\nconsole.log('debug')\n//#else\nlet mode = '$_MODE'\n//#endif\n";
//!
//! let options = Options::default().with_value("_MODE", "release");
//! let result = preprocess(code, "app.js", &options).unwrap();
//! assert_eq!(result.output, "let mode = 'release'\n");
//! ```

mod config;
mod context;
mod engine;
mod error;
mod output;
mod preprocessor;
pub mod scanner;
mod substitute;
mod token;
mod value;

pub use config::{
    CommentFilter, CommentPolicy, CommentPredicate, Options, Prefix, QuoteKind, default_prefixes,
};
pub use context::{
    BlockFrame, BlockStack, BranchKind, Environment, FILE_VARIABLE, OutputState,
    VERSION_VARIABLE,
};
pub use engine::{Evaluator, ExpressionEngine};
pub use error::{ConfigError, DirectiveError, EvalError};
pub use output::{EditBuffer, PositionMap, Processed};
pub use preprocessor::{Keyword, Preprocessor};
pub use substitute::{Reference, find_references};
pub use token::is_variable_name;
pub use value::Value;

/// Preprocess one file with the given options
///
/// # Errors
/// Returns `DirectiveError` if a directive is malformed, blocks are unbalanced,
/// an expression fails or an `#error` directive is reached.
pub fn preprocess(
    source: &str,
    filename: &str,
    options: &Options,
) -> Result<Processed, DirectiveError> {
    Preprocessor::with_options(options).process(source, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> String {
        Preprocessor::new().process(src, "test.js").unwrap().output
    }

    #[test]
    fn if_else_keeps_one_branch() {
        let src = "//#if _DEBUG\ndebug();\n//#else\nrelease();\n//#endif\n";
        assert_eq!(run(src), "release();\n");

        let mut pp = Preprocessor::new();
        pp.define("_DEBUG", true);
        let out = pp.process(src, "test.js").unwrap();
        assert_eq!(out.output, "debug();\n");
        assert!(out.changed);
    }

    #[test]
    fn elif_chain() {
        let src = "\
//#set _V 2
//#if _V == 1
one
//#elif _V == 2
two
//#elif _V > 1
also
//#else
other
//#endif
";
        assert_eq!(run(src), "two\n");
    }

    #[test]
    fn nested_blocks() {
        let src = "\
//#if 1
a
//#if 0
b
//#else
c
//#endif
//#endif
//#if 0
//#if 1
d
//#endif
//#else
e
//#endif
";
        assert_eq!(run(src), "a\nc\ne\n");
    }

    #[test]
    fn inner_if_of_dead_branch_is_not_evaluated() {
        let src = "//#if 0\n//#if _MISSING.prop\nx\n//#endif\n//#endif\nok\n";
        assert_eq!(run(src), "ok\n");
    }

    #[test]
    fn set_then_substitute() {
        let src = "//#set _FOO 'foo'\nlet bar = '$_FOO'.toUpperCase();";
        assert_eq!(run(src), "let bar = 'foo'.toUpperCase();");
    }

    #[test]
    fn set_forms() {
        let src = "\
//#set _A = 1 + 1
//#set _B 'b'
//#set _C
//#ifset _C
$_A $_B $_C
//#endif
";
        assert_eq!(run(src), "2 b undefined\n");
    }

    #[test]
    fn unset_makes_variable_unknown() {
        let src = "//#set _X 1\n//#unset _X\n//#ifset _X\nyes\n//#endif\n$_X\n";
        assert_eq!(run(src), "$_X\n");
    }

    #[test]
    fn ifnset() {
        assert_eq!(run("//#ifnset _X\nno x\n//#endif\n"), "no x\n");
    }

    #[test]
    fn substitution_follows_directive_order() {
        let src = "$_X\n//#set _X 1\n$_X\n//#set _X 2\n$_X\n";
        assert_eq!(run(src), "$_X\n1\n2\n");
    }

    #[test]
    fn error_directive() {
        let err = Preprocessor::new()
            .process("ok\n//#error \"boom\"\n", "test.js")
            .unwrap_err();
        assert!(matches!(err, DirectiveError::User { line: 2, .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn error_with_falsy_message() {
        let err = Preprocessor::new()
            .process("//#error 0\n", "test.js")
            .unwrap_err();
        assert_eq!(err.message(), "Error");
    }

    #[test]
    fn error_in_dead_branch_is_ignored() {
        assert_eq!(run("//#if 0\n//#error 'no'\n//#endif\nfine\n"), "fine\n");
    }

    #[test]
    fn unbalanced_blocks() {
        let pp = Preprocessor::new();
        assert!(matches!(
            pp.process("//#endif\n", "t.js"),
            Err(DirectiveError::Structural { line: 1, .. })
        ));
        assert!(matches!(
            pp.process("//#else\n", "t.js"),
            Err(DirectiveError::Structural { .. })
        ));
        assert!(matches!(
            pp.process("//#if 1\n//#else\n//#elif 1\n//#endif\n", "t.js"),
            Err(DirectiveError::Structural { line: 3, .. })
        ));
        let err = pp.process("a\n//#if 1\nb\n", "t.js").unwrap_err();
        assert!(err.to_string().contains("unexpected end of file"));
    }

    #[test]
    fn missing_expression() {
        let err = Preprocessor::new().process("//#if\n//#endif\n", "t.js").unwrap_err();
        assert!(matches!(err, DirectiveError::Parse { .. }));
        assert_eq!(err.message(), "expression expected for #if");
    }

    #[test]
    fn invalid_names() {
        let pp = Preprocessor::new();
        assert!(matches!(
            pp.process("//#set foo 1\n", "t.js"),
            Err(DirectiveError::Parse { .. })
        ));
        assert!(matches!(
            pp.process("//#unset _X.y\n", "t.js"),
            Err(DirectiveError::Parse { .. })
        ));
    }

    #[test]
    fn builtins_are_read_only() {
        let err = Preprocessor::new()
            .process("//#set _FILE 'x'\n", "t.js")
            .unwrap_err();
        assert!(err.message().contains("read-only"));
        assert!(Preprocessor::new().process("//#unset _VERSION\n", "t.js").is_err());
    }

    #[test]
    fn builtin_values() {
        let options = Options::default().with_version("1.0.0");
        let out = preprocess("'$_FILE' '$_VERSION'", "src/app.js", &options).unwrap();
        assert_eq!(out.output, "'src/app.js' '1.0.0'");
    }

    #[test]
    fn evaluation_error_names_expression() {
        let err = Preprocessor::new()
            .process("//#if _X.y\n//#endif\n", "t.js")
            .unwrap_err();
        match err {
            DirectiveError::Evaluation {
                expression, line, ..
            } => {
                assert_eq!(expression, "_X.y");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn variables_do_not_leak_between_files() {
        let pp = Preprocessor::new();
        pp.process("//#set _LEAK 1\n", "a.js").unwrap();
        assert_eq!(pp.process("$_LEAK", "b.js").unwrap().output, "$_LEAK");
        assert!(!pp.is_defined("_LEAK"));
    }

    #[test]
    fn no_directives_no_change() {
        let src = "const a = b / c; // note\nlet re = /x\\/y/g;\n";
        let out = Preprocessor::new().process(src, "t.js").unwrap();
        assert_eq!(out.output, src);
        assert!(!out.changed);
    }

    #[test]
    fn directives_inside_strings_are_ignored() {
        let src = "let s = '//#if _X';\nlet t = `\n//#endif\n`;\n";
        assert_eq!(run(src), src);
    }

    #[test]
    fn indented_directives() {
        let src = "function f() {\n  //#if _A\n  a();\n  //#endif\n  b();\n}\n";
        assert_eq!(run(src), "function f() {\n  b();\n}\n");
    }

    #[test]
    fn directive_at_start_absorbs_following_line_ending() {
        assert_eq!(run("//#set _A 1\n//#set _B 2\ncode\n"), "code\n");
    }

    #[test]
    fn directive_at_end_without_newline() {
        assert_eq!(run("a\n//#if 1\nb\n//#endif"), "a\nb");
    }

    #[test]
    fn keep_lines_blanks_dead_code() {
        let options = Options::default().with_keep_lines(true);
        let src = "//#if 0\nhidden\n//#endif\nshown\n";
        let out = preprocess(src, "t.js", &options).unwrap();
        assert_eq!(out.output, "       \n      \n        \nshown\n");
        assert_eq!(out.output.lines().count(), src.lines().count());
    }

    #[test]
    fn hidden_content_block() {
        let src = "\
/*#if _DEBUG
const debug = '$_TAG'
//#else // */
const debug = null
//#endif
";
        let mut pp = Preprocessor::new();
        assert_eq!(pp.process(src, "t.js").unwrap().output, "const debug = null\n");
        pp.define("_DEBUG", 1i64);
        pp.define("_TAG", "dev");
        assert_eq!(pp.process(src, "t.js").unwrap().output, "const debug = 'dev'\n");
    }

    #[test]
    fn html_directives() {
        let src = "<div>\n<!--#if _ADMIN-->\n<a href=\"/admin\">admin</a>\n<!--#endif-->\n</div>\n";
        assert_eq!(run(src), "<div>\n</div>\n");
    }

    #[test]
    fn object_property_substitution() {
        let options = Options::default().with_value("_APP", Value::parse_literal(r#"{"name":"demo","port":8080}"#));
        let out = preprocess("listen($_APP.port, '$_APP.name')", "t.js", &options).unwrap();
        assert_eq!(out.output, "listen(8080, 'demo')");
    }

    #[test]
    fn crlf_is_preserved_in_live_text() {
        let src = "a\r\n//#if 0\r\nb\r\n//#endif\r\nc\r\n";
        assert_eq!(run(src), "a\r\nc\r\n");
    }

    #[test]
    fn comment_policy_none_drops_plain_comments() {
        let options = Options::default().with_comments(CommentPolicy::None);
        let src = "// header\nlet a = 1; /* inline */\n/* own line */\nlet b = 2;\n";
        let out = preprocess(src, "t.js", &options).unwrap();
        assert_eq!(out.output, "let a = 1; \nlet b = 2;\n");
    }

    #[test]
    fn comment_filters_keep_matching_comments() {
        let options = Options::default()
            .with_comments(CommentPolicy::from_names(&["license"]).unwrap());
        let src = "/* @license MIT */\n// drop\ncode();\n";
        let out = preprocess(src, "t.js", &options).unwrap();
        assert_eq!(out.output, "/* @license MIT */\ncode();\n");
    }

    #[test]
    fn custom_prefix() {
        let options = Options::default().with_prefixes(vec![Prefix::literal("//@")]);
        let src = "//@#if 0\nx\n//@#endif\n//#if 0\ny\n";
        assert_eq!(preprocess(src, "t.js", &options).unwrap().output, "//#if 0\ny\n");
    }

    #[test]
    fn position_map_is_monotonic() {
        let src = "//#set _A 'abc'\nx = $_A;\n//#if 0\ngone\n//#endif\ny();\n";
        let out = Preprocessor::new().process(src, "t.js").unwrap();
        assert_eq!(out.output, "x = abc;\ny();\n");
        let map = out.position_map.unwrap();
        assert!(map
            .pairs
            .windows(2)
            .all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
        let y_out = out.output.find("y()").unwrap();
        assert_eq!(map.original_offset(y_out), src.find("y()"));
    }

    #[test]
    fn custom_evaluator() {
        struct Always;
        impl Evaluator for Always {
            fn evaluate(&self, _: &str, _: &Environment) -> Result<Value, EvalError> {
                Ok(Value::Bool(true))
            }
        }
        let pp = Preprocessor::new().with_evaluator(Always);
        assert_eq!(pp.process("//#if nonsense(\nx\n//#endif\n", "t.js").unwrap().output, "x\n");
    }
}
