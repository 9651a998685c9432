use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::Options;
use crate::context::{
    BlockFrame, BlockStack, BranchKind, Environment, FILE_VARIABLE, OutputState,
    VERSION_VARIABLE,
};
use crate::engine::{Evaluator, ExpressionEngine};
use crate::error::DirectiveError;
use crate::output::{EditBuffer, Processed};
use crate::scanner::{Scanner, Span, SpanKind, find_unquoted_line_comment, normalize_line_endings};
use crate::substitute::replace_references;
use crate::token::{is_variable_name, variable_name_len};
use crate::value::Value;

/// Directive keywords
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    /// `#if EXPR`
    If,
    /// `#ifset NAME`
    IfSet,
    /// `#ifnset NAME`
    IfNotSet,
    /// `#elif EXPR`
    Elif,
    /// `#else`
    Else,
    /// `#endif`
    Endif,
    /// `#set NAME [=] [EXPR]`
    Set,
    /// `#unset NAME`
    Unset,
    /// `#error EXPR`
    Error,
}

impl Keyword {
    /// Keyword for a directive name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "if" => Keyword::If,
            "ifset" => Keyword::IfSet,
            "ifnset" => Keyword::IfNotSet,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "endif" => Keyword::Endif,
            "set" => Keyword::Set,
            "unset" => Keyword::Unset,
            "error" => Keyword::Error,
            _ => return None,
        })
    }

    /// Name as written after the `#`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::IfSet => "ifset",
            Keyword::IfNotSet => "ifnset",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::Endif => "endif",
            Keyword::Set => "set",
            Keyword::Unset => "unset",
            Keyword::Error => "error",
        }
    }

    const fn takes_expression(self) -> bool {
        !matches!(self, Keyword::Else | Keyword::Endif)
    }
}

/// A recognized directive comment
#[derive(Clone, Copy, Debug)]
struct Directive<'s> {
    keyword: Keyword,
    /// Normalized expression text, empty for `#else`/`#endif`
    expression: &'s str,
    /// Start of the directive line
    line_start: usize,
    /// End of the directive, where scanning resumes
    end: usize,
}

/// The conditional-comment preprocessor
///
/// Holds the options and the base variable table. Every call to
/// [`Preprocessor::process`] works on a fresh copy of the variables, so
/// `#set` and `#unset` never leak from one file to the next.
pub struct Preprocessor {
    options: Options,
    evaluator: Arc<dyn Evaluator>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    /// Create a preprocessor with default options
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(&Options::default())
    }

    /// Create a preprocessor with the given options
    #[must_use]
    pub fn with_options(options: &Options) -> Self {
        Preprocessor {
            options: options.clone(),
            evaluator: Arc::new(ExpressionEngine),
        }
    }

    /// Replace the expression evaluator
    #[must_use]
    pub fn with_evaluator<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Options in use
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Define a variable in the base table
    pub fn define(&mut self, name: &str, value: impl Into<Value>) {
        self.options.values.insert(name.to_string(), value.into());
    }

    /// Remove a variable from the base table
    pub fn undefine(&mut self, name: &str) -> Option<Value> {
        self.options.values.remove(name)
    }

    /// Check if a variable is defined in the base table
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.options.values.contains_key(name)
    }

    /// Base variable table
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.options.values
    }

    /// Process one file
    ///
    /// # Errors
    /// Returns `DirectiveError` for malformed or unbalanced directives, failed
    /// expressions and `#error`. No output is produced in that case.
    pub fn process(&self, source: &str, filename: &str) -> Result<Processed, DirectiveError> {
        debug!(file = filename, bytes = source.len(), "preprocessing");
        let env = self.file_environment(filename)?;
        let normalized = normalize_line_endings(source);
        let mut run = FileRun {
            pp: self,
            file: filename,
            source,
            text: &normalized,
            env,
            stack: BlockStack::new(),
            buffer: EditBuffer::new(source),
            live_from: 0,
            hide_start: 0,
            line: LineCounter::default(),
        };
        run.execute()?;

        let changed = run.buffer.is_changed();
        let (output, position_map) = if changed {
            run.buffer
                .render(self.options.map_hires, self.options.emit_position_map)
        } else {
            EditBuffer::new(source).render(self.options.map_hires, self.options.emit_position_map)
        };
        debug!(
            file = filename,
            edits = run.buffer.edit_count(),
            changed,
            "preprocessed"
        );
        Ok(Processed {
            output,
            changed,
            position_map,
        })
    }

    fn file_environment(&self, filename: &str) -> Result<Environment, DirectiveError> {
        let mut env = Environment::new();
        let mut version = Value::String(self.options.version.clone());

        for (name, value) in &self.options.values {
            if !is_variable_name(name) {
                return Err(DirectiveError::parse(
                    filename,
                    1,
                    format!("invalid variable name: {name}"),
                ));
            }
            match name.as_str() {
                VERSION_VARIABLE => version = value.clone(),
                FILE_VARIABLE => {}
                _ => env.insert(name, value.clone()),
            }
        }

        env.insert_read_only(FILE_VARIABLE, Value::String(self.relative_file(filename)));
        env.insert_read_only(VERSION_VARIABLE, version);
        Ok(env)
    }

    fn relative_file(&self, filename: &str) -> String {
        let path = Path::new(filename);
        let relative = self
            .options
            .root
            .as_deref()
            .and_then(|root| pathdiff::diff_paths(path, root))
            .unwrap_or_else(|| path.to_path_buf());
        relative.to_string_lossy().replace('\\', "/")
    }

    /// Recognize a directive in a comment span
    fn match_directive<'s>(&self, text: &'s str, span: &Span) -> Option<Directive<'s>> {
        let line_start = text[..span.start].rfind('\n').map_or(0, |i| i + 1);
        if !text[line_start..span.start]
            .bytes()
            .all(|b| b == b' ' || b == b'\t')
        {
            return None;
        }

        let comment = span.text(text);
        let prefix_len = self
            .options
            .prefixes
            .iter()
            .find_map(|p| p.directive_len(comment))?;
        let after_hash = &comment[prefix_len + 1..];
        let name_len = after_hash
            .bytes()
            .take_while(u8::is_ascii_lowercase)
            .count();
        let keyword = Keyword::from_name(&after_hash[..name_len])?;

        let (opener_len, closer) = match span.kind {
            SpanKind::BlockComment => (2, "*/"),
            SpanKind::HtmlComment => (4, "-->"),
            _ => (0, ""),
        };
        let dir_len = if closer.is_empty() {
            comment.len()
        } else {
            let newline = comment.find('\n');
            let close = comment
                .get(opener_len..)
                .and_then(|rest| rest.find(closer))
                .map(|i| opener_len + i + closer.len());
            match (newline, close) {
                (Some(nl), Some(cl)) if cl <= nl => cl,
                (Some(nl), _) => nl,
                (None, Some(cl)) => cl,
                (None, None) => comment.len(),
            }
        };

        let body_start = prefix_len + 1 + name_len;
        let body = comment.get(body_start..dir_len).unwrap_or_default();
        // a closer ends the expression in any comment kind, so `//#elif _B */`
        // can close a hidden `/*#if` block
        let body = &body[..closer_offset(body).unwrap_or(body.len())];
        let boundary_ok = body.is_empty()
            || body.starts_with(|c: char| c.is_whitespace())
            || body.starts_with("//");
        if !boundary_ok {
            return None;
        }
        let body = &body[..find_unquoted_line_comment(body).unwrap_or(body.len())];
        let expression = if keyword.takes_expression() {
            body.trim()
        } else {
            ""
        };

        Some(Directive {
            keyword,
            expression,
            line_start,
            end: span.start + dir_len,
        })
    }
}

/// Offset of the first `*/` or `-->` in a directive body
fn closer_offset(body: &str) -> Option<usize> {
    match (body.find("*/"), body.find("-->")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Line numbers for increasing offsets
#[derive(Default)]
struct LineCounter {
    offset: usize,
    line: usize,
}

impl LineCounter {
    fn line_at(&mut self, text: &str, offset: usize) -> usize {
        if offset >= self.offset {
            self.line += text.as_bytes()[self.offset..offset]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.offset = offset;
        }
        self.line + 1
    }
}

/// Per-file state of one `process` call
struct FileRun<'p, 's> {
    pp: &'p Preprocessor,
    file: &'s str,
    /// Input as given, kept text is copied from here
    source: &'s str,
    /// Input with normalized line endings, same offsets as `source`
    text: &'s str,
    env: Environment,
    stack: BlockStack,
    buffer: EditBuffer<'s>,
    /// Start of the pending live range
    live_from: usize,
    /// Start of the current dead range
    hide_start: usize,
    line: LineCounter,
}

impl FileRun<'_, '_> {
    fn execute(&mut self) -> Result<(), DirectiveError> {
        let mut scanner = Scanner::new(self.text);

        while let Some(span) = scanner.next() {
            if !span.kind.is_comment() {
                continue;
            }
            if let Some(directive) = self.pp.match_directive(self.text, &span) {
                if directive.end < scanner.position() {
                    scanner.seek(directive.end);
                }
                self.handle_directive(&directive, span.start)?;
            } else if self.stack.is_working() && !self.pp.options.comments.keeps(span.text(self.text)) {
                self.drop_comment(&span);
            }
        }

        if self.stack.depth() != 1 {
            let line = self.line.line_at(self.text, self.text.len());
            return Err(DirectiveError::structural(
                self.file,
                line,
                "unexpected end of file: unclosed conditional block",
            ));
        }
        self.flush(self.text.len());
        Ok(())
    }

    fn handle_directive(&mut self, directive: &Directive<'_>, at: usize) -> Result<(), DirectiveError> {
        let line = self.line.line_at(self.text, at);
        let was_working = self.stack.is_working();
        if was_working {
            self.flush(directive.line_start);
        }

        let keyword = directive.keyword;
        if keyword.takes_expression() && directive.expression.is_empty() {
            return Err(DirectiveError::parse(
                self.file,
                line,
                format!("expression expected for #{}", keyword.as_str()),
            ));
        }
        let expr = directive.expression;
        match keyword {
            Keyword::If | Keyword::IfSet | Keyword::IfNotSet => self.handle_if(keyword, expr, line)?,
            Keyword::Elif => self.handle_elif(expr, line)?,
            Keyword::Else => self.handle_else(line)?,
            Keyword::Endif => self.handle_endif(line)?,
            Keyword::Set if was_working => self.handle_set(expr, line)?,
            Keyword::Unset if was_working => self.handle_unset(expr, line)?,
            Keyword::Error if was_working => self.handle_error(expr, line)?,
            Keyword::Set | Keyword::Unset | Keyword::Error => {}
        }
        trace!(
            keyword = keyword.as_str(),
            line,
            state = ?self.stack.top().state,
            depth = self.stack.depth(),
            "directive"
        );

        match (was_working, self.stack.is_working()) {
            (true, true) => {
                self.remove(directive.line_start, directive.end);
                self.live_from = directive.end;
            }
            (true, false) => self.hide_start = directive.line_start,
            (false, true) => {
                self.remove(self.hide_start, directive.end);
                self.live_from = directive.end;
            }
            (false, false) => {}
        }
        Ok(())
    }

    fn evaluate(&self, expr: &str, line: usize) -> Result<Value, DirectiveError> {
        self.pp
            .evaluator
            .evaluate(expr, &self.env)
            .map_err(|e| DirectiveError::evaluation(self.file, line, expr, e))
    }

    fn handle_if(&mut self, keyword: Keyword, expr: &str, line: usize) -> Result<(), DirectiveError> {
        if !self.stack.is_working() {
            self.stack.push(OutputState::Ending);
            return Ok(());
        }
        let taken = match keyword {
            Keyword::IfSet => self.env.contains(expr),
            Keyword::IfNotSet => !self.env.contains(expr),
            _ => self.evaluate(expr, line)?.is_truthy(),
        };
        self.stack.push(if taken {
            OutputState::Working
        } else {
            OutputState::Testing
        });
        Ok(())
    }

    fn handle_elif(&mut self, expr: &str, line: usize) -> Result<(), DirectiveError> {
        let frame = self.top_frame_in(&[BranchKind::If], "elif", line)?;
        let state = match frame.state {
            OutputState::Testing => {
                if self.evaluate(expr, line)?.is_truthy() {
                    OutputState::Working
                } else {
                    OutputState::Testing
                }
            }
            OutputState::Working | OutputState::Ending => OutputState::Ending,
        };
        self.stack.set_top(BlockFrame { state, ..frame });
        Ok(())
    }

    fn handle_else(&mut self, line: usize) -> Result<(), DirectiveError> {
        let frame = self.top_frame_in(&[BranchKind::If], "else", line)?;
        let state = if frame.state == OutputState::Testing {
            OutputState::Working
        } else {
            OutputState::Ending
        };
        self.stack.set_top(BlockFrame {
            branch: BranchKind::Else,
            state,
        });
        Ok(())
    }

    fn handle_endif(&mut self, line: usize) -> Result<(), DirectiveError> {
        self.top_frame_in(&[BranchKind::If, BranchKind::Else], "endif", line)?;
        self.stack.pop();
        Ok(())
    }

    fn top_frame_in(
        &self,
        allowed: &[BranchKind],
        keyword: &str,
        line: usize,
    ) -> Result<BlockFrame, DirectiveError> {
        let frame = self.stack.top();
        if allowed.contains(&frame.branch) {
            Ok(frame)
        } else {
            Err(DirectiveError::structural(
                self.file,
                line,
                format!("unexpected #{keyword}"),
            ))
        }
    }

    fn handle_set(&mut self, expr: &str, line: usize) -> Result<(), DirectiveError> {
        let Some(name_len) = variable_name_len(expr) else {
            return Err(DirectiveError::parse(
                self.file,
                line,
                format!("invalid symbol or declaration \"{expr}\""),
            ));
        };
        let (name, rest) = expr.split_at(name_len);
        self.check_writable(name, line)?;

        let rest = rest.trim_start();
        let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
        let value = if rest.is_empty() {
            Value::Undefined
        } else {
            self.evaluate(rest, line)?
        };
        self.env.insert(name, value);
        Ok(())
    }

    fn handle_unset(&mut self, expr: &str, line: usize) -> Result<(), DirectiveError> {
        if !is_variable_name(expr) {
            return Err(DirectiveError::parse(
                self.file,
                line,
                format!("invalid symbol name \"{expr}\""),
            ));
        }
        self.check_writable(expr, line)?;
        self.env.remove(expr);
        Ok(())
    }

    fn check_writable(&self, name: &str, line: usize) -> Result<(), DirectiveError> {
        if self.env.is_read_only(name) {
            Err(DirectiveError::parse(
                self.file,
                line,
                format!("cannot modify read-only variable {name}"),
            ))
        } else {
            Ok(())
        }
    }

    fn handle_error(&mut self, expr: &str, line: usize) -> Result<(), DirectiveError> {
        let value = self.evaluate(expr, line)?;
        let message = if value.is_truthy() {
            value.to_js_string()
        } else {
            "Error".to_string()
        };
        Err(DirectiveError::User {
            file: self.file.to_string(),
            line,
            message,
        })
    }

    /// Substitute variable references in the pending live range up to `end`
    fn flush(&mut self, end: usize) {
        let start = self.live_from.max(self.buffer.last_end());
        if start < end {
            replace_references(
                &mut self.buffer,
                self.text,
                start,
                end,
                &self.env,
                self.pp.options.escape_quotes,
            );
        }
        self.live_from = self.live_from.max(end);
    }

    /// Drop a comment rejected by the retention policy
    fn drop_comment(&mut self, span: &Span) {
        let bytes = self.text.as_bytes();
        let is_blank = |b: &u8| *b == b' ' || *b == b'\t';
        let line_start = self.text[..span.start].rfind('\n').map_or(0, |i| i + 1);
        let trailing = bytes[span.end..].iter().take_while(|b| is_blank(b)).count();
        let line_end = span.end + trailing;
        let alone = bytes[line_start..span.start].iter().all(is_blank)
            && (line_end == bytes.len() || bytes[line_end] == b'\n');
        let (start, end) = if alone {
            (line_start, line_end)
        } else {
            (span.start, span.end)
        };
        self.flush(start);
        self.remove(start, end);
        self.live_from = end;
    }

    /// Remove a dead range, blanking it instead when lines are kept
    ///
    /// A range spanning whole lines also takes one adjacent line ending: the
    /// one after it, or the one before it at end of input.
    fn remove(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        if self.pp.options.keep_lines {
            let blank: String = self.source[start..end]
                .chars()
                .map(|c| if c == '\n' || c == '\r' { c } else { ' ' })
                .collect();
            self.buffer.overwrite(start, end, blank);
            return;
        }

        let bytes = self.text.as_bytes();
        let src = self.source.as_bytes();
        let at_line_start = start == 0 || bytes[start - 1] == b'\n';
        let at_line_end = end == bytes.len() || bytes[end] == b'\n';
        let (mut from, mut to) = (start, end);
        if at_line_start && at_line_end {
            let last_end = self.buffer.last_end();
            if end < bytes.len() {
                to = end + 1;
            } else if start > last_end {
                from = start - 1;
                if from > last_end && src[from - 1] == b'\r' {
                    from -= 1;
                }
            }
        }
        self.buffer.remove(from, to);
    }
}
