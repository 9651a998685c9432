use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::token::is_variable_name;
use crate::value::Value;

/// Type alias for a comment retention predicate, called with the full comment text
pub type CommentPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Named comment filters, matched against the whole comment text
const BUILTIN_FILTERS: &[(&str, &str)] = &[
    ("license", r"^/[*/]\*?!?\s*@license\b"),
    ("some", r"(?:@license|@preserve|@cc_on)\b"),
    ("jsdoc", r"^/\*\*[^@]*@[A-Za-z]"),
    ("jslint", r"^/[*/](?:jslint|global|property)\b"),
    ("jshint", r"^/[*/]\s*(?:jshint|globals|exported)\s"),
    ("eslint", r"^/[*/]\s*(?:eslint(?:\s|-[ed])|global\s)"),
    ("jscs", r"^/[*/]\s*jscs:[ed]"),
    ("istanbul", r"^/[*/]\s*istanbul\s"),
    ("srcmaps", r"//#\ssource(?:Mapping)?URL="),
    ("html", r"^<!--(?:[^>]|$)"),
];

/// Quote characters escaped in substituted string values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    /// Escape `'`
    Single,
    /// Escape `"`
    Double,
    /// Escape both `'` and `"`
    Both,
}

impl QuoteKind {
    /// Backslash-escape the selected quotes in `text`
    #[must_use]
    pub fn escape(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            let escaped = match ch {
                '\'' => matches!(self, QuoteKind::Single | QuoteKind::Both),
                '"' => matches!(self, QuoteKind::Double | QuoteKind::Both),
                _ => false,
            };
            if escaped {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    }
}

/// Character sequence that introduces a directive, the text before the `#`
#[derive(Clone, Debug)]
pub enum Prefix {
    /// Exact text
    Literal(String),
    /// Regular expression matched at the start of the comment
    Pattern(Regex),
}

impl Prefix {
    /// Literal prefix
    pub fn literal(text: impl Into<String>) -> Self {
        Prefix::Literal(text.into())
    }

    /// Prefix given as a regular expression
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Prefix::Pattern(Regex::new(&format!("^(?:{pattern})#"))?))
    }

    /// Length of the prefix at the start of `text` when a `#` follows it
    pub(crate) fn directive_len(&self, text: &str) -> Option<usize> {
        match self {
            Prefix::Literal(lit) => text
                .strip_prefix(lit.as_str())
                .filter(|rest| rest.starts_with('#'))
                .map(|_| lit.len()),
            Prefix::Pattern(re) => re.find(text).map(|m| m.end() - 1),
        }
    }
}

impl PartialEq for Prefix {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Prefix::Literal(a), Prefix::Literal(b)) => a == b,
            (Prefix::Pattern(a), Prefix::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// Default prefixes: `//`, `/*` and `<!--`, each optionally followed by a space
#[must_use]
pub fn default_prefixes() -> Vec<Prefix> {
    ["//", "// ", "/*", "/* ", "<!--", "<!-- "]
        .into_iter()
        .map(Prefix::literal)
        .collect()
}

/// A comment filter: a named built-in or a custom pattern
#[derive(Clone, Debug)]
pub struct CommentFilter {
    name: String,
    regex: Regex,
}

impl CommentFilter {
    /// Look up a built-in filter (`license`, `some`, `jsdoc`, `jslint`, `jshint`,
    /// `eslint`, `jscs`, `istanbul`, `srcmaps`, `html`)
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownCommentFilter` for other names.
    pub fn named(name: &str) -> Result<Self, ConfigError> {
        let (_, pattern) = BUILTIN_FILTERS
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| ConfigError::UnknownCommentFilter(name.to_string()))?;
        Ok(CommentFilter {
            name: name.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    /// Filter matching comments against a custom regular expression
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Result<Self, ConfigError> {
        Ok(CommentFilter {
            name: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    /// Name of the built-in, or the pattern source
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` when `comment` should be kept
    #[must_use]
    pub fn matches(&self, comment: &str) -> bool {
        self.regex.is_match(comment)
    }
}

/// Which ordinary comments survive in live ranges
#[derive(Clone, Default)]
pub enum CommentPolicy {
    /// Keep every comment
    #[default]
    All,
    /// Drop every comment
    None,
    /// Keep comments matched by any filter
    Filters(Vec<CommentFilter>),
    /// Keep comments the predicate accepts
    Custom(CommentPredicate),
}

impl CommentPolicy {
    /// Policy from a list of built-in filter names; `all` and `none` are
    /// accepted as single names
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownCommentFilter` for an unknown name.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        match names {
            [one] if one.as_ref() == "all" => Ok(CommentPolicy::All),
            [one] if one.as_ref() == "none" => Ok(CommentPolicy::None),
            _ => names
                .iter()
                .map(|n| CommentFilter::named(n.as_ref()))
                .collect::<Result<Vec<_>, _>>()
                .map(CommentPolicy::Filters),
        }
    }

    /// `true` when `comment` is kept in the output
    #[must_use]
    pub fn keeps(&self, comment: &str) -> bool {
        match self {
            CommentPolicy::All => true,
            CommentPolicy::None => false,
            CommentPolicy::Filters(filters) => filters.iter().any(|f| f.matches(comment)),
            CommentPolicy::Custom(predicate) => predicate(comment),
        }
    }
}

impl fmt::Debug for CommentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentPolicy::All => f.write_str("All"),
            CommentPolicy::None => f.write_str("None"),
            CommentPolicy::Filters(filters) => f
                .debug_list()
                .entries(filters.iter().map(CommentFilter::name))
                .finish(),
            CommentPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Options for one preprocessing run
#[derive(Clone, Debug)]
pub struct Options {
    /// Initial variable bindings, copied for every file
    pub values: BTreeMap<String, Value>,
    /// Value of `_VERSION` unless `values` provides one
    pub version: String,
    /// Directory `_FILE` is made relative to
    pub root: Option<PathBuf>,
    /// Sequences that introduce a directive
    pub prefixes: Vec<Prefix>,
    /// Blank dead ranges instead of removing them
    pub keep_lines: bool,
    /// Produce a position map
    pub emit_position_map: bool,
    /// One map pair per character of kept text instead of one per line
    pub map_hires: bool,
    /// Retention of ordinary comments
    pub comments: CommentPolicy,
    /// Quotes escaped in substituted strings
    pub escape_quotes: Option<QuoteKind>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            values: BTreeMap::new(),
            version: "?".to_string(),
            root: None,
            prefixes: default_prefixes(),
            keep_lines: false,
            emit_position_map: true,
            map_hires: true,
            comments: CommentPolicy::All,
            escape_quotes: None,
        }
    }
}

impl Options {
    /// Bind an initial variable
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Set the `_VERSION` built-in
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Make `_FILE` relative to `root`
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Replace the directive prefixes
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: Vec<Prefix>) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// Blank dead ranges instead of removing them
    #[must_use]
    pub const fn with_keep_lines(mut self, keep_lines: bool) -> Self {
        self.keep_lines = keep_lines;
        self
    }

    /// Enable or disable the position map
    #[must_use]
    pub const fn with_position_map(mut self, emit: bool, hires: bool) -> Self {
        self.emit_position_map = emit;
        self.map_hires = hires;
        self
    }

    /// Set the comment retention policy
    #[must_use]
    pub fn with_comments(mut self, comments: CommentPolicy) -> Self {
        self.comments = comments;
        self
    }

    /// Keep comments the predicate accepts
    #[must_use]
    pub fn with_comment_predicate<F>(self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.with_comments(CommentPolicy::Custom(Arc::new(predicate)))
    }

    /// Escape quotes in substituted strings
    #[must_use]
    pub const fn with_escape_quotes(mut self, quotes: QuoteKind) -> Self {
        self.escape_quotes = Some(quotes);
        self
    }

    /// Load options from a JSON document with camelCase keys
    ///
    /// ```json
    /// { "values": { "_DEBUG": 1 }, "prefixes": ["//", { "regex": "/\\* ?" }],
    ///   "keepLines": true, "comments": ["license", "eslint"] }
    /// ```
    ///
    /// # Errors
    /// Returns `ConfigError` for malformed JSON, invalid variable names,
    /// unknown comment filters or prefix patterns that do not compile.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawOptions = serde_json::from_str(json)?;
        let mut options = Options::default();

        if let Some(name) = raw.values.keys().find(|k| !is_variable_name(k)) {
            return Err(ConfigError::InvalidVariableName(name.clone()));
        }
        options.values = raw.values;
        if let Some(version) = raw.version {
            options.version = version;
        }
        options.root = raw.root;
        if let Some(prefixes) = raw.prefixes {
            options.prefixes = prefixes
                .into_vec()
                .into_iter()
                .map(|p| match p {
                    RawPattern::Literal(s) => Ok(Prefix::literal(s)),
                    RawPattern::Regex { regex } => Prefix::pattern(&regex),
                })
                .collect::<Result<_, _>>()?;
        }
        options.keep_lines = raw.keep_lines;
        options.emit_position_map = raw.source_map.unwrap_or(true);
        options.map_hires = raw.map_hires.unwrap_or(true);
        if let Some(comments) = raw.comments {
            options.comments = comments.into_policy()?;
        }
        options.escape_quotes = raw.escape_quotes;
        Ok(options)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawOptions {
    values: BTreeMap<String, Value>,
    version: Option<String>,
    root: Option<PathBuf>,
    prefixes: Option<OneOrMany<RawPattern>>,
    keep_lines: bool,
    source_map: Option<bool>,
    map_hires: Option<bool>,
    comments: Option<RawComments>,
    escape_quotes: Option<QuoteKind>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Literal(String),
    Regex { regex: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawComments {
    Flag(bool),
    Filters(OneOrMany<RawPattern>),
}

impl RawComments {
    fn into_policy(self) -> Result<CommentPolicy, ConfigError> {
        let filters = match self {
            RawComments::Flag(true) => return Ok(CommentPolicy::All),
            RawComments::Flag(false) => return Ok(CommentPolicy::None),
            RawComments::Filters(filters) => filters.into_vec(),
        };
        match filters.as_slice() {
            [RawPattern::Literal(s)] if s == "all" => return Ok(CommentPolicy::All),
            [RawPattern::Literal(s)] if s == "none" => return Ok(CommentPolicy::None),
            _ => {}
        }
        filters
            .into_iter()
            .map(|f| match f {
                RawPattern::Literal(name) => CommentFilter::named(&name),
                RawPattern::Regex { regex } => CommentFilter::pattern(&regex),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CommentPolicy::Filters)
    }
}
