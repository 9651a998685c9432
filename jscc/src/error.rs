use thiserror::Error;

/// Errors raised while evaluating a directive expression
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    /// The expression text does not parse
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Reference to an identifier that is neither a variable nor a literal
    #[error("{0} is not defined")]
    NotDefined(String),
    /// Member access on `undefined` or `null`
    #[error("cannot read properties of {target} (reading '{property}')")]
    PropertyOfNothing {
        /// `undefined` or `null`
        target: &'static str,
        /// Name of the member being read
        property: String,
    },
    /// Valid host syntax the interpreter does not run, such as calls
    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

/// Fatal errors that abort preprocessing of one file
#[derive(Debug, Error)]
pub enum DirectiveError {
    /// Malformed directive: missing expression, bad variable name, read-only variable
    #[error("{file}:{line}: {message}")]
    Parse {
        /// File being processed
        file: String,
        /// 1-based line of the directive
        line: usize,
        /// Description of the problem
        message: String,
    },
    /// Unbalanced `#elif`/`#else`/`#endif` or an unclosed block
    #[error("{file}:{line}: {message}")]
    Structural {
        /// File being processed
        file: String,
        /// 1-based line of the directive, or the last line for unclosed blocks
        line: usize,
        /// Description of the problem
        message: String,
    },
    /// The expression of a directive failed to evaluate
    #[error("{file}:{line}: {source} in expression: {expression}")]
    Evaluation {
        /// File being processed
        file: String,
        /// 1-based line of the directive
        line: usize,
        /// Expression text as written in the directive
        expression: String,
        /// The evaluator failure
        #[source]
        source: EvalError,
    },
    /// Raised by an `#error` directive
    #[error("{file}:{line}: {message}")]
    User {
        /// File being processed
        file: String,
        /// 1-based line of the directive
        line: usize,
        /// The evaluated `#error` message
        message: String,
    },
}

impl DirectiveError {
    pub(crate) fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        DirectiveError::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn structural(file: &str, line: usize, message: impl Into<String>) -> Self {
        DirectiveError::Structural {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(file: &str, line: usize, expression: &str, source: EvalError) -> Self {
        DirectiveError::Evaluation {
            file: file.to_string(),
            line,
            expression: expression.to_string(),
            source,
        }
    }

    /// Line of the offending directive
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            DirectiveError::Parse { line, .. }
            | DirectiveError::Structural { line, .. }
            | DirectiveError::Evaluation { line, .. }
            | DirectiveError::User { line, .. } => *line,
        }
    }

    /// File the error was raised in
    #[must_use]
    pub fn file(&self) -> &str {
        match self {
            DirectiveError::Parse { file, .. }
            | DirectiveError::Structural { file, .. }
            | DirectiveError::Evaluation { file, .. }
            | DirectiveError::User { file, .. } => file,
        }
    }

    /// Message without the location prefix
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            DirectiveError::Parse { message, .. }
            | DirectiveError::Structural { message, .. }
            | DirectiveError::User { message, .. } => message.clone(),
            DirectiveError::Evaluation {
                expression, source, ..
            } => format!("{source} in expression: {expression}"),
        }
    }
}

/// Errors in user supplied options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options document is not valid JSON or has the wrong shape
    #[error("invalid options: {0}")]
    Json(#[from] serde_json::Error),
    /// A key of `values` does not match the variable naming pattern
    #[error("invalid variable name: {0}")]
    InvalidVariableName(String),
    /// A prefix pattern failed to compile
    #[error("invalid prefix pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    /// Unknown comment filter name
    #[error("unknown comments filter \"{0}\"")]
    UnknownCommentFilter(String),
}
