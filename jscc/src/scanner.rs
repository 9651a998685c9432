//! Lexical scanner for C-family / HTML hybrid sources.
//!
//! The scanner does not tokenize the host language. It only classifies the
//! regions that matter to the preprocessor: comments, quoted literals, regex
//! literals and division operators. Everything else is reported as text.
//!
//! All stop conditions are ASCII bytes, so every span boundary is a valid
//! `char` boundary even when the source contains multi-byte characters.

/// Classification of a scanned region
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanKind {
    /// Anything that is not one of the other kinds
    Text,
    /// `// ...` up to, not including, the line feed
    LineComment,
    /// `/* ... */`
    BlockComment,
    /// `<!-- ... -->`
    HtmlComment,
    /// `'...'` or `"..."`
    StringLiteral,
    /// `` `...` ``
    TemplateLiteral,
    /// `/pattern/flags`
    RegexLiteral,
    /// A `/` that divides, or the slash of a closing tag
    DivisionOp,
}

impl SpanKind {
    /// `true` for the three comment kinds
    #[must_use]
    pub const fn is_comment(self) -> bool {
        matches!(
            self,
            SpanKind::LineComment | SpanKind::BlockComment | SpanKind::HtmlComment
        )
    }
}

/// A classified byte range of the source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    /// What the range contains
    pub kind: SpanKind,
    /// Byte offset of the first byte
    pub start: usize,
    /// Byte offset one past the last byte
    pub end: usize,
}

impl Span {
    /// The text covered by this span
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Keywords after which a `/` starts a regex literal rather than dividing
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return",
    "yield",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "await",
];

/// Forward scanner producing non-overlapping spans that cover the input
pub struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    regex_allowed: bool,
}

impl<'a> Scanner<'a> {
    /// Create a scanner positioned at the start of `source`
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            regex_allowed: true,
        }
    }

    /// Current byte offset
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Resume scanning at `offset`, as if a new statement started there
    ///
    /// Offsets past the end clamp to the end of input.
    pub fn seek(&mut self, offset: usize) {
        self.pos = offset.min(self.bytes.len());
        self.regex_allowed = true;
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Returns `true` if the byte at the current position begins a special span
    fn at_special(&self) -> bool {
        match self.bytes[self.pos] {
            b'/' | b'\'' | b'"' | b'`' => true,
            b'<' => self.at_html_comment(),
            _ => false,
        }
    }

    fn at_html_comment(&self) -> bool {
        self.bytes[self.pos..].starts_with(b"<!--") && self.peek(4) != Some(b'>')
    }

    /// Consume plain text, updating the regex context as tokens go by
    fn skip_text(&mut self) {
        while self.pos < self.bytes.len() && !self.at_special() {
            let b = self.bytes[self.pos];
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80 {
                let start = self.pos;
                while self.pos < self.bytes.len() {
                    let c = self.bytes[self.pos];
                    if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80 {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let word = &self.source[start..self.pos];
                self.regex_allowed = EXPRESSION_KEYWORDS.contains(&word);
            } else if (b == b'+' || b == b'-') && self.peek(1) == Some(b) {
                self.pos += 2;
                self.regex_allowed = false;
            } else {
                self.pos += 1;
                self.regex_allowed = !matches!(b, b')' | b']');
            }
        }
    }

    fn scan_line_comment(&mut self) -> usize {
        memchr_from(self.bytes, self.pos, b'\n').unwrap_or(self.bytes.len())
    }

    fn scan_block_comment(&mut self) -> usize {
        find_from(self.bytes, self.pos + 2, b"*/").map_or(self.bytes.len(), |i| i + 2)
    }

    fn scan_html_comment(&mut self) -> usize {
        find_from(self.bytes, self.pos + 4, b"-->").map_or(self.bytes.len(), |i| i + 3)
    }

    fn scan_quoted(&mut self, quote: u8) -> usize {
        let mut i = self.pos + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' if quote != b'`' => return i,
                c if c == quote => return i + 1,
                _ => i += 1,
            }
        }
        self.bytes.len()
    }

    /// End of the regex literal starting at the current `/`, `None` if the
    /// slash cannot open one on this line
    fn scan_regex(&self) -> Option<usize> {
        let mut i = self.pos + 1;
        let mut in_class = false;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => {
                    if self.bytes.get(i + 1) == Some(&b'\n') {
                        return None;
                    }
                    i += 2;
                }
                b'\n' => return None,
                b'[' => {
                    in_class = true;
                    i += 1;
                }
                b']' => {
                    in_class = false;
                    i += 1;
                }
                b'/' if !in_class => {
                    i += 1;
                    while i < self.bytes.len() && self.bytes[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    return Some(i);
                }
                _ => i += 1,
            }
        }
        Some(self.bytes.len())
    }

    fn is_closing_tag_slash(&self) -> bool {
        self.pos > 0
            && self.bytes[self.pos - 1] == b'<'
            && self
                .peek(1)
                .is_some_and(|c| c.is_ascii_alphabetic() || c == b'-')
    }

    fn scan_special(&mut self) -> Span {
        let start = self.pos;
        let (kind, end) = match self.bytes[start] {
            b'/' => match self.peek(1) {
                Some(b'/') => (SpanKind::LineComment, self.scan_line_comment()),
                Some(b'*') => (SpanKind::BlockComment, self.scan_block_comment()),
                next => {
                    let division = !self.regex_allowed
                        || next == Some(b'>')
                        || self.is_closing_tag_slash();
                    match (division, self.scan_regex()) {
                        (false, Some(end)) => {
                            self.regex_allowed = false;
                            (SpanKind::RegexLiteral, end)
                        }
                        _ => {
                            self.regex_allowed = true;
                            (SpanKind::DivisionOp, start + 1)
                        }
                    }
                }
            },
            b'<' => (SpanKind::HtmlComment, self.scan_html_comment()),
            b'`' => {
                self.regex_allowed = false;
                (SpanKind::TemplateLiteral, self.scan_quoted(b'`'))
            }
            quote => {
                self.regex_allowed = false;
                (SpanKind::StringLiteral, self.scan_quoted(quote))
            }
        };
        let end = end.min(self.bytes.len());
        self.pos = end;
        Span { kind, start, end }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        self.skip_text();
        if self.pos > start {
            return Some(Span {
                kind: SpanKind::Text,
                start,
                end: self.pos,
            });
        }
        Some(self.scan_special())
    }
}

/// Scan the whole source into spans
#[must_use]
pub fn scan(source: &str) -> Vec<Span> {
    Scanner::new(source).collect()
}

/// Offset of the first `//` in `text` that is not inside a string literal
///
/// Used to drop same-line trailing comments from directive expressions
/// without truncating values such as `"file:///path"`.
#[must_use]
pub fn find_unquoted_line_comment(text: &str) -> Option<usize> {
    Scanner::new(text)
        .find(|span| span.kind == SpanKind::LineComment)
        .map(|span| span.start)
}

/// Replace `\r\n` with ` \n` and lone `\r` with `\n`, keeping every offset
#[must_use]
pub fn normalize_line_endings(source: &str) -> std::borrow::Cow<'_, str> {
    if !source.contains('\r') {
        return std::borrow::Cow::Borrowed(source);
    }
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                out.push(' ');
            } else {
                out.push('\n');
            }
        } else {
            out.push(c);
        }
    }
    std::borrow::Cow::Owned(out)
}

fn memchr_from(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|b| *b == needle)
        .map(|i| i + from)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
