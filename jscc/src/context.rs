use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

/// Name of the built-in holding the path of the file being processed
pub const FILE_VARIABLE: &str = "_FILE";
/// Name of the built-in holding the configured version
pub const VERSION_VARIABLE: &str = "_VERSION";

/// Kind of branch a block frame is currently in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    /// Root frame, outside any conditional block
    None,
    /// Inside an `#if`/`#ifset`/`#ifnset` or `#elif` branch
    If,
    /// Inside the `#else` branch
    Else,
}

/// Output state of a block frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputState {
    /// Content is emitted
    Working,
    /// No branch taken yet, content is hidden
    Testing,
    /// A branch was already taken or the parent is hidden
    Ending,
}

/// State for one level of conditional nesting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockFrame {
    /// Branch the frame is in
    pub branch: BranchKind,
    /// Whether content in this frame is emitted
    pub state: OutputState,
}

impl BlockFrame {
    const ROOT: BlockFrame = BlockFrame {
        branch: BranchKind::None,
        state: OutputState::Working,
    };
}

/// Stack of block frames, never empty
#[derive(Clone, Debug)]
pub struct BlockStack {
    frames: Vec<BlockFrame>,
}

impl Default for BlockStack {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStack {
    /// Create a stack holding only the root frame
    #[must_use]
    pub fn new() -> Self {
        BlockStack {
            frames: vec![BlockFrame::ROOT],
        }
    }

    /// Topmost frame
    #[must_use]
    pub fn top(&self) -> BlockFrame {
        self.frames.last().copied().unwrap_or(BlockFrame::ROOT)
    }

    /// Replace the topmost frame
    pub fn set_top(&mut self, frame: BlockFrame) {
        if self.frames.len() > 1 {
            if let Some(last) = self.frames.last_mut() {
                *last = frame;
            }
        }
    }

    /// Open a nested block
    pub fn push(&mut self, state: OutputState) {
        self.frames.push(BlockFrame {
            branch: BranchKind::If,
            state,
        });
    }

    /// Close the innermost block; the root frame is never removed
    pub fn pop(&mut self) -> Option<BlockFrame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Number of frames including the root
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// `true` when content at the current position is emitted
    #[must_use]
    pub fn is_working(&self) -> bool {
        self.top().state == OutputState::Working
    }
}

/// Variable environment visible to expressions and substitution
///
/// Names listed as read-only can be read but never written by directives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Environment {
    values: BTreeMap<String, Value>,
    read_only: BTreeSet<String>,
}

impl Environment {
    /// Create an empty environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// `true` if `name` is bound, even to `undefined`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bind `name` to `value`, replacing any previous binding
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Remove the binding of `name`
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Bind a built-in that directives cannot modify
    pub fn insert_read_only(&mut self, name: &str, value: Value) {
        self.insert(name, value);
        self.read_only.insert(name.to_string());
    }

    /// `true` for built-ins such as `_FILE`
    #[must_use]
    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only.contains(name)
    }

    /// Iterate over bindings in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
