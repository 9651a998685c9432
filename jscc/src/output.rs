use serde::Serialize;

/// Ordered correspondence from output offsets back to input offsets
///
/// Both coordinates are byte offsets and never decrease along `pairs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PositionMap {
    /// `(output offset, input offset)` pairs
    pub pairs: Vec<(usize, usize)>,
}

impl PositionMap {
    fn push(&mut self, output: usize, input: usize) {
        if self.pairs.last() != Some(&(output, input)) {
            self.pairs.push((output, input));
        }
    }

    /// Input offset for an output offset, measured from the nearest preceding pair
    ///
    /// Offsets inside substituted text resolve relative to the replaced reference.
    #[must_use]
    pub fn original_offset(&self, output: usize) -> Option<usize> {
        let idx = self.pairs.partition_point(|(out, _)| *out <= output);
        let (out, input) = self.pairs.get(idx.checked_sub(1)?)?;
        Some(input + (output - out))
    }

    /// Number of recorded pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// `true` when no pair was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Result of preprocessing one file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Processed {
    /// Transformed source text
    pub output: String,
    /// `false` when the output is byte-identical to the input
    pub changed: bool,
    /// Present when position mapping was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_map: Option<PositionMap>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Overwrite edits recorded against an immutable source
///
/// Edits are kept in source order and never overlap; text outside any edit
/// is copied from the source unchanged.
#[derive(Clone, Debug)]
pub struct EditBuffer<'a> {
    source: &'a str,
    edits: Vec<Edit>,
}

impl<'a> EditBuffer<'a> {
    /// Start an empty edit list over `source`
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        EditBuffer {
            source,
            edits: Vec::new(),
        }
    }

    /// End of the last recorded edit, 0 if none
    #[must_use]
    pub fn last_end(&self) -> usize {
        self.edits.last().map_or(0, |e| e.end)
    }

    /// Replace `start..end` with `text`
    ///
    /// A range reaching back into an earlier edit is clipped to its end.
    pub fn overwrite(&mut self, start: usize, end: usize, text: impl Into<String>) {
        let end = end.min(self.source.len());
        let start = start.max(self.last_end()).min(end);
        let text = text.into();
        if start == end && text.is_empty() {
            return;
        }
        self.edits.push(Edit { start, end, text });
    }

    /// Remove `start..end`
    pub fn remove(&mut self, start: usize, end: usize) {
        self.overwrite(start, end, String::new());
    }

    /// Number of recorded edits
    #[must_use]
    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// `true` if any edit alters the text it covers
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.edits
            .iter()
            .any(|e| self.source.get(e.start..e.end) != Some(e.text.as_str()))
    }

    /// Assemble the output text and, when requested, its position map
    ///
    /// Kept text gets a pair at its start and at every line start, or at every
    /// character with `hires`. Each non-empty replacement gets a pair at its start.
    #[must_use]
    pub fn render(&self, hires: bool, with_map: bool) -> (String, Option<PositionMap>) {
        let mut output = String::with_capacity(self.source.len());
        let mut map = PositionMap::default();
        let mut cursor = 0;

        for edit in &self.edits {
            self.copy_kept(cursor, edit.start, hires, &mut output, &mut map);
            if !edit.text.is_empty() {
                map.push(output.len(), edit.start);
                output.push_str(&edit.text);
            }
            cursor = edit.end;
        }
        self.copy_kept(cursor, self.source.len(), hires, &mut output, &mut map);

        (output, with_map.then_some(map))
    }

    fn copy_kept(
        &self,
        start: usize,
        end: usize,
        hires: bool,
        output: &mut String,
        map: &mut PositionMap,
    ) {
        let Some(segment) = self.source.get(start..end) else {
            return;
        };
        if segment.is_empty() {
            return;
        }
        let base = output.len();
        map.push(base, start);
        for (i, ch) in segment.char_indices() {
            if hires {
                map.push(base + i, start + i);
            } else if ch == '\n' && i + 1 < segment.len() {
                map.push(base + i + 1, start + i + 1);
            }
        }
        output.push_str(segment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_source_renders_identically() {
        let buffer = EditBuffer::new("a\nb\n");
        let (out, map) = buffer.render(false, true);
        assert_eq!(out, "a\nb\n");
        assert!(!buffer.is_changed());
        assert_eq!(map.map(|m| m.pairs), Some(vec![(0, 0), (2, 2)]));
    }

    #[test]
    fn empty_source_has_empty_map() {
        let (_, map) = EditBuffer::new("").render(true, true);
        let map = map.unwrap();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.original_offset(0), None);

        let (_, map) = EditBuffer::new("ab").render(true, true);
        assert_eq!(map.map(|m| m.len()), Some(2));
    }

    #[test]
    fn removal_and_replacement() {
        let mut buffer = EditBuffer::new("one\ntwo\nthree");
        buffer.remove(3, 7);
        buffer.overwrite(8, 13, "3");
        let (out, map) = buffer.render(false, true);
        assert_eq!(out, "one\n3");
        assert!(buffer.is_changed());
        assert_eq!(map.map(|m| m.pairs), Some(vec![(0, 0), (3, 7), (4, 8)]));
    }

    #[test]
    fn overlapping_edit_is_clipped() {
        let mut buffer = EditBuffer::new("abcdef");
        buffer.remove(1, 4);
        buffer.remove(2, 5);
        assert_eq!(buffer.render(false, false).0, "af");
        assert_eq!(buffer.edit_count(), 2);
    }

    #[test]
    fn same_text_overwrite_is_not_a_change() {
        let mut buffer = EditBuffer::new("  x");
        buffer.overwrite(0, 2, "  ");
        assert!(!buffer.is_changed());
    }

    #[test]
    fn hires_map_has_pair_per_char() {
        let mut buffer = EditBuffer::new("ab\ncd");
        buffer.remove(0, 3);
        let (_, map) = buffer.render(true, true);
        assert_eq!(map.map(|m| m.pairs), Some(vec![(0, 3), (1, 4)]));
    }

    #[test]
    fn original_offset_lookup() {
        let mut buffer = EditBuffer::new("xx\nkeep");
        buffer.remove(0, 3);
        let (_, map) = buffer.render(false, true);
        let map = map.unwrap_or_default();
        assert_eq!(map.original_offset(0), Some(3));
        assert_eq!(map.original_offset(2), Some(5));
    }
}
