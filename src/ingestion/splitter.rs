//! Size-bounded, separator-aware text splitting with fixed overlap.
//!
//! Splitting walks a separator ladder — paragraph break, line break,
//! sentence boundary, word boundary — and only hard-cuts when no separator
//! can produce a piece under the size bound. Consecutive pieces are merged
//! greedily up to the bound, carrying whole trailing pieces as overlap into
//! the next chunk, so chunk boundaries land on natural text seams whenever
//! the text has any.

/// Size/overlap profile for one splitting pass. Sizes are in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Upper bound on fragment size.
    pub chunk_size: usize,
    /// Approximate overlap carried between consecutive fragments.
    pub overlap: usize,
}

impl SplitterConfig {
    /// Coarse profile for parent chunks.
    #[must_use]
    pub fn parents() -> Self {
        Self {
            chunk_size: 1500,
            overlap: 100,
        }
    }

    /// Fine, higher-overlap profile for child chunks.
    #[must_use]
    pub fn children() -> Self {
        Self {
            chunk_size: 400,
            overlap: 80,
        }
    }
}

/// One split fragment with its byte offset into the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub offset: usize,
}

/// Separator ladder, coarse to fine. Pieces still over the bound after the
/// last separator are hard-cut at character boundaries.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Recursive separator-aware splitter.
#[derive(Clone, Copy, Debug)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Splits `text` into overlapping fragments, each at most
    /// `chunk_size` bytes. Whitespace-only input yields no fragments.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Fragment> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let pieces = self.split_ranges(text, 0, text.len(), &SEPARATORS);
        self.merge_pieces(text, &pieces)
    }

    /// Tiles `[start, end)` into ranges each within the size bound, trying
    /// separators in ladder order and hard-cutting as a last resort.
    fn split_ranges(
        &self,
        text: &str,
        start: usize,
        end: usize,
        separators: &[&str],
    ) -> Vec<(usize, usize)> {
        if end - start <= self.config.chunk_size {
            return vec![(start, end)];
        }
        let Some((separator, rest)) = separators.split_first() else {
            return hard_cut(text, start, end, self.config.chunk_size);
        };

        let mut boundaries = Vec::new();
        let mut cursor = start;
        while let Some(found) = text[cursor..end].find(separator) {
            let boundary = cursor + found + separator.len();
            boundaries.push(boundary);
            cursor = boundary;
        }
        if boundaries.is_empty() {
            return self.split_ranges(text, start, end, rest);
        }

        let mut pieces = Vec::new();
        let mut piece_start = start;
        for boundary in boundaries.into_iter().chain(std::iter::once(end)) {
            if boundary <= piece_start {
                continue;
            }
            if boundary - piece_start > self.config.chunk_size {
                pieces.extend(self.split_ranges(text, piece_start, boundary, rest));
            } else {
                pieces.push((piece_start, boundary));
            }
            piece_start = boundary;
        }
        pieces
    }

    /// Greedily merges adjacent pieces up to the size bound, retaining
    /// trailing pieces worth up to `overlap` bytes as the start of the
    /// next fragment.
    fn merge_pieces(&self, text: &str, pieces: &[(usize, usize)]) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        let mut window: Vec<(usize, usize)> = Vec::new();
        let mut window_len = 0usize;

        let mut emit = |window: &[(usize, usize)]| {
            if let (Some(first), Some(last)) = (window.first(), window.last()) {
                let slice = &text[first.0..last.1];
                if !slice.trim().is_empty() {
                    fragments.push(Fragment {
                        text: slice.to_string(),
                        offset: first.0,
                    });
                }
            }
        };

        for &piece in pieces {
            let piece_len = piece.1 - piece.0;
            if window_len + piece_len > self.config.chunk_size && !window.is_empty() {
                emit(&window);
                while !window.is_empty()
                    && (window_len > self.config.overlap
                        || window_len + piece_len > self.config.chunk_size)
                {
                    let dropped = window.remove(0);
                    window_len -= dropped.1 - dropped.0;
                }
            }
            window.push(piece);
            window_len += piece_len;
        }
        emit(&window);
        fragments
    }
}

/// Cuts `[start, end)` into `chunk_size`-byte ranges aligned to character
/// boundaries.
fn hard_cut(text: &str, start: usize, end: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut cut_start = start;
    while cut_start < end {
        let mut cut_end = (cut_start + chunk_size).min(end);
        while cut_end < end && !text.is_char_boundary(cut_end) {
            cut_end -= 1;
        }
        // A single >chunk_size character cannot be split further.
        if cut_end <= cut_start {
            cut_end = next_char_boundary(text, cut_start, end);
        }
        ranges.push((cut_start, cut_end));
        cut_start = cut_end;
    }
    ranges
}

fn next_char_boundary(text: &str, from: usize, end: usize) -> usize {
    let mut idx = from + 1;
    while idx < end && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn splitter(chunk_size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            overlap,
        })
    }

    #[test]
    fn short_text_is_one_fragment() {
        let fragments = splitter(100, 10).split("a short paragraph");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "a short paragraph");
        assert_eq!(fragments[0].offset, 0);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(splitter(100, 10).split("").is_empty());
        assert!(splitter(100, 10).split("   \n\n  ").is_empty());
    }

    #[test]
    fn paragraph_boundaries_are_preferred() {
        let text = "First paragraph with some words.\n\nSecond paragraph with more words.\n\nThird paragraph closes it out.";
        let fragments = splitter(40, 0).split(text);
        assert!(fragments.len() >= 3);
        assert!(fragments[0].text.starts_with("First paragraph"));
        assert!(fragments[1].text.starts_with("Second paragraph"));
    }

    #[test]
    fn overlap_repeats_trailing_text() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let fragments = splitter(30, 12).split(text);
        assert!(fragments.len() > 1);
        for pair in fragments.windows(2) {
            // The next fragment starts at or before the previous one ends.
            assert!(pair[1].offset <= pair[0].offset + pair[0].text.len());
        }
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let text = "x".repeat(95);
        let fragments = splitter(30, 0).split(&text);
        assert_eq!(fragments.len(), 4);
        assert!(fragments.iter().all(|f| f.text.len() <= 30));
    }

    #[test]
    fn multibyte_text_respects_char_boundaries() {
        let text = "ä".repeat(50);
        let fragments = splitter(15, 0).split(&text);
        for fragment in &fragments {
            assert!(fragment.text.len() <= 15);
            assert!(fragment.text.chars().all(|c| c == 'ä'));
        }
    }

    #[test]
    fn offsets_index_into_source() {
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta.\n\nEta theta iota kappa.";
        for fragment in splitter(25, 5).split(text) {
            assert_eq!(
                &text[fragment.offset..fragment.offset + fragment.text.len()],
                fragment.text
            );
        }
    }

    proptest! {
        #[test]
        fn fragments_are_bounded_and_anchored(text in "\\PC{0,600}") {
            let splitter = splitter(64, 16);
            let fragments = splitter.split(&text);
            for fragment in &fragments {
                prop_assert!(fragment.text.len() <= 64);
                prop_assert_eq!(
                    &text[fragment.offset..fragment.offset + fragment.text.len()],
                    fragment.text.as_str()
                );
            }
        }

        #[test]
        fn every_word_survives_splitting(text in "[a-z \\n]{1,600}") {
            let splitter = splitter(48, 8);
            let fragments = splitter.split(&text);
            if text.trim().is_empty() {
                prop_assert!(fragments.is_empty());
            } else {
                // Every non-whitespace byte of the source is covered by at
                // least one fragment.
                let mut covered = vec![false; text.len()];
                for fragment in &fragments {
                    for slot in &mut covered[fragment.offset..fragment.offset + fragment.text.len()] {
                        *slot = true;
                    }
                }
                for (idx, byte) in text.bytes().enumerate() {
                    if !byte.is_ascii_whitespace() {
                        prop_assert!(covered[idx], "byte {idx} ({}) lost", byte as char);
                    }
                }
            }
        }
    }
}
