//! Bounded-memory Levenshtein distance.
//!
//! The distance runs inside the ranking loop over thousands of results, so it
//! keeps only two rows of the dynamic-programming matrix and reuses them
//! across calls. Rows are sized by the shorter input, which bounds memory to
//! `O(min(len(a), len(b)))`, and they grow to the largest string seen and keep
//! that capacity.
//!
//! Buffers are owned explicitly by the caller: one `DistanceBuffers` per
//! worker, typically created through rayon's `map_init`.
//!
//! Comparison is literal, one `char` at a time. Callers that want
//! case-insensitive distances lowercase both inputs first.

/// Smallest row capacity handed out, so short strings never reallocate
const INITIAL_ROW_CAPACITY: usize = 64;

/// Reusable rolling rows for [`DistanceBuffers::distance`]
#[derive(Debug, Clone)]
pub struct DistanceBuffers {
    prev: Vec<usize>,
    curr: Vec<usize>,
}

impl Default for DistanceBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceBuffers {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_ROW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            prev: vec![0; capacity],
            curr: vec![0; capacity],
        }
    }

    /// Current row capacity (in cells)
    pub fn capacity(&self) -> usize {
        self.prev.len()
    }

    /// Ensures both rows hold at least `cells` entries.
    ///
    /// Growth rounds up to the next power of two so a sequence of slightly
    /// longer strings does not reallocate on every call.
    fn reserve_row(&mut self, cells: usize) {
        if self.prev.len() < cells {
            let size = cells.next_power_of_two();
            self.prev = vec![0; size];
            self.curr = vec![0; size];
        }
    }

    /// Minimum number of single-character insertions, deletions and
    /// substitutions turning `a` into `b`.
    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        let a_len = a.chars().count();
        let b_len = b.chars().count();

        if a_len == 0 {
            return b_len;
        }
        if b_len == 0 {
            return a_len;
        }

        // The row runs over the shorter string.
        let (short, short_len, long) = if a_len <= b_len {
            (a, a_len, b)
        } else {
            (b, b_len, a)
        };

        self.reserve_row(short_len + 1);
        let mut prev = &mut self.prev[..=short_len];
        let mut curr = &mut self.curr[..=short_len];

        for (i, cell) in prev.iter_mut().enumerate() {
            *cell = i;
        }

        for (j, long_char) in long.chars().enumerate() {
            curr[0] = j + 1;
            for (i, short_char) in short.chars().enumerate() {
                let cost = usize::from(short_char != long_char);
                curr[i + 1] = (curr[i] + 1).min(prev[i + 1] + 1).min(prev[i] + cost);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[short_len]
    }

    /// Fuzzy acceptance: the distance is at most half the longer length.
    pub fn is_fuzzy_match(&mut self, text: &str, query: &str) -> bool {
        let threshold = text.chars().count().max(query.chars().count()) / 2;
        self.distance(text, query) <= threshold
    }
}

/// One-off distance with freshly allocated rows.
///
/// Prefer a long-lived [`DistanceBuffers`] in loops.
pub fn levenshtein(a: &str, b: &str) -> usize {
    DistanceBuffers::new().distance(a, b)
}

/// One-off fuzzy check with freshly allocated rows
pub fn is_fuzzy_match(text: &str, query: &str) -> bool {
    DistanceBuffers::new().is_fuzzy_match(text, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_distances() {
        let mut buffers = DistanceBuffers::new();
        assert_eq!(buffers.distance("kitten", "sitting"), 3);
        assert_eq!(buffers.distance("saturday", "sunday"), 3);
        assert_eq!(buffers.distance("flaw", "lawn"), 2);
        assert_eq!(buffers.distance("ubuntu", "ubuntu desktop iso"), 12);
    }

    #[test]
    fn test_empty_inputs() {
        let mut buffers = DistanceBuffers::new();
        assert_eq!(buffers.distance("", "abc"), 3);
        assert_eq!(buffers.distance("abc", ""), 3);
        assert_eq!(buffers.distance("", ""), 0);
    }

    #[test]
    fn test_identity_and_symmetry() {
        let words = [
            "",
            "a",
            "kitten",
            "sitting",
            "timon of athens",
            "ubuntu desktop iso",
            "niño",
            "nino",
        ];
        let mut buffers = DistanceBuffers::new();
        for a in words {
            assert_eq!(buffers.distance(a, a), 0, "distance({a:?}, {a:?})");
            for b in words {
                assert_eq!(
                    buffers.distance(a, b),
                    buffers.distance(b, a),
                    "symmetry for {a:?} / {b:?}"
                );
            }
        }
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let mut buffers = DistanceBuffers::new();
        assert_eq!(buffers.distance("niño", "nino"), 1);
        assert_eq!(buffers.distance("日本語", "日本"), 1);
    }

    #[test]
    fn test_comparison_is_literal() {
        let mut buffers = DistanceBuffers::new();
        assert_eq!(buffers.distance("Ubuntu", "ubuntu"), 1);
    }

    #[test]
    fn test_rows_are_reused_between_calls() {
        let mut buffers = DistanceBuffers::new();
        buffers.distance("short", "strings");
        let prev_ptr = buffers.prev.as_ptr();
        let curr_ptr = buffers.curr.as_ptr();

        for _ in 0..100 {
            buffers.distance("the quick brown fox", "jumps over the lazy dog");
        }

        assert_eq!(buffers.prev.as_ptr(), prev_ptr);
        assert_eq!(buffers.curr.as_ptr(), curr_ptr);
        assert_eq!(buffers.capacity(), INITIAL_ROW_CAPACITY);
    }

    #[test]
    fn test_rows_sized_by_shorter_input() {
        let mut buffers = DistanceBuffers::new();
        let long = "x".repeat(10_000);
        let short = "y".repeat(100);

        assert_eq!(buffers.distance(&long, &short), 10_000);
        // 101 cells rounded up, never anything proportional to the long side
        assert_eq!(buffers.capacity(), 128);

        // Growth is kept for later calls
        buffers.distance("a", "b");
        assert_eq!(buffers.capacity(), 128);
    }

    #[test]
    fn test_fuzzy_threshold() {
        let mut buffers = DistanceBuffers::new();
        // distance 3, threshold 7 / 2 = 3
        assert!(buffers.is_fuzzy_match("kitten", "sitting"));
        // distance 5, threshold 5 / 2 = 2
        assert!(!buffers.is_fuzzy_match("abcde", "vwxyz"));
        assert!(is_fuzzy_match("", ""));
    }

    #[test]
    fn test_one_off_helpers() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert!(!is_fuzzy_match("linux", "completely unrelated text"));
    }
}
