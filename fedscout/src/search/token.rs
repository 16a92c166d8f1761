use std::fmt;

/// Identifies one search session.
///
/// Tokens are minted from a monotonically increasing counter, so a larger
/// token always belongs to a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchToken(u64);

impl SearchToken {
    /// Wraps a raw token value, e.g. one received back from a listener
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SearchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_order_by_age() {
        let older = SearchToken::from_raw(3);
        let newer = SearchToken::from_raw(4);
        assert!(older < newer);
        assert_eq!(newer.get(), 4);
        assert_eq!(newer.to_string(), "#4");
    }
}
