//! Offset/limit pagination for collection reads.

/// Limit applied when the caller gives none.
pub const DEFAULT_LIMIT: usize = 100;

/// Largest limit a caller may request.
pub const MAX_LIMIT: usize = 1000;

/// A window into an ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Entries to skip.
    pub offset: usize,
    /// Entries to return at most.
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Build a page from optional caller input, clamping the limit to
    /// [`MAX_LIMIT`].
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            offset: offset.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    /// Apply the window to `items`.
    pub fn apply<T>(self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(Page::new(None, None), Page::default());
        assert_eq!(Page::new(Some(5), Some(50_000)).limit, MAX_LIMIT);
    }

    #[test]
    fn windows_past_the_end_are_empty() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(Page::new(Some(8), Some(5)).apply(items.clone()), vec![8, 9]);
        assert!(Page::new(Some(20), None).apply(items).is_empty());
    }
}
