use super::StoreError;

/// A lazy sequence over a query result (§9: "lazy sequences... synchronous
/// iterators that hold a cursor" rather than materialising the whole result
/// set). `loom-sqlite` builds one from a pooled connection plus a Diesel
/// `load_iter`; `loom-core` only needs the shape so `Catalog`'s signatures
/// don't force every caller to collect into a `Vec` up front.
pub struct RowCursor<T> {
    inner: Box<dyn Iterator<Item = Result<T, StoreError>> + Send>,
}

impl<T> RowCursor<T> {
    pub fn new<I>(iter: I) -> Self
        where I: Iterator<Item = Result<T, StoreError>> + Send + 'static
    {
        Self { inner: Box::new(iter) }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl<T> Iterator for RowCursor<T> {
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_a_plain_iterator() {
        let mut cursor = RowCursor::new(vec![Ok(1), Ok(2), Err(StoreError::RowNotFound(3))].into_iter());
        assert_eq!(cursor.next().unwrap().unwrap(), 1);
        assert_eq!(cursor.next().unwrap().unwrap(), 2);
        assert!(cursor.next().unwrap().is_err());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn empty_cursor_yields_nothing() {
        let mut cursor: RowCursor<i32> = RowCursor::empty();
        assert!(cursor.next().is_none());
    }
}
