//! Forward-only result cursors.

use crate::backend::RowSource;
use crate::error::{CoreError, CoreResult};
use crate::record::Row;
use crate::schema::Schema;
use std::fmt;

/// A lazy, forward-only, non-restartable sequence of raw rows.
///
/// The backend resource behind the cursor is released as soon as the last
/// row has been read, when [`ResultCursor::close`] is called, after a fetch
/// error, or when the cursor is dropped, whichever comes first.
pub struct ResultCursor<'c> {
    schema: &'static Schema,
    source: Option<Box<dyn RowSource + 'c>>,
    advanced: bool,
}

impl<'c> ResultCursor<'c> {
    pub(crate) fn new(schema: &'static Schema, source: Box<dyn RowSource + 'c>) -> Self {
        Self {
            schema,
            source: Some(source),
            advanced: false,
        }
    }

    /// Returns the schema the rows follow.
    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Positions at the first row and returns it, `None` for an empty result.
    ///
    /// # Errors
    ///
    /// [`CoreError::CursorConsumed`] if the cursor has already advanced;
    /// run the query again instead. Backend errors are passed through.
    pub fn begin(&mut self) -> CoreResult<Option<Row>> {
        if self.advanced {
            return Err(CoreError::CursorConsumed);
        }
        self.next().transpose()
    }

    /// Releases the backend resource. Later calls to `next` return `None`.
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }

    /// Returns true once the backend resource has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }
}

impl Iterator for ResultCursor<'_> {
    type Item = CoreResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advanced = true;
        let source = self.source.as_mut()?;
        match source.fetch() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for ResultCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ResultCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("schema", &self.schema.name())
            .field("advanced", &self.advanced)
            .field("closed", &self.is_closed())
            .finish()
    }
}
