use std::io::{Read, Seek};

use tracing::trace;

use super::element::Element;
use super::element_util::{read_header, EbmlSize, Extent};
use super::errors::element::ElementError;

///
/// A forward cursor over the children of a master [`Element`].  Obtained from [`Element::iter`].
///
/// Only the position of the next child is stored between steps; every step seeks there and parses one header, so several
/// cursors over the same source can be used alternately.
///
/// For a parent with a known size, iteration ends at the end of its payload, and a source that ends before that produces
/// [`ElementError::Truncated`].  For a parent with an unknown size, iteration ends when the source ends or at the first
/// element that is neither a valid child of the parent nor a global element.  A completed iteration records the
/// parent's resolved size and child count, so they are never scanned for again.
///
/// The cursor stops after yielding an error.
///
pub struct Children<'a, R: Read + Seek> {
    parent: &'a Element<R>,
    position: u64,
    count: usize,
    precache: bool,
    memoize: bool,
    done: bool,
    extent: Option<Extent>,
}

impl<'a, R: Read + Seek> Children<'a, R> {
    pub(crate) fn new(parent: &'a Element<R>) -> Self {
        Children {
            parent,
            position: parent.payload_offset(),
            count: 0,
            precache: true,
            memoize: true,
            done: !parent.is_master(),
            extent: None,
        }
    }

    ///
    /// A header-only cursor: children are never precached and the result is not recorded on the parent.
    ///
    pub(crate) fn scanning(parent: &'a Element<R>) -> Self {
        Children {
            precache: false,
            memoize: false,
            ..Children::new(parent)
        }
    }

    ///
    /// Source offset of the next child header.
    ///
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of children yielded so far.
    pub fn count_so_far(&self) -> usize {
        self.count
    }

    pub(crate) fn extent(&self) -> Option<Extent> {
        self.extent
    }

    fn end(&self) -> Option<u64> {
        let payload_offset = self.parent.payload_offset();
        match self.parent.declared_size() {
            EbmlSize::Known(size) => Some(payload_offset + size),
            EbmlSize::Unknown => self.parent.resolved_extent().map(|extent| payload_offset + extent.size),
        }
    }

    fn finish(&mut self, end: Option<u64>) {
        let payload_offset = self.parent.payload_offset();
        let extent = Extent {
            size: end.unwrap_or(self.position) - payload_offset,
            children: self.count,
        };
        self.done = true;
        self.extent = Some(extent);
        if self.memoize {
            self.parent.record_extent(extent);
        }
    }

    fn step(&mut self) -> Result<Option<Element<R>>, ElementError> {
        let end = self.end();
        if let Some(end) = end {
            if self.position >= end {
                self.finish(Some(end));
                return Ok(None);
            }
        }

        let header = {
            let mut source = self.parent.source().borrow_mut();
            read_header(&mut *source, self.position)?
        };
        let header = match header {
            Some(header) => header,
            None if end.is_some() => return Err(ElementError::Truncated { position: self.position }),
            None => {
                trace!(parent = self.parent.id(), position = self.position, "source ended inside unknown-size element");
                self.finish(None);
                return Ok(None);
            },
        };

        // checked on the raw id, before the header is validated as an element of its own
        if end.is_none() && !self.parent.is_valid_child(header.id) {
            trace!(parent = self.parent.id(), child = header.id, position = self.position, "unknown-size element ended by sibling");
            self.finish(None);
            return Ok(None);
        }

        let child = Element::from_header(self.parent.source(), self.parent.schema(), self.position, header)?;

        self.position = child.end()?;
        self.count += 1;
        if self.precache {
            child.precache()?;
        }
        Ok(Some(child))
    }
}

impl<'a, R: Read + Seek> Iterator for Children<'a, R> {
    type Item = Result<Element<R>, ElementError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.step() {
            Ok(Some(child)) => Some(Ok(child)),
            Ok(None) => None,
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}
