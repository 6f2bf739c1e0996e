//! Placement of the regions inside message RAM
//!
//! The [`Layout`] remembers, for every region, where it starts, how many
//! elements it holds and how many words each element spans. It is derived from
//! a [`Config`] when the configuration is applied and is the only source the
//! Tx and Rx paths use to locate elements.

use crate::config::{Config, IdFilter};
use crate::error::{Error, Result};
use crate::message::{
    EXTENDED_FILTER_WORDS, STANDARD_FILTER_WORDS, TX_EVENT_WORDS,
};
use vcell::VolatileCell;

/// An enabled region of message RAM
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    /// Offset of the first element, in words
    pub offset: u16,
    /// Number of elements
    pub len: u8,
    /// Size of one element, in words
    pub stride: u8,
}

impl Region {
    /// Describes `len` elements of `stride` words starting at `offset`
    pub const fn new(offset: u16, len: u8, stride: usize) -> Self {
        Self {
            offset,
            len,
            stride: stride as u8,
        }
    }

    /// Word offset just past the last element
    pub fn end(&self) -> usize {
        usize::from(self.offset) + usize::from(self.len) * usize::from(self.stride)
    }

    /// The words of element `index`
    pub(crate) fn element<'m>(
        &self,
        memory: &'m [VolatileCell<u32>],
        index: u8,
    ) -> Result<&'m [VolatileCell<u32>]> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange);
        }
        let start = usize::from(self.offset) + usize::from(index) * usize::from(self.stride);
        memory
            .get(start..start + usize::from(self.stride))
            .ok_or(Error::IndexOutOfRange)
    }
}

/// Region descriptors of one controller
///
/// A `None` region is disabled; every access to it fails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    /// Standard ID filter list
    pub standard_filters: Option<Region>,
    /// Extended ID filter list
    pub extended_filters: Option<Region>,
    /// Rx FIFO 0
    pub rx_fifo_0: Option<Region>,
    /// Rx FIFO 1
    pub rx_fifo_1: Option<Region>,
    /// Dedicated Rx buffers
    pub rx_buffer: Option<Region>,
    /// Dedicated Tx buffers followed by the Tx FIFO/queue
    pub tx_buffer: Option<Region>,
    /// Number of dedicated Tx buffers at the start of `tx_buffer`
    pub tx_dedicated: u8,
    /// Tx event FIFO
    pub tx_event_fifo: Option<Region>,
}

fn filter_region(filter: &IdFilter, stride: usize) -> Option<Region> {
    match filter {
        IdFilter::RejectAll => None,
        IdFilter::Filter { list, .. } => Some(Region::new(list.offset, list.len, stride)),
    }
}

impl Layout {
    /// Computes the descriptors of every region `config` enables
    pub fn from_config(config: &Config) -> Self {
        Self {
            standard_filters: filter_region(&config.standard_id_filter, STANDARD_FILTER_WORDS),
            extended_filters: filter_region(&config.extended_id_filter, EXTENDED_FILTER_WORDS),
            rx_fifo_0: config
                .rx_fifo_0
                .map(|c| Region::new(c.offset, c.len, c.element_size.element_words())),
            rx_fifo_1: config
                .rx_fifo_1
                .map(|c| Region::new(c.offset, c.len, c.element_size.element_words())),
            rx_buffer: config
                .rx_buffer
                .map(|c| Region::new(c.offset, c.len, c.element_size.element_words())),
            tx_buffer: config.tx_buffer.map(|c| {
                Region::new(
                    c.offset,
                    c.buffer_len + c.queue_len,
                    c.element_size.element_words(),
                )
            }),
            tx_dedicated: config.tx_buffer.map_or(0, |c| c.buffer_len),
            tx_event_fifo: config
                .tx_event_fifo
                .map(|c| Region::new(c.offset, c.len, TX_EVENT_WORDS)),
        }
    }

    fn regions(&self) -> [Option<Region>; 7] {
        [
            self.standard_filters,
            self.extended_filters,
            self.rx_fifo_0,
            self.rx_fifo_1,
            self.rx_buffer,
            self.tx_buffer,
            self.tx_event_fifo,
        ]
    }

    /// `true` if every enabled region ends within `memory_words`
    ///
    /// Overlaps between regions are not detected.
    pub fn fits(&self, memory_words: usize) -> bool {
        self.regions()
            .iter()
            .flatten()
            .all(|region| region.end() <= memory_words)
    }

    /// Number of queue elements following the dedicated Tx buffers
    pub fn tx_queue_len(&self) -> u8 {
        self.tx_buffer
            .map_or(0, |region| region.len - self.tx_dedicated)
    }
}
