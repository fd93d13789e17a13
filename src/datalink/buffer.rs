//! Fixed-block pool for transmit frames.
//!
//! Every block is allocated once when the pool is built. Blocks move out of the
//! pool while a frame is in flight and come back when it is acknowledged, so the
//! send path never touches the allocator.

use tracing::trace;

/// Pool of equally sized byte blocks.
#[derive(Debug)]
pub struct BufferPool {
    free: Vec<Box<[u8]>>,
    block_size: usize,
    blocks: usize,
}

impl BufferPool {
    /// Preallocate `blocks` blocks of `block_size` bytes.
    #[must_use]
    pub fn new(block_size: usize, blocks: usize) -> Self {
        let free = (0..blocks)
            .map(|_| vec![0u8; block_size].into_boxed_slice())
            .collect();
        Self {
            free,
            block_size,
            blocks,
        }
    }

    /// Take a block, or `None` when every block is leased.
    pub fn acquire(&mut self) -> Option<Buffer> {
        let data = self.free.pop()?;
        trace!(available = self.free.len(), "tx block acquired");
        Some(Buffer { data, len: 0 })
    }

    /// Return a block.
    ///
    /// Blocks of the wrong size or beyond the pool's capacity are dropped.
    pub fn release(&mut self, mut buffer: Buffer) {
        if buffer.data.len() != self.block_size || self.free.len() >= self.blocks {
            return;
        }
        buffer.data.fill(0);
        self.free.push(buffer.data);
    }

    /// Blocks currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Block size in bytes.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total number of blocks managed by the pool.
    #[must_use]
    pub const fn blocks(&self) -> usize {
        self.blocks
    }
}

/// A block leased from a [`BufferPool`].
#[derive(Debug)]
pub struct Buffer {
    data: Box<[u8]>,
    len: usize,
}

impl Buffer {
    /// Whole block for writing.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Filled portion of the block.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Length of the meaningful data.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no data has been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the length of the meaningful data, clamped to the block size.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// Block size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
