use bytes::Bytes;

/// Source of chunk storage, supplied once at parser construction.
///
/// The chain owns every chunk it allocates until reclamation hands it back
/// through [`reclaim`](ChunkAllocator::reclaim). `allocate` is permitted to
/// block until memory is available; the engine itself never blocks.
pub trait ChunkAllocator {
    /// Copy `data` into newly allocated chunk storage.
    fn allocate(&mut self, data: &[u8]) -> Bytes;

    /// Observe a fully consumed, unreferenced chunk being freed.
    fn reclaim(&mut self, chunk: Bytes) {
        drop(chunk);
    }
}

/// Default allocator: plain heap copies.
#[derive(Debug, Default)]
pub struct HeapAllocator;

impl ChunkAllocator for HeapAllocator {
    fn allocate(&mut self, data: &[u8]) -> Bytes {
        Bytes::copy_from_slice(data)
    }
}
