// Aligned buffer & I/O (component A).
//
// AlignedBuffer owns a 64-byte-aligned allocation of `n + PAD` bytes, where
// `PAD >= 64` trailing bytes are zeroed. Any SIMD kernel may therefore read
// a full 64-byte block starting at any offset in [0, n] without bounds
// checks. Move-only: cloning would defeat the point of mapping once.

use std::alloc::{self, Layout};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::ptr::NonNull;

use crate::error::LoadError;

pub const ALIGNMENT: usize = 64;
pub const PAD: usize = 64;

/// Default stream-drain chunk size, overridable via `VROOM_CONNECTION_SIZE`.
pub const DEFAULT_CONNECTION_SIZE: usize = 128 * 1024;

pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    capacity: usize,
}

// SAFETY: AlignedBuffer owns its allocation exclusively and exposes it only
// through shared (&[u8]) or exclusively-owned access; the raw pointer never
// outlives the allocation.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    fn layout_for(capacity: usize) -> Layout {
        Layout::from_size_align(capacity, ALIGNMENT)
            .unwrap_or_else(|e| panic!("capacity {capacity} overflows alignment {ALIGNMENT}: {e}"))
    }

    /// Allocate a zeroed buffer with logical length `len` and `PAD` trailing
    /// zero bytes.
    fn with_len(len: usize) -> Self {
        let capacity = len + PAD;
        let layout = Self::layout_for(capacity);
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        AlignedBuffer { ptr, len, capacity }
    }

    /// Build a padded, aligned buffer from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buf = Self::with_len(data.len());
        buf.as_mut_slice().copy_from_slice(data);
        buf
    }

    /// Memory-map `path` and copy it into a padded, aligned allocation.
    /// Empty files produce a valid zero-length buffer.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        let file_len = metadata.len();

        if file_len == 0 {
            return Ok(Self::with_len(0));
        }

        if file_len > u32::MAX as u64 * 8 {
            return Err(LoadError::TooLarge(file_len));
        }

        // SAFETY: the file is not concurrently truncated by this process;
        // callers are expected not to mutate the underlying file while a
        // parse is in progress, matching the teacher's move-only buffer
        // ownership story.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self::from_bytes(&mmap))
    }

    /// Drain a stream into a spill file, honoring `VROOM_CONNECTION_SIZE`
    /// (bytes) for the read chunk size, then load it.
    pub fn from_stream<R: Read>(mut reader: R) -> Result<Self, LoadError> {
        let chunk_size = std::env::var("VROOM_CONNECTION_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CONNECTION_SIZE);

        let mut spill = tempfile::tempfile()?;
        let mut chunk = vec![0u8; chunk_size];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            std::io::Write::write_all(&mut spill, &chunk[..n])?;
            total += n as u64;
        }

        if total == 0 {
            return Ok(Self::with_len(0));
        }

        use std::io::Seek;
        spill.seek(std::io::SeekFrom::Start(0))?;
        // SAFETY: `spill` is a private tempfile not shared with another
        // writer for the remainder of this call.
        let mmap = unsafe { memmap2::Mmap::map(&spill)? };
        Ok(Self::from_bytes(&mmap))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `capacity` bytes, `len <= capacity`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Read exactly 64 bytes starting at `offset`, which may read into the
    /// zero padding region but never past `capacity`.
    #[inline]
    pub fn read_block(&self, offset: usize) -> [u8; 64] {
        debug_assert!(offset <= self.len);
        let mut block = [0u8; 64];
        let avail = (self.capacity - offset).min(64);
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), block.as_mut_ptr(), avail);
        }
        block
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        let layout = Self::layout_for(self.capacity);
        unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
    }
}

impl std::ops::Deref for AlignedBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_valid() {
        let buf = AlignedBuffer::from_bytes(b"");
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn padding_is_zeroed() {
        let buf = AlignedBuffer::from_bytes(b"hello");
        let block = buf.read_block(0);
        assert_eq!(&block[..5], b"hello");
        assert_eq!(block[5], 0);
        assert_eq!(block[63], 0);
    }

    #[test]
    fn read_block_at_end_never_overruns() {
        let buf = AlignedBuffer::from_bytes(b"abc");
        let block = buf.read_block(3);
        assert_eq!(block, [0u8; 64]);
    }

    #[test]
    fn alignment_is_64() {
        let buf = AlignedBuffer::from_bytes(b"hello world");
        assert_eq!((buf.ptr.as_ptr() as usize) % ALIGNMENT, 0);
    }

    #[test]
    fn load_round_trips_a_file() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"a,b,c\n1,2,3\n").unwrap();
        let buf = AlignedBuffer::load(f.path()).unwrap();
        assert_eq!(buf.as_slice(), b"a,b,c\n1,2,3\n");
    }

    #[test]
    fn from_stream_drains_a_reader() {
        let data = b"x,y\n1,2\n".to_vec();
        let buf = AlignedBuffer::from_stream(&data[..]).unwrap();
        assert_eq!(buf.as_slice(), &data[..]);
    }
}
