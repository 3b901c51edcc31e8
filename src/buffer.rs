/// A trait used to buffer data. Conceptually, a buffer starts empty,
/// has some data written to it. The buffer holds that data while it's
/// uncommitted, then something else commits that data e.g. by appending it
/// to a [ChunkBuffer] or writing it to the outside world. Once all data has
/// been committed, then the buffer is again empty.
///
/// See [FixedBuffer] for a minimal buffer implementation.
pub trait Buffer {
    /// Get the writable slice of the buffer.
    fn writable(&mut self) -> &mut [u8];

    /// Mark the first `len` bytes as having been written to the writable
    /// part of the buffer.
    ///
    /// ## Panics
    ///
    /// Implementations may panic if `len > self.writable().len()`.
    fn written(&mut self, len: usize);

    /// Get the uncommitted slice of the buffer. This is data that has
    /// been written to the buffer but not yet committed.
    fn uncommitted(&self) -> &[u8];

    /// Mark the first `len` bytes as having been committed to the uncommitted
    /// part of the buffer. Implementations may then free the committed space
    /// to allow for writing again.
    ///
    /// ## Panics
    ///
    /// Implementations may panic if `len > self.uncommitted().len()`.
    fn commit(&mut self, len: usize);

    /// Clear any uncommitted data in the buffer. This is conceptually
    /// equivalent to committing all the uncommitted data.
    fn clear(&mut self);
}

/// A [Buffer] that wraps some fixed-size array-like type, which uses two
/// indices to track the writable, uncommitted, and commmitted parts of the
/// buffer.
///
/// Sessions use one of these as the staging buffer handed to the native
/// codec on every step. The buffer will look like this internally:
///
/// ```plain
/// |--------------------- buffer ---------------------|
/// |-- (committed) --|-- uncommitted --|-- writable --|
///                 ^ head            ^ tail
/// ```
///
/// - When data is written to the buffer, `tail` is bumped forward
/// - When data is committed from the buffer, `head` is bumped forward
/// - Once all data is committed, then `head` and `tail` are reset
pub struct FixedBuffer<T> {
    buffer: T,
    head: usize,
    tail: usize,
}

impl<T> FixedBuffer<T> {
    pub fn new(buffer: T) -> Self {
        Self {
            buffer,
            head: 0,
            tail: 0,
        }
    }

    /// Wrap a buffer whose contents are all uncommitted, e.g. the output
    /// of a finished codec operation waiting to be written out.
    pub fn filled(buffer: T) -> Self
    where
        T: AsRef<[u8]>,
    {
        let tail = buffer.as_ref().len();
        Self {
            buffer,
            head: 0,
            tail,
        }
    }

    /// Total size of the underlying buffer.
    pub fn capacity(&self) -> usize
    where
        T: AsRef<[u8]>,
    {
        self.buffer.as_ref().len()
    }
}

impl<T> Buffer for FixedBuffer<T>
where
    T: AsRef<[u8]> + AsMut<[u8]>,
{
    fn writable(&mut self) -> &mut [u8] {
        let buffer = self.buffer.as_mut();
        &mut buffer[self.tail..]
    }

    fn written(&mut self, len: usize) {
        self.tail += len;
        assert!(self.tail <= self.buffer.as_ref().len());
    }

    fn uncommitted(&self) -> &[u8] {
        let buffer = self.buffer.as_ref();
        &buffer[self.head..self.tail]
    }

    fn commit(&mut self, len: usize) {
        self.head += len;
        assert!(self.head <= self.tail);

        if self.head == self.tail {
            self.head = 0;
            self.tail = 0;
        }
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

/// Growable accumulator for the output of one `feed` or `finish` call.
///
/// Codec steps append whatever landed in the staging buffer; the final
/// result is the in-order concatenation of every append.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    data: Vec<u8>,
}

impl ChunkBuffer {
    pub fn with_estimate(estimated_size: usize) -> Self {
        let mut buffer = Self::default();
        buffer.reserve(estimated_size);
        buffer
    }

    /// Pre-size the buffer for `estimated_size` more bytes.
    pub fn reserve(&mut self, estimated_size: usize) {
        self.data.reserve(estimated_size);
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Move all uncommitted data out of a staging buffer, leaving it empty.
    /// Returns the number of bytes moved.
    pub fn drain_from(&mut self, staging: &mut impl Buffer) -> usize {
        let uncommitted = staging.uncommitted();
        let len = uncommitted.len();
        self.append(uncommitted);
        staging.commit(len);
        len
    }

    pub fn finalize(self) -> Vec<u8> {
        self.data
    }
}

/// Call a function that uses a [`zstd::stream::raw::OutBuffer`] by wrapping
/// a [`Buffer`]. Returns a tuple containing the function's output and the
/// total uncommitted bytes written to the buffer during the function call.
pub fn with_zstd_out_buffer<R>(
    buffer: &mut impl Buffer,
    f: impl FnOnce(&mut zstd::stream::raw::OutBuffer<'_, [u8]>) -> R,
) -> (R, usize) {
    let mut out_buffer = zstd::stream::raw::OutBuffer::around(buffer.writable());
    let result = f(&mut out_buffer);
    let written = out_buffer.pos();
    buffer.written(written);
    (result, written)
}
