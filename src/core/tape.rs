//! Fixed-capacity tape and the execution cursor.

use super::error::{FatalError, FatalResult};

/// Default capacity of a tape in cells.
pub const DEFAULT_TAPE_CAPACITY: usize = 4096;

/// Largest capacity the native backends can bounds-check with a 32-bit
/// immediate.
pub const MAX_TAPE_CAPACITY: usize = i32::MAX as usize;

/// Owned, zero-initialised byte tape. It never grows; moving outside of
/// `[0, capacity)` is a [`FatalError::TapeOutOfBounds`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Box<[u8]>,
}

impl Tape {
    pub fn new(capacity: usize) -> FatalResult<Self> {
        if capacity == 0 || capacity > MAX_TAPE_CAPACITY {
            return Err(FatalError::InvalidTapeCapacity { capacity });
        }
        Ok(Self {
            cells: vec![0u8; capacity].into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Cell value at `index`. The cursor keeps `index` in range, so an
    /// out-of-range read is a capacity fault rather than a panic.
    pub fn get(&self, index: usize) -> FatalResult<u8> {
        self.cells
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_bounds(index as i64))
    }

    pub fn set(&mut self, index: usize, value: u8) -> FatalResult<()> {
        let capacity = self.capacity();
        match self.cells.get_mut(index) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(FatalError::TapeOutOfBounds {
                index: index as i64,
                capacity,
            }),
        }
    }

    /// Index reached by moving `delta` cells from `index`.
    pub fn offset(&self, index: usize, delta: i64) -> FatalResult<usize> {
        let target = (index as i64)
            .checked_add(delta)
            .ok_or_else(|| self.out_of_bounds(i64::MAX))?;
        if target < 0 || target as u64 >= self.capacity() as u64 {
            return Err(self.out_of_bounds(target));
        }
        Ok(target as usize)
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr()
    }

    fn out_of_bounds(&self, index: i64) -> FatalError {
        FatalError::TapeOutOfBounds {
            index,
            capacity: self.capacity(),
        }
    }
}

/// Instruction pointer and tape pointer of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub ip: usize,
    pub ptr: usize,
}
