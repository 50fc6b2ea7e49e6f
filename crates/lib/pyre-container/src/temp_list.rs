use std::cell::UnsafeCell;

use arrayvec::ArrayVec;

struct TempListInner<T> {
    array: ArrayVec<T, 8>,
    next: Option<TempList<T>>,
}

impl<T> Default for TempListInner<T> {
    fn default() -> Self {
        Self { array: ArrayVec::new(), next: None }
    }
}

/// Append-only, reference-stable scratch storage. Used by the synchronization
/// planner to stash resolved `vk_sync::AccessType` slices for the lifetime of
/// a single batch's barrier emission without a `Vec` reallocation ever
/// invalidating a reference handed to `pyre-rhi`'s barrier builders.
pub struct TempList<T> {
    inner: UnsafeCell<Box<TempListInner<T>>>,
}

impl<T> Default for TempList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TempList<T> {
    pub fn new() -> Self {
        Self { inner: Default::default() }
    }

    pub fn add(&self, value: T) -> &T {
        let chunk = unsafe { &mut *self.inner.get() };

        match chunk.array.try_push(value) {
            Err(err) => {
                let mut new_chunk = Box::new(TempListInner { array: ArrayVec::new(), next: None });
                new_chunk.array.push(err.element());

                std::mem::swap(&mut new_chunk, chunk);
                chunk.next = Some(TempList { inner: UnsafeCell::new(new_chunk) });

                &chunk.array[0]
            }
            Ok(()) => &chunk.array[chunk.array.len() - 1],
        }
    }
}
