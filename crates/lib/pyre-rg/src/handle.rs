use crate::error::GraphError;

/// Index bits of a [`Handle`]; the remaining 8 bits hold the generation.
const INDEX_BITS: u32 = 24;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const MAX_INDEX: u32 = INDEX_MASK;

/// One of the four disjoint namespaces a [`Handle`] can be minted from.
/// Kept as a tag rather than four separate handle types so the Resource
/// Registry can store one flat `Vec<HandleSlot>` per space while still
/// rejecting a buffer handle presented where an image handle is expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleSpace {
    Buffer,
    Image,
    Blas,
    Tlas,
}

/// A 24-bit index paired with an 8-bit generation. Two handles compare equal
/// only if both the index and the generation match — a handle minted before
/// a transient slot was recycled will not match the slot's current occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub space: HandleSpace,
    pub index: u32,
    pub generation: u8,
}

impl Handle {
    pub(crate) fn new(space: HandleSpace, index: u32, generation: u8) -> Self {
        debug_assert!(index <= MAX_INDEX, "handle index exceeds the 24-bit index space");
        Self { space, index, generation }
    }
}

/// Tracks the next free index and generation counters for one handle space.
/// Recycled slots (from transient-resource generation bumps) are not
/// reused by this allocator directly — the Transient Allocator reuses slot
/// *storage*, but each new logical resource still gets a fresh index here;
/// generation bumps happen in-place on an existing index when a transient
/// slot's backing memory is reassigned across a recompile (see
/// [`crate::registry::ResourceRegistry::bump_generation`]).
#[derive(Default)]
pub(crate) struct HandleAllocator {
    next_index: u32,
}

impl HandleAllocator {
    pub fn allocate(&mut self, space: HandleSpace) -> Result<Handle, GraphError> {
        if self.next_index > MAX_INDEX {
            return Err(GraphError::ResourceExhausted { space });
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Handle::new(space, index, 0))
    }
}

impl std::fmt::Display for HandleSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandleSpace::Buffer => "buffer",
            HandleSpace::Image => "image",
            HandleSpace::Blas => "blas",
            HandleSpace::Tlas => "tlas",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_from_different_spaces_never_compare_equal_even_with_same_index() {
        let a = Handle::new(HandleSpace::Buffer, 3, 0);
        let b = Handle::new(HandleSpace::Image, 3, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn allocator_hands_out_monotonic_indices() {
        let mut alloc = HandleAllocator::default();
        let h0 = alloc.allocate(HandleSpace::Buffer).unwrap();
        let h1 = alloc.allocate(HandleSpace::Buffer).unwrap();
        assert_eq!(h0.index, 0);
        assert_eq!(h1.index, 1);
    }
}
