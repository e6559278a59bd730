//! Bitfield map over the bytes of an instruction stream.
//!
//! The decoder uses two of these: one marking the first byte of every decoded instruction, so
//! that jump targets can be validated against instruction boundaries, and one marking block
//! leaders.

/// Tracks one flag per byte of the code array.
pub struct VisitedMap {
    data: Vec<usize>,
    elements: usize,
}

const BITS: usize = usize::BITS as usize;

impl VisitedMap {
    /// Create a new instance of the `VisitedMap`
    ///
    /// ## Arguments
    /// * 'elements' - The amount of bytes to track
    #[must_use]
    pub fn new(elements: usize) -> VisitedMap {
        VisitedMap {
            data: vec![0_usize; elements.div_ceil(BITS)],
            elements,
        }
    }

    /// Returns the max amount of elements this instance can track
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements
    }

    /// Check if the visited map is empty (has no trackable elements)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements == 0
    }

    /// Check if a certain element / byte has been marked
    ///
    /// # Arguments
    /// * 'element' - The element or byte that should be looked up
    #[must_use]
    pub fn get(&self, element: usize) -> bool {
        if element >= self.elements {
            return false;
        }

        self.data
            .get(element / BITS)
            .is_some_and(|bitfield| (bitfield >> (element % BITS)) & 1 != 0)
    }

    /// Set a specific element / byte to either visited or un-visited
    ///
    /// Elements outside of the tracked range are ignored.
    ///
    /// # Arguments
    /// * 'element' - The element / byte which is going to be set
    /// * 'visited' - The state that should be applied to the specified element
    pub fn set(&mut self, element: usize, visited: bool) {
        if element >= self.elements {
            return;
        }

        if let Some(bitfield) = self.data.get_mut(element / BITS) {
            let mask = 1_usize << (element % BITS);
            if visited {
                *bitfield |= mask;
            } else {
                *bitfield &= !mask;
            }
        }
    }

    /// Iterates over all marked elements in ascending order
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.elements).filter(|element| self.get(*element))
    }

    /// Clears the whole structure back to not visited
    pub fn clear_all(&mut self) {
        self.data.iter_mut().for_each(|bitfield| *bitfield = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_small() {
        let elements = 4096;
        let map = VisitedMap::new(elements);

        assert_eq!(map.len(), elements);
        assert!(!map.get(0));
        assert!(!map.get(elements));
    }

    #[test]
    fn set_across_words() {
        let mut map = VisitedMap::new(200);
        map.set(0, true);
        map.set(63, true);
        map.set(64, true);
        map.set(199, true);
        map.set(200, true);

        assert_eq!(map.iter_set().collect::<Vec<_>>(), vec![0, 63, 64, 199]);

        map.set(63, false);
        assert!(!map.get(63));

        map.clear_all();
        assert_eq!(map.iter_set().count(), 0);
    }
}
