use std::fmt::{Debug, Error, Formatter};
use std::iter::{DoubleEndedIterator, Enumerate, Extend, FromIterator};
use std::ops::Sub;
use std::slice::Iter;

/// Elements which occupy some number of slots when stored in an [`OffsetVec`]
pub trait Width {
    fn width(&self) -> usize;
}

/// Vector whose elements are addressed by the sum of the widths of the elements before them
///
/// Several class file structures are indexed this way:
///
///   - the constant pool (`long` and `double` constants take two slots)
///   - local variables and the operand stack (`long` and `double` values take two slots)
///   - bytecode (instructions have varying sizes and jumps are byte offsets)
///
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,

    /// Offset of the first element (the constant pool starts at 1)
    initial_offset: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl Sub for Offset {
    type Output = isize;

    fn sub(self, other: Offset) -> isize {
        (self.0 as isize) - (other.0 as isize)
    }
}

impl<T: Sized + Width> OffsetVec<T> {
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty vector whose first element will be at `initial_offset`
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
            initial_offset,
        }
    }

    /// Number of entries (not the sum of their widths)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset at which the next pushed element would land
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += elem.width();
        self.entries.push((offset, elem));
        offset
    }

    /// Remove the last entry, returning its offset and index
    pub fn pop(&mut self) -> Option<(Offset, usize, T)> {
        self.entries.pop().map(|(off, elem)| {
            self.offset_len = off;
            (off, self.entries.len(), elem)
        })
    }

    /// Look at the last entry
    pub fn last(&self) -> Option<(Offset, &T)> {
        self.entries.last().map(|(off, elem)| (*off, elem))
    }

    /// Drop every entry starting at or after `offset`
    pub fn truncate_to(&mut self, offset: Offset) {
        while let Some((off, _)) = self.entries.last() {
            if *off < offset {
                break;
            }
            self.pop();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = self.initial_offset;
    }

    /// Find an entry (and its index) by offset
    pub fn get_offset(&self, offset: Offset) -> OffsetResult<T> {
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at) if insert_at == self.entries.len() => OffsetResult::TooLarge,
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at),
            Ok(found_idx) => OffsetResult::Ok(found_idx, &self.entries[found_idx].1),
        }
    }

    /// Replace the entry at `offset`, or push if `offset` is exactly the end of the vector
    ///
    /// The replacement must have the same width as the entry it replaces.
    pub fn set_offset(&mut self, offset: Offset, value: T) -> OffsetResult<'static, ()> {
        if offset == self.offset_len {
            self.push(value);
            return OffsetResult::Ok(self.len() - 1, &());
        }
        match self.entries.binary_search_by_key(&offset, |(off, _)| *off) {
            Err(insert_at) if insert_at == self.entries.len() => OffsetResult::TooLarge,
            Err(insert_at) => OffsetResult::InvalidOffset(insert_at),
            Ok(found_idx) => {
                let replacing = &mut self.entries[found_idx].1;
                if replacing.width() != value.width() {
                    OffsetResult::IncompatibleWidth(value.width(), replacing.width())
                } else {
                    *replacing = value;
                    OffsetResult::Ok(found_idx, &())
                }
            }
        }
    }

    /// Get an entry (and its offset) by its index
    pub fn get_index(&self, index: usize) -> Option<(Offset, &T)> {
        self.entries.get(index).map(|(offset, t)| (*offset, t))
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }

    /// Iterate over the elements only
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.entries.iter().map(|(_, elem)| elem)
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|(off, elem)| format!("#{} = {:?}", off.0, elem)),
            )
            .finish()
    }
}

pub enum OffsetResult<'a, T> {
    /// Element found at this index
    Ok(usize, &'a T),

    /// Offset falls in the middle of the element at this index
    InvalidOffset(usize),

    /// New element width, old element width (only when setting)
    IncompatibleWidth(usize, usize),

    /// Offset is past the end
    TooLarge,
}

impl<'a, T> OffsetResult<'a, T> {
    pub fn ok(&self) -> Option<&'a T> {
        match self {
            OffsetResult::Ok(_, found) => Some(found),
            _ => None,
        }
    }
}

/// Iterator for borrowed `OffsetVec`, yielding offset, index, and element
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> DoubleEndedIterator for OffsetVecIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        offset_vec.extend(elems);
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn constant_pool_style_offsets() {
        let mut pool: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        assert_eq!(pool.push(Slot::Narrow(1)), Offset(1));
        assert_eq!(pool.push(Slot::Wide(2)), Offset(2));
        assert_eq!(pool.push(Slot::Narrow(3)), Offset(4));
        assert_eq!(pool.offset_len(), Offset(5));
        assert_eq!(pool.len(), 3);

        assert_eq!(pool.get_offset(Offset(2)).ok(), Some(&Slot::Wide(2)));
        assert!(matches!(
            pool.get_offset(Offset(3)),
            OffsetResult::InvalidOffset(2)
        ));
        assert!(matches!(pool.get_offset(Offset(9)), OffsetResult::TooLarge));
    }

    #[test]
    fn set_requires_matching_width() {
        let mut locals: OffsetVec<Slot> = vec![Slot::Narrow(0), Slot::Wide(1)].into_iter().collect();

        assert!(matches!(
            locals.set_offset(Offset(0), Slot::Wide(9)),
            OffsetResult::IncompatibleWidth(2, 1)
        ));
        assert!(matches!(
            locals.set_offset(Offset(1), Slot::Wide(9)),
            OffsetResult::Ok(1, _)
        ));
        assert!(matches!(
            locals.set_offset(Offset(3), Slot::Narrow(4)),
            OffsetResult::Ok(2, _)
        ));
        assert_eq!(
            locals.values().copied().collect::<Vec<_>>(),
            vec![Slot::Narrow(0), Slot::Wide(9), Slot::Narrow(4)]
        );
    }

    #[test]
    fn truncate_drops_trailing_entries() {
        let mut stack: OffsetVec<Slot> = vec![Slot::Narrow(0), Slot::Wide(1), Slot::Narrow(3)]
            .into_iter()
            .collect();

        stack.truncate_to(Offset(1));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.offset_len(), Offset(1));
        assert_eq!(stack.pop(), Some((Offset(0), 0, Slot::Narrow(0))));
        assert_eq!(stack.pop(), None);
    }
}
