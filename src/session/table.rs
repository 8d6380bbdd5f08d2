//! Fixed-capacity map from device index to open handle.

use crate::error::CameraError;
use crate::MAX_DEVICES;

/// A validated device index, `0 <= index < MAX_DEVICES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIndex(usize);

impl DeviceIndex {
    /// Validates a caller-supplied index.
    pub fn new(index: i32) -> Result<Self, CameraError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < MAX_DEVICES)
            .map(DeviceIndex)
            .ok_or_else(|| {
                CameraError::InvalidArgument(format!(
                    "device index {index} out of range (0-{})",
                    MAX_DEVICES - 1
                ))
            })
    }

    /// Slot position.
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }

    /// Index as passed to the driver.
    #[inline]
    pub fn native(self) -> u32 {
        self.0 as u32
    }

    /// Index as seen by callers.
    #[inline]
    pub fn public(self) -> i32 {
        self.0 as i32
    }
}

/// One slot per possible device; a slot is either empty or owns the only
/// handle for that device.
pub struct SessionTable<H> {
    slots: [Option<H>; MAX_DEVICES],
}

impl<H> SessionTable<H> {
    /// Creates a table with every slot empty.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Handle stored for `index`, if any.
    #[inline]
    pub fn get(&self, index: DeviceIndex) -> Option<&H> {
        self.slots[index.get()].as_ref()
    }

    /// Whether `index` holds a handle.
    #[inline]
    pub fn is_open(&self, index: DeviceIndex) -> bool {
        self.slots[index.get()].is_some()
    }

    /// Stores a handle, returning the one it replaced.
    pub fn insert(&mut self, index: DeviceIndex, handle: H) -> Option<H> {
        self.slots[index.get()].replace(handle)
    }

    /// Empties the slot, handing its handle back.
    pub fn take(&mut self, index: DeviceIndex) -> Option<H> {
        self.slots[index.get()].take()
    }

    /// Number of occupied slots.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Empties every slot, yielding `(index, handle)` pairs.
    pub fn drain(&mut self) -> impl Iterator<Item = (DeviceIndex, H)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.take().map(|h| (DeviceIndex(i), h)))
    }
}

impl<H> Default for SessionTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_bounds() {
        assert!(DeviceIndex::new(0).is_ok());
        assert_eq!(DeviceIndex::new(15).unwrap().get(), 15);
        assert!(matches!(
            DeviceIndex::new(16),
            Err(CameraError::InvalidArgument(_))
        ));
        assert!(matches!(
            DeviceIndex::new(-1),
            Err(CameraError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_table_starts_empty() {
        let table: SessionTable<u8> = SessionTable::new();
        assert_eq!(table.open_count(), 0);
        for i in 0..MAX_DEVICES as i32 {
            assert!(!table.is_open(DeviceIndex::new(i).unwrap()));
        }
    }

    #[test]
    fn test_insert_take() {
        let mut table = SessionTable::new();
        let index = DeviceIndex::new(3).unwrap();

        assert_eq!(table.insert(index, "h3"), None);
        assert_eq!(table.get(index), Some(&"h3"));
        assert_eq!(table.open_count(), 1);

        assert_eq!(table.take(index), Some("h3"));
        assert_eq!(table.take(index), None);
        assert!(!table.is_open(index));
    }

    #[test]
    fn test_drain_empties_all() {
        let mut table = SessionTable::new();
        table.insert(DeviceIndex::new(1).unwrap(), 10);
        table.insert(DeviceIndex::new(7).unwrap(), 70);

        let drained: Vec<_> = table.drain().map(|(i, h)| (i.get(), h)).collect();
        assert_eq!(drained, vec![(1, 10), (7, 70)]);
        assert_eq!(table.open_count(), 0);
    }
}
