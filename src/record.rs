use std::slice;

const DEFAULT_CAPACITY: usize = 16;

/// An accumulator for the fields of a single row.
///
/// A `RecordBuilder` is reused across rows: `clear` resets its length to
/// zero without releasing any storage, and `add` overwrites the slots left
/// behind by previous rows. When every slot is in use, the capacity doubles.
///
/// Fields are never removed individually. Use `snapshot` to get an
/// independent copy of the current row.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    /// Backing storage. Slots at or beyond `len` hold stale fields from a
    /// previous row and are never observable.
    fields: Vec<String>,
    /// The number of fields in the current row.
    len: usize,
    /// The logical capacity, doubled every time it is exhausted.
    capacity: usize,
}

impl Default for RecordBuilder {
    fn default() -> RecordBuilder {
        RecordBuilder::new()
    }
}

impl RecordBuilder {
    /// Create a new empty builder with the default capacity of 16 fields.
    pub fn new() -> RecordBuilder {
        RecordBuilder::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new empty builder with room for `capacity` fields.
    ///
    /// A capacity of zero selects the default capacity.
    pub fn with_capacity(capacity: usize) -> RecordBuilder {
        let capacity = if capacity > 0 { capacity } else { DEFAULT_CAPACITY };
        RecordBuilder { fields: Vec::with_capacity(capacity), len: 0, capacity }
    }

    /// Append a field to the current row.
    pub fn add(&mut self, field: String) -> &mut RecordBuilder {
        if self.len == self.capacity {
            self.capacity *= 2;
            self.fields.reserve_exact(self.capacity - self.fields.len());
        }
        if self.len < self.fields.len() {
            self.fields[self.len] = field;
        } else {
            self.fields.push(field);
        }
        self.len += 1;
        self
    }

    /// Reset the current row to zero fields, keeping all storage.
    pub fn clear(&mut self) -> &mut RecordBuilder {
        self.len = 0;
        self
    }

    /// Returns a copy of the current row sized exactly to its field count.
    pub fn snapshot(&self) -> Vec<String> {
        self.as_slice().to_vec()
    }

    /// Returns the fields of the current row.
    pub fn as_slice(&self) -> &[String] {
        &self.fields[..self.len]
    }

    /// Returns the field at index `i`, if it exists.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.as_slice().get(i).map(|f| &**f)
    }

    /// Returns an iterator over all fields in the current row.
    pub fn iter(&self) -> slice::Iter<'_, String> {
        self.as_slice().iter()
    }

    /// The number of fields in the current row.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if and only if the current row has no fields.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of fields this builder can hold before it grows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<'a> IntoIterator for &'a RecordBuilder {
    type IntoIter = slice::Iter<'a, String>;
    type Item = &'a String;

    fn into_iter(self) -> slice::Iter<'a, String> {
        self.iter()
    }
}
