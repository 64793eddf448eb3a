//! Bidirectional field mapping between canonical attributes and wire keys.
//!
//! Each gateway declares two independent tables because its request and response
//! vocabularies only partially overlap. A table's declaration order is the order
//! in which request fields are serialized.

use crate::payments::attributes::Field;

/// One direction of a gateway's vocabulary: an ordered list of `(wire key, field)`.
#[derive(Debug, Clone, Copy)]
pub struct WireTable {
    entries: &'static [(&'static str, Field)],
}

impl WireTable {
    pub const fn new(entries: &'static [(&'static str, Field)]) -> Self {
        Self { entries }
    }

    pub fn wire_key(&self, field: Field) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, f)| *f == field)
            .map(|(key, _)| *key)
    }

    pub fn field(&self, wire_key: &str) -> Option<Field> {
        self.entries
            .iter()
            .find(|(key, _)| *key == wire_key)
            .map(|(_, f)| *f)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, Field)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Request and response tables of one gateway. Immutable for the adapter's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub request: WireTable,
    pub response: WireTable,
}

impl FieldMap {
    pub const fn new(request: WireTable, response: WireTable) -> Self {
        Self { request, response }
    }

    /// Wire key used when sending `field`; `None` means the field is not serialized.
    pub fn to_wire(&self, field: Field) -> Option<&'static str> {
        self.request.wire_key(field)
    }

    /// Canonical field for a received wire key; `None` routes the pair to custom_info.
    pub fn to_canonical(&self, wire_key: &str) -> Option<Field> {
        self.response.field(wire_key)
    }
}
