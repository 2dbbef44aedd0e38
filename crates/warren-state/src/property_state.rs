//! Mutable property state.

use parking_lot::RwLock;
use warren_types::{PropertyId, PropertyType, Value};

use crate::ItemStatus;

/// The state of one property: type, multi-valued flag, modification count
/// and current values.
#[derive(Debug)]
pub struct PropertyState {
    id: PropertyId,
    data: RwLock<PropertyData>,
}

#[derive(Debug)]
struct PropertyData {
    property_type: PropertyType,
    multi_valued: bool,
    mod_count: u32,
    values: Vec<Value>,
    status: ItemStatus,
}

impl PropertyState {
    pub fn new(
        id: PropertyId,
        property_type: PropertyType,
        multi_valued: bool,
        status: ItemStatus,
    ) -> Self {
        Self {
            id,
            data: RwLock::new(PropertyData {
                property_type,
                multi_valued,
                mod_count: 0,
                values: Vec::new(),
                status,
            }),
        }
    }

    #[inline]
    pub fn property_id(&self) -> &PropertyId {
        &self.id
    }

    pub fn property_type(&self) -> PropertyType {
        self.data.read().property_type
    }

    pub fn is_multi_valued(&self) -> bool {
        self.data.read().multi_valued
    }

    pub fn mod_count(&self) -> u32 {
        self.data.read().mod_count
    }

    pub fn status(&self) -> ItemStatus {
        self.data.read().status
    }

    pub fn set_status(&self, status: ItemStatus) {
        self.data.write().status = status;
    }

    pub fn values(&self) -> Vec<Value> {
        self.data.read().values.clone()
    }

    /// Replace the values and bump the modification count.
    pub fn set_values(&self, values: Vec<Value>) {
        let mut data = self.data.write();
        data.values = values;
        data.mod_count = data.mod_count.wrapping_add(1);
        if data.status == ItemStatus::Existing {
            data.status = ItemStatus::Modified;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_types::{Name, NodeId, NS_DEFAULT_URI};

    #[test]
    fn set_values_bumps_mod_count() {
        let id = PropertyId::new(NodeId::new(0, 1), Name::new(NS_DEFAULT_URI, "title"));
        let state = PropertyState::new(id, PropertyType::String, false, ItemStatus::Existing);
        assert_eq!(state.mod_count(), 0);
        state.set_values(vec![Value::String("hello".to_owned())]);
        assert_eq!(state.mod_count(), 1);
        assert_eq!(state.status(), ItemStatus::Modified);
        assert_eq!(state.values().len(), 1);
    }
}
