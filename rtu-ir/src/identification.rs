//! The Modbus MEI (Encapsulated Interface) device identification object
//! table: object codes, their classification category, and the derived
//! conformity level used by the synthetic "Read Device Identification"
//! reply builder.

use std::collections::BTreeMap;

/// One of the sixteen recognized MEI object codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentObject {
    /// Object code `0x00`.
    VendorName,
    /// Object code `0x01`. The only object required to activate
    /// identification at all.
    ProductCode,
    /// Object code `0x02`.
    MajorMinorRevision,
    /// Object code `0x03`.
    VendorUrl,
    /// Object code `0x04`.
    ProductName,
    /// Object code `0x05`.
    ModelName,
    /// Object code `0x06`.
    UserApplicationName,
    /// Vendor-private object, codes `0x80`..=`0x87`. The index (0..=7)
    /// is carried so each of the eight slots is distinct.
    Private(u8),
}

impl IdentObject {
    /// The raw MEI object code byte.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            IdentObject::VendorName => 0x00,
            IdentObject::ProductCode => 0x01,
            IdentObject::MajorMinorRevision => 0x02,
            IdentObject::VendorUrl => 0x03,
            IdentObject::ProductName => 0x04,
            IdentObject::ModelName => 0x05,
            IdentObject::UserApplicationName => 0x06,
            IdentObject::Private(slot) => 0x80 + slot,
        }
    }

    /// Parses a raw MEI object code into its symbolic form, for
    /// validating an `identification` table key.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => IdentObject::VendorName,
            0x01 => IdentObject::ProductCode,
            0x02 => IdentObject::MajorMinorRevision,
            0x03 => IdentObject::VendorUrl,
            0x04 => IdentObject::ProductName,
            0x05 => IdentObject::ModelName,
            0x06 => IdentObject::UserApplicationName,
            0x80..=0x87 => IdentObject::Private(code - 0x80),
            _ => return None,
        })
    }

    /// The conformity category this object belongs to.
    #[must_use]
    pub fn category(self) -> Conformity {
        match self {
            IdentObject::VendorName | IdentObject::ProductCode | IdentObject::MajorMinorRevision => {
                Conformity::Basic
            }
            IdentObject::VendorUrl
            | IdentObject::ProductName
            | IdentObject::ModelName
            | IdentObject::UserApplicationName => Conformity::Regular,
            IdentObject::Private(_) => Conformity::Extended,
        }
    }
}

/// A device identification conformity tier. Ordered so that
/// `Conformity::Basic < Conformity::Regular < Conformity::Extended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Conformity {
    /// No identification objects declared; MEI is inactive.
    None,
    /// Category 1 — vendor name, product code, revision.
    Basic,
    /// Category 2 — basic plus URL/product/model/application name.
    Regular,
    /// Category 3 — regular plus the eight private slots.
    Extended,
}

impl Conformity {
    /// The numeric MEI classification code (`0`, `1`, `2`, `3`) packed
    /// into the reply.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Conformity::None => 0,
            Conformity::Basic => 1,
            Conformity::Regular => 2,
            Conformity::Extended => 3,
        }
    }
}

/// The declared identification strings, keyed by MEI object code.
///
/// Construction order is preserved in a `BTreeMap` keyed by
/// [`IdentObject`]'s derived `Ord` (which follows declaration order in
/// this enum, i.e. basic objects before regular before private slots) —
/// this is the order the reply-packing loop walks in the original tool,
/// and the order this implementation packs objects within a category.
#[derive(Debug, Clone, Default)]
pub struct IdentificationTable {
    objects: BTreeMap<IdentObject, String>,
}

impl IdentificationTable {
    /// An empty table — identification inactive.
    #[must_use]
    pub fn new() -> Self {
        IdentificationTable::default()
    }

    /// Declares `object`'s string payload.
    #[must_use]
    pub fn with(mut self, object: IdentObject, value: impl Into<String>) -> Self {
        self.objects.insert(object, value.into());
        self
    }

    /// The declared value for `object`, if any.
    #[must_use]
    pub fn get(&self, object: IdentObject) -> Option<&str> {
        self.objects.get(&object).map(String::as_str)
    }

    /// Whether any object at all is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All declared objects in a category, in `IdentObject` order.
    pub fn in_category(&self, category: Conformity) -> impl Iterator<Item = (IdentObject, &str)> {
        self.objects
            .iter()
            .filter(move |(obj, _)| obj.category() == category)
            .map(|(obj, value)| (*obj, value.as_str()))
    }

    /// The conformity level: the maximum category among declared
    /// objects, or [`Conformity::None`] if the table is empty.
    #[must_use]
    pub fn conformity_level(&self) -> Conformity {
        self.objects
            .keys()
            .map(|obj| obj.category())
            .max()
            .unwrap_or(Conformity::None)
    }

    /// The function-17 "Report Slave ID" identifier string: the product
    /// code, optionally suffixed with `_<model_name>`.
    ///
    /// `None` if `PRODUCT_CODE` was never declared — identification is
    /// inactive.
    #[must_use]
    pub fn slave_id_identifier(&self) -> Option<String> {
        let product_code = self.get(IdentObject::ProductCode)?;
        let mut id = product_code.to_string();
        if let Some(model_name) = self.get(IdentObject::ModelName) {
            id.push('_');
            id.push_str(model_name);
        }
        Some(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for obj in [
            IdentObject::VendorName,
            IdentObject::ProductCode,
            IdentObject::MajorMinorRevision,
            IdentObject::VendorUrl,
            IdentObject::ProductName,
            IdentObject::ModelName,
            IdentObject::UserApplicationName,
            IdentObject::Private(0),
            IdentObject::Private(7),
        ] {
            assert_eq!(IdentObject::from_code(obj.code()), Some(obj));
        }
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(IdentObject::from_code(0x07), None);
        assert_eq!(IdentObject::from_code(0x90), None);
    }

    #[test]
    fn empty_table_has_no_conformity() {
        assert_eq!(IdentificationTable::new().conformity_level(), Conformity::None);
    }

    #[test]
    fn conformity_is_max_declared_category() {
        let table = IdentificationTable::new()
            .with(IdentObject::ProductCode, "PC")
            .with(IdentObject::ModelName, "MX");
        assert_eq!(table.conformity_level(), Conformity::Regular);
    }

    #[test]
    fn slave_id_identifier_combines_product_and_model() {
        let table = IdentificationTable::new()
            .with(IdentObject::ProductCode, "PC")
            .with(IdentObject::ModelName, "MX");
        assert_eq!(table.slave_id_identifier().as_deref(), Some("PC_MX"));
    }

    #[test]
    fn slave_id_identifier_needs_product_code() {
        let table = IdentificationTable::new().with(IdentObject::ModelName, "MX");
        assert_eq!(table.slave_id_identifier(), None);
    }
}
