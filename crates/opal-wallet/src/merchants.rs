//! The known-merchant directory.
//!
//! Offline payments can only target merchants the device already knows;
//! there is no way to look up an unknown payee without connectivity. The
//! directory is fixed at build time here — a production build would seed
//! it from the last online catalog sync.

/// Merchant id → display name, in catalog order.
const MERCHANTS: [(&str, &str); 5] = [
    ("MERCHANT001", "Chai Corner"),
    ("MERCHANT002", "Fresh Veggies Store"),
    ("MERCHANT003", "Quick Repairs"),
    ("MERCHANT004", "City Pharmacy"),
    ("MERCHANT005", "Street Bites"),
];

/// Lookup over the fixed merchant catalog.
pub struct MerchantDirectory;

impl MerchantDirectory {
    /// Display name for a merchant id, if known.
    pub fn name_of(merchant_id: &str) -> Option<&'static str> {
        MERCHANTS
            .iter()
            .find(|(id, _)| *id == merchant_id)
            .map(|(_, name)| *name)
    }

    pub fn is_valid(merchant_id: &str) -> bool {
        Self::name_of(merchant_id).is_some()
    }

    /// All known merchants as `(id, name)` pairs, in catalog order.
    pub fn all() -> &'static [(&'static str, &'static str)] {
        &MERCHANTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_merchants_resolve() {
        assert_eq!(MerchantDirectory::name_of("MERCHANT001"), Some("Chai Corner"));
        assert_eq!(MerchantDirectory::name_of("MERCHANT005"), Some("Street Bites"));
        assert!(MerchantDirectory::is_valid("MERCHANT003"));
    }

    #[test]
    fn unknown_merchant_is_rejected() {
        assert_eq!(MerchantDirectory::name_of("MERCHANT999"), None);
        assert!(!MerchantDirectory::is_valid(""));
    }

    #[test]
    fn catalog_has_five_entries() {
        assert_eq!(MerchantDirectory::all().len(), 5);
    }
}
