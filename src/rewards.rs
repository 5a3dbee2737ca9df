use serde::Serialize;

/// A redeemable entry in the village reward catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardItem {
    pub id: u32,
    pub name: &'static str,
    pub vendor_name: &'static str,
    pub cost_in_points: u32,
    pub glyph: &'static str,
    pub is_available: bool,
}

pub static CATALOG: &[RewardItem] = &[
    RewardItem {
        id: 1,
        name: "Es Teh Manis Jumbo",
        vendor_name: "Warung Bu Siti",
        cost_in_points: 50,
        glyph: "🥤",
        is_available: true,
    },
    RewardItem {
        id: 2,
        name: "Keripik Singkong Level 3",
        vendor_name: "Snack UMKM Jaya",
        cost_in_points: 100,
        glyph: "🥔",
        is_available: true,
    },
    RewardItem {
        id: 3,
        name: "Cilok Bumbu Kacang",
        vendor_name: "Gerobak Mang Asep",
        cost_in_points: 80,
        glyph: "🍡",
        is_available: true,
    },
    RewardItem {
        id: 4,
        name: "Voucher Diskon 50%",
        vendor_name: "Kantin Sehat",
        cost_in_points: 150,
        glyph: "🏷️",
        is_available: true,
    },
    RewardItem {
        id: 5,
        name: "Totebag Daur Ulang",
        vendor_name: "Eco Craft",
        cost_in_points: 250,
        glyph: "👜",
        is_available: true,
    },
];

pub fn catalog() -> &'static [RewardItem] {
    CATALOG
}

pub fn find(id: u32) -> Option<&'static RewardItem> {
    CATALOG.iter().find(|item| item.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique() {
        let ids: HashSet<u32> = catalog().iter().map(|item| item.id).collect();
        assert_eq!(ids.len(), catalog().len());
    }

    #[test]
    fn test_find_by_id() {
        assert_eq!(find(4).map(|item| item.cost_in_points), Some(150));
        assert!(find(99).is_none());
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(find(1).unwrap()).unwrap();
        assert_eq!(value["vendorName"], "Warung Bu Siti");
        assert_eq!(value["costInPoints"], 50);
        assert_eq!(value["isAvailable"], true);
    }
}
