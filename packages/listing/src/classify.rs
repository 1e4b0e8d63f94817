//! Flat/room classification of listings.
//!
//! A listing renting out a whole dwelling (an "entire place" property
//! type) is a flat; anything else is a room. Matching is exact on the
//! trimmed property type, as published by the listing source.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Built-in list of whole-dwelling property types.
const ENTIRE_PLACE_TOML: &str = include_str!("../categories/entire_place.toml");

/// Rental category of a listing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListingCategory {
    /// The whole dwelling is rented.
    Flat,
    /// A room or shared space inside a dwelling.
    Room,
}

#[derive(Deserialize)]
struct EntirePlaceList {
    property_types: Vec<String>,
}

/// Classifies property types into [`ListingCategory`] values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTypeClassifier {
    entire_place: BTreeSet<String>,
}

impl PropertyTypeClassifier {
    /// Uses the given whole-dwelling property types.
    #[must_use]
    pub fn new<I, S>(entire_place: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entire_place: entire_place
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Uses the built-in whole-dwelling list.
    ///
    /// # Panics
    ///
    /// Panics if the embedded list fails to parse. It is a compile-time
    /// constant, so a failure is a development error caught by tests.
    #[must_use]
    pub fn builtin() -> Self {
        let list: EntirePlaceList = toml::de::from_str(ENTIRE_PLACE_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse built-in entire place list: {e}"));
        Self::new(list.property_types)
    }

    /// Classifies one property type.
    #[must_use]
    pub fn classify(&self, property_type: &str) -> ListingCategory {
        if self.entire_place.contains(property_type.trim()) {
            ListingCategory::Flat
        } else {
            ListingCategory::Room
        }
    }

    /// Number of whole-dwelling property types known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entire_place.len()
    }

    /// Whether no property type counts as a flat.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entire_place.is_empty()
    }
}

impl Default for PropertyTypeClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}
