#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core data types for the rental density engine.
//!
//! Zones are administrative polygons (censal sections, neighborhoods,
//! districts). Features are cadastral parcels or rental listings that get
//! assigned to zones. Metrics describe how features are weighted, and the
//! aggregate/result types carry the per-zone counts and ratios that the
//! engine appends to each zone.

pub mod crs;
pub mod ratio;

use std::fmt;

use geo::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use crs::{Crs, InvalidCrsError};
pub use ratio::Ratio;

/// Free-form attribute map carried by zones and features.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Output column holding the sum of all numerator metrics.
pub const N_ALL_COLUMN: &str = "n_all";

/// Output column holding the overall ratio.
pub const RATIO_COLUMN: &str = "ratio";

// ── Features ─────────────────────────────────────────────────────────────

/// What a feature collection represents. Fixes the spatial predicate used
/// to assign its features to zones.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    /// Cadastral parcel polygons. Matched with [`SpatialPredicate::Intersects`].
    Parcel,
    /// Rental listing points. Matched with [`SpatialPredicate::Within`].
    Listing,
}

impl FeatureKind {
    /// Returns the predicate used for this kind of feature.
    #[must_use]
    pub const fn predicate(self) -> SpatialPredicate {
        match self {
            Self::Parcel => SpatialPredicate::Intersects,
            Self::Listing => SpatialPredicate::Within,
        }
    }

    /// Geometry shape expected for features of this kind.
    #[must_use]
    pub const fn expected_shape(self) -> &'static str {
        match self {
            Self::Parcel => "polygon",
            Self::Listing => "point",
        }
    }
}

/// Relation tested between a feature and a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SpatialPredicate {
    /// Any shared point, boundary included.
    Intersects,
    /// The feature lies strictly inside the zone.
    Within,
}

/// Identity of a feature inside its collection.
///
/// Features without an upstream identifier are identified by their row
/// position in the source collection, so the two variants never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureId {
    /// Identifier read from the source data.
    Given(String),
    /// Row position in the source collection.
    Position(usize),
}

impl FeatureId {
    /// Uses `given` when present and non-empty, otherwise the row position.
    #[must_use]
    pub fn or_position(given: Option<String>, position: usize) -> Self {
        given
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map_or(Self::Position(position), Self::Given)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Given(id) => write!(f, "{id}"),
            Self::Position(pos) => write!(f, "#{pos}"),
        }
    }
}

/// Geometry of a single feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// A listing location.
    Point(Point<f64>),
    /// A parcel footprint.
    Area(MultiPolygon<f64>),
}

impl FeatureGeometry {
    /// Short shape name for diagnostics.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Point(_) => "point",
            Self::Area(_) => "polygon",
        }
    }

    /// Whether this geometry has the shape expected for `kind`.
    #[must_use]
    pub const fn fits(&self, kind: FeatureKind) -> bool {
        matches!(
            (self, kind),
            (Self::Point(_), FeatureKind::Listing) | (Self::Area(_), FeatureKind::Parcel)
        )
    }
}

/// A parcel or listing record.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identity used for deduplication.
    pub id: FeatureId,
    /// Geometry, if the source row had one.
    pub geometry: Option<FeatureGeometry>,
    /// Remaining source attributes (weight columns live here).
    pub attributes: Attributes,
}

/// A homogeneous set of features sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    kind: FeatureKind,
    crs: Crs,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new(kind: FeatureKind, crs: Crs) -> Self {
        Self {
            kind,
            crs,
            features: Vec::new(),
        }
    }

    /// Appends a feature.
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Appends a feature whose identifier is `given` or, when absent, the
    /// current row position.
    pub fn push_row(
        &mut self,
        given: Option<String>,
        geometry: Option<FeatureGeometry>,
        attributes: Attributes,
    ) {
        let id = FeatureId::or_position(given, self.features.len());
        self.features.push(Feature {
            id,
            geometry,
            attributes,
        });
    }

    /// Kind of every feature in this collection.
    #[must_use]
    pub const fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// CRS shared by every feature in this collection.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates features in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ── Zones ────────────────────────────────────────────────────────────────

/// Position of a zone in its collection. Stable for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub usize);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone {}", self.0)
    }
}

/// An administrative polygon against which features are aggregated.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    /// Zone-local index.
    pub id: ZoneId,
    /// Human-readable name, if known.
    pub name: Option<String>,
    /// Zone boundary.
    pub geometry: MultiPolygon<f64>,
    /// Source attributes, passed through to the output untouched.
    pub attributes: Attributes,
}

/// An ordered set of zones sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneCollection {
    crs: Crs,
    zones: Vec<Zone>,
}

impl ZoneCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new(crs: Crs) -> Self {
        Self {
            crs,
            zones: Vec::new(),
        }
    }

    /// Appends a zone, assigning it the next [`ZoneId`].
    pub fn push(
        &mut self,
        name: Option<String>,
        geometry: MultiPolygon<f64>,
        attributes: Attributes,
    ) -> ZoneId {
        let id = ZoneId(self.zones.len());
        self.zones.push(Zone {
            id,
            name,
            geometry,
            attributes,
        });
        id
    }

    /// CRS shared by every zone.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Looks up a zone by id.
    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.0)
    }

    /// Mutable access for enrichment steps run before the engine.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Zone> {
        self.zones.iter_mut()
    }

    /// Number of zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether the collection has no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Iterates zones in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }
}

impl<'a> IntoIterator for &'a ZoneCollection {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────

/// Where a feature's weight comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "column", rename_all = "snake_case")]
pub enum WeightSource {
    /// Every feature counts as one.
    Unweighted,
    /// Numeric attribute, leniently coerced.
    Column(String),
}

/// A named per-zone count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name (`parcels`, `flats`, `rooms`, ...).
    pub name: String,
    /// Weight of each matched feature.
    pub weight: WeightSource,
}

impl Metric {
    /// A metric counting each feature once.
    #[must_use]
    pub fn unweighted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: WeightSource::Unweighted,
        }
    }

    /// A metric summing a numeric attribute.
    #[must_use]
    pub fn weighted(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: WeightSource::Column(column.into()),
        }
    }

    /// Output count column, e.g. `n_flats`.
    #[must_use]
    pub fn count_column(&self) -> String {
        format!("n_{}", self.name)
    }

    /// Output ratio column, e.g. `ratio_flats`.
    #[must_use]
    pub fn ratio_column(&self) -> String {
        format!("ratio_{}", self.name)
    }
}

// ── Aggregates and results ───────────────────────────────────────────────

/// Count of one metric in one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCount {
    /// Metric the count belongs to.
    pub metric: Metric,
    /// Truncated weighted sum, `0` when nothing matched.
    pub count: u64,
}

/// The housing-stock value a zone's ratios are divided by.
#[derive(Debug, Clone, PartialEq)]
pub enum DenominatorValue {
    /// Aggregated from a feature metric (e.g. dwellings from parcels).
    Count(MetricCount),
    /// Read from a census attribute on the zone itself.
    Field {
        /// Attribute name.
        field: String,
        /// Coerced value, `None` when missing or not numeric.
        value: Option<f64>,
    },
}

impl DenominatorValue {
    /// Numeric value, `None` when undefined.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Count(count) => Some(count.count as f64),
            Self::Field { value, .. } => *value,
        }
    }

    /// Whether the zone has housing stock to divide by.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.value().is_some_and(|v| v > 0.0)
    }
}

/// Per-zone counts after merging every metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneAggregate {
    /// Zone the counts belong to.
    pub zone: ZoneId,
    /// Denominator for every ratio of this zone.
    pub denominator: DenominatorValue,
    /// Numerator counts in plan order.
    pub numerators: Vec<MetricCount>,
    /// Sum of all numerator counts.
    pub n_all: u64,
}

/// Ratios derived from a [`ZoneAggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRatios {
    /// One ratio per numerator metric, in plan order.
    pub per_metric: Vec<(Metric, Ratio)>,
    /// Overall ratio.
    pub all: Ratio,
}

impl ZoneRatios {
    /// Iterates every ratio, the overall one last.
    pub fn iter(&self) -> impl Iterator<Item = Ratio> + '_ {
        self.per_metric
            .iter()
            .map(|(_, r)| *r)
            .chain(std::iter::once(self.all))
    }
}

/// A zone with its counts, ratios, and geometry, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneResult {
    /// Zone-local index.
    pub zone: ZoneId,
    /// Zone name, if known.
    pub name: Option<String>,
    /// Zone boundary.
    pub geometry: MultiPolygon<f64>,
    /// Source attributes of the zone.
    pub attributes: Attributes,
    /// Merged counts.
    pub aggregate: ZoneAggregate,
    /// Derived ratios.
    pub ratios: ZoneRatios,
}

impl ZoneResult {
    /// Derived output columns in output order: `n_<denominator metric>`
    /// (metric denominators only), `n_<numerator>`..., `n_all`,
    /// `ratio_<numerator>`..., `ratio`.
    #[must_use]
    pub fn columns(&self) -> Vec<(String, serde_json::Value)> {
        let mut columns = Vec::new();

        if let DenominatorValue::Count(count) = &self.aggregate.denominator {
            columns.push((count.metric.count_column(), count.count.into()));
        }
        for count in &self.aggregate.numerators {
            columns.push((count.metric.count_column(), count.count.into()));
        }
        columns.push((N_ALL_COLUMN.to_string(), self.aggregate.n_all.into()));
        for (metric, ratio) in &self.ratios.per_metric {
            columns.push((metric.ratio_column(), ratio_json(*ratio)));
        }
        columns.push((RATIO_COLUMN.to_string(), ratio_json(self.ratios.all)));

        columns
    }

    /// Source attributes followed by the derived columns. Derived columns
    /// overwrite source attributes of the same name.
    #[must_use]
    pub fn properties(&self) -> Attributes {
        let mut properties = self.attributes.clone();
        for (key, value) in self.columns() {
            properties.insert(key, value);
        }
        properties
    }
}

fn ratio_json(ratio: Ratio) -> serde_json::Value {
    ratio
        .value()
        .map_or(serde_json::Value::Null, serde_json::Value::from)
}
