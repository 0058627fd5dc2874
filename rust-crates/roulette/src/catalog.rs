use crate::{
    eligibility,
    geometry::Coordinates,
};
use anyhow::Context;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};
use std::{
    collections::HashMap,
    fmt,
    fs,
    path::Path,
};

mod iso;

pub use iso::alpha2_for;

/// Identifier used when a feature carries none of the identifier properties.
/// Several malformed features may collide on it.
pub const UNKNOWN_COUNTRY_ID: &str = "UNKNOWN";

const ID_PROPERTIES: [&str; 5] = ["ISO_A3", "iso_a3", "id", "NAME", "name"];
const NAME_PROPERTIES: [&str; 4] = ["NAME", "name", "ADMIN", "admin"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryId(String);

impl CountryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CountryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CountryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryId,
    pub name: String,
    pub iso_a3: Option<String>,
    pub iso_a2: Option<String>,
}

impl Country {
    /// Derives a country from the `properties` object of a GeoJSON feature.
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        let id = first_property(properties, &ID_PROPERTIES)
            .unwrap_or_else(|| UNKNOWN_COUNTRY_ID.to_string());
        let name =
            first_property(properties, &NAME_PROPERTIES).unwrap_or_else(|| id.clone());
        let iso_a3 = first_property(properties, &["ISO_A3", "iso_a3"]);
        let iso_a2 = first_property(properties, &["ISO_A2", "iso_a2"]).or_else(|| {
            iso_a3
                .as_deref()
                .and_then(alpha2_for)
                .map(str::to_string)
        });
        Self {
            id: CountryId::new(id),
            name,
            iso_a3,
            iso_a2,
        }
    }

    /// Flag emoji built from the regional indicator symbols of `iso_a2`.
    pub fn flag(&self) -> Option<String> {
        let code = self.iso_a2.as_deref()?;
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        code.bytes()
            .map(|b| char::from_u32(0x1F1E6 + u32::from(b.to_ascii_uppercase() - b'A')))
            .collect()
    }
}

// JSON strings count when non-empty, numbers are rendered; everything else is absent.
fn first_property(properties: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match properties.get(*key)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<FeatureGeometry>,
}

#[derive(Debug, Deserialize)]
struct FeatureGeometry {
    #[serde(default)]
    coordinates: Option<Coordinates>,
}

/// Every selectable country of a session, in feature order, with its outline.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    countries: Vec<Country>,
    coordinates: Vec<Option<Coordinates>>,
    index: HashMap<CountryId, usize>,
}

impl Catalog {
    pub fn new(entries: Vec<(Country, Option<Coordinates>)>) -> Self {
        let mut countries = Vec::with_capacity(entries.len());
        let mut coordinates = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for (position, (country, outline)) in entries.into_iter().enumerate() {
            index.entry(country.id.clone()).or_insert(position);
            countries.push(country);
            coordinates.push(outline);
        }
        Self {
            countries,
            coordinates,
            index,
        }
    }

    pub fn from_geojson_str(raw: &str) -> crate::Result<Self> {
        let collection: FeatureCollection =
            serde_json::from_str(raw).context("parse GeoJSON feature collection")?;
        let empty = Map::new();
        let entries = collection
            .features
            .into_iter()
            .map(|feature| {
                let country =
                    Country::from_properties(feature.properties.as_ref().unwrap_or(&empty));
                let outline = feature.geometry.and_then(|geometry| geometry.coordinates);
                (country, outline)
            })
            .collect();
        let catalog = Self::new(entries);
        tracing::debug!(countries = catalog.len(), "loaded country catalog");
        Ok(catalog)
    }

    pub fn from_geojson_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read GeoJSON from {}", path.display()))?;
        Self::from_geojson_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn ids(&self) -> Vec<CountryId> {
        self.countries.iter().map(|country| country.id.clone()).collect()
    }

    pub fn get(&self, id: &CountryId) -> Option<&Country> {
        self.index.get(id).map(|position| &self.countries[*position])
    }

    pub fn coordinates(&self, id: &CountryId) -> Option<&Coordinates> {
        self.index
            .get(id)
            .and_then(|position| self.coordinates[*position].as_ref())
    }

    /// Countries paired with their outlines, features without geometry skipped.
    pub fn outlines(&self) -> impl Iterator<Item = (&Country, &Coordinates)> {
        self.countries
            .iter()
            .zip(&self.coordinates)
            .filter_map(|(country, outline)| outline.as_ref().map(|o| (country, o)))
    }

    /// Resolves visit history to countries, skipping IDs the catalog doesn't know.
    pub fn resolve(&self, ids: &[CountryId]) -> Vec<&Country> {
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Countries not yet in `used`, in catalog order.
    pub fn eligible_countries(&self, used: &[CountryId]) -> Vec<Country> {
        eligibility::eligible(&self.ids(), used)
            .iter()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }

    /// True once a non-empty catalog has nothing left to offer.
    pub fn all_used(&self, used: &[CountryId]) -> bool {
        !self.is_empty() && self.eligible_countries(used).is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use serde_json::json;

    fn properties(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other:?}"),
        }
    }

    #[test]
    fn from_properties__prefers_upper_case_iso_a3() {
        // given
        let props = properties(json!({
            "ISO_A3": "FRA",
            "iso_a3": "fra",
            "id": "250",
            "NAME": "France",
        }));

        // when
        let country = Country::from_properties(&props);

        // then
        assert_eq!(country.id, CountryId::from("FRA"));
        assert_eq!(country.name, "France");
        assert_eq!(country.iso_a3.as_deref(), Some("FRA"));
        assert_eq!(country.iso_a2.as_deref(), Some("FR"));
    }

    #[test]
    fn from_properties__falls_back_through_id_and_name_fields() {
        // given
        let by_id = properties(json!({ "ISO_A3": "", "id": 840, "admin": "United States" }));
        let by_name = properties(json!({ "name": "Atlantis" }));

        // when
        let by_id = Country::from_properties(&by_id);
        let by_name = Country::from_properties(&by_name);

        // then
        assert_eq!(by_id.id, CountryId::from("840"));
        assert_eq!(by_id.name, "United States");
        assert_eq!(by_id.iso_a2, None);
        assert_eq!(by_name.id, CountryId::from("Atlantis"));
        assert_eq!(by_name.name, "Atlantis");
    }

    #[test]
    fn from_properties__uses_sentinel_when_nothing_identifies_the_feature() {
        let country = Country::from_properties(&Map::new());

        assert_eq!(country.id.as_str(), UNKNOWN_COUNTRY_ID);
        assert_eq!(country.name, UNKNOWN_COUNTRY_ID);
    }

    #[test]
    fn from_properties__explicit_iso_a2_wins_over_lookup() {
        let props = properties(json!({ "ISO_A3": "GBR", "ISO_A2": "UK", "NAME": "UK" }));

        let country = Country::from_properties(&props);

        assert_eq!(country.iso_a2.as_deref(), Some("UK"));
    }

    #[test]
    fn flag__renders_regional_indicators() {
        let country = Country {
            id: CountryId::from("JPN"),
            name: "Japan".to_string(),
            iso_a3: Some("JPN".to_string()),
            iso_a2: Some("jp".to_string()),
        };

        assert_eq!(country.flag().as_deref(), Some("\u{1F1EF}\u{1F1F5}"));
    }

    #[test]
    fn from_geojson_str__keeps_feature_order_and_outlines() {
        // given
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "ISO_A3": "ESP", "NAME": "Spain" },
                    "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [0, 2], [2, 2], [2, 0]]] }
                },
                {
                    "type": "Feature",
                    "properties": { "ISO_A3": "PRT", "NAME": "Portugal" },
                    "geometry": null
                },
                {
                    "type": "Feature",
                    "properties": null,
                    "geometry": { "type": "Point", "coordinates": [5, 6] }
                }
            ]
        })
        .to_string();

        // when
        let catalog = Catalog::from_geojson_str(&raw).unwrap();

        // then
        assert_eq!(
            catalog.ids(),
            vec![
                CountryId::from("ESP"),
                CountryId::from("PRT"),
                CountryId::from(UNKNOWN_COUNTRY_ID)
            ]
        );
        let centroid = catalog
            .coordinates(&CountryId::from("ESP"))
            .and_then(Coordinates::centroid)
            .unwrap();
        assert_eq!((centroid.lng, centroid.lat), (1.0, 1.0));
        assert!(catalog.coordinates(&CountryId::from("PRT")).is_none());
        assert_eq!(catalog.outlines().count(), 2);
    }

    #[test]
    fn resolve__skips_ids_missing_from_the_catalog() {
        // given
        let catalog = Catalog::new(vec![
            (
                Country::from_properties(&properties(json!({ "ISO_A3": "NOR", "NAME": "Norway" }))),
                None,
            ),
            (
                Country::from_properties(&properties(json!({ "ISO_A3": "SWE", "NAME": "Sweden" }))),
                None,
            ),
        ]);
        let used = vec![CountryId::from("SWE"), CountryId::from("XXX")];

        // when
        let resolved = catalog.resolve(&used);
        let eligible = catalog.eligible_countries(&used);

        // then
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Sweden");
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].name, "Norway");
        assert!(!catalog.all_used(&used));
        assert!(catalog.all_used(&catalog.ids()));
    }
}
