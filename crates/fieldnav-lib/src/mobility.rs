//! Unit mobility profiles and the catalog they are loaded from.
//!
//! A profile prices terrain traversal for one unit archetype (a tank, a
//! truck, a rifle squad). Profiles are registered once at load time, receive
//! a dense [`MobilityId`], and are shared read-only by every unit of that
//! archetype, on any thread.
//!
//! # Catalog format
//!
//! ```text
//! name,slope_sensitivity,directional_slope_sensitivity,plain,road,water,forest,bridge,building
//! tank,1.5,0.5,0.8,1.0,0,0.4,0.9,0
//! infantry,0.6,0.2,0.5,0.6,0.1,0.45,0.6,0
//! ```
//!
//! Header matching is case-insensitive and tolerates a few synonyms.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::terrain::TerrainClass;

/// Dense index of a registered profile. Arc time tables are indexed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MobilityId(pub usize);

impl MobilityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// How one unit archetype interacts with terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityProfile {
    pub id: MobilityId,
    pub name: String,
    /// Speed lost per unit of absolute grade.
    pub slope_sensitivity: f32,
    /// Additional speed lost per unit of uphill grade.
    pub directional_slope_sensitivity: f32,
    /// Speed factor per terrain class, indexed by [`TerrainClass::index`].
    pub terrain_factors: [f32; TerrainClass::COUNT],
}

impl MobilityProfile {
    /// Speed factor on `class` when climbing `grade` (rise over run, positive
    /// uphill) along the direction of travel. Zero means impassable.
    pub fn speed_factor(&self, class: TerrainClass, grade: f32) -> f32 {
        let base = self.terrain_factors[class.index()];
        if base <= 0.0 {
            return 0.0;
        }
        let penalty = self.slope_sensitivity * grade.abs()
            + self.directional_slope_sensitivity * grade.max(0.0);
        (base * (1.0 - penalty)).max(0.0)
    }

    /// Raw factor for a terrain class before slope penalties.
    pub fn terrain_factor(&self, class: TerrainClass) -> f32 {
        self.terrain_factors[class.index()]
    }

    /// Validate profile values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::MobilityValidation {
                message: "profile name must not be empty".to_string(),
            });
        }

        let sensitivities = [
            (self.slope_sensitivity, "slope_sensitivity"),
            (
                self.directional_slope_sensitivity,
                "directional_slope_sensitivity",
            ),
        ];
        for (value, field) in sensitivities {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::MobilityValidation {
                    message: format!("{field} of '{}' must be finite and >= 0", self.name),
                });
            }
        }

        for class in TerrainClass::ALL {
            let factor = self.terrain_factor(class);
            if !factor.is_finite() || factor < 0.0 {
                return Err(Error::MobilityValidation {
                    message: format!(
                        "{} factor of '{}' must be finite and >= 0",
                        class.as_str(),
                        self.name
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Registered mobility profiles, in id order.
#[derive(Debug, Clone, Default)]
pub struct MobilityRegistry {
    profiles: Vec<MobilityProfile>,
    by_name: HashMap<String, MobilityId>,
    source: Option<PathBuf>,
}

impl MobilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile; its id is assigned from registration order.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        slope_sensitivity: f32,
        directional_slope_sensitivity: f32,
        terrain_factors: [f32; TerrainClass::COUNT],
    ) -> Result<MobilityId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateMobility { name });
        }

        let id = MobilityId(self.profiles.len());
        let profile = MobilityProfile {
            id,
            name: name.clone(),
            slope_sensitivity,
            directional_slope_sensitivity,
            terrain_factors,
        };
        profile.validate()?;

        self.by_name.insert(name, id);
        self.profiles.push(profile);
        Ok(id)
    }

    /// Number of registered profiles; every arc stores this many times.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, id: MobilityId) -> Option<&MobilityProfile> {
        self.profiles.get(id.index())
    }

    pub fn profiles(&self) -> &[MobilityProfile] {
        &self.profiles
    }

    /// Path the registry was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Resolve a profile by name.
    pub fn resolve(&self, name: &str) -> Result<&MobilityProfile> {
        self.by_name
            .get(name)
            .and_then(|id| self.get(*id))
            .ok_or_else(|| Error::UnknownMobility {
                name: name.to_string(),
                known: self.profiles.iter().map(|p| p.name.clone()).collect(),
            })
    }

    /// Load a catalog from a CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let mut registry = Self::from_reader(file)?;
        registry.source = Some(path.to_path_buf());
        Ok(registry)
    }

    /// Load a catalog from a reader (e.g., file or in-memory buffer).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new().trim(Trim::Fields).from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|err| Error::MobilityValidation {
                message: format!("failed to read mobility catalog headers: {err}"),
            })?
            .clone();

        let normalize = |s: &str| {
            s.to_ascii_lowercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        };
        let normalized_headers: Vec<String> = headers.iter().map(&normalize).collect();

        let synonyms: &[(&str, &[&str])] = &[
            ("name", &["name", "unit", "archetype", "profile"]),
            ("slope_sensitivity", &["slope_sensitivity", "slope"]),
            (
                "directional_slope_sensitivity",
                &[
                    "directional_slope_sensitivity",
                    "directional_slope",
                    "uphill_sensitivity",
                ],
            ),
            ("plain", &["plain", "open"]),
            ("road", &["road"]),
            ("water", &["water"]),
            ("forest", &["forest", "woods"]),
            ("bridge", &["bridge"]),
            ("building", &["building", "urban"]),
        ];

        let mut index_map: BTreeMap<&str, usize> = BTreeMap::new();
        for (canon, alts) in synonyms {
            'outer: for alt in *alts {
                let alt_n = normalize(alt);
                for (i, h) in normalized_headers.iter().enumerate() {
                    if h == &alt_n {
                        index_map.insert(*canon, i);
                        break 'outer;
                    }
                }
            }
        }

        let missing: Vec<&str> = synonyms
            .iter()
            .map(|(canon, _)| *canon)
            .filter(|canon| !index_map.contains_key(canon))
            .collect();
        if !missing.is_empty() {
            return Err(Error::MobilityValidation {
                message: format!(
                    "mobility catalog missing required columns: {}. Available: {}",
                    missing.join(", "),
                    headers.iter().collect::<Vec<_>>().join(", ")
                ),
            });
        }

        let mut registry = MobilityRegistry::new();
        let mut row_num: usize = 1;
        for result in csv_reader.records() {
            row_num += 1;
            let record = result?;

            let get = |field: &str| -> Option<String> {
                index_map
                    .get(field)
                    .and_then(|&i| record.get(i))
                    .map(|s| s.trim().to_string())
            };
            let name = get("name").unwrap_or_default();
            let number = |field: &str| -> Result<f32> {
                get(field)
                    .ok_or_else(|| Error::MobilityValidation {
                        message: format!("missing {field} for '{name}' at row {row_num}"),
                    })?
                    .parse::<f32>()
                    .map_err(|e| Error::MobilityValidation {
                        message: format!("invalid {field} for '{name}' at row {row_num}: {e}"),
                    })
            };

            let mut factors = [0.0f32; TerrainClass::COUNT];
            for class in TerrainClass::ALL {
                factors[class.index()] = number(class.as_str())?;
            }
            let slope = number("slope_sensitivity")?;
            let directional = number("directional_slope_sensitivity")?;

            registry.register(name, slope, directional, factors)?;
        }

        if registry.is_empty() {
            return Err(Error::MobilityValidation {
                message: "mobility catalog contains no profiles".to_string(),
            });
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
Name, Slope, Directional_Slope, Plain, Road, Water, Forest, Bridge, Building
tank, 1.5, 0.5, 0.8, 1.0, 0, 0.4, 0.9, 0
infantry, 0.6, 0.2, 0.5, 0.6, 0.1, 0.45, 0.6, 0
";

    #[test]
    fn loads_catalog_with_synonym_headers() {
        let registry = MobilityRegistry::from_reader(CATALOG.as_bytes()).expect("catalog loads");
        assert_eq!(registry.len(), 2);

        let tank = registry.resolve("tank").expect("tank");
        assert_eq!(tank.id, MobilityId(0));
        assert_eq!(tank.terrain_factor(TerrainClass::Water), 0.0);

        let infantry = registry.resolve("infantry").expect("infantry");
        assert_eq!(infantry.id, MobilityId(1));
        assert!(infantry.terrain_factor(TerrainClass::Water) > 0.0);
    }

    #[test]
    fn rejects_missing_columns() {
        let error = MobilityRegistry::from_reader("name,plain\ntank,1\n".as_bytes())
            .expect_err("columns missing");
        assert!(error.to_string().contains("missing required columns"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = MobilityRegistry::new();
        registry
            .register("tank", 0.0, 0.0, [1.0; TerrainClass::COUNT])
            .expect("first");
        let error = registry
            .register("tank", 0.0, 0.0, [1.0; TerrainClass::COUNT])
            .expect_err("duplicate");
        assert!(matches!(error, Error::DuplicateMobility { .. }));
    }

    #[test]
    fn uphill_costs_more_than_downhill() {
        let mut registry = MobilityRegistry::new();
        let id = registry
            .register("truck", 1.0, 1.0, [1.0; TerrainClass::COUNT])
            .expect("register");
        let truck = registry.get(id).expect("profile");

        let up = truck.speed_factor(TerrainClass::Plain, 0.2);
        let down = truck.speed_factor(TerrainClass::Plain, -0.2);
        assert!(up < down);
        assert!((down - 0.8).abs() < 1e-6);
        assert_eq!(truck.speed_factor(TerrainClass::Plain, 5.0), 0.0);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = MobilityRegistry::from_reader(CATALOG.as_bytes()).expect("catalog loads");
        let error = registry.resolve("boat").expect_err("unknown");
        assert!(error.to_string().contains("'tank'"));
    }
}
