use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One of the four fixed growth stages a plant moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    V1,
    V2,
    V3,
    V4,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::V1, Stage::V2, Stage::V3, Stage::V4];

    /// Parses the lowercase path form (`v1`..`v4`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "v1" => Some(Stage::V1),
            "v2" => Some(Stage::V2),
            "v3" => Some(Stage::V3),
            "v4" => Some(Stage::V4),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Self> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::V1 => "v1",
            Stage::V2 => "v2",
            Stage::V3 => "v3",
            Stage::V4 => "v4",
        }
    }

    fn default_name(self) -> &'static str {
        match self {
            Stage::V1 => "Prepared Soil",
            Stage::V2 => "Sprouts",
            Stage::V3 => "Growing",
            Stage::V4 => "Ready to Harvest",
        }
    }

    fn default_description(self) -> &'static str {
        match self {
            Stage::V1 => "Ready for sowing",
            Stage::V2 => "Seeds germinated",
            Stage::V3 => "Medium growth phase",
            Stage::V4 => "Fully grown",
        }
    }
}

/// Upper-case label used in user-facing messages ("V3").
impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.index() + 1)
    }
}

/// Media slots attached to a growth stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "file" => Some(MediaKind::File),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::File => "File",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthStage {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub video: Option<String>,
    pub file: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl GrowthStage {
    pub fn blank(stage: Stage) -> Self {
        GrowthStage {
            name: stage.default_name().to_owned(),
            description: stage.default_description().to_owned(),
            image: None,
            video: None,
            file: None,
            date: None,
            notes: None,
        }
    }

    pub fn clear_media(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Image => self.image = None,
            MediaKind::Video => self.video = None,
            MediaKind::File => self.file = None,
        }
    }
}

/// The fixed `v1`..`v4` stage map carried by every plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versions {
    pub v1: GrowthStage,
    pub v2: GrowthStage,
    pub v3: GrowthStage,
    pub v4: GrowthStage,
}

impl Versions {
    /// Builds the stage map for a plant that starts at `start`: earlier stages are
    /// marked completed, the start stage carries `notes`, and every stage up to
    /// and including `start` is dated `now`.
    pub fn starting_at(start: Stage, notes: Option<String>, now: DateTime<Utc>) -> Self {
        let build = |stage: Stage| {
            let mut s = GrowthStage::blank(stage);
            if stage <= start {
                s.date = Some(now);
            }
            s.notes = match stage.cmp(&start) {
                std::cmp::Ordering::Less => Some("Completed".to_owned()),
                std::cmp::Ordering::Equal => notes.clone(),
                std::cmp::Ordering::Greater => None,
            };
            s
        };
        Versions {
            v1: build(Stage::V1),
            v2: build(Stage::V2),
            v3: build(Stage::V3),
            v4: build(Stage::V4),
        }
    }

    #[cfg(test)]
    pub fn get(&self, stage: Stage) -> &GrowthStage {
        match stage {
            Stage::V1 => &self.v1,
            Stage::V2 => &self.v2,
            Stage::V3 => &self.v3,
            Stage::V4 => &self.v4,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut GrowthStage {
        match stage {
            Stage::V1 => &mut self.v1,
            Stage::V2 => &mut self.v2,
            Stage::V3 => &mut self.v3,
            Stage::V4 => &mut self.v4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WateringFrequency {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "every-2-days")]
    EveryTwoDays,
    #[serde(rename = "every-3-days")]
    EveryThreeDays,
    #[default]
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    #[serde(rename = "monthly")]
    Monthly,
}

impl WateringFrequency {
    pub fn days(self) -> i64 {
        match self {
            WateringFrequency::Daily => 1,
            WateringFrequency::EveryTwoDays => 2,
            WateringFrequency::EveryThreeDays => 3,
            WateringFrequency::Weekly => 7,
            WateringFrequency::BiWeekly => 14,
            WateringFrequency::Monthly => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sunlight {
    FullSun,
    #[default]
    PartialSun,
    PartialShade,
    FullShade,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlantLocation {
    #[default]
    Indoor,
    Outdoor,
    Greenhouse,
    Balcony,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
    Critical,
}

/// plant details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub species: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub is_priority: bool,
    #[serde(default)]
    pub watering_frequency: WateringFrequency,
    #[serde(default)]
    pub sunlight: Sunlight,
    #[serde(default)]
    pub location: PlantLocation,
    #[serde(default)]
    pub health_status: HealthStatus,
    pub care_notes: Option<String>,
    pub photo: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub last_watered: Option<DateTime<Utc>>,
    pub next_watering: Option<DateTime<Utc>>,
    pub current_version: Stage,
    pub versions: Versions,
    pub planted_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plant {
    /// Sets `next_watering` from the last watering (or `now` when never watered).
    pub fn schedule_next_watering(&mut self, now: DateTime<Utc>) {
        let last = self.last_watered.unwrap_or(now);
        self.next_watering = Some(last + Duration::days(self.watering_frequency.days()));
    }

    pub fn needs_water(&self, now: DateTime<Utc>) -> bool {
        self.next_watering.is_some_and(|next| next <= now)
    }

    /// Case-insensitive substring match on name, species and description.
    pub fn search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        [Some(&self.name), self.species.as_ref(), self.description.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// New plant details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlant {
    #[serde(default)]
    pub name: String,
    pub species: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_priority: Option<bool>,
    pub watering_frequency: Option<WateringFrequency>,
    pub sunlight: Option<Sunlight>,
    pub location: Option<PlantLocation>,
    pub health_status: Option<HealthStatus>,
    pub care_notes: Option<String>,
    pub photo: Option<String>,
    pub tags: Option<Vec<String>>,
    pub current_version: Option<Stage>,
    pub version_notes: Option<String>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
}

impl NewPlant {
    /// Constructs new plant details from name.
    #[cfg(test)] // only needed in tests
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial plant update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantPatch {
    pub name: Option<String>,
    pub species: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_priority: Option<bool>,
    pub watering_frequency: Option<WateringFrequency>,
    pub sunlight: Option<Sunlight>,
    pub location: Option<PlantLocation>,
    pub health_status: Option<HealthStatus>,
    pub care_notes: Option<String>,
    pub photo: Option<String>,
    pub tags: Option<Vec<String>>,
    pub last_watered: Option<DateTime<Utc>>,
    pub current_version: Option<Stage>,
    pub planted_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub file: Option<String>,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvanceNotes {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GardenLocation {
    FrontYard,
    #[default]
    Backyard,
    Balcony,
    Indoor,
    Rooftop,
    Greenhouse,
    Community,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GardenSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GardenType {
    Flower,
    Vegetable,
    Herb,
    Succulent,
    Tropical,
    #[default]
    Mixed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Climate {
    Tropical,
    Subtropical,
    #[default]
    Temperate,
    Mediterranean,
    Arid,
    Continental,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilType {
    Clay,
    Sandy,
    #[default]
    Loamy,
    Peaty,
    Chalky,
    Silty,
}

/// A named grouping of plants, stored with plant ids only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Garden {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub location: GardenLocation,
    #[serde(default)]
    pub size: GardenSize,
    #[serde(default)]
    pub garden_type: GardenType,
    #[serde(default)]
    pub plants: Vec<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub climate: Climate,
    #[serde(default)]
    pub soil_type: SoilType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Garden {
    /// Adds the plant id unless it is already referenced.
    pub fn add_plant(&mut self, plant_id: &str) {
        if !self.plants.iter().any(|p| p == plant_id) {
            self.plants.push(plant_id.to_owned());
        }
    }

    pub fn remove_plant(&mut self, plant_id: &str) {
        self.plants.retain(|p| p != plant_id);
    }

    pub fn search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        [Some(&self.name), self.description.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Resolves plant ids against `plants`, dropping ids that no longer exist.
    pub fn populate(&self, plants: &[Plant]) -> PopulatedGarden {
        let resolved: Vec<Plant> = self
            .plants
            .iter()
            .filter_map(|id| plants.iter().find(|p| &p.id == id).cloned())
            .collect();
        PopulatedGarden {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            location: self.location,
            size: self.size,
            garden_type: self.garden_type,
            plant_count: resolved.len(),
            plants: resolved,
            notes: self.notes.clone(),
            is_active: self.is_active,
            climate: self.climate,
            soil_type: self.soil_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Garden as returned over the API, with plant records in place of ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedGarden {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub location: GardenLocation,
    pub size: GardenSize,
    pub garden_type: GardenType,
    pub plants: Vec<Plant>,
    pub plant_count: usize,
    pub notes: Option<String>,
    pub is_active: bool,
    pub climate: Climate,
    pub soil_type: SoilType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGarden {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub location: Option<GardenLocation>,
    pub size: Option<GardenSize>,
    pub garden_type: Option<GardenType>,
    pub plants: Option<Vec<String>>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
    pub climate: Option<Climate>,
    pub soil_type: Option<SoilType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GardenPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<GardenLocation>,
    pub size: Option<GardenSize>,
    pub garden_type: Option<GardenType>,
    pub plants: Option<Vec<String>>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
    pub climate: Option<Climate>,
    pub soil_type: Option<SoilType>,
}

/// Cosmetic bed layout shown on the front page, ordered by `position`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub size: Option<String>,
    pub crop_type: Option<String>,
    pub position: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLayout {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub size: Option<String>,
    pub crop_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub size: Option<String>,
    pub crop_type: Option<String>,
    pub position: Option<u32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_linear() {
        assert_eq!(Stage::V1.next(), Some(Stage::V2));
        assert_eq!(Stage::V3.next(), Some(Stage::V4));
        assert_eq!(Stage::V4.next(), None);
        assert_eq!(Stage::V2.to_string(), "V2");
        assert_eq!(Stage::parse("v5"), None);
    }

    #[test]
    fn versions_starting_at_v3_mark_earlier_stages_completed() {
        let now = Utc::now();
        let versions = Versions::starting_at(Stage::V3, Some("thinned".into()), now);

        assert_eq!(versions.v1.notes.as_deref(), Some("Completed"));
        assert_eq!(versions.v2.notes.as_deref(), Some("Completed"));
        assert_eq!(versions.v3.notes.as_deref(), Some("thinned"));
        assert_eq!(versions.v4.notes, None);
        assert!(versions.v3.date.is_some());
        assert!(versions.v4.date.is_none());
        assert_eq!(versions.v4.name, "Ready to Harvest");
    }

    #[test]
    fn watering_frequency_uses_kebab_names() {
        let freq: WateringFrequency = serde_json::from_str("\"every-2-days\"").unwrap();
        assert_eq!(freq, WateringFrequency::EveryTwoDays);
        assert_eq!(freq.days(), 2);
        assert_eq!(
            serde_json::to_string(&WateringFrequency::BiWeekly).unwrap(),
            "\"bi-weekly\""
        );
    }

    #[test]
    fn garden_add_plant_is_idempotent() {
        let now = Utc::now();
        let mut garden = Garden {
            id: "gardens_1_1".into(),
            name: "Herbs".into(),
            description: None,
            location: GardenLocation::default(),
            size: GardenSize::default(),
            garden_type: GardenType::Herb,
            plants: vec![],
            notes: None,
            is_active: true,
            climate: Climate::default(),
            soil_type: SoilType::default(),
            created_at: now,
            updated_at: now,
        };
        garden.add_plant("plants_1_1");
        garden.add_plant("plants_1_1");
        assert_eq!(garden.plants, vec!["plants_1_1".to_owned()]);

        garden.remove_plant("plants_1_1");
        assert!(garden.plants.is_empty());
    }
}
