use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Collection, Page, Store, StoreError, StoreResult};
use crate::models::{
    HealthStatus, MediaKind, NewPlant, Plant, PlantLocation, PlantPatch, Stage, StagePatch,
    Versions, WateringFrequency,
};

const NAME_MAX: usize = 100;
const SPECIES_MAX: usize = 150;
const DESCRIPTION_MAX: usize = 1000;
const CARE_NOTES_MAX: usize = 2000;

/// Filters accepted by `GET /api/plants`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantQuery {
    pub location: Option<PlantLocation>,
    pub health_status: Option<HealthStatus>,
    pub category: Option<String>,
    pub watering_frequency: Option<WateringFrequency>,
    pub is_priority: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

impl PlantQuery {
    fn matches(&self, plant: &Plant) -> bool {
        self.location.is_none_or(|l| plant.location == l)
            && self.health_status.is_none_or(|h| plant.health_status == h)
            && self.category.as_ref().is_none_or(|c| &plant.category == c)
            && self
                .watering_frequency
                .is_none_or(|w| plant.watering_frequency == w)
            && self.is_priority.is_none_or(|p| plant.is_priority == p)
            && self
                .search
                .as_deref()
                .filter(|s| !s.is_empty())
                .is_none_or(|s| plant.search(s))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> StoreResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(StoreError::Validation(format!(
            "{} cannot exceed {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

fn check_name(name: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("Plant name is required".to_owned()));
    }
    check_len("Plant name", Some(name.trim()), NAME_MAX)
}

fn check_text_fields(
    species: Option<&str>,
    description: Option<&str>,
    care_notes: Option<&str>,
) -> StoreResult<()> {
    check_len("Species name", species, SPECIES_MAX)?;
    check_len("Description", description, DESCRIPTION_MAX)?;
    check_len("Care notes", care_notes, CARE_NOTES_MAX)
}

impl Store {
    fn plant_index(&self, id: &str) -> StoreResult<usize> {
        self.plants
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound("Plant"))
    }

    pub fn find_plant(&self, id: &str) -> StoreResult<&Plant> {
        self.plant_index(id).map(|i| &self.plants[i])
    }

    /// Priority plants first, newest first within each group.
    pub fn list_plants(&self, query: &PlantQuery) -> Page<Plant> {
        let mut matched: Vec<Plant> = self
            .plants
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.is_priority
                .cmp(&a.is_priority)
                .then(b.created_at.cmp(&a.created_at))
        });
        Page::slice(matched, query.limit, query.page)
    }

    pub fn plants_at_stage(&self, stage: &str) -> Vec<Plant> {
        self.plants
            .iter()
            .filter(|p| p.current_version.as_str() == stage)
            .cloned()
            .collect()
    }

    pub fn plant_count(&self) -> usize {
        self.plants.len()
    }

    /// Plants whose next watering is due, most overdue first.
    pub fn plants_needing_water(&self, now: DateTime<Utc>) -> Vec<Plant> {
        let mut due: Vec<Plant> = self
            .plants
            .iter()
            .filter(|p| p.needs_water(now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.next_watering);
        due
    }

    pub fn insert_plant(&mut self, new: NewPlant, now: DateTime<Utc>) -> StoreResult<Plant> {
        check_name(&new.name)?;
        let species = trimmed(new.species);
        let description = trimmed(new.description);
        let care_notes = trimmed(new.care_notes);
        check_text_fields(species.as_deref(), description.as_deref(), care_notes.as_deref())?;

        let start = new.current_version.unwrap_or(Stage::V1);
        let plant = Plant {
            id: self.next_id(Collection::Plants, now),
            name: new.name.trim().to_owned(),
            species,
            description,
            category: trimmed(new.category).unwrap_or_else(|| "leafy-vegetable".to_owned()),
            is_priority: new.is_priority.unwrap_or(true),
            watering_frequency: new.watering_frequency.unwrap_or_default(),
            sunlight: new.sunlight.unwrap_or_default(),
            location: new.location.unwrap_or_default(),
            health_status: new.health_status.unwrap_or_default(),
            care_notes,
            photo: new.photo,
            tags: new
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .collect(),
            last_watered: None,
            next_watering: None,
            current_version: start,
            versions: Versions::starting_at(start, new.version_notes, now),
            planted_date: Some(now),
            expected_harvest_date: new.expected_harvest_date,
            created_at: now,
            updated_at: now,
        };
        self.plants.push(plant.clone());
        Ok(plant)
    }

    pub fn update_plant(
        &mut self,
        id: &str,
        patch: PlantPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Plant> {
        let index = self.plant_index(id)?;
        if let Some(name) = &patch.name {
            check_name(name)?;
        }
        check_text_fields(
            patch.species.as_deref(),
            patch.description.as_deref(),
            patch.care_notes.as_deref(),
        )?;

        let plant = &mut self.plants[index];
        let reschedule = patch.last_watered.is_some()
            || patch
                .watering_frequency
                .is_some_and(|w| w != plant.watering_frequency);

        if let Some(name) = patch.name {
            plant.name = name.trim().to_owned();
        }
        if let Some(species) = patch.species {
            plant.species = trimmed(Some(species));
        }
        if let Some(description) = patch.description {
            plant.description = trimmed(Some(description));
        }
        if let Some(category) = trimmed(patch.category) {
            plant.category = category;
        }
        if let Some(is_priority) = patch.is_priority {
            plant.is_priority = is_priority;
        }
        if let Some(freq) = patch.watering_frequency {
            plant.watering_frequency = freq;
        }
        if let Some(sunlight) = patch.sunlight {
            plant.sunlight = sunlight;
        }
        if let Some(location) = patch.location {
            plant.location = location;
        }
        if let Some(health) = patch.health_status {
            plant.health_status = health;
        }
        if let Some(care_notes) = patch.care_notes {
            plant.care_notes = trimmed(Some(care_notes));
        }
        if let Some(photo) = patch.photo {
            plant.photo = Some(photo);
        }
        if let Some(tags) = patch.tags {
            plant.tags = tags;
        }
        if let Some(last) = patch.last_watered {
            plant.last_watered = Some(last);
        }
        if let Some(stage) = patch.current_version {
            plant.current_version = stage;
        }
        if let Some(planted) = patch.planted_date {
            plant.planted_date = Some(planted);
        }
        if let Some(harvest) = patch.expected_harvest_date {
            plant.expected_harvest_date = Some(harvest);
        }
        if reschedule {
            plant.schedule_next_watering(now);
        }
        plant.updated_at = now;
        Ok(plant.clone())
    }

    /// Merges `patch` into one stage, dating it, and moves the plant forward
    /// when the stage is ahead of its current one.
    pub fn update_stage(
        &mut self,
        id: &str,
        stage: Stage,
        patch: StagePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Plant> {
        let index = self.plant_index(id)?;
        let plant = &mut self.plants[index];
        let slot = plant.versions.get_mut(stage);
        if let Some(name) = patch.name {
            slot.name = name;
        }
        if let Some(description) = patch.description {
            slot.description = description;
        }
        if let Some(image) = patch.image {
            slot.image = Some(image);
        }
        if let Some(video) = patch.video {
            slot.video = Some(video);
        }
        if let Some(file) = patch.file {
            slot.file = Some(file);
        }
        if let Some(notes) = patch.notes {
            slot.notes = Some(notes);
        }
        slot.date = Some(patch.date.unwrap_or(now));

        if stage > plant.current_version {
            plant.current_version = stage;
        }
        plant.updated_at = now;
        Ok(plant.clone())
    }

    pub fn advance_plant(
        &mut self,
        id: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Plant> {
        let index = self.plant_index(id)?;
        let plant = &mut self.plants[index];
        let next = plant.current_version.next().ok_or(StoreError::FullyGrown)?;

        plant.current_version = next;
        let slot = plant.versions.get_mut(next);
        slot.date = Some(now);
        slot.notes = Some(
            notes
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Advanced to {}", next)),
        );
        plant.updated_at = now;
        Ok(plant.clone())
    }

    pub fn clear_stage_media(
        &mut self,
        id: &str,
        stage: Stage,
        kind: MediaKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Plant> {
        let index = self.plant_index(id)?;
        let plant = &mut self.plants[index];
        plant.versions.get_mut(stage).clear_media(kind);
        plant.updated_at = now;
        Ok(plant.clone())
    }

    pub fn water_plant(&mut self, id: &str, now: DateTime<Utc>) -> StoreResult<Plant> {
        let index = self.plant_index(id)?;
        let plant = &mut self.plants[index];
        plant.last_watered = Some(now);
        plant.schedule_next_watering(now);
        plant.updated_at = now;
        Ok(plant.clone())
    }

    pub fn delete_plant(&mut self, id: &str) -> StoreResult<Plant> {
        let index = self.plant_index(id)?;
        Ok(self.plants.remove(index))
    }
}
