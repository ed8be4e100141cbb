use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Collection, Page, Store, StoreError, StoreResult};
use crate::models::{Garden, GardenLocation, GardenPatch, GardenType, NewGarden, PopulatedGarden};

/// Filters accepted by `GET /api/gardens`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GardenQuery {
    pub location: Option<GardenLocation>,
    pub garden_type: Option<GardenType>,
    pub is_active: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

impl GardenQuery {
    fn matches(&self, garden: &Garden) -> bool {
        self.location.is_none_or(|l| garden.location == l)
            && self.garden_type.is_none_or(|t| garden.garden_type == t)
            && self
                .is_active
                .as_deref()
                .is_none_or(|a| garden.is_active == (a == "true"))
            && self
                .search
                .as_deref()
                .filter(|s| !s.is_empty())
                .is_none_or(|s| garden.search(s))
    }

    fn sort(&self, gardens: &mut [Garden]) {
        let key = self.sort.as_deref().unwrap_or("-createdAt");
        let (descending, field) = match key.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, key),
        };
        gardens.sort_by(|a, b| {
            let ord = match field {
                "name" => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                "updatedAt" => a.updated_at.cmp(&b.updated_at),
                _ => a.created_at.cmp(&b.created_at),
            };
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
}

fn check_garden_text(
    name: Option<&str>,
    description: Option<&str>,
    notes: Option<&str>,
) -> StoreResult<()> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(StoreError::Validation("Garden name is required".to_owned()));
        }
        if name.trim().chars().count() > 100 {
            return Err(StoreError::Validation(
                "Garden name cannot exceed 100 characters".to_owned(),
            ));
        }
    }
    if description.is_some_and(|d| d.chars().count() > 1000) {
        return Err(StoreError::Validation(
            "Description cannot exceed 1000 characters".to_owned(),
        ));
    }
    if notes.is_some_and(|n| n.chars().count() > 2000) {
        return Err(StoreError::Validation(
            "Notes cannot exceed 2000 characters".to_owned(),
        ));
    }
    Ok(())
}

impl Store {
    fn garden_index(&self, id: &str) -> StoreResult<usize> {
        self.gardens
            .iter()
            .position(|g| g.id == id)
            .ok_or(StoreError::NotFound("Garden"))
    }

    pub fn find_garden(&self, id: &str) -> StoreResult<PopulatedGarden> {
        self.garden_index(id)
            .map(|i| self.gardens[i].populate(&self.plants))
    }

    pub fn list_gardens(&self, query: &GardenQuery) -> Page<PopulatedGarden> {
        let mut matched: Vec<Garden> = self
            .gardens
            .iter()
            .filter(|g| query.matches(g))
            .cloned()
            .collect();
        query.sort(&mut matched);
        let populated = matched.iter().map(|g| g.populate(&self.plants)).collect();
        Page::slice(populated, query.limit, query.page)
    }

    pub fn insert_garden(
        &mut self,
        new: NewGarden,
        now: DateTime<Utc>,
    ) -> StoreResult<PopulatedGarden> {
        check_garden_text(
            Some(&new.name),
            new.description.as_deref(),
            new.notes.as_deref(),
        )?;
        let mut garden = Garden {
            id: self.next_id(Collection::Gardens, now),
            name: new.name.trim().to_owned(),
            description: new.description,
            location: new.location.unwrap_or_default(),
            size: new.size.unwrap_or_default(),
            garden_type: new.garden_type.unwrap_or_default(),
            plants: Vec::new(),
            notes: new.notes,
            is_active: new.is_active.unwrap_or(true),
            climate: new.climate.unwrap_or_default(),
            soil_type: new.soil_type.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        for plant_id in new.plants.unwrap_or_default() {
            garden.add_plant(&plant_id);
        }
        let populated = garden.populate(&self.plants);
        self.gardens.push(garden);
        Ok(populated)
    }

    pub fn update_garden(
        &mut self,
        id: &str,
        patch: GardenPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<PopulatedGarden> {
        let index = self.garden_index(id)?;
        check_garden_text(
            patch.name.as_deref(),
            patch.description.as_deref(),
            patch.notes.as_deref(),
        )?;

        let garden = &mut self.gardens[index];
        if let Some(name) = patch.name {
            garden.name = name.trim().to_owned();
        }
        if let Some(description) = patch.description {
            garden.description = Some(description);
        }
        if let Some(location) = patch.location {
            garden.location = location;
        }
        if let Some(size) = patch.size {
            garden.size = size;
        }
        if let Some(garden_type) = patch.garden_type {
            garden.garden_type = garden_type;
        }
        if let Some(plants) = patch.plants {
            garden.plants.clear();
            for plant_id in plants {
                garden.add_plant(&plant_id);
            }
        }
        if let Some(notes) = patch.notes {
            garden.notes = Some(notes);
        }
        if let Some(is_active) = patch.is_active {
            garden.is_active = is_active;
        }
        if let Some(climate) = patch.climate {
            garden.climate = climate;
        }
        if let Some(soil_type) = patch.soil_type {
            garden.soil_type = soil_type;
        }
        garden.updated_at = now;
        Ok(self.gardens[index].populate(&self.plants))
    }

    pub fn add_plant_to_garden(
        &mut self,
        garden_id: &str,
        plant_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PopulatedGarden> {
        let index = self.garden_index(garden_id)?;
        self.find_plant(plant_id)?;
        let garden = &mut self.gardens[index];
        garden.add_plant(plant_id);
        garden.updated_at = now;
        Ok(self.gardens[index].populate(&self.plants))
    }

    pub fn remove_plant_from_garden(
        &mut self,
        garden_id: &str,
        plant_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PopulatedGarden> {
        let index = self.garden_index(garden_id)?;
        let garden = &mut self.gardens[index];
        garden.remove_plant(plant_id);
        garden.updated_at = now;
        Ok(self.gardens[index].populate(&self.plants))
    }

    pub fn delete_garden(&mut self, id: &str) -> StoreResult<PopulatedGarden> {
        let index = self.garden_index(id)?;
        let garden = self.gardens.remove(index);
        Ok(garden.populate(&self.plants))
    }
}
