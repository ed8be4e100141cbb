use chrono::{DateTime, Utc};

use super::{Collection, Store, StoreError, StoreResult};
use crate::models::{Layout, LayoutPatch, NewLayout};

impl Store {
    fn layout_index(&self, id: &str) -> StoreResult<usize> {
        self.layouts
            .iter()
            .position(|l| l.id == id)
            .ok_or(StoreError::NotFound("Layout"))
    }

    /// Active layouts in display order.
    pub fn active_layouts(&self) -> Vec<Layout> {
        let mut active: Vec<Layout> = self
            .layouts
            .iter()
            .filter(|l| l.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|l| l.position);
        active
    }

    pub fn find_layout(&self, id: &str) -> StoreResult<&Layout> {
        self.layout_index(id).map(|i| &self.layouts[i])
    }

    pub fn insert_layout(&mut self, new: NewLayout, now: DateTime<Utc>) -> StoreResult<Layout> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Validation("Layout name is required".to_owned()));
        }
        let layout = Layout {
            id: self.next_id(Collection::Layouts, now),
            name: new.name.trim().to_owned(),
            description: new.description,
            image: new.image,
            size: new.size,
            crop_type: new.crop_type,
            position: self.layouts.len() as u32 + 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.layouts.push(layout.clone());
        Ok(layout)
    }

    pub fn update_layout(
        &mut self,
        id: &str,
        patch: LayoutPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Layout> {
        let index = self.layout_index(id)?;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(StoreError::Validation("Layout name is required".to_owned()));
        }
        let layout = &mut self.layouts[index];
        if let Some(name) = patch.name {
            layout.name = name.trim().to_owned();
        }
        if let Some(description) = patch.description {
            layout.description = Some(description);
        }
        if let Some(image) = patch.image {
            layout.image = Some(image);
        }
        if let Some(size) = patch.size {
            layout.size = Some(size);
        }
        if let Some(crop_type) = patch.crop_type {
            layout.crop_type = Some(crop_type);
        }
        if let Some(position) = patch.position {
            layout.position = position;
        }
        if let Some(is_active) = patch.is_active {
            layout.is_active = is_active;
        }
        layout.updated_at = now;
        Ok(layout.clone())
    }

    pub fn delete_layout(&mut self, id: &str) -> StoreResult<Layout> {
        let index = self.layout_index(id)?;
        Ok(self.layouts.remove(index))
    }
}
