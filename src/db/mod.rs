//! In-process document store with JSON snapshot persistence.
//!
//! `Store` holds the collections and exposes synchronous operations that take
//! `&mut self`; `Db` wraps it in an async lock and writes a snapshot to disk
//! after every successful mutation.

mod auth;
mod gardens;
mod layouts;
pub mod persistence;
mod plants;
mod seed;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{Garden, Layout, Plant, Session, User};

pub use gardens::GardenQuery;
pub use plants::PlantQuery;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("Plant is already at V4 (fully grown)")]
    FullyGrown,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy)]
pub enum Collection {
    Users,
    Layouts,
    Plants,
    Gardens,
}

/// Per-collection id counters, persisted alongside the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdCounters {
    pub users: u64,
    pub layouts: u64,
    pub plants: u64,
    pub gardens: u64,
}

impl Default for IdCounters {
    fn default() -> Self {
        // user_1 is the seeded admin
        IdCounters {
            users: 2,
            layouts: 1,
            plants: 1,
            gardens: 1,
        }
    }
}

/// A page of results plus the size of the full match set.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    fn slice(all: Vec<T>, limit: Option<usize>, page: Option<usize>) -> Self {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Page {
            items,
            total,
            page,
            pages: total.div_ceil(limit),
        }
    }
}

/// Admin login seeded into the user table.
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct Store {
    users: Vec<User>,
    layouts: Vec<Layout>,
    plants: Vec<Plant>,
    gardens: Vec<Garden>,
    id_counters: IdCounters,
    sessions: HashMap<String, Session>,
}

impl Store {
    /// Empty store containing only the admin user.
    pub fn new(admin: &AdminAccount, now: DateTime<Utc>) -> Self {
        Store {
            users: vec![User {
                id: "user_1".to_owned(),
                username: admin.username.clone(),
                password: admin.password.clone(),
                role: "admin".to_owned(),
                created_at: now,
            }],
            layouts: Vec::new(),
            plants: Vec::new(),
            gardens: Vec::new(),
            id_counters: IdCounters::default(),
            sessions: HashMap::new(),
        }
    }

    fn next_id(&mut self, collection: Collection, now: DateTime<Utc>) -> String {
        let (name, counter) = match collection {
            Collection::Users => ("users", &mut self.id_counters.users),
            Collection::Layouts => ("layouts", &mut self.id_counters.layouts),
            Collection::Plants => ("plants", &mut self.id_counters.plants),
            Collection::Gardens => ("gardens", &mut self.id_counters.gardens),
        };
        let id = format!("{}_{}_{}", name, now.timestamp_millis(), counter);
        *counter += 1;
        id
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn gardens(&self) -> &[Garden] {
        &self.gardens
    }

    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }

    fn snapshot(&self, now: DateTime<Utc>) -> persistence::Snapshot {
        persistence::Snapshot {
            plants: self.plants.clone(),
            gardens: self.gardens.clone(),
            layouts: self.layouts.clone(),
            id_counters: self.id_counters.clone(),
            saved_at: Some(now),
        }
    }

    fn restore(&mut self, snapshot: persistence::Snapshot) {
        self.plants = snapshot.plants;
        self.gardens = snapshot.gardens;
        self.layouts = snapshot.layouts;
        let defaults = IdCounters::default();
        // never hand out an id lower than a fresh store would
        self.id_counters = IdCounters {
            users: snapshot.id_counters.users.max(defaults.users),
            layouts: snapshot.id_counters.layouts.max(defaults.layouts),
            plants: snapshot.id_counters.plants.max(defaults.plants),
            gardens: snapshot.id_counters.gardens.max(defaults.gardens),
        };
    }
}

/// Shared handle to the store used by every route.
pub struct Db {
    store: RwLock<Store>,
    data_file: Option<PathBuf>,
}

impl Db {
    /// Opens the store described by `config`: restores the snapshot on disk when
    /// one exists, otherwise seeds the sample garden and saves it.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let admin = config.admin_account();
        let now = Utc::now();
        let mut store = Store::new(&admin, now);

        if config.no_persist {
            info!("persistence disabled; starting from sample data");
            seed::load_sample_data(&mut store, now);
            return Ok(Db::from_store(store, None));
        }

        let path = config.data_file.clone();
        match persistence::load(&path).await {
            Ok(Some(snapshot)) => {
                info!(
                    "loaded data from {} (saved at {})",
                    path.display(),
                    snapshot
                        .saved_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_owned())
                );
                store.restore(snapshot);
                info!(
                    plants = store.plants().len(),
                    gardens = store.gardens().len(),
                    layouts = store.layouts().len(),
                    "store ready"
                );
                Ok(Db::from_store(store, Some(path)))
            }
            Ok(None) => {
                seed::load_sample_data(&mut store, now);
                let db = Db::from_store(store, Some(path));
                db.persist(&*db.store.read().await).await;
                Ok(db)
            }
            Err(e) => {
                warn!("could not load {}: {:#}; starting from sample data", path.display(), e);
                seed::load_sample_data(&mut store, now);
                let db = Db::from_store(store, Some(path));
                db.persist(&*db.store.read().await).await;
                Ok(db)
            }
        }
    }

    /// Sample-data store that never touches disk.
    pub fn in_memory(admin: &AdminAccount) -> Self {
        let now = Utc::now();
        let mut store = Store::new(admin, now);
        seed::load_sample_data(&mut store, now);
        Db::from_store(store, None)
    }

    fn from_store(store: Store, data_file: Option<PathBuf>) -> Self {
        Db {
            store: RwLock::new(store),
            data_file,
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().await
    }

    /// Runs a mutation and persists the result. The write lock is held until the
    /// snapshot is on disk so snapshots land in mutation order.
    pub async fn write<T>(&self, op: impl FnOnce(&mut Store) -> StoreResult<T>) -> StoreResult<T> {
        let mut store = self.store.write().await;
        let out = op(&mut store)?;
        self.persist(&store).await;
        Ok(out)
    }

    /// Mutation on state that is never persisted (sessions).
    pub async fn write_volatile<T>(&self, op: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = self.store.write().await;
        op(&mut store)
    }

    async fn persist(&self, store: &Store) {
        let Some(path) = &self.data_file else {
            return;
        };
        if let Err(e) = persistence::save(path, &store.snapshot(Utc::now())).await {
            error!("error saving data to {}: {:#}", path.display(), e);
        }
    }
}

#[cfg(test)]
pub(crate) fn test_admin() -> AdminAccount {
    AdminAccount {
        username: "user".to_owned(),
        password: "admin764".to_owned(),
    }
}
