//! Worker directory: the studio roster and category-based eligibility.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::worker_repo::{self, WorkerRow};
use crate::db::Database;
use crate::error::WorkflowError;
use crate::stage::{StageCategory, BUILTIN_CATEGORIES};

/// A roster entry. Owned by the host application; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub is_active: bool,
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            role: row.role,
            phone: row.phone,
            is_active: row.is_active,
        }
    }
}

/// Source of the worker roster.
#[async_trait]
pub trait WorkerRoster: Send + Sync {
    /// Every worker of the company, inactive ones included.
    async fn list_workers(&self, company_id: &str) -> Result<Vec<Worker>, WorkflowError>;
}

/// [`WorkerRoster`] reading the `workers` table.
#[derive(Clone)]
pub struct SqliteWorkerRoster {
    db: Database,
}

impl SqliteWorkerRoster {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkerRoster for SqliteWorkerRoster {
    async fn list_workers(&self, company_id: &str) -> Result<Vec<Worker>, WorkflowError> {
        let rows = worker_repo::list_by_company(&self.db, company_id)?;
        Ok(rows.into_iter().map(Worker::from).collect())
    }
}

/// Category to eligible-role mapping.
///
/// Built-in categories carry fixed defaults which configuration may
/// replace per category. Custom categories have no mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMap {
    roles: HashMap<String, Vec<String>>,
}

impl RoleMap {
    pub fn with_overrides(overrides: &HashMap<String, Vec<String>>) -> Self {
        let mut map = Self::default();
        for (key, roles) in overrides {
            match StageCategory::parse(key) {
                Some(category) if !category.is_custom() => {
                    map.roles.insert(
                        category.key(),
                        roles.iter().map(|r| normalize_role(r)).collect(),
                    );
                }
                _ => log::warn!("Ignoring role override for unknown category '{}'", key),
            }
        }
        map
    }

    /// Roles eligible for a category, `None` when the category is unfiltered.
    pub fn roles_for(&self, category: &StageCategory) -> Option<&[String]> {
        if category.is_custom() {
            return None;
        }
        self.roles.get(&category.key()).map(Vec::as_slice)
    }

    fn allows(&self, category: &StageCategory, role: &str) -> bool {
        match self.roles_for(category) {
            Some(roles) => {
                let role = normalize_role(role);
                roles.iter().any(|r| *r == role)
            }
            None => true,
        }
    }
}

impl Default for RoleMap {
    fn default() -> Self {
        let roles = BUILTIN_CATEGORIES
            .iter()
            .map(|(key, _, roles)| {
                (
                    key.to_string(),
                    roles.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect();
        Self { roles }
    }
}

fn normalize_role(role: &str) -> String {
    role.trim().to_ascii_lowercase().replace([' ', '_'], "-")
}

/// Whether worker lists are narrowed to the stage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerFilter {
    #[default]
    ByCategory,
    ShowAll,
}

/// Resolves eligible workers and worker identities for stages.
#[derive(Clone)]
pub struct WorkerDirectory {
    roster: Arc<dyn WorkerRoster>,
    roles: RoleMap,
}

impl WorkerDirectory {
    pub fn new(roster: Arc<dyn WorkerRoster>, roles: RoleMap) -> Self {
        Self { roster, roles }
    }

    pub fn roles(&self) -> &RoleMap {
        &self.roles
    }

    pub async fn workers(&self, company_id: &str) -> Result<Vec<Worker>, WorkflowError> {
        self.roster.list_workers(company_id).await
    }

    /// Active workers that may take a stage of the given category.
    pub fn eligible_workers<'a>(
        &self,
        category: &StageCategory,
        all_workers: &'a [Worker],
        filter: WorkerFilter,
    ) -> Vec<&'a Worker> {
        all_workers
            .iter()
            .filter(|w| w.is_active)
            .filter(|w| filter == WorkerFilter::ShowAll || self.roles.allows(category, &w.role))
            .collect()
    }

    /// Fetches the company roster and narrows it to a category.
    pub async fn eligible_for(
        &self,
        company_id: &str,
        category: &StageCategory,
        filter: WorkerFilter,
    ) -> Result<Vec<Worker>, WorkflowError> {
        let all = self.workers(company_id).await?;
        Ok(self
            .eligible_workers(category, &all, filter)
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Display name of a worker, `None` when the id is not in the roster.
pub fn resolve_worker_name<'a>(worker_id: &str, all_workers: &'a [Worker]) -> Option<&'a str> {
    all_workers
        .iter()
        .find(|w| w.id == worker_id)
        .map(|w| w.name.as_str())
}
