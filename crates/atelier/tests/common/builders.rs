//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use atelier::config::AtelierConfig;
use atelier::db::worker_repo::WorkerRow;
use atelier::SaleContext;

pub const COMPANY: &str = "co-1";
pub const BRANCH: &str = "br-1";

pub const DYER: &str = "w-dyer";
pub const TAILOR: &str = "w-tailor";
pub const CUTTER: &str = "w-cutter";
pub const EMBROIDERER: &str = "w-embroidery";
pub const HELPER: &str = "w-helper";
pub const RETIRED_TAILOR: &str = "w-retired";

/// Builder for roster rows.
pub struct WorkerBuilder {
    row: WorkerRow,
}

impl WorkerBuilder {
    pub fn new(id: &str, role: &str) -> Self {
        Self {
            row: WorkerRow {
                id: id.to_string(),
                company_id: COMPANY.to_string(),
                name: format!("Worker {}", id),
                role: role.to_string(),
                phone: None,
                is_active: true,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.row.name = name.to_string();
        self
    }

    pub fn phone(mut self, phone: &str) -> Self {
        self.row.phone = Some(phone.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.row.is_active = false;
        self
    }

    pub fn company(mut self, company_id: &str) -> Self {
        self.row.company_id = company_id.to_string();
        self
    }

    pub fn build(self) -> WorkerRow {
        self.row
    }
}

/// The roster most tests run against.
pub fn default_roster() -> Vec<WorkerRow> {
    vec![
        WorkerBuilder::new(DYER, "dyer").name("Asif").build(),
        WorkerBuilder::new(TAILOR, "tailor").name("Bilal").build(),
        WorkerBuilder::new(CUTTER, "cutter").name("Danish").build(),
        WorkerBuilder::new(EMBROIDERER, "embroidery").name("Farah").build(),
        WorkerBuilder::new(HELPER, "helper").name("Hina").build(),
        WorkerBuilder::new(RETIRED_TAILOR, "tailor")
            .name("Kamran")
            .inactive()
            .build(),
    ]
}

/// Builder for sale contexts.
pub struct SaleBuilder {
    sale: SaleContext,
}

impl SaleBuilder {
    pub fn new(sale_id: &str) -> Self {
        Self {
            sale: SaleContext::new(sale_id, COMPANY).with_branch(BRANCH),
        }
    }

    pub fn without_branch(mut self) -> Self {
        self.sale.branch_id = None;
        self
    }

    pub fn invoice(mut self, invoice_no: &str) -> Self {
        self.sale.invoice_no = Some(invoice_no.to_string());
        self
    }

    pub fn build(self) -> SaleContext {
        self.sale
    }
}

/// Builder for `AtelierConfig` instances.
pub struct ConfigBuilder {
    config: AtelierConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AtelierConfig::default(),
        }
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database_path = Some(path);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn number_prefix(mut self, prefix: &str) -> Self {
        self.config.production_number_prefix = prefix.to_string();
        self
    }

    pub fn roles(mut self, category: &str, roles: &[&str]) -> Self {
        self.config.roles.insert(
            category.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn build(self) -> AtelierConfig {
        self.config
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.config).expect("Failed to serialize config")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Role overrides as loaded from JSON.
pub fn roles(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|r| r.to_string()).collect()))
        .collect()
}
