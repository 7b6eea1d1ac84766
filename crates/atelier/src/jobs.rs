//! Production jobs: one per sale, created on first use.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::audit::{AuditAction, ProductionLog};
use crate::db::job_repo::{self, JobRow};
use crate::db::values::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::db::Database;
use crate::error::WorkflowError;
use crate::sale::{SaleContext, SaleGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Open,
    /// Terminal: the sale has been finalized.
    Finalized,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Open => "open",
            JobState::Finalized => "finalized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(JobState::Open),
            "finalized" | "completed" => Some(JobState::Finalized),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionJob {
    pub id: String,
    pub sale_id: String,
    pub company_id: String,
    pub branch_id: String,
    pub production_no: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ProductionJob {
    pub fn is_finalized(&self) -> bool {
        self.state == JobState::Finalized
    }
}

impl From<JobRow> for ProductionJob {
    fn from(row: JobRow) -> Self {
        let state = JobState::parse(&row.status).unwrap_or_else(|| {
            log::warn!(
                "Unknown status '{}' on production job {}, treating as open",
                row.status,
                row.id
            );
            JobState::Open
        });
        Self {
            state,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            finalized_at: parse_optional_timestamp(row.finalized_at.as_deref()),
            id: row.id,
            sale_id: row.sale_id,
            company_id: row.company_id,
            branch_id: row.branch_id,
            production_no: row.production_no,
        }
    }
}

/// Production number: prefix plus invoice number, or the first eight
/// characters of the sale id when the sale has no invoice yet.
pub fn production_number(prefix: &str, sale: &SaleContext) -> String {
    match sale.invoice_no.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(invoice) => format!("{}{}", prefix, invoice),
        None => format!("{}{}", prefix, sale.sale_id.chars().take(8).collect::<String>()),
    }
}

#[derive(Clone)]
pub struct JobService {
    db: Database,
    gateway: Arc<dyn SaleGateway>,
    audit: ProductionLog,
    number_prefix: String,
}

impl JobService {
    pub fn new(
        db: Database,
        gateway: Arc<dyn SaleGateway>,
        audit: ProductionLog,
        number_prefix: &str,
    ) -> Self {
        Self {
            db,
            gateway,
            audit,
            number_prefix: number_prefix.to_string(),
        }
    }

    /// Returns the sale's job, creating it on first use.
    pub async fn get_or_create(&self, sale: &SaleContext) -> Result<ProductionJob, WorkflowError> {
        if let Some(row) = job_repo::find_by_sale(&self.db, &sale.sale_id)? {
            return Ok(row.into());
        }
        self.create(sale)
            .instrument(info_span!("create_job", sale_id = %sale.sale_id))
            .await
    }

    async fn create(&self, sale: &SaleContext) -> Result<ProductionJob, WorkflowError> {
        let branch_id = self.resolve_branch(sale).await?;
        let now = format_timestamp(Utc::now());
        let row = JobRow {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: sale.sale_id.clone(),
            company_id: sale.company_id.clone(),
            branch_id,
            production_no: production_number(&self.number_prefix, sale),
            status: JobState::Open.as_str().to_string(),
            created_at: now.clone(),
            updated_at: now,
            finalized_at: None,
        };
        job_repo::insert(&self.db, &row)?;
        log::info!(
            "Created production job {} ({}) for sale {}",
            row.id,
            row.production_no,
            row.sale_id
        );

        let job = ProductionJob::from(row);
        self.audit
            .record(&job.id, AuditAction::JobCreated, None::<&ProductionJob>, Some(&job));
        Ok(job)
    }

    async fn resolve_branch(&self, sale: &SaleContext) -> Result<String, WorkflowError> {
        let own = sale
            .branch_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());
        if let Some(branch) = own {
            return Ok(branch.to_string());
        }

        let fallback = self.gateway.fallback_branch(&sale.company_id).await?;
        match fallback.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(branch) => {
                log::debug!(
                    "Sale {} has no branch, using company fallback {}",
                    sale.sale_id,
                    branch
                );
                Ok(branch.to_string())
            }
            None => Err(WorkflowError::MissingLocationContext {
                sale_id: sale.sale_id.clone(),
            }),
        }
    }

    pub fn get(&self, job_id: &str) -> Result<ProductionJob, WorkflowError> {
        job_repo::find_by_id(&self.db, job_id)?
            .map(ProductionJob::from)
            .ok_or_else(|| WorkflowError::JobNotFound(job_id.to_string()))
    }

    pub fn find_by_sale(&self, sale_id: &str) -> Result<Option<ProductionJob>, WorkflowError> {
        Ok(job_repo::find_by_sale(&self.db, sale_id)?.map(ProductionJob::from))
    }

    pub fn list_for_company(&self, company_id: &str) -> Result<Vec<ProductionJob>, WorkflowError> {
        Ok(job_repo::list_by_company(&self.db, company_id)?
            .into_iter()
            .map(ProductionJob::from)
            .collect())
    }

    pub(crate) fn mark_finalized(&self, job_id: &str) -> Result<ProductionJob, WorkflowError> {
        let now = format_timestamp(Utc::now());
        job_repo::update_status(
            &self.db,
            job_id,
            JobState::Finalized.as_str(),
            &now,
            Some(&now),
        )?;
        self.get(job_id)
    }
}
