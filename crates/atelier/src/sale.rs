//! Boundary to the sales subsystem.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// What the workflow needs to know about the sale a job belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleContext {
    pub sale_id: String,
    pub company_id: String,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub invoice_no: Option<String>,
}

impl SaleContext {
    pub fn new(sale_id: &str, company_id: &str) -> Self {
        Self {
            sale_id: sale_id.to_string(),
            company_id: company_id.to_string(),
            branch_id: None,
            invoice_no: None,
        }
    }

    pub fn with_branch(mut self, branch_id: &str) -> Self {
        self.branch_id = Some(branch_id.to_string());
        self
    }

    pub fn with_invoice(mut self, invoice_no: &str) -> Self {
        self.invoice_no = Some(invoice_no.to_string());
        self
    }
}

/// Payload handed to the sales subsystem when production is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub sale_id: String,
    pub job_id: String,
    pub production_no: String,
    /// Sum of actual stage costs, to be charged on the sale.
    pub studio_charges: Decimal,
}

/// Implemented by the host application.
#[async_trait]
pub trait SaleGateway: Send + Sync {
    /// Branch to use when a sale carries none (usually the company's first).
    async fn fallback_branch(&self, company_id: &str) -> Result<Option<String>, WorkflowError>;

    /// Completes the sale: posts inventory and accounting effects.
    async fn finalize_sale(&self, request: &FinalizeRequest) -> Result<(), WorkflowError>;
}
