//! Escrow and commission configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// Escrow controller configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowConfig {
    /// Platform fee as a whole percentage of the total agreed amount.
    #[serde(default = "default_commission_percent")]
    pub commission_percent: u8,

    /// Default invoice due window in days.
    #[serde(default = "default_invoice_due_days")]
    pub invoice_due_days: u32,
}

fn default_commission_percent() -> u8 {
    10
}

fn default_invoice_due_days() -> u32 {
    7
}

impl EscrowConfig {
    /// Validate escrow configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.commission_percent > 100 {
            return Err(ValidationError::invalid(
                "ESCROW_COMMISSION_PERCENT",
                format!("must be 0-100, got {}", self.commission_percent),
            ));
        }
        if self.invoice_due_days == 0 {
            return Err(ValidationError::invalid(
                "ESCROW_INVOICE_DUE_DAYS",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            commission_percent: default_commission_percent(),
            invoice_due_days: default_invoice_due_days(),
        }
    }
}
