//! Customer profile, keyed by CPF and refreshed on every checkout.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub id: i32,
    pub cpf: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset exposed to the public checkout autofill.
#[derive(Clone, Debug, Serialize)]
pub struct CustomerSummary {
    pub cpf: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<CustomerProfile> for CustomerSummary {
    fn from(p: CustomerProfile) -> Self {
        Self { cpf: p.cpf, name: p.name, email: p.email, phone: p.phone }
    }
}
