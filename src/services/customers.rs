use sqlx::{PgConnection, PgPool};

use crate::domain::aggregates::CustomerProfile;
use crate::domain::value_objects::Cpf;
use crate::Result;

pub async fn find_by_cpf(pool: &PgPool, cpf: &Cpf) -> Result<Option<CustomerProfile>> {
    let profile = sqlx::query_as::<_, CustomerProfile>("SELECT * FROM customer_profiles WHERE cpf = $1")
        .bind(cpf.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(profile)
}

/// Creates or refreshes the profile behind a CPF with the latest contact data.
pub(crate) async fn upsert(conn: &mut PgConnection, cpf: &Cpf, name: &str, email: &str, phone: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO customer_profiles (cpf, name, email, phone)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (cpf) DO UPDATE
         SET name = EXCLUDED.name, email = EXCLUDED.email, phone = EXCLUDED.phone, updated_at = NOW()",
    )
    .bind(cpf.as_str())
    .bind(name)
    .bind(email)
    .bind(phone)
    .execute(conn)
    .await?;
    Ok(())
}
