use sqlx::PgPool;

use crate::core::BillingError;
use crate::models::users::BillingCustomer;

pub async fn get_billing_customer(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<BillingCustomer>, BillingError> {
    let customer = sqlx::query_as::<_, BillingCustomer>(
        r#"
        SELECT id, email, name
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(customer)
}
