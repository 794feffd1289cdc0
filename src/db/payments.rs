use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::core::BillingError;
use crate::models::payments::{NewPayment, Payment, PaymentStatus};

#[derive(sqlx::FromRow, Debug)]
pub struct PaymentsTbl {
    pub id: i64,
    pub subscription_id: Option<i64>,
    pub user_id: i64,
    pub order_id: String,
    pub payment_key: String,
    pub order_name: String,
    pub total_amount: i64,
    pub method: Option<String>,
    pub status: String,
    pub approved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentsTbl> for Payment {
    fn from(row: PaymentsTbl) -> Self {
        Payment {
            id: row.id,
            subscription_id: row.subscription_id,
            user_id: row.user_id,
            order_id: row.order_id,
            payment_key: row.payment_key,
            order_name: row.order_name,
            total_amount: row.total_amount,
            method: row.method,
            status: PaymentStatus::from_gateway(&row.status),
            approved_at: row.approved_at,
            created_at: row.created_at,
        }
    }
}

pub async fn insert_payment(
    transaction: &mut Transaction<'_, Postgres>,
    payment: &NewPayment,
) -> Result<Payment, BillingError> {
    let row = sqlx::query_as::<_, PaymentsTbl>(
        r#"
        INSERT INTO payments (
            subscription_id, user_id, order_id, payment_key, order_name,
            total_amount, method, status, approved_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(payment.subscription_id)
    .bind(payment.user_id)
    .bind(&payment.order_id)
    .bind(&payment.payment_key)
    .bind(&payment.order_name)
    .bind(payment.total_amount)
    .bind(&payment.method)
    .bind(payment.status.as_str())
    .bind(payment.approved_at)
    .fetch_one(&mut **transaction)
    .await?;

    Ok(row.into())
}

pub async fn get_payments_by_subscription(
    pool: &PgPool,
    subscription_id: i64,
) -> Result<Vec<Payment>, BillingError> {
    let rows = sqlx::query_as::<_, PaymentsTbl>(
        r#"
        SELECT * FROM payments
        WHERE subscription_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Payment::from).collect())
}
