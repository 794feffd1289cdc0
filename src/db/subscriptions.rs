use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::core::BillingError;
use crate::models::subscriptions::{NewSubscription, Subscription};

const UNIQUE_VIOLATION: &str = "23505";

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, customer_key, billing_key, plan_name, plan_type, price,
    question_quota, is_active, start_date, end_date, next_billing_date,
    created_at, updated_at
"#;

#[derive(sqlx::FromRow, Debug)]
pub struct SubscriptionsTbl {
    pub id: i64,
    pub user_id: i64,
    pub customer_key: String,
    pub billing_key: Option<String>,
    pub plan_name: String,
    pub plan_type: String,
    pub price: i64,
    pub question_quota: i32,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_billing_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionsTbl> for Subscription {
    type Error = BillingError;

    fn try_from(row: SubscriptionsTbl) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: row.id,
            user_id: row.user_id,
            customer_key: row.customer_key,
            billing_key: row.billing_key,
            plan_name: row.plan_name,
            plan_type: row.plan_type.parse().map_err(BillingError::Database)?,
            price: row.price,
            question_quota: row.question_quota,
            is_active: row.is_active,
            start_date: row.start_date,
            end_date: row.end_date,
            next_billing_date: row.next_billing_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn get_subscription_by_id(
    pool: &PgPool,
    subscription_id: i64,
) -> Result<Option<Subscription>, BillingError> {
    let query = format!("SELECT {} FROM subscriptions WHERE id = $1", SUBSCRIPTION_COLUMNS);
    let row = sqlx::query_as::<_, SubscriptionsTbl>(&query)
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?;

    row.map(Subscription::try_from).transpose()
}

pub async fn get_subscription_by_customer_key(
    pool: &PgPool,
    customer_key: &str,
) -> Result<Option<Subscription>, BillingError> {
    let query = format!(
        "SELECT {} FROM subscriptions WHERE customer_key = $1",
        SUBSCRIPTION_COLUMNS
    );
    let row = sqlx::query_as::<_, SubscriptionsTbl>(&query)
        .bind(customer_key)
        .fetch_optional(pool)
        .await?;

    row.map(Subscription::try_from).transpose()
}

pub async fn get_due_subscriptions(
    pool: &PgPool,
    billing_date: NaiveDate,
) -> Result<Vec<Subscription>, BillingError> {
    let query = format!(
        "SELECT {} FROM subscriptions WHERE is_active = TRUE AND next_billing_date <= $1",
        SUBSCRIPTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, SubscriptionsTbl>(&query)
        .bind(billing_date)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Subscription::try_from).collect()
}

pub async fn create_subscription(
    pool: &PgPool,
    request: &NewSubscription,
) -> Result<Subscription, BillingError> {
    let query = format!(
        r#"
        INSERT INTO subscriptions
        (user_id, customer_key, plan_name, plan_type, price, question_quota,
         is_active, start_date)
        VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
        RETURNING {}
        "#,
        SUBSCRIPTION_COLUMNS
    );

    let row = sqlx::query_as::<_, SubscriptionsTbl>(&query)
        .bind(request.user_id)
        .bind(&request.customer_key)
        .bind(request.plan_type.plan_name())
        .bind(request.plan_type.as_str())
        .bind(request.price)
        .bind(request.plan_type.question_quota())
        .bind(request.start_date)
        .fetch_one(pool)
        .await
        .map_err(map_insert_error)?;

    Subscription::try_from(row)
}

pub async fn update_subscription(
    pool: &PgPool,
    subscription: &Subscription,
) -> Result<Subscription, BillingError> {
    let query = format!(
        r#"
        UPDATE subscriptions
        SET billing_key = $1, plan_name = $2, plan_type = $3, price = $4,
            question_quota = $5, is_active = $6, start_date = $7, end_date = $8,
            next_billing_date = $9, updated_at = NOW()
        WHERE id = $10
        RETURNING {}
        "#,
        SUBSCRIPTION_COLUMNS
    );

    let row = sqlx::query_as::<_, SubscriptionsTbl>(&query)
        .bind(&subscription.billing_key)
        .bind(&subscription.plan_name)
        .bind(subscription.plan_type.as_str())
        .bind(subscription.price)
        .bind(subscription.question_quota)
        .bind(subscription.is_active)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.next_billing_date)
        .bind(subscription.id)
        .fetch_optional(pool)
        .await?
        .ok_or(BillingError::SubscriptionNotFound)?;

    Subscription::try_from(row)
}

/// Soft cancel touches only the billing key, so a charge committed in between keeps its date.
pub async fn clear_billing_key(
    pool: &PgPool,
    subscription_id: i64,
) -> Result<Option<Subscription>, BillingError> {
    let query = format!(
        r#"
        UPDATE subscriptions
        SET billing_key = NULL, updated_at = NOW()
        WHERE id = $1 AND is_active = TRUE AND billing_key IS NOT NULL
        RETURNING {}
        "#,
        SUBSCRIPTION_COLUMNS
    );

    let row = sqlx::query_as::<_, SubscriptionsTbl>(&query)
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?;

    row.map(Subscription::try_from).transpose()
}

pub async fn lock_subscription(
    transaction: &mut Transaction<'_, Postgres>,
    subscription_id: i64,
) -> Result<(), BillingError> {
    let locked = sqlx::query("SELECT 1 FROM subscriptions WHERE id = $1 FOR UPDATE")
        .bind(subscription_id)
        .fetch_optional(&mut **transaction)
        .await?;

    locked.map(|_| ()).ok_or(BillingError::SubscriptionNotFound)
}

pub async fn set_next_billing_date(
    transaction: &mut Transaction<'_, Postgres>,
    subscription_id: i64,
    next_billing_date: NaiveDate,
) -> Result<(), BillingError> {
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET next_billing_date = $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(next_billing_date)
    .bind(subscription_id)
    .execute(&mut **transaction)
    .await?;

    Ok(())
}

fn map_insert_error(error: sqlx::Error) -> BillingError {
    let duplicate = error
        .as_database_error()
        .and_then(|e| e.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION);

    if duplicate {
        BillingError::SubscriptionAlreadyExists
    } else {
        BillingError::from(error)
    }
}
