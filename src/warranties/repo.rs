use anyhow::Context;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::model::{Warranty, WarrantyDraft};

const COLUMNS: &str = "id, user_id, name, brand, category, purchase_date, warranty_months, \
     price, expiry_date, receipt_number, receipt_key, image_key, created_at, updated_at";

/// Which stored file column an attachment occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileColumn {
    Receipt,
    Image,
}

impl FileColumn {
    fn column(self) -> &'static str {
        match self {
            FileColumn::Receipt => "receipt_key",
            FileColumn::Image => "image_key",
        }
    }
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Warranty>> {
    let rows = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        SELECT {COLUMNS}
          FROM warranties
         WHERE user_id = $1
         ORDER BY purchase_date DESC, created_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list warranties by user")?;
    Ok(rows)
}

pub async fn count_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM warranties WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("count warranties by user")?;
    Ok(count)
}

pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Warranty>> {
    let row = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        SELECT {COLUMNS}
          FROM warranties
         WHERE id = $1 AND user_id = $2
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("find warranty")?;
    Ok(row)
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    draft: &WarrantyDraft,
    expiry_date: Date,
) -> anyhow::Result<Warranty> {
    let row = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        INSERT INTO warranties
            (id, user_id, name, brand, category, purchase_date,
             warranty_months, price, expiry_date, receipt_number)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&draft.name)
    .bind(&draft.brand)
    .bind(&draft.category)
    .bind(draft.purchase_date)
    .bind(draft.warranty_months)
    .bind(draft.price)
    .bind(expiry_date)
    .bind(&draft.receipt_number)
    .fetch_one(db)
    .await
    .context("insert warranty")?;
    Ok(row)
}

/// Replaces every user-editable field; `None` when the record is not the user's.
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    draft: &WarrantyDraft,
    expiry_date: Date,
) -> anyhow::Result<Option<Warranty>> {
    let row = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        UPDATE warranties
           SET name = $3, brand = $4, category = $5, purchase_date = $6,
               warranty_months = $7, price = $8, expiry_date = $9,
               receipt_number = $10, updated_at = now()
         WHERE id = $1 AND user_id = $2
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .bind(&draft.name)
    .bind(&draft.brand)
    .bind(&draft.category)
    .bind(draft.purchase_date)
    .bind(draft.warranty_months)
    .bind(draft.price)
    .bind(expiry_date)
    .bind(&draft.receipt_number)
    .fetch_optional(db)
    .await
    .context("update warranty")?;
    Ok(row)
}

/// Deletes and returns the row so its files can be released afterwards.
pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Warranty>> {
    let row = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        DELETE FROM warranties
         WHERE id = $1 AND user_id = $2
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("delete warranty")?;
    Ok(row)
}

pub async fn set_file_key(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    column: FileColumn,
    key: &str,
) -> anyhow::Result<Option<Warranty>> {
    let row = sqlx::query_as::<_, Warranty>(&format!(
        r#"
        UPDATE warranties
           SET {col} = $3, updated_at = now()
         WHERE id = $1 AND user_id = $2
        RETURNING {COLUMNS}
        "#,
        col = column.column()
    ))
    .bind(id)
    .bind(user_id)
    .bind(key)
    .fetch_optional(db)
    .await
    .with_context(|| format!("set warranty {}", column.column()))?;
    Ok(row)
}
