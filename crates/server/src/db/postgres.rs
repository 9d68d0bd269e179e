//! `PostgreSQL` store.
//!
//! Queries are built at runtime with `sqlx::query_as` and decoded through
//! private row structs, converted to the core entities at the edge.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sample_depot_core::{
    Role, Sample, Shelf, ShelfPlacement, Shipment, ShipmentId, ShipmentLine, Size, SizeId,
    UserId, UserSummary,
};

use super::{InventoryStore, NewShipment, NewSize, RepositoryError, SizeChange, UserStore};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert shelves that do not exist yet. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn seed_shelves(&self, shelves: &[Shelf]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for shelf in shelves {
            let result = sqlx::query(
                "INSERT INTO shelves (id, sections, levels) VALUES ($1, $2, $3)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(&shelf.id)
            .bind(shelf.sections)
            .bind(shelf.levels)
            .execute(&mut *tx)
            .await?;
            added += result.rows_affected();
        }
        tx.commit().await?;
        Ok(added)
    }

    /// Number of registered users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_users(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct SampleRow {
    code: String,
    description: Option<String>,
    image: String,
}

impl From<SampleRow> for Sample {
    fn from(row: SampleRow) -> Self {
        Self {
            code: row.code,
            description: row.description,
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SizeRow {
    id: SizeId,
    sample_code: String,
    box_number: Option<String>,
    size_label: String,
    quantity: i32,
    shelf_id: Option<String>,
    section: Option<i32>,
    level: Option<i32>,
}

impl From<SizeRow> for Size {
    fn from(row: SizeRow) -> Self {
        let placement = match (row.shelf_id, row.section, row.level) {
            (Some(shelf_id), Some(section), Some(level)) => Some(ShelfPlacement {
                shelf_id,
                section,
                level,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            sample_code: row.sample_code,
            box_number: row.box_number.filter(|b| !b.is_empty()),
            size_label: row.size_label,
            quantity: row.quantity,
            placement,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShelfRow {
    id: String,
    sections: i32,
    levels: i32,
}

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: ShipmentId,
    recipient: String,
    courier: String,
    user_id: UserId,
    user_name: String,
    created_at: DateTime<Utc>,
}

impl ShipmentRow {
    fn with_lines(self, lines: Vec<ShipmentLine>) -> Shipment {
        Shipment {
            id: self.id,
            recipient: self.recipient,
            courier: self.courier,
            user_id: self.user_id,
            user_name: self.user_name,
            created_at: self.created_at,
            lines,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    shipment_id: ShipmentId,
    sample_code: String,
    size_label: String,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    role: Role,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: UserId,
    name: String,
    role: Role,
    password_hash: String,
}

/// Map unique and foreign-key violations to their repository meaning.
fn write_error(e: sqlx::Error, conflict: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(conflict.to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Inventory
// =============================================================================

impl InventoryStore for PgStore {
    async fn list_samples(&self) -> Result<Vec<Sample>, RepositoryError> {
        let rows = sqlx::query_as::<_, SampleRow>(
            "SELECT code, description, image FROM samples ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Sample::from).collect())
    }

    async fn get_sample(&self, code: &str) -> Result<Option<Sample>, RepositoryError> {
        let row = sqlx::query_as::<_, SampleRow>(
            "SELECT code, description, image FROM samples WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Sample::from))
    }

    async fn insert_sample(&self, sample: &Sample) -> Result<Sample, RepositoryError> {
        let row = sqlx::query_as::<_, SampleRow>(
            "INSERT INTO samples (code, description, image) VALUES ($1, $2, $3)
             RETURNING code, description, image",
        )
        .bind(&sample.code)
        .bind(&sample.description)
        .bind(&sample.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "sample code already exists"))?;
        Ok(row.into())
    }

    async fn rename_sample(&self, old_code: &str, new_code: &str) -> Result<Sample, RepositoryError> {
        // sizes.sample_code follows through ON UPDATE CASCADE
        let row = sqlx::query_as::<_, SampleRow>(
            "UPDATE samples SET code = $1 WHERE code = $2
             RETURNING code, description, image",
        )
        .bind(new_code)
        .bind(old_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "sample code already exists"))?;
        row.map(Sample::from).ok_or(RepositoryError::NotFound)
    }

    async fn set_description(
        &self,
        code: &str,
        description: Option<&str>,
    ) -> Result<Sample, RepositoryError> {
        let row = sqlx::query_as::<_, SampleRow>(
            "UPDATE samples SET description = $1 WHERE code = $2
             RETURNING code, description, image",
        )
        .bind(description)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Sample::from).ok_or(RepositoryError::NotFound)
    }

    async fn set_image(&self, code: &str, image: &str) -> Result<Sample, RepositoryError> {
        let row = sqlx::query_as::<_, SampleRow>(
            "UPDATE samples SET image = $1 WHERE code = $2
             RETURNING code, description, image",
        )
        .bind(image)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Sample::from).ok_or(RepositoryError::NotFound)
    }

    async fn delete_sample(&self, code: &str) -> Result<Sample, RepositoryError> {
        // sizes go with it through ON DELETE CASCADE
        let row = sqlx::query_as::<_, SampleRow>(
            "DELETE FROM samples WHERE code = $1 RETURNING code, description, image",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Sample::from).ok_or(RepositoryError::NotFound)
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, RepositoryError> {
        let rows = sqlx::query_as::<_, SizeRow>(
            "SELECT id, sample_code, box_number, size_label, quantity, shelf_id, section, level
             FROM sizes ORDER BY sample_code, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Size::from).collect())
    }

    async fn sizes_of(&self, sample_code: &str) -> Result<Vec<Size>, RepositoryError> {
        let rows = sqlx::query_as::<_, SizeRow>(
            "SELECT id, sample_code, box_number, size_label, quantity, shelf_id, section, level
             FROM sizes WHERE sample_code = $1 ORDER BY id",
        )
        .bind(sample_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Size::from).collect())
    }

    async fn sizes_in_box(&self, box_number: &str) -> Result<Vec<Size>, RepositoryError> {
        let rows = sqlx::query_as::<_, SizeRow>(
            "SELECT id, sample_code, box_number, size_label, quantity, shelf_id, section, level
             FROM sizes WHERE box_number = $1 ORDER BY id",
        )
        .bind(box_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Size::from).collect())
    }

    async fn insert_size(&self, size: &NewSize) -> Result<Size, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(
            "INSERT INTO sizes (sample_code, box_number, size_label, quantity, shelf_id, section, level)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, sample_code, box_number, size_label, quantity, shelf_id, section, level",
        )
        .bind(&size.sample_code)
        .bind(&size.box_number)
        .bind(&size.size_label)
        .bind(size.quantity)
        .bind(&size.placement.shelf_id)
        .bind(size.placement.section)
        .bind(size.placement.level)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "size already exists"))?;
        Ok(row.into())
    }

    async fn update_size(
        &self,
        id: SizeId,
        change: &SizeChange,
    ) -> Result<Vec<Size>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let touched = match change {
            SizeChange::Clear { size_label } => {
                let row = sqlx::query_as::<_, SizeRow>(
                    "UPDATE sizes
                     SET box_number = NULL, quantity = 0, shelf_id = NULL, section = NULL,
                         level = NULL, size_label = COALESCE($1, size_label)
                     WHERE id = $2
                     RETURNING id, sample_code, box_number, size_label, quantity, shelf_id, section, level",
                )
                .bind(size_label)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;
                vec![Size::from(row)]
            }
            SizeChange::Assign {
                box_number,
                size_label,
                quantity,
                placement,
            } => {
                let updated = sqlx::query(
                    "UPDATE sizes
                     SET box_number = $1, size_label = $2, quantity = $3,
                         shelf_id = $4, section = $5, level = $6
                     WHERE id = $7",
                )
                .bind(box_number)
                .bind(size_label)
                .bind(quantity)
                .bind(&placement.shelf_id)
                .bind(placement.section)
                .bind(placement.level)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| write_error(e, "size already exists"))?;
                if updated.rows_affected() == 0 {
                    return Err(RepositoryError::NotFound);
                }

                sqlx::query(
                    "UPDATE sizes SET shelf_id = $1, section = $2, level = $3
                     WHERE box_number = $4 AND id <> $5",
                )
                .bind(&placement.shelf_id)
                .bind(placement.section)
                .bind(placement.level)
                .bind(box_number)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                sqlx::query_as::<_, SizeRow>(
                    "SELECT id, sample_code, box_number, size_label, quantity, shelf_id, section, level
                     FROM sizes WHERE box_number = $1 ORDER BY id",
                )
                .bind(box_number)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(Size::from)
                .collect()
            }
        };

        tx.commit().await?;
        Ok(touched)
    }

    async fn delete_size(&self, id: SizeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM sizes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_shelves(&self) -> Result<Vec<Shelf>, RepositoryError> {
        let rows =
            sqlx::query_as::<_, ShelfRow>("SELECT id, sections, levels FROM shelves ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| Shelf {
                id: r.id,
                sections: r.sections,
                levels: r.levels,
            })
            .collect())
    }

    async fn list_shipments(&self) -> Result<Vec<Shipment>, RepositoryError> {
        let headers = sqlx::query_as::<_, ShipmentRow>(
            "SELECT id, recipient, courier, user_id, user_name, created_at
             FROM shipments ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, LineRow>(
            "SELECT shipment_id, sample_code, size_label, quantity
             FROM shipment_lines ORDER BY shipment_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<ShipmentId, Vec<ShipmentLine>> = HashMap::new();
        for row in rows {
            lines.entry(row.shipment_id).or_default().push(ShipmentLine {
                sample_code: row.sample_code,
                size_label: row.size_label,
                quantity: row.quantity,
            });
        }

        Ok(headers
            .into_iter()
            .map(|header| {
                let items = lines.remove(&header.id).unwrap_or_default();
                header.with_lines(items)
            })
            .collect())
    }

    async fn create_shipment(
        &self,
        shipment: &NewShipment,
    ) -> Result<(Shipment, Vec<Size>), RepositoryError> {
        let request = &shipment.request;
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query_as::<_, ShipmentRow>(
            "INSERT INTO shipments (recipient, courier, user_id, user_name)
             VALUES ($1, $2, $3, $4)
             RETURNING id, recipient, courier, user_id, user_name, created_at",
        )
        .bind(&request.recipient)
        .bind(&request.courier)
        .bind(shipment.user_id)
        .bind(&shipment.user_name)
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(request.lines.len());
        let mut touched: Vec<Size> = Vec::new();

        for (position, line) in request.lines.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                RepositoryError::DataCorruption("shipment line position overflow".to_owned())
            })?;

            sqlx::query(
                "INSERT INTO shipment_lines (shipment_id, position, sample_code, size_label, quantity)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(header.id)
            .bind(position)
            .bind(&line.sample_code)
            .bind(&line.size_label)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            let drawn = sqlx::query_as::<_, SizeRow>(
                "UPDATE sizes SET quantity = quantity - $1
                 WHERE sample_code = $2 AND size_label = $3 AND box_number = $4 AND quantity >= $1
                 RETURNING id, sample_code, box_number, size_label, quantity, shelf_id, section, level",
            )
            .bind(line.quantity)
            .bind(&line.sample_code)
            .bind(&line.size_label)
            .bind(&line.box_number)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(drawn) = drawn else {
                let available = sqlx::query_scalar::<_, i32>(
                    "SELECT quantity FROM sizes
                     WHERE sample_code = $1 AND size_label = $2 AND box_number = $3
                     LIMIT 1",
                )
                .bind(&line.sample_code)
                .bind(&line.size_label)
                .bind(&line.box_number)
                .fetch_optional(&mut *tx)
                .await?;
                // dropping `tx` rolls back the header and earlier lines
                return Err(RepositoryError::Conflict(match available {
                    Some(left) => format!(
                        "only {left} of {} {} left in box {}",
                        line.sample_code, line.size_label, line.box_number
                    ),
                    None => format!(
                        "no size {} of {} in box {}",
                        line.size_label, line.sample_code, line.box_number
                    ),
                }));
            };

            let size = Size::from(drawn);
            match touched.iter_mut().find(|s| s.id == size.id) {
                Some(existing) => *existing = size,
                None => touched.push(size),
            }

            lines.push(ShipmentLine {
                sample_code: line.sample_code.clone(),
                size_label: line.size_label.clone(),
                quantity: line.quantity,
            });
        }

        tx.commit().await?;
        Ok((header.with_lines(lines), touched))
    }
}

// =============================================================================
// Users
// =============================================================================

impl UserStore for PgStore {
    async fn list_users(&self) -> Result<Vec<UserSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name, role FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UserSummary::from).collect())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserSummary>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserSummary::from))
    }

    async fn find_credentials(
        &self,
        name: &str,
    ) -> Result<Option<(UserSummary, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, name, role, password_hash FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            (
                UserSummary {
                    id: r.id,
                    name: r.name,
                    role: r.role,
                },
                r.password_hash,
            )
        }))
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserSummary, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (name, password_hash, role) VALUES ($1, $2, $3)
             RETURNING id, name, role",
        )
        .bind(name)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "user name already exists"))?;
        Ok(row.into())
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<UserSummary, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET role = $1 WHERE id = $2 RETURNING id, name, role",
        )
        .bind(role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserSummary::from).ok_or(RepositoryError::NotFound)
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn rename_user(&self, id: UserId, name: &str) -> Result<UserSummary, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET name = $1 WHERE id = $2 RETURNING id, name, role",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| write_error(e, "user name already exists"))?;
        let user = row.map(UserSummary::from).ok_or(RepositoryError::NotFound)?;

        // shipment history shows the creator's current name
        sqlx::query("UPDATE shipments SET user_name = $1 WHERE user_id = $2")
            .bind(name)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
