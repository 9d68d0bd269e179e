//! Inventory mutations: samples, sizes and shipments.
//!
//! Every successful write publishes one event per changed entity through the
//! hub, after the store has committed. Failed writes publish nothing.

use serde::Deserialize;
use tracing::instrument;

use sample_depot_core::events::{SampleUpdate, ServerEvent};
use sample_depot_core::{
    MISSING_IMAGE, Sample, Shelf, ShelfPlacement, Shipment, ShipmentRequest, Size, SizeId, UserId,
};

use super::error::{ServiceError, required};
use crate::db::{InventoryStore, NewShipment, NewSize, SizeChange};
use crate::realtime::EventHub;

/// Most line items one shipment may carry.
pub const MAX_SHIPMENT_LINES: usize = 500;

/// Input for creating a sample.
#[derive(Debug, Clone, Default)]
pub struct NewSample {
    pub code: Option<String>,
    pub description: Option<String>,
    /// Public path of an already stored picture.
    pub image: Option<String>,
}

/// Body of a size creation request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeInput {
    pub sample_code: Option<String>,
    pub box_number: Option<String>,
    pub size_label: Option<String>,
    pub quantity: Option<i32>,
    pub shelf_id: Option<String>,
    pub section: Option<i32>,
    pub level: Option<i32>,
}

/// Body of a size update request.
///
/// Zero or missing quantity together with empty box, shelf, section and
/// level means "clear this record".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeUpdate {
    pub box_number: Option<String>,
    pub size_label: Option<String>,
    pub quantity: Option<i32>,
    pub shelf_id: Option<String>,
    pub section: Option<i32>,
    pub level: Option<i32>,
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn placement_of(
    shelf_id: Option<&str>,
    section: Option<i32>,
    level: Option<i32>,
) -> Result<ShelfPlacement, ServiceError> {
    Ok(ShelfPlacement {
        shelf_id: required(shelf_id, "shelf")?,
        section: section.ok_or_else(|| ServiceError::Validation("section is required".to_owned()))?,
        level: level.ok_or_else(|| ServiceError::Validation("level is required".to_owned()))?,
    })
}

impl SizeUpdate {
    /// Whether the request unassigns the record.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.quantity.unwrap_or(0) == 0
            && is_blank(self.box_number.as_deref())
            && is_blank(self.shelf_id.as_deref())
            && self.section.unwrap_or(0) == 0
            && self.level.unwrap_or(0) == 0
    }

    /// Validate into a store change.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if a field of a non-clearing update
    /// is missing or the quantity is negative.
    pub fn into_change(self) -> Result<SizeChange, ServiceError> {
        if self.is_clear() {
            return Ok(SizeChange::Clear {
                size_label: self
                    .size_label
                    .map(|l| l.trim().to_owned())
                    .filter(|l| !l.is_empty()),
            });
        }

        let quantity = self
            .quantity
            .ok_or_else(|| ServiceError::Validation("quantity is required".to_owned()))?;
        if quantity < 0 {
            return Err(ServiceError::Validation(
                "quantity cannot be negative".to_owned(),
            ));
        }

        Ok(SizeChange::Assign {
            box_number: required(self.box_number.as_deref(), "box")?,
            size_label: required(self.size_label.as_deref(), "size")?,
            quantity,
            placement: placement_of(self.shelf_id.as_deref(), self.section, self.level)?,
        })
    }
}

/// Inventory operations over any [`InventoryStore`].
pub struct InventoryService<'a, S> {
    store: &'a S,
    hub: &'a EventHub,
}

impl<'a, S: InventoryStore> InventoryService<'a, S> {
    /// Create a new inventory service.
    #[must_use]
    pub const fn new(store: &'a S, hub: &'a EventHub) -> Self {
        Self { store, hub }
    }

    // =========================================================================
    // Samples
    // =========================================================================

    /// List every sample.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn list_samples(&self) -> Result<Vec<Sample>, ServiceError> {
        Ok(self.store.list_samples().await?)
    }

    /// Get one sample.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if no sample has this code.
    pub async fn get_sample(&self, code: &str) -> Result<Sample, ServiceError> {
        self.store
            .get_sample(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sample {code}")))
    }

    /// Create a sample; without an image it points at the placeholder picture.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` without a code and
    /// `ServiceError::Conflict` if the code is taken.
    #[instrument(skip(self), fields(code = ?input.code))]
    pub async fn create_sample(&self, input: NewSample) -> Result<Sample, ServiceError> {
        let sample = Sample {
            code: required(input.code.as_deref(), "code")?,
            description: input
                .description
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
            image: input.image.unwrap_or_else(|| MISSING_IMAGE.to_owned()),
        };

        let created = self.store.insert_sample(&sample).await?;
        tracing::info!(code = %created.code, "Sample created");
        self.hub.broadcast(ServerEvent::SampleAdded(created.clone()));
        Ok(created)
    }

    /// Change a sample's code. Its sizes follow.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty code,
    /// `ServiceError::NotFound` for an unknown sample and
    /// `ServiceError::Conflict` if the new code is taken.
    #[instrument(skip(self))]
    pub async fn rename_sample(
        &self,
        old_code: &str,
        new_code: Option<&str>,
    ) -> Result<Sample, ServiceError> {
        let new_code = required(new_code, "code")?;
        if new_code == old_code {
            return self.get_sample(old_code).await;
        }

        let renamed = self
            .store
            .rename_sample(old_code, &new_code)
            .await
            .map_err(ServiceError::or_missing(format!("sample {old_code}")))?;
        tracing::info!(old_code, new_code = %renamed.code, "Sample renamed");
        self.hub
            .broadcast(ServerEvent::SampleUpdated(SampleUpdate::Code {
                old_code: old_code.to_owned(),
                new_code: renamed.code.clone(),
            }));
        Ok(renamed)
    }

    /// Set or clear a sample's description.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown sample.
    #[instrument(skip(self))]
    pub async fn set_description(
        &self,
        code: &str,
        description: Option<&str>,
    ) -> Result<Sample, ServiceError> {
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let updated = self
            .store
            .set_description(code, description)
            .await
            .map_err(ServiceError::or_missing(format!("sample {code}")))?;
        self.hub
            .broadcast(ServerEvent::SampleUpdated(SampleUpdate::Description {
                code: updated.code.clone(),
                description: updated.description.clone(),
            }));
        Ok(updated)
    }

    /// Point a sample at a new picture. Returns the sample and the replaced
    /// image reference, which the caller may reclaim.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown sample.
    #[instrument(skip(self))]
    pub async fn replace_image(
        &self,
        code: &str,
        image: &str,
    ) -> Result<(Sample, String), ServiceError> {
        let previous = self.get_sample(code).await?;
        let updated = self
            .store
            .set_image(code, image)
            .await
            .map_err(ServiceError::or_missing(format!("sample {code}")))?;
        self.hub
            .broadcast(ServerEvent::SampleUpdated(SampleUpdate::Image {
                code: updated.code.clone(),
                image: updated.image.clone(),
            }));
        Ok((updated, previous.image))
    }

    /// Delete a sample and all its sizes. Returns the removed sample.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown sample.
    #[instrument(skip(self))]
    pub async fn delete_sample(&self, code: &str) -> Result<Sample, ServiceError> {
        let removed = self
            .store
            .delete_sample(code)
            .await
            .map_err(ServiceError::or_missing(format!("sample {code}")))?;
        tracing::info!(code, "Sample deleted");
        self.hub.broadcast(ServerEvent::SampleDeleted {
            code: removed.code.clone(),
        });
        Ok(removed)
    }

    // =========================================================================
    // Sizes
    // =========================================================================

    /// List every size record.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn list_sizes(&self) -> Result<Vec<Size>, ServiceError> {
        Ok(self.store.list_sizes().await?)
    }

    /// List the size records of one sample.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn sizes_of(&self, code: &str) -> Result<Vec<Size>, ServiceError> {
        Ok(self.store.sizes_of(code).await?)
    }

    /// Add a size record to a sample.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for missing fields, a placement
    /// outside every shelf, or a box already stored elsewhere;
    /// `ServiceError::NotFound` for an unknown sample.
    #[instrument(skip(self), fields(code = ?input.sample_code, box_number = ?input.box_number))]
    pub async fn create_size(&self, input: SizeInput) -> Result<Size, ServiceError> {
        let quantity = input
            .quantity
            .filter(|q| *q > 0)
            .ok_or_else(|| ServiceError::Validation("quantity must be positive".to_owned()))?;
        let new = NewSize {
            sample_code: required(input.sample_code.as_deref(), "sample")?,
            box_number: required(input.box_number.as_deref(), "box")?,
            size_label: required(input.size_label.as_deref(), "size")?,
            quantity,
            placement: placement_of(input.shelf_id.as_deref(), input.section, input.level)?,
        };

        self.check_placement(&new.placement).await?;
        if let Some(existing) = self
            .store
            .sizes_in_box(&new.box_number)
            .await?
            .into_iter()
            .find_map(|s| s.placement.filter(|p| *p != new.placement))
        {
            return Err(ServiceError::Validation(format!(
                "box {} is stored at {}/{}/{}",
                new.box_number, existing.shelf_id, existing.section, existing.level
            )));
        }

        let created = self
            .store
            .insert_size(&new)
            .await
            .map_err(ServiceError::or_missing(format!("sample {}", new.sample_code)))?;
        tracing::info!(size_id = %created.id, "Size created");
        self.hub.broadcast(ServerEvent::SizeAdded(created.clone()));
        Ok(created)
    }

    /// Update a size record and move every record sharing its box to the
    /// same placement. Returns (and announces) every record touched.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an incomplete update or unknown
    /// placement and `ServiceError::NotFound` for an unknown size.
    #[instrument(skip(self, update))]
    pub async fn update_size(
        &self,
        id: SizeId,
        update: SizeUpdate,
    ) -> Result<Vec<Size>, ServiceError> {
        let change = update.into_change()?;
        if let SizeChange::Assign { placement, .. } = &change {
            self.check_placement(placement).await?;
        }

        let touched = self
            .store
            .update_size(id, &change)
            .await
            .map_err(ServiceError::or_missing(format!("size {id}")))?;
        tracing::info!(size_id = %id, touched = touched.len(), "Size updated");
        for size in &touched {
            self.hub.broadcast(ServerEvent::SizeUpdated(size.clone()));
        }
        Ok(touched)
    }

    /// Delete a size record.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown size.
    #[instrument(skip(self))]
    pub async fn delete_size(&self, id: SizeId) -> Result<SizeId, ServiceError> {
        self.store
            .delete_size(id)
            .await
            .map_err(ServiceError::or_missing(format!("size {id}")))?;
        self.hub.broadcast(ServerEvent::SizeDeleted { id });
        Ok(id)
    }

    /// The shelf layout.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn list_shelves(&self) -> Result<Vec<Shelf>, ServiceError> {
        Ok(self.store.list_shelves().await?)
    }

    async fn check_placement(&self, placement: &ShelfPlacement) -> Result<(), ServiceError> {
        let shelves = self.store.list_shelves().await?;
        if shelves.iter().any(|shelf| shelf.contains(placement)) {
            Ok(())
        } else {
            Err(ServiceError::Validation(format!(
                "no shelf position {}/{}/{}",
                placement.shelf_id, placement.section, placement.level
            )))
        }
    }

    // =========================================================================
    // Shipments
    // =========================================================================

    /// Shipment history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn list_shipments(&self) -> Result<Vec<Shipment>, ServiceError> {
        Ok(self.store.list_shipments().await?)
    }

    /// Record a shipment and draw its quantities from stock.
    ///
    /// Announces each decremented size, then the shipment. Nothing is written
    /// or announced if any line cannot be served.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an incomplete request and
    /// `ServiceError::Conflict` if a line matches no size or exceeds stock.
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn create_shipment(
        &self,
        user_id: UserId,
        user_name: &str,
        request: ShipmentRequest,
    ) -> Result<Shipment, ServiceError> {
        let request = validate_shipment(request)?;
        let (shipment, touched) = self
            .store
            .create_shipment(&NewShipment {
                user_id,
                user_name: user_name.to_owned(),
                request,
            })
            .await?;

        tracing::info!(shipment_id = %shipment.id, user_id = %user_id, "Shipment created");
        for size in touched {
            self.hub.broadcast(ServerEvent::SizeUpdated(size));
        }
        self.hub
            .broadcast(ServerEvent::ShippingCreated(shipment.clone()));
        Ok(shipment)
    }
}

fn validate_shipment(request: ShipmentRequest) -> Result<ShipmentRequest, ServiceError> {
    let recipient = required(Some(request.recipient.as_str()), "recipient")?;
    let courier = required(Some(request.courier.as_str()), "courier")?;
    if request.lines.is_empty() {
        return Err(ServiceError::Validation(
            "a shipment needs at least one line".to_owned(),
        ));
    }
    if request.lines.len() > MAX_SHIPMENT_LINES {
        return Err(ServiceError::Validation(format!(
            "a shipment carries at most {MAX_SHIPMENT_LINES} lines"
        )));
    }

    let mut lines = Vec::with_capacity(request.lines.len());
    for mut line in request.lines {
        line.sample_code = required(Some(line.sample_code.as_str()), "sample")?;
        line.size_label = required(Some(line.size_label.as_str()), "size")?;
        line.box_number = required(Some(line.box_number.as_str()), "box")?;
        if line.quantity <= 0 {
            return Err(ServiceError::Validation(format!(
                "quantity for {} {} must be positive",
                line.sample_code, line.size_label
            )));
        }
        lines.push(line);
    }

    Ok(ShipmentRequest {
        recipient,
        courier,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use sample_depot_core::ShipmentLineRequest;

    use super::*;
    use crate::db::MemoryStore;

    fn sample_input(code: &str) -> NewSample {
        NewSample {
            code: Some(code.to_owned()),
            ..NewSample::default()
        }
    }

    fn size_input(code: &str, label: &str, box_number: &str, quantity: i32) -> SizeInput {
        SizeInput {
            sample_code: Some(code.to_owned()),
            box_number: Some(box_number.to_owned()),
            size_label: Some(label.to_owned()),
            quantity: Some(quantity),
            shelf_id: Some("S1".to_owned()),
            section: Some(2),
            level: Some(1),
        }
    }

    #[test]
    fn test_clear_update_detection() {
        let clear = SizeUpdate {
            quantity: Some(0),
            box_number: Some(String::new()),
            ..SizeUpdate::default()
        };
        assert!(clear.is_clear());
        assert_eq!(
            clear.into_change().ok(),
            Some(SizeChange::Clear { size_label: None })
        );

        let partial = SizeUpdate {
            quantity: Some(2),
            box_number: Some("B7".to_owned()),
            ..SizeUpdate::default()
        };
        assert!(!partial.is_clear());
        assert!(matches!(
            partial.into_change(),
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_sample_emits_nothing() {
        let store = MemoryStore::new();
        let hub = EventHub::new(16);
        let mut events = hub.connect();
        let service = InventoryService::new(&store, &hub);

        let created = service.create_sample(sample_input("A123")).await;
        assert_eq!(created.map(|s| s.image).ok().as_deref(), Some(MISSING_IMAGE));
        assert!(matches!(
            service.create_sample(sample_input("A123")).await,
            Err(ServiceError::Conflict(_))
        ));

        let received = events.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received.first().map(ServerEvent::name), Some("sample-added"));
    }

    #[tokio::test]
    async fn test_size_outside_shelf_rejected() {
        let store = MemoryStore::new();
        let hub = EventHub::new(16);
        let service = InventoryService::new(&store, &hub);
        service.create_sample(sample_input("A123")).await.ok();

        let mut input = size_input("A123", "M", "B7", 3);
        input.level = Some(9);
        assert!(matches!(
            service.create_size(input).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_new_size_must_match_box_location() {
        let store = MemoryStore::new();
        let hub = EventHub::new(16);
        let service = InventoryService::new(&store, &hub);
        service.create_sample(sample_input("A123")).await.ok();
        assert!(service.create_size(size_input("A123", "M", "B7", 3)).await.is_ok());

        let mut elsewhere = size_input("A123", "L", "B7", 1);
        elsewhere.shelf_id = Some("S2".to_owned());
        assert!(matches!(
            service.create_size(elsewhere).await,
            Err(ServiceError::Validation(m)) if m.contains("B7")
        ));
    }

    #[tokio::test]
    async fn test_rename_to_same_code_is_silent() {
        let store = MemoryStore::new();
        let hub = EventHub::new(16);
        let service = InventoryService::new(&store, &hub);
        service.create_sample(sample_input("A123")).await.ok();
        let mut events = hub.connect();

        assert!(service.rename_sample("A123", Some("A123")).await.is_ok());
        assert!(events.drain().is_empty());
    }

    #[tokio::test]
    async fn test_shipment_validation() {
        let store = MemoryStore::new();
        let hub = EventHub::new(16);
        let service = InventoryService::new(&store, &hub);

        let empty = ShipmentRequest {
            recipient: "Studio Rossi".to_owned(),
            courier: "DHL".to_owned(),
            lines: Vec::new(),
        };
        assert!(matches!(
            service.create_shipment(UserId::new(1), "admin", empty).await,
            Err(ServiceError::Validation(_))
        ));

        let zero = ShipmentRequest {
            recipient: "Studio Rossi".to_owned(),
            courier: " ".to_owned(),
            lines: vec![ShipmentLineRequest {
                sample_code: "A123".to_owned(),
                size_label: "M".to_owned(),
                box_number: "B7".to_owned(),
                quantity: 1,
            }],
        };
        assert!(matches!(
            service.create_shipment(UserId::new(1), "admin", zero).await,
            Err(ServiceError::Validation(m)) if m == "courier is required"
        ));

        let line = ShipmentLineRequest {
            sample_code: "A123".to_owned(),
            size_label: "M".to_owned(),
            box_number: "B7".to_owned(),
            quantity: 1,
        };
        let oversized = ShipmentRequest {
            recipient: "Studio Rossi".to_owned(),
            courier: "DHL".to_owned(),
            lines: vec![line; MAX_SHIPMENT_LINES + 1],
        };
        assert!(matches!(
            service.create_shipment(UserId::new(1), "admin", oversized).await,
            Err(ServiceError::Validation(m)) if m.contains("at most")
        ));
    }
}
