//! In-memory store with the same semantics as [`super::PgStore`].
//!
//! Every operation runs under one lock and validates before it writes, so a
//! failing multi-step operation leaves nothing behind.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use sample_depot_core::{
    Role, Sample, Shelf, Shipment, ShipmentId, ShipmentLine, Size, SizeId, UserId, UserSummary,
    default_shelves,
};

use super::{InventoryStore, NewShipment, NewSize, RepositoryError, SizeChange, UserStore};

#[derive(Debug, Default)]
struct Data {
    samples: Vec<Sample>,
    sizes: Vec<Size>,
    shelves: Vec<Shelf>,
    /// Oldest first; listed in reverse.
    shipments: Vec<Shipment>,
    users: Vec<(UserSummary, String)>,
    next_size_id: i32,
    next_shipment_id: i32,
    next_user_id: i32,
}

/// A process-local store, seeded with the default shelves.
#[derive(Debug)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Data {
                shelves: default_shelves(),
                next_size_id: 1,
                next_shipment_id: 1,
                next_user_id: 1,
                ..Data::default()
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Data {
    fn sample_mut(&mut self, code: &str) -> Result<&mut Sample, RepositoryError> {
        self.samples
            .iter_mut()
            .find(|s| s.code == code)
            .ok_or(RepositoryError::NotFound)
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut (UserSummary, String), RepositoryError> {
        self.users
            .iter_mut()
            .find(|(u, _)| u.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn size_taken(
        &self,
        sample_code: &str,
        size_label: &str,
        box_number: &str,
        except: Option<SizeId>,
    ) -> bool {
        self.sizes.iter().any(|s| {
            s.sample_code == sample_code
                && s.size_label == size_label
                && s.in_box(box_number)
                && Some(s.id) != except
        })
    }

    fn name_taken(&self, name: &str, except: Option<UserId>) -> bool {
        self.users
            .iter()
            .any(|(u, _)| u.name == name && Some(u.id) != except)
    }
}

impl InventoryStore for MemoryStore {
    async fn list_samples(&self) -> Result<Vec<Sample>, RepositoryError> {
        let mut samples = self.data().samples.clone();
        samples.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(samples)
    }

    async fn get_sample(&self, code: &str) -> Result<Option<Sample>, RepositoryError> {
        Ok(self.data().samples.iter().find(|s| s.code == code).cloned())
    }

    async fn insert_sample(&self, sample: &Sample) -> Result<Sample, RepositoryError> {
        let mut data = self.data();
        if data.samples.iter().any(|s| s.code == sample.code) {
            return Err(RepositoryError::Conflict(
                "sample code already exists".to_owned(),
            ));
        }
        data.samples.push(sample.clone());
        Ok(sample.clone())
    }

    async fn rename_sample(&self, old_code: &str, new_code: &str) -> Result<Sample, RepositoryError> {
        let mut data = self.data();
        if old_code != new_code && data.samples.iter().any(|s| s.code == new_code) {
            return Err(RepositoryError::Conflict(
                "sample code already exists".to_owned(),
            ));
        }
        let sample = data.sample_mut(old_code)?;
        new_code.clone_into(&mut sample.code);
        let renamed = sample.clone();
        for size in data.sizes.iter_mut().filter(|s| s.sample_code == old_code) {
            new_code.clone_into(&mut size.sample_code);
        }
        Ok(renamed)
    }

    async fn set_description(
        &self,
        code: &str,
        description: Option<&str>,
    ) -> Result<Sample, RepositoryError> {
        let mut data = self.data();
        let sample = data.sample_mut(code)?;
        sample.description = description.map(str::to_owned);
        Ok(sample.clone())
    }

    async fn set_image(&self, code: &str, image: &str) -> Result<Sample, RepositoryError> {
        let mut data = self.data();
        let sample = data.sample_mut(code)?;
        image.clone_into(&mut sample.image);
        Ok(sample.clone())
    }

    async fn delete_sample(&self, code: &str) -> Result<Sample, RepositoryError> {
        let mut data = self.data();
        let index = data
            .samples
            .iter()
            .position(|s| s.code == code)
            .ok_or(RepositoryError::NotFound)?;
        let removed = data.samples.remove(index);
        data.sizes.retain(|s| s.sample_code != code);
        Ok(removed)
    }

    async fn list_sizes(&self) -> Result<Vec<Size>, RepositoryError> {
        let mut sizes = self.data().sizes.clone();
        sizes.sort_by(|a, b| {
            a.sample_code
                .cmp(&b.sample_code)
                .then(a.id.as_i32().cmp(&b.id.as_i32()))
        });
        Ok(sizes)
    }

    async fn sizes_of(&self, sample_code: &str) -> Result<Vec<Size>, RepositoryError> {
        Ok(self
            .data()
            .sizes
            .iter()
            .filter(|s| s.sample_code == sample_code)
            .cloned()
            .collect())
    }

    async fn sizes_in_box(&self, box_number: &str) -> Result<Vec<Size>, RepositoryError> {
        Ok(self
            .data()
            .sizes
            .iter()
            .filter(|s| s.in_box(box_number))
            .cloned()
            .collect())
    }

    async fn insert_size(&self, size: &NewSize) -> Result<Size, RepositoryError> {
        let mut data = self.data();
        if !data.samples.iter().any(|s| s.code == size.sample_code) {
            return Err(RepositoryError::NotFound);
        }
        if data.size_taken(&size.sample_code, &size.size_label, &size.box_number, None) {
            return Err(RepositoryError::Conflict("size already exists".to_owned()));
        }
        let created = Size {
            id: SizeId::new(data.next_size_id),
            sample_code: size.sample_code.clone(),
            box_number: Some(size.box_number.clone()),
            size_label: size.size_label.clone(),
            quantity: size.quantity,
            placement: Some(size.placement.clone()),
        };
        data.next_size_id += 1;
        data.sizes.push(created.clone());
        Ok(created)
    }

    async fn update_size(
        &self,
        id: SizeId,
        change: &SizeChange,
    ) -> Result<Vec<Size>, RepositoryError> {
        let mut data = self.data();
        if let SizeChange::Assign {
            box_number,
            size_label,
            ..
        } = change
        {
            let sample_code = data
                .sizes
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.sample_code.clone())
                .ok_or(RepositoryError::NotFound)?;
            if data.size_taken(&sample_code, size_label, box_number, Some(id)) {
                return Err(RepositoryError::Conflict("size already exists".to_owned()));
            }
        }
        let target = data
            .sizes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepositoryError::NotFound)?;

        match change {
            SizeChange::Clear { size_label } => {
                target.box_number = None;
                target.quantity = 0;
                target.placement = None;
                if let Some(label) = size_label {
                    label.clone_into(&mut target.size_label);
                }
                Ok(vec![target.clone()])
            }
            SizeChange::Assign {
                box_number,
                size_label,
                quantity,
                placement,
            } => {
                target.box_number = Some(box_number.clone());
                size_label.clone_into(&mut target.size_label);
                target.quantity = *quantity;
                target.placement = Some(placement.clone());

                let mut in_box = Vec::new();
                for size in data.sizes.iter_mut().filter(|s| s.in_box(box_number)) {
                    size.placement = Some(placement.clone());
                    in_box.push(size.clone());
                }
                Ok(in_box)
            }
        }
    }

    async fn delete_size(&self, id: SizeId) -> Result<(), RepositoryError> {
        let mut data = self.data();
        let before = data.sizes.len();
        data.sizes.retain(|s| s.id != id);
        if data.sizes.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_shelves(&self) -> Result<Vec<Shelf>, RepositoryError> {
        Ok(self.data().shelves.clone())
    }

    async fn list_shipments(&self) -> Result<Vec<Shipment>, RepositoryError> {
        Ok(self.data().shipments.iter().rev().cloned().collect())
    }

    async fn create_shipment(
        &self,
        shipment: &NewShipment,
    ) -> Result<(Shipment, Vec<Size>), RepositoryError> {
        let mut data = self.data();
        let request = &shipment.request;

        // Check every line against stock first, counting repeated lines.
        let mut remaining: Vec<(SizeId, i32)> = Vec::new();
        for line in &request.lines {
            let size = data
                .sizes
                .iter()
                .find(|s| {
                    s.sample_code == line.sample_code
                        && s.size_label == line.size_label
                        && s.in_box(&line.box_number)
                })
                .ok_or_else(|| {
                    RepositoryError::Conflict(format!(
                        "no size {} of {} in box {}",
                        line.size_label, line.sample_code, line.box_number
                    ))
                })?;

            let index = match remaining.iter().position(|(id, _)| *id == size.id) {
                Some(index) => index,
                None => {
                    remaining.push((size.id, size.quantity));
                    remaining.len() - 1
                }
            };
            let Some((_, left)) = remaining.get_mut(index) else {
                return Err(RepositoryError::DataCorruption(
                    "stock ledger out of range".to_owned(),
                ));
            };
            if *left < line.quantity {
                return Err(RepositoryError::Conflict(format!(
                    "only {left} of {} {} left in box {}",
                    line.sample_code, line.size_label, line.box_number
                )));
            }
            *left -= line.quantity;
        }

        let mut touched = Vec::with_capacity(remaining.len());
        for (id, left) in remaining {
            if let Some(size) = data.sizes.iter_mut().find(|s| s.id == id) {
                size.quantity = left;
                touched.push(size.clone());
            }
        }

        let created = Shipment {
            id: ShipmentId::new(data.next_shipment_id),
            recipient: request.recipient.clone(),
            courier: request.courier.clone(),
            user_id: shipment.user_id,
            user_name: shipment.user_name.clone(),
            created_at: Utc::now(),
            lines: request
                .lines
                .iter()
                .map(|l| ShipmentLine {
                    sample_code: l.sample_code.clone(),
                    size_label: l.size_label.clone(),
                    quantity: l.quantity,
                })
                .collect(),
        };
        data.next_shipment_id += 1;
        data.shipments.push(created.clone());
        Ok((created, touched))
    }
}

impl UserStore for MemoryStore {
    async fn list_users(&self) -> Result<Vec<UserSummary>, RepositoryError> {
        Ok(self.data().users.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserSummary>, RepositoryError> {
        Ok(self
            .data()
            .users
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone()))
    }

    async fn find_credentials(
        &self,
        name: &str,
    ) -> Result<Option<(UserSummary, String)>, RepositoryError> {
        Ok(self
            .data()
            .users
            .iter()
            .find(|(u, _)| u.name == name)
            .cloned())
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .data()
            .users
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(_, hash)| hash.clone()))
    }

    async fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserSummary, RepositoryError> {
        let mut data = self.data();
        if data.name_taken(name, None) {
            return Err(RepositoryError::Conflict(
                "user name already exists".to_owned(),
            ));
        }
        let user = UserSummary {
            id: UserId::new(data.next_user_id),
            name: name.to_owned(),
            role,
        };
        data.next_user_id += 1;
        data.users.push((user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<UserSummary, RepositoryError> {
        let mut data = self.data();
        let (user, _) = data.user_mut(id)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), RepositoryError> {
        let mut data = self.data();
        let (_, hash) = data.user_mut(id)?;
        password_hash.clone_into(hash);
        Ok(())
    }

    async fn rename_user(&self, id: UserId, name: &str) -> Result<UserSummary, RepositoryError> {
        let mut data = self.data();
        if data.name_taken(name, Some(id)) {
            return Err(RepositoryError::Conflict(
                "user name already exists".to_owned(),
            ));
        }
        let (user, _) = data.user_mut(id)?;
        name.clone_into(&mut user.name);
        let renamed = user.clone();
        for shipment in data.shipments.iter_mut().filter(|s| s.user_id == id) {
            name.clone_into(&mut shipment.user_name);
        }
        Ok(renamed)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut data = self.data();
        let before = data.users.len();
        data.users.retain(|(u, _)| u.id != id);
        if data.users.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sample_depot_core::{ShelfPlacement, ShipmentLineRequest, ShipmentRequest};

    use super::*;

    fn placement(shelf: &str, section: i32, level: i32) -> ShelfPlacement {
        ShelfPlacement {
            shelf_id: shelf.to_owned(),
            section,
            level,
        }
    }

    async fn store_with_box() -> MemoryStore {
        let store = MemoryStore::new();
        for code in ["A123", "B200"] {
            store
                .insert_sample(&Sample {
                    code: code.to_owned(),
                    description: None,
                    image: sample_depot_core::MISSING_IMAGE.to_owned(),
                })
                .await
                .ok();
        }
        for (code, label) in [("A123", "M"), ("B200", "L")] {
            store
                .insert_size(&NewSize {
                    sample_code: code.to_owned(),
                    box_number: "B7".to_owned(),
                    size_label: label.to_owned(),
                    quantity: 5,
                    placement: placement("S1", 2, 1),
                })
                .await
                .ok();
        }
        store
    }

    #[tokio::test]
    async fn test_assign_spreads_placement_over_box() {
        let store = store_with_box().await;
        let touched = store
            .update_size(
                SizeId::new(1),
                &SizeChange::Assign {
                    box_number: "B7".to_owned(),
                    size_label: "M".to_owned(),
                    quantity: 5,
                    placement: placement("S2", 3, 1),
                },
            )
            .await
            .unwrap_or_default();
        assert_eq!(touched.len(), 2);
        assert!(touched.iter().all(|s| s.placement == Some(placement("S2", 3, 1))));
    }

    #[tokio::test]
    async fn test_clear_touches_only_target() {
        let store = store_with_box().await;
        let touched = store
            .update_size(SizeId::new(2), &SizeChange::Clear { size_label: None })
            .await
            .unwrap_or_default();
        assert_eq!(touched.len(), 1);
        let cleared = touched.first().cloned();
        assert_eq!(cleared.as_ref().map(|s| s.quantity), Some(0));
        assert_eq!(cleared.as_ref().and_then(|s| s.box_number.clone()), None);
        assert_eq!(cleared.map(|s| s.size_label), Some("L".to_owned()));
    }

    #[tokio::test]
    async fn test_rename_moves_sizes() {
        let store = store_with_box().await;
        assert!(store.rename_sample("A123", "A124").await.is_ok());
        assert!(store.sizes_of("A123").await.unwrap_or_default().is_empty());
        assert_eq!(store.sizes_of("A124").await.unwrap_or_default().len(), 1);
        assert!(matches!(
            store.rename_sample("A124", "B200").await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_shipment_changes_nothing() {
        let store = store_with_box().await;
        let request = ShipmentRequest {
            recipient: "Studio Rossi".to_owned(),
            courier: "DHL".to_owned(),
            lines: vec![
                ShipmentLineRequest {
                    sample_code: "A123".to_owned(),
                    size_label: "M".to_owned(),
                    box_number: "B7".to_owned(),
                    quantity: 3,
                },
                ShipmentLineRequest {
                    sample_code: "A123".to_owned(),
                    size_label: "M".to_owned(),
                    box_number: "B7".to_owned(),
                    quantity: 3,
                },
            ],
        };
        let result = store
            .create_shipment(&NewShipment {
                user_id: UserId::new(1),
                user_name: "admin".to_owned(),
                request,
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(store.list_shipments().await.unwrap_or_default().is_empty());
        let sizes = store.sizes_of("A123").await.unwrap_or_default();
        assert_eq!(sizes.first().map(|s| s.quantity), Some(5));
    }

    #[tokio::test]
    async fn test_duplicate_size_in_box_conflicts() {
        let store = store_with_box().await;
        let duplicate = store
            .insert_size(&NewSize {
                sample_code: "A123".to_owned(),
                box_number: "B7".to_owned(),
                size_label: "M".to_owned(),
                quantity: 1,
                placement: placement("S1", 2, 1),
            })
            .await;
        assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));

        // clearing leaves no box, so the label is free again
        assert!(
            store
                .update_size(SizeId::new(1), &SizeChange::Clear { size_label: None })
                .await
                .is_ok()
        );
        assert!(
            store
                .insert_size(&NewSize {
                    sample_code: "A123".to_owned(),
                    box_number: "B7".to_owned(),
                    size_label: "M".to_owned(),
                    quantity: 1,
                    placement: placement("S1", 2, 1),
                })
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_user_rename_rewrites_shipment_history() {
        let store = store_with_box().await;
        let anna = match store.insert_user("anna", "hash", Role::User).await {
            Ok(user) => user,
            Err(e) => panic!("insert failed: {e}"),
        };
        let shipped = store
            .create_shipment(&NewShipment {
                user_id: anna.id,
                user_name: anna.name.clone(),
                request: ShipmentRequest {
                    recipient: "Studio Rossi".to_owned(),
                    courier: "DHL".to_owned(),
                    lines: vec![ShipmentLineRequest {
                        sample_code: "A123".to_owned(),
                        size_label: "M".to_owned(),
                        box_number: "B7".to_owned(),
                        quantity: 1,
                    }],
                },
            })
            .await;
        assert!(shipped.is_ok());

        assert!(store.rename_user(anna.id, "anna.b").await.is_ok());
        let names: Vec<_> = store
            .list_shipments()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.user_name)
            .collect();
        assert_eq!(names, vec!["anna.b".to_owned()]);
    }

    #[tokio::test]
    async fn test_duplicate_user_name_conflicts() {
        let store = MemoryStore::new();
        assert!(store.insert_user("anna", "hash", Role::User).await.is_ok());
        assert!(matches!(
            store.insert_user("anna", "hash", Role::Admin).await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}
