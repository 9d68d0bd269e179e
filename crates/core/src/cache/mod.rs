//! Client-side mirror of server state, kept current by applying [`ServerEvent`]s.
//!
//! A client fills the cache once from the REST API ([`Snapshot`]) and from then
//! on feeds every pushed event to [`ClientCache::apply`]. The rules are:
//!
//! - "added" events insert only when the key is absent, so duplicate delivery
//!   and a locally inserted copy are both harmless;
//! - a sample rename is located by the old code and re-keys everything that
//!   hangs off it (cached sizes, draft rows);
//! - deletions cascade to dependent cached entries;
//! - search results, option lists and filters are computed from the cache on
//!   every call and never stored;
//! - draft rows invalidated by a size change are cleared, not left stale.

mod draft;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use draft::{DraftLine, ShipmentDraft};

use crate::events::{SampleUpdate, ServerEvent};
use crate::types::{Role, Sample, ShelfPlacement, Shipment, Size, SizeId, UserId, UserSummary};

/// Initial state fetched from the server before events are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub samples: Vec<Sample>,
    pub sizes: Vec<Size>,
    pub shipments: Vec<Shipment>,
    pub users: Vec<UserSummary>,
    pub current_user: Option<UserSummary>,
}

/// What applying an event did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The event was already reflected, or concerned nothing cached.
    Unchanged,
    Changed,
    /// The current user's role changed.
    RoleChanged(Role),
    /// The current user was logged out by the server.
    LoggedOut { reason: String },
}

impl Applied {
    const fn from_changed(changed: bool) -> Self {
        if changed { Self::Changed } else { Self::Unchanged }
    }
}

/// A box and where it sits, as listed in box pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxLocation {
    pub box_number: String,
    pub placement: Option<ShelfPlacement>,
}

/// Distinct values offered by the shipment history filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentFilters {
    pub recipients: Vec<String>,
    pub couriers: Vec<String>,
    pub users: Vec<String>,
}

/// Local mirror of the entities a client displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCache {
    samples: Vec<Sample>,
    /// Sizes grouped by owning sample code.
    sizes: BTreeMap<String, Vec<Size>>,
    /// Newest first.
    shipments: Vec<Shipment>,
    users: Vec<UserSummary>,
    current_user: Option<UserSummary>,
    db_connected: bool,
    draft: ShipmentDraft,
}

impl ClientCache {
    /// Build a cache from an initial fetch.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut sizes: BTreeMap<String, Vec<Size>> = BTreeMap::new();
        for size in snapshot.sizes {
            sizes.entry(size.sample_code.clone()).or_default().push(size);
        }
        Self {
            samples: snapshot.samples,
            sizes,
            shipments: snapshot.shipments,
            users: snapshot.users,
            current_user: snapshot.current_user,
            db_connected: true,
            draft: ShipmentDraft::new(),
        }
    }

    /// Replace the cached sizes of one sample (lazy per-sample fetch).
    pub fn load_sizes(&mut self, code: &str, sizes: Vec<Size>) {
        self.sizes.insert(code.to_owned(), sizes);
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn sample(&self, code: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.code == code)
    }

    /// Cached sizes of a sample (empty if none are cached).
    #[must_use]
    pub fn sizes_of(&self, code: &str) -> &[Size] {
        self.sizes.get(code).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn size(&self, id: SizeId) -> Option<&Size> {
        self.sizes.values().flatten().find(|s| s.id == id)
    }

    #[must_use]
    pub fn shipments(&self) -> &[Shipment] {
        &self.shipments
    }

    #[must_use]
    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    #[must_use]
    pub const fn current_user(&self) -> Option<&UserSummary> {
        self.current_user.as_ref()
    }

    #[must_use]
    pub const fn db_connected(&self) -> bool {
        self.db_connected
    }

    #[must_use]
    pub const fn draft(&self) -> &ShipmentDraft {
        &self.draft
    }

    pub const fn draft_mut(&mut self) -> &mut ShipmentDraft {
        &mut self.draft
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    /// Samples whose code or description contains `term` (case-insensitive).
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&Sample> {
        let term = term.to_lowercase();
        self.samples
            .iter()
            .filter(|s| {
                s.code.to_lowercase().contains(&term)
                    || s
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            })
            .collect()
    }

    /// Every known box with its placement, first occurrence wins.
    #[must_use]
    pub fn boxes(&self) -> Vec<BoxLocation> {
        let mut boxes: Vec<BoxLocation> = Vec::new();
        for size in self.sizes.values().flatten() {
            let Some(box_number) = size.box_number.as_deref() else {
                continue;
            };
            if !boxes.iter().any(|b| b.box_number == box_number) {
                boxes.push(BoxLocation {
                    box_number: box_number.to_owned(),
                    placement: size.placement.clone(),
                });
            }
        }
        boxes
    }

    /// Distinct recipients, couriers and user names across cached shipments.
    #[must_use]
    pub fn shipment_filters(&self) -> ShipmentFilters {
        fn push_unique(values: &mut Vec<String>, value: &str) {
            if !values.iter().any(|v| v == value) {
                values.push(value.to_owned());
            }
        }

        let mut filters = ShipmentFilters::default();
        for shipment in &self.shipments {
            push_unique(&mut filters.recipients, &shipment.recipient);
            push_unique(&mut filters.couriers, &shipment.courier);
            push_unique(&mut filters.users, &shipment.user_name);
        }
        filters
    }

    /// Size labels offered for a draft row.
    #[must_use]
    pub fn draft_size_options(&self, index: usize) -> Vec<String> {
        self.draft.size_options(index, self.draft_sizes(index))
    }

    /// Boxes offered for a draft row.
    #[must_use]
    pub fn draft_box_options(&self, index: usize) -> Vec<String> {
        self.draft.box_options(index, self.draft_sizes(index))
    }

    /// Quantities offered for a draft row.
    #[must_use]
    pub fn draft_quantity_options(&self, index: usize) -> Vec<i32> {
        self.draft.quantity_options(index, self.draft_sizes(index))
    }

    fn draft_sizes(&self, index: usize) -> &[Size] {
        self.draft
            .line(index)
            .and_then(|l| l.sample_code.as_deref())
            .map_or(&[], |code| self.sizes_of(code))
    }

    // =========================================================================
    // Event application
    // =========================================================================

    /// Patch the cache with one pushed event.
    pub fn apply(&mut self, event: &ServerEvent) -> Applied {
        match event {
            ServerEvent::SampleAdded(sample) => Applied::from_changed(self.add_sample(sample)),
            ServerEvent::SampleUpdated(update) => Applied::from_changed(self.update_sample(update)),
            ServerEvent::SampleDeleted { code } => Applied::from_changed(self.delete_sample(code)),
            ServerEvent::SizeAdded(size) => Applied::from_changed(self.add_size(size)),
            ServerEvent::SizeUpdated(size) => Applied::from_changed(self.update_size(size)),
            ServerEvent::SizeDeleted { id } => Applied::from_changed(self.delete_size(*id)),
            ServerEvent::ShippingCreated(shipment) => {
                Applied::from_changed(self.add_shipment(shipment))
            }
            ServerEvent::UserAdded(user) => Applied::from_changed(self.add_user(user)),
            ServerEvent::UserDeleted { id } => {
                let before = self.users.len();
                self.users.retain(|u| u.id != *id);
                Applied::from_changed(self.users.len() != before)
            }
            ServerEvent::RoleUpdated { id, role } => {
                Applied::from_changed(self.set_user_role(*id, *role))
            }
            ServerEvent::RoleChanged { role } => match self.current_user.as_mut() {
                Some(user) => {
                    user.role = *role;
                    if let Some(listed) = self.users.iter_mut().find(|u| u.id == user.id) {
                        listed.role = *role;
                    }
                    Applied::RoleChanged(*role)
                }
                None => Applied::Unchanged,
            },
            ServerEvent::UserRenamed { id, name } => {
                Applied::from_changed(self.rename_user(*id, name))
            }
            ServerEvent::ForceLogout { reason } => {
                self.current_user = None;
                Applied::LoggedOut {
                    reason: reason.clone(),
                }
            }
            ServerEvent::DbStatus { connected } => {
                let changed = self.db_connected != *connected;
                self.db_connected = *connected;
                Applied::from_changed(changed)
            }
        }
    }

    fn add_sample(&mut self, sample: &Sample) -> bool {
        if self.sample(&sample.code).is_some() {
            return false;
        }
        self.samples.push(sample.clone());
        true
    }

    fn update_sample(&mut self, update: &SampleUpdate) -> bool {
        match update {
            SampleUpdate::Code { old_code, new_code } => {
                let mut changed = false;
                if let Some(sample) = self.samples.iter_mut().find(|s| s.code == *old_code) {
                    sample.code.clone_from(new_code);
                    changed = true;
                }
                if let Some(mut sizes) = self.sizes.remove(old_code) {
                    for size in &mut sizes {
                        size.sample_code.clone_from(new_code);
                    }
                    self.sizes.insert(new_code.clone(), sizes);
                    changed = true;
                }
                self.draft.rename_sample(old_code, new_code) || changed
            }
            SampleUpdate::Description { code, description } => {
                match self.samples.iter_mut().find(|s| s.code == *code) {
                    Some(sample) if sample.description != *description => {
                        sample.description.clone_from(description);
                        true
                    }
                    _ => false,
                }
            }
            SampleUpdate::Image { code, image } => {
                match self.samples.iter_mut().find(|s| s.code == *code) {
                    Some(sample) if sample.image != *image => {
                        sample.image.clone_from(image);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn delete_sample(&mut self, code: &str) -> bool {
        let before = self.samples.len();
        self.samples.retain(|s| s.code != code);
        let removed_sizes = self.sizes.remove(code).is_some();
        let draft_changed = self.draft.forget_sample(code);
        self.samples.len() != before || removed_sizes || draft_changed
    }

    fn add_size(&mut self, size: &Size) -> bool {
        if self.size(size.id).is_some() {
            return false;
        }
        self.sizes
            .entry(size.sample_code.clone())
            .or_default()
            .push(size.clone());
        true
    }

    fn update_size(&mut self, size: &Size) -> bool {
        let Some(sizes) = self.sizes.get_mut(&size.sample_code) else {
            return false;
        };
        let Some(existing) = sizes.iter_mut().find(|s| s.id == size.id) else {
            return false;
        };
        if *existing == *size {
            return false;
        }
        *existing = size.clone();
        self.draft.reconcile(&size.sample_code, sizes);
        true
    }

    fn delete_size(&mut self, id: SizeId) -> bool {
        let Some((code, sizes)) = self
            .sizes
            .iter_mut()
            .find(|(_, sizes)| sizes.iter().any(|s| s.id == id))
        else {
            return false;
        };
        sizes.retain(|s| s.id != id);
        self.draft.reconcile(code, sizes);
        true
    }

    fn add_shipment(&mut self, shipment: &Shipment) -> bool {
        if self.shipments.iter().any(|s| s.id == shipment.id) {
            return false;
        }
        self.shipments.insert(0, shipment.clone());
        true
    }

    fn add_user(&mut self, user: &UserSummary) -> bool {
        if self.users.iter().any(|u| u.id == user.id) {
            return false;
        }
        self.users.push(user.clone());
        true
    }

    fn set_user_role(&mut self, id: UserId, role: Role) -> bool {
        match self.users.iter_mut().find(|u| u.id == id) {
            Some(user) if user.role != role => {
                user.role = role;
                true
            }
            _ => false,
        }
    }

    fn rename_user(&mut self, id: UserId, name: &str) -> bool {
        let mut changed = false;
        for user in self
            .users
            .iter_mut()
            .chain(self.current_user.as_mut())
            .filter(|u| u.id == id && u.name != name)
        {
            name.clone_into(&mut user.name);
            changed = true;
        }
        for shipment in self
            .shipments
            .iter_mut()
            .filter(|s| s.user_id == id && s.user_name != name)
        {
            name.clone_into(&mut shipment.user_name);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(code: &str) -> Sample {
        Sample {
            code: code.to_owned(),
            description: Some(format!("{code} description")),
            image: crate::types::MISSING_IMAGE.to_owned(),
        }
    }

    fn size(id: i32, code: &str, label: &str, box_number: &str, quantity: i32) -> Size {
        Size {
            id: SizeId::new(id),
            sample_code: code.to_owned(),
            box_number: Some(box_number.to_owned()),
            size_label: label.to_owned(),
            quantity,
            placement: Some(ShelfPlacement {
                shelf_id: "S1".to_owned(),
                section: 2,
                level: 1,
            }),
        }
    }

    fn cache() -> ClientCache {
        ClientCache::from_snapshot(Snapshot {
            samples: vec![sample("A123"), sample("B200")],
            sizes: vec![size(1, "A123", "M", "B7", 5), size(2, "A123", "L", "B7", 2)],
            ..Snapshot::default()
        })
    }

    #[test]
    fn test_added_sample_is_idempotent() {
        let mut cache = cache();
        let event = ServerEvent::SampleAdded(sample("C300"));
        assert_eq!(cache.apply(&event), Applied::Changed);
        let after_first = cache.clone();
        assert_eq!(cache.apply(&event), Applied::Unchanged);
        assert_eq!(cache, after_first);
        assert_eq!(cache.samples().len(), 3);
    }

    #[test]
    fn test_rename_rekeys_sizes_and_draft() {
        let mut cache = cache();
        cache.draft_mut().select_sample(0, Some("A123".to_owned()));
        let applied = cache.apply(&ServerEvent::SampleUpdated(SampleUpdate::Code {
            old_code: "A123".to_owned(),
            new_code: "A124".to_owned(),
        }));
        assert_eq!(applied, Applied::Changed);
        assert!(cache.sample("A123").is_none());
        assert_eq!(cache.sample("A124").map(|s| s.description.clone()), Some(Some("A123 description".to_owned())));
        assert!(cache.sizes_of("A123").is_empty());
        assert!(cache.sizes_of("A124").iter().all(|s| s.sample_code == "A124"));
        assert_eq!(cache.sizes_of("A124").len(), 2);
        assert_eq!(
            cache.draft().line(0).and_then(|l| l.sample_code.clone()).as_deref(),
            Some("A124")
        );
    }

    #[test]
    fn test_description_merge_keeps_other_fields() {
        let mut cache = cache();
        cache.apply(&ServerEvent::SampleUpdated(SampleUpdate::Description {
            code: "B200".to_owned(),
            description: None,
        }));
        let b200 = cache.sample("B200").cloned();
        assert_eq!(b200.as_ref().and_then(|s| s.description.clone()), None);
        assert_eq!(b200.map(|s| s.image), Some(crate::types::MISSING_IMAGE.to_owned()));
    }

    #[test]
    fn test_sample_delete_cascades() {
        let mut cache = cache();
        cache.draft_mut().select_sample(0, Some("A123".to_owned()));
        let applied = cache.apply(&ServerEvent::SampleDeleted {
            code: "A123".to_owned(),
        });
        assert_eq!(applied, Applied::Changed);
        assert!(cache.sample("A123").is_none());
        assert!(cache.sizes_of("A123").is_empty());
        assert!(cache.size(SizeId::new(1)).is_none());
        assert_eq!(cache.draft().line(0), Some(&DraftLine::default()));
    }

    #[test]
    fn test_size_added_once() {
        let mut cache = cache();
        let event = ServerEvent::SizeAdded(size(3, "B200", "S", "B9", 4));
        assert_eq!(cache.apply(&event), Applied::Changed);
        assert_eq!(cache.apply(&event), Applied::Unchanged);
        assert_eq!(cache.sizes_of("B200").len(), 1);
    }

    #[test]
    fn test_size_update_clears_stale_draft_quantity() {
        let mut cache = cache();
        let draft = cache.draft_mut();
        draft.select_sample(0, Some("A123".to_owned()));
        draft.select_size(0, Some("M".to_owned()));
        draft.select_box(0, Some("B7".to_owned()));
        draft.select_quantity(0, Some(4));

        let applied = cache.apply(&ServerEvent::SizeUpdated(size(1, "A123", "M", "B7", 3)));
        assert_eq!(applied, Applied::Changed);
        assert_eq!(cache.size(SizeId::new(1)).map(|s| s.quantity), Some(3));
        assert_eq!(cache.draft().line(0).and_then(|l| l.quantity), None);
        assert_eq!(cache.draft_quantity_options(0), vec![1, 2, 3]);
    }

    #[test]
    fn test_size_delete_resets_draft_selection() {
        let mut cache = cache();
        let draft = cache.draft_mut();
        draft.select_sample(0, Some("A123".to_owned()));
        draft.select_size(0, Some("L".to_owned()));
        draft.select_box(0, Some("B7".to_owned()));

        assert_eq!(cache.apply(&ServerEvent::SizeDeleted { id: SizeId::new(2) }), Applied::Changed);
        assert_eq!(cache.apply(&ServerEvent::SizeDeleted { id: SizeId::new(2) }), Applied::Unchanged);
        let line = cache.draft().line(0).cloned().unwrap_or_default();
        assert_eq!(line.size_label, None);
        assert_eq!(line.box_number, None);
        assert_eq!(cache.draft_size_options(0), vec!["M".to_owned()]);
    }

    #[test]
    fn test_search_is_computed_from_current_state() {
        let mut cache = cache();
        assert_eq!(cache.search("a12").len(), 1);
        cache.apply(&ServerEvent::SampleUpdated(SampleUpdate::Code {
            old_code: "A123".to_owned(),
            new_code: "Z999".to_owned(),
        }));
        assert!(cache.search("z99").first().is_some_and(|s| s.code == "Z999"));
        assert_eq!(cache.search("DESCRIPTION").len(), 2);
    }

    #[test]
    fn test_boxes_listed_once() {
        let cache = cache();
        let boxes = cache.boxes();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes.first().map(|b| b.box_number.as_str()), Some("B7"));
    }

    #[test]
    fn test_user_events() {
        let me = UserSummary {
            id: UserId::new(1),
            name: "anna".to_owned(),
            role: Role::User,
        };
        let mut cache = ClientCache::from_snapshot(Snapshot {
            users: vec![me.clone()],
            current_user: Some(me),
            ..Snapshot::default()
        });

        assert_eq!(
            cache.apply(&ServerEvent::RoleChanged { role: Role::Admin }),
            Applied::RoleChanged(Role::Admin)
        );
        assert_eq!(cache.current_user().map(|u| u.role), Some(Role::Admin));
        assert_eq!(cache.users().first().map(|u| u.role), Some(Role::Admin));

        cache.apply(&ServerEvent::UserRenamed {
            id: UserId::new(1),
            name: "anna.b".to_owned(),
        });
        assert_eq!(cache.current_user().map(|u| u.name.as_str()), Some("anna.b"));

        let applied = cache.apply(&ServerEvent::ForceLogout {
            reason: "account removed".to_owned(),
        });
        assert_eq!(
            applied,
            Applied::LoggedOut {
                reason: "account removed".to_owned()
            }
        );
        assert!(cache.current_user().is_none());
    }

    #[test]
    fn test_db_status_tracked() {
        let mut cache = cache();
        assert!(cache.db_connected());
        assert_eq!(cache.apply(&ServerEvent::DbStatus { connected: false }), Applied::Changed);
        assert!(!cache.db_connected());
        assert_eq!(cache.apply(&ServerEvent::DbStatus { connected: false }), Applied::Unchanged);
    }
}
