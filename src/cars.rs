//! Car records: validation, slug assignment and status bookkeeping.
//!
//! [`Catalog::save_car`] is the single write path for cars. Everything it
//! decides is made inside one critical section on the store:
//!
//! 1. **Validate** the effective make/model pair, price, currency, features
//!    and any supplied slug.
//! 2. **Slug**: derived once on create as `<make>-<model>-<vin or id>`;
//!    never recomputed afterwards.
//! 3. **published_at**: stamped the first time the car is published, then
//!    left alone forever.
//! 4. **status_changed_at**: moves only when the stored status actually
//!    changes.
//! 5. **Persist** and return the stored snapshot.
//!
//! ## Partial updates
//!
//! Passing a [`FieldSet`] copies only the declared fields from the draft onto
//! the stored record. Undeclared fields keep their stored values, and when
//! `status` is not declared the status timestamp cannot move.
//!
//! ## Caller snapshots
//!
//! Callers may hand in the record they loaded earlier as `prior`. It is only
//! checked for identity: the previous status is always read from the store
//! under the lock, so a stale snapshot cannot hide or invent a transition.

use crate::error::{CatalogError, Result};
use crate::slug::{is_slug, join, slugify};
use crate::store::{Catalog, CatalogState, bump};
use crate::types::{Car, CarAttributes, CarId, CarStatus, PayloadRef};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Attribute bag for [`Catalog::save_car`]. `id: None` creates a new car.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarDraft {
    pub id: Option<CarId>,
    /// Leave empty to have one derived on create.
    pub slug: String,
    pub attributes: CarAttributes,
}

impl CarDraft {
    pub fn create(attributes: CarAttributes) -> Self {
        Self {
            id: None,
            slug: String::new(),
            attributes,
        }
    }

    /// Draft that rewrites `car` with new attributes.
    pub fn update(car: &Car, attributes: CarAttributes) -> Self {
        Self {
            id: Some(car.id),
            slug: car.slug.clone(),
            attributes,
        }
    }
}

impl From<CarAttributes> for CarDraft {
    fn from(attributes: CarAttributes) -> Self {
        Self::create(attributes)
    }
}

impl From<&Car> for CarDraft {
    fn from(car: &Car) -> Self {
        Self::update(car, car.attributes.clone())
    }
}

macro_rules! car_fields {
    ($($variant:ident => $field:ident),* $(,)?) => {
        /// A writable attribute of a car, as named in partial updates.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum CarField {
            $($variant),*
        }

        impl CarField {
            pub const ALL: &'static [CarField] = &[$(CarField::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(CarField::$variant => stringify!($field)),*
                }
            }
        }

        /// Stored attributes with the declared fields taken from `draft`.
        fn overlay(stored: &CarAttributes, draft: CarAttributes, fields: &FieldSet) -> CarAttributes {
            let mut merged = stored.clone();
            $(
                if fields.contains(CarField::$variant) {
                    merged.$field = draft.$field;
                }
            )*
            merged
        }
    };
}

car_fields! {
    Title => title,
    Vin => vin,
    Make => make,
    Model => model,
    Generation => generation,
    ManufactureYear => manufacture_year,
    Price => price,
    Currency => currency,
    MileageKm => mileage_km,
    BodyType => body_type,
    Color => color,
    Transmission => transmission,
    DriveType => drive_type,
    FuelType => fuel_type,
    EngineCapacityL => engine_capacity_l,
    EnginePowerHp => engine_power_hp,
    OwnersCount => owners_count,
    CustomsCleared => customs_cleared,
    Description => description,
    ContactName => contact_name,
    ContactPhone => contact_phone,
    ContactEmail => contact_email,
    Status => status,
    Features => features,
}

impl FromStr for CarField {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        CarField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == name)
            .ok_or_else(|| {
                CatalogError::validation("declared_fields", format!("unknown car field '{name}'"))
            })
    }
}

/// The fields a partial update declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<CarField>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        CarField::ALL.iter().copied().collect()
    }

    pub fn contains(&self, field: CarField) -> bool {
        self.0.contains(&field)
    }

    pub fn insert(&mut self, field: CarField) -> bool {
        self.0.insert(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = CarField> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma-separated list such as `"price,status"`.
    pub fn parse(names: &str) -> Result<Self> {
        names
            .split(',')
            .filter(|name| !name.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromIterator<CarField> for FieldSet {
    fn from_iter<I: IntoIterator<Item = CarField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[CarField; N]> for FieldSet {
    fn from(fields: [CarField; N]) -> Self {
        fields.into_iter().collect()
    }
}

fn validate(state: &CatalogState, attrs: &CarAttributes) -> Result<()> {
    if attrs.title.trim().is_empty() {
        return Err(CatalogError::validation("title", "must not be empty"));
    }
    let make = state
        .makes
        .get(&attrs.make)
        .ok_or_else(|| CatalogError::validation("make", format!("make {} does not exist", attrs.make)))?;
    let model = state.car_models.get(&attrs.model).ok_or_else(|| {
        CatalogError::validation("model", format!("model {} does not exist", attrs.model))
    })?;
    if model.make != make.id {
        return Err(CatalogError::validation(
            "model",
            format!("{} does not belong to make {}", model.title, make.title),
        ));
    }
    if attrs.price < Decimal::ZERO {
        return Err(CatalogError::validation("price", "must not be negative"));
    }
    if attrs.currency.len() != 3 || !attrs.currency.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(CatalogError::validation(
            "currency",
            format!("'{}' is not a three-letter code", attrs.currency),
        ));
    }
    if let Some(missing) = attrs.features.iter().find(|f| !state.features.contains_key(f)) {
        return Err(CatalogError::validation(
            "features",
            format!("feature {missing} does not exist"),
        ));
    }
    Ok(())
}

/// `<make>-<model>-<vin or id>`, each part already in slug form.
fn derive_slug(state: &CatalogState, attrs: &CarAttributes, id: CarId) -> Result<String> {
    let make = state.make(attrs.make)?;
    let model = state.car_model(attrs.model)?;
    let part = |slug: &str, title: &str| {
        if slug.is_empty() {
            slugify(title)
        } else {
            slug.to_string()
        }
    };
    let tail = match attrs.vin.trim() {
        "" => id.to_string(),
        vin => vin.to_string(),
    };
    Ok(join(&[
        &part(&make.slug, &make.title),
        &part(&model.slug, &model.title),
        &tail,
    ]))
}

impl Catalog {
    /// Create or update a car. See the module docs for the rules applied.
    #[instrument(skip_all, fields(car = ?draft.id))]
    pub fn save_car(
        &self,
        draft: CarDraft,
        prior: Option<&Car>,
        declared: Option<&FieldSet>,
    ) -> Result<Car> {
        self.write_car(draft, prior, declared)
            .inspect_err(|e| warn!(error = %e, "rejected car write"))
    }

    fn write_car(
        &self,
        draft: CarDraft,
        prior: Option<&Car>,
        declared: Option<&FieldSet>,
    ) -> Result<Car> {
        if let Some(prior) = prior
            && Some(prior.id) != draft.id
        {
            return Err(CatalogError::validation(
                "id",
                format!("snapshot of car {} does not match the draft", prior.id),
            ));
        }
        let slug = draft.slug.trim().to_string();
        if !slug.is_empty() && !is_slug(&slug) {
            return Err(CatalogError::validation(
                "slug",
                format!("'{slug}' is not a valid slug"),
            ));
        }

        let mut state = self.lock();
        let now = self.clock.now();

        let stored = match draft.id {
            Some(id) => Some(state.car(id)?.clone()),
            None => None,
        };

        let car = match stored {
            None => {
                let attributes = draft.attributes;
                validate(&state, &attributes)?;
                let id = CarId(bump(&mut state.sequences.car));
                let slug = if slug.is_empty() {
                    derive_slug(&state, &attributes, id)?
                } else {
                    slug
                };
                debug!(car = %id, slug = %slug, "assigned slug");
                let published_at = (attributes.status == CarStatus::Published).then_some(now);
                Car {
                    id,
                    slug,
                    attributes,
                    status_changed_at: now,
                    published_at,
                    created_at: now,
                    updated_at: now,
                }
            }
            Some(stored) => {
                if let Some(prior) = prior
                    && prior.status() != stored.status()
                {
                    debug!(
                        snapshot = %prior.status(),
                        stored = %stored.status(),
                        "caller snapshot is stale, using stored status"
                    );
                }
                let attributes = match declared {
                    Some(fields) => overlay(&stored.attributes, draft.attributes, fields),
                    None => draft.attributes,
                };
                validate(&state, &attributes)?;
                if !slug.is_empty() && slug != stored.slug {
                    return Err(CatalogError::validation(
                        "slug",
                        format!("slug is fixed as '{}'", stored.slug),
                    ));
                }

                let status_declared = declared.is_none_or(|f| f.contains(CarField::Status));
                let status_changed_at =
                    if status_declared && attributes.status != stored.status() {
                        debug!(from = %stored.status(), to = %attributes.status, "status changed");
                        now
                    } else {
                        stored.status_changed_at
                    };
                let published_at = match stored.published_at {
                    Some(at) => Some(at),
                    None => (attributes.status == CarStatus::Published).then_some(now),
                };
                Car {
                    id: stored.id,
                    slug: stored.slug,
                    attributes,
                    status_changed_at,
                    published_at,
                    created_at: stored.created_at,
                    updated_at: now,
                }
            }
        };

        if state
            .cars
            .values()
            .any(|other| other.id != car.id && other.slug == car.slug)
        {
            return Err(CatalogError::constraint(format!(
                "car slug '{}' already exists",
                car.slug
            )));
        }

        state.cars.insert(car.id, car.clone());
        info!(car = %car.id, slug = %car.slug, status = %car.status(), "saved car");
        Ok(car)
    }

    /// Move a car to `status`, leaving every other field alone.
    pub fn set_car_status(&self, id: CarId, status: CarStatus) -> Result<Car> {
        let car = self.get_car(id)?;
        let mut attributes = car.attributes.clone();
        attributes.status = status;
        self.save_car(
            CarDraft::update(&car, attributes),
            Some(&car),
            Some(&FieldSet::from([CarField::Status])),
        )
    }

    pub fn get_car(&self, id: CarId) -> Result<Car> {
        self.lock().car(id).cloned()
    }

    pub fn car_by_slug(&self, slug: &str) -> Result<Car> {
        self.lock()
            .cars
            .values()
            .find(|car| car.slug == slug)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("car", slug))
    }

    /// Cars newest first, optionally only those in `status`.
    pub fn cars(&self, status: Option<CarStatus>) -> Vec<Car> {
        let mut cars: Vec<Car> = self
            .lock()
            .cars
            .values()
            .filter(|car| status.is_none_or(|s| car.status() == s))
            .cloned()
            .collect();
        cars.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        cars
    }

    /// Delete a car together with its images, their payloads and its
    /// publication logs.
    #[instrument(skip(self))]
    pub fn delete_car(&self, id: CarId) -> Result<()> {
        let mut state = self.lock();
        if state.cars.remove(&id).is_none() {
            return Err(CatalogError::not_found("car", id));
        }
        let images: Vec<_> = state.images_of(id).iter().map(|img| img.id).collect();
        let payloads: Vec<PayloadRef> = images
            .iter()
            .filter_map(|img| state.car_images.remove(img))
            .map(|img| img.payload)
            .collect();
        state.publication_logs.retain(|_, log| log.car != id);
        for payload in &payloads {
            self.release_payload(&state, payload)?;
        }
        info!(car = %id, images = payloads.len(), "deleted car");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{SteppingClock, car_attributes, seeded_catalog};
    use crate::clock::Clock;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn create_derives_slug_from_make_model_and_vin() {
        let (catalog, seed) = seeded_catalog();
        let mut attrs = car_attributes(&seed);
        attrs.vin = "WAUZZZ8K9BA012345".into();

        let car = catalog.save_car(attrs.into(), None, None).unwrap();
        assert_eq!(car.slug, "audi-a4-wauzzz8k9ba012345");
    }

    #[test]
    fn create_without_vin_uses_reserved_id() {
        let (catalog, seed) = seeded_catalog();
        let first = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        let second = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        assert_eq!(first.slug, format!("audi-a4-{}", first.id));
        assert_eq!(second.slug, format!("audi-a4-{}", second.id));
    }

    #[test]
    fn duplicate_slug_is_a_constraint_violation() {
        let (catalog, seed) = seeded_catalog();
        let mut attrs = car_attributes(&seed);
        attrs.vin = "VIN1".into();
        catalog.save_car(attrs.clone().into(), None, None).unwrap();

        let err = catalog.save_car(attrs.into(), None, None).unwrap_err();
        assert!(matches!(err, CatalogError::ConstraintViolation(_)));
    }

    #[test]
    fn slug_survives_title_and_vin_changes() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        let mut attrs = car.attributes.clone();
        attrs.title = "Audi A4 Avant".into();
        attrs.vin = "NEWVIN".into();
        let updated = catalog.save_car(CarDraft::update(&car, attrs), None, None).unwrap();
        assert_eq!(updated.slug, car.slug);
    }

    #[test]
    fn changing_slug_on_update_is_rejected() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        let mut draft = CarDraft::from(&car);
        draft.slug = "something-else".into();
        let err = catalog.save_car(draft, None, None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "slug"));
    }

    #[test]
    fn mismatched_make_and_model_is_rejected_on_create() {
        let (catalog, seed) = seeded_catalog();
        let mut attrs = car_attributes(&seed);
        attrs.model = seed.x5;

        let err = catalog.save_car(attrs.into(), None, None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "model"));
        assert!(catalog.cars(None).is_empty());
    }

    #[test]
    fn mismatched_pair_is_rejected_whatever_is_declared() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        let cases = [
            FieldSet::from([CarField::Model]),
            FieldSet::from([CarField::Make]),
            FieldSet::from([CarField::Make, CarField::Title]),
        ];
        for declared in &cases {
            let mut attrs = car.attributes.clone();
            if declared.contains(CarField::Model) {
                attrs.model = seed.x5;
            }
            if declared.contains(CarField::Make) {
                attrs.make = seed.bmw;
            }
            let err = catalog
                .save_car(CarDraft::update(&car, attrs), None, Some(declared))
                .unwrap_err();
            assert!(
                matches!(err, CatalogError::Validation { ref field, .. } if field == "model"),
                "declared {declared:?}"
            );
        }
        // full update too
        let mut attrs = car.attributes.clone();
        attrs.make = seed.bmw;
        assert!(catalog.save_car(CarDraft::update(&car, attrs), None, None).is_err());

        assert_eq!(catalog.get_car(car.id).unwrap(), car);
    }

    #[test]
    fn moving_both_make_and_model_together_is_accepted() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        let mut attrs = car.attributes.clone();
        attrs.make = seed.bmw;
        attrs.model = seed.x5;
        let moved = catalog
            .save_car(
                CarDraft::update(&car, attrs),
                None,
                Some(&FieldSet::from([CarField::Make, CarField::Model])),
            )
            .unwrap();
        assert_eq!(moved.attributes.make, seed.bmw);
        assert_eq!(moved.slug, car.slug);
    }

    #[test]
    fn negative_price_and_bad_currency_are_rejected() {
        let (catalog, seed) = seeded_catalog();

        let mut attrs = car_attributes(&seed);
        attrs.price = Decimal::new(-1, 0);
        let err = catalog.save_car(attrs.into(), None, None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "price"));

        let mut attrs = car_attributes(&seed);
        attrs.currency = "RUBL".into();
        let err = catalog.save_car(attrs.into(), None, None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "currency"));
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let (catalog, seed) = seeded_catalog();
        let mut attrs = car_attributes(&seed);
        attrs.features.insert(crate::types::FeatureId(999));
        let err = catalog.save_car(attrs.into(), None, None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "features"));
    }

    #[test]
    fn update_of_missing_car_is_not_found() {
        let (catalog, seed) = seeded_catalog();
        let draft = CarDraft {
            id: Some(CarId(77)),
            slug: String::new(),
            attributes: car_attributes(&seed),
        };
        assert!(matches!(
            catalog.save_car(draft, None, None),
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[test]
    fn prior_snapshot_of_another_car_is_rejected() {
        let (catalog, seed) = seeded_catalog();
        let a = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        let b = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        let err = catalog
            .save_car(CarDraft::from(&a), Some(&b), None)
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "id"));
    }

    #[test]
    fn create_sets_status_changed_at() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        assert_eq!(car.status_changed_at, seed.clock.now());
        assert_eq!(car.created_at, car.updated_at);
        assert_eq!(car.published_at, None);
    }

    #[test]
    fn creating_published_car_stamps_published_at() {
        let (catalog, seed) = seeded_catalog();
        let mut attrs = car_attributes(&seed);
        attrs.status = CarStatus::Published;
        let car = catalog.save_car(attrs.into(), None, None).unwrap();
        assert_eq!(car.published_at, Some(car.created_at));
    }

    #[test]
    fn price_only_update_keeps_status_changed_at() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        seed.clock.advance(Duration::hours(1));

        let mut attrs = car.attributes.clone();
        attrs.price = Decimal::new(23_500, 0);
        let updated = catalog
            .save_car(
                CarDraft::update(&car, attrs),
                Some(&car),
                Some(&FieldSet::from([CarField::Price])),
            )
            .unwrap();

        assert_eq!(updated.attributes.price, Decimal::new(23_500, 0));
        assert_eq!(updated.status_changed_at, car.status_changed_at);
        assert!(updated.updated_at > car.updated_at);
    }

    #[test]
    fn undeclared_status_is_neither_copied_nor_timestamped() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        seed.clock.advance(Duration::hours(1));

        let mut attrs = car.attributes.clone();
        attrs.status = CarStatus::Published;
        attrs.mileage_km = 120_000;
        let updated = catalog
            .save_car(
                CarDraft::update(&car, attrs),
                None,
                Some(&FieldSet::from([CarField::MileageKm])),
            )
            .unwrap();

        assert_eq!(updated.status(), CarStatus::Draft);
        assert_eq!(updated.attributes.mileage_km, 120_000);
        assert_eq!(updated.status_changed_at, car.status_changed_at);
        assert_eq!(updated.published_at, None);
    }

    #[test]
    fn resaving_same_status_keeps_timestamp() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        seed.clock.advance(Duration::minutes(10));

        let again = catalog.save_car(CarDraft::from(&car), None, None).unwrap();
        assert_eq!(again.status_changed_at, car.status_changed_at);
    }

    #[test]
    fn review_to_published_then_archived() {
        let (catalog, seed) = seeded_catalog();
        let mut attrs = car_attributes(&seed);
        attrs.status = CarStatus::Review;
        let car = catalog.save_car(attrs.into(), None, None).unwrap();

        let publish_time = seed.clock.advance(Duration::hours(2));
        let published = catalog.set_car_status(car.id, CarStatus::Published).unwrap();
        assert_eq!(published.status_changed_at, publish_time);
        assert_eq!(published.published_at, Some(publish_time));

        let archive_time = seed.clock.advance(Duration::days(3));
        let archived = catalog.set_car_status(car.id, CarStatus::Archived).unwrap();
        assert_eq!(archived.status_changed_at, archive_time);
        assert_eq!(archived.published_at, Some(publish_time));
    }

    #[test]
    fn published_at_is_write_once() {
        let (catalog, seed) = seeded_catalog();
        let car = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        let first = seed.clock.advance(Duration::hours(1));
        catalog.set_car_status(car.id, CarStatus::Published).unwrap();
        seed.clock.advance(Duration::hours(1));
        catalog.set_car_status(car.id, CarStatus::Draft).unwrap();
        seed.clock.advance(Duration::hours(1));
        let republished = catalog.set_car_status(car.id, CarStatus::Published).unwrap();

        assert_eq!(republished.published_at, Some(first));
    }

    #[test]
    fn stale_snapshot_does_not_drop_a_transition() {
        let (catalog, seed) = seeded_catalog();
        let stale = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();

        // someone else moves the car to review
        seed.clock.advance(Duration::minutes(5));
        let reviewed = catalog.set_car_status(stale.id, CarStatus::Review).unwrap();

        // caller still holds the draft snapshot and writes "draft" back
        let back_time = seed.clock.advance(Duration::minutes(5));
        let mut attrs = stale.attributes.clone();
        attrs.status = CarStatus::Draft;
        let back = catalog
            .save_car(CarDraft::update(&stale, attrs), Some(&stale), None)
            .unwrap();

        assert!(reviewed.status_changed_at < back_time);
        assert_eq!(back.status_changed_at, back_time);
    }

    #[test]
    fn field_set_parses_names() {
        let fields = FieldSet::parse("price, status").unwrap();
        assert!(fields.contains(CarField::Price));
        assert!(fields.contains(CarField::Status));
        assert!(!fields.contains(CarField::Title));
        assert!(FieldSet::parse("price,colour").is_err());
        assert_eq!(FieldSet::all().iter().count(), CarField::ALL.len());
    }

    #[test]
    fn listing_is_newest_first_and_filterable() {
        let (catalog, seed) = seeded_catalog();
        let older = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        seed.clock.advance(Duration::minutes(1));
        let newer = catalog.save_car(car_attributes(&seed).into(), None, None).unwrap();
        catalog.set_car_status(older.id, CarStatus::Ready).unwrap();

        let ids: Vec<CarId> = catalog.cars(None).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        let ready = catalog.cars(Some(CarStatus::Ready));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, older.id);
        assert_eq!(catalog.car_by_slug(&newer.slug).unwrap().id, newer.id);
    }

    #[test]
    fn last_committed_transition_carries_the_latest_stamp() {
        let (catalog, seed) = seeded_catalog();
        let clock = Arc::new(SteppingClock::new(seed.clock.now()));
        let catalog = Arc::new(catalog.with_clock(Arc::clone(&clock)));
        let car = catalog
            .save_car(car_attributes(&seed).into(), None, None)
            .unwrap();
        let id = car.id;

        // writer A parks right after reading the time
        let (entered, release) = clock.gate.arm();
        let to_review = {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || catalog.set_car_status(id, CarStatus::Review).unwrap())
        };
        entered.recv().unwrap();
        let to_ready = {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || catalog.set_car_status(id, CarStatus::Ready).unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        release.send(()).unwrap();

        let review = to_review.join().unwrap();
        let ready = to_ready.join().unwrap();
        let stored = catalog.get_car(car.id).unwrap();
        let latest = review.status_changed_at.max(ready.status_changed_at);
        assert_eq!(stored.status_changed_at, latest);
        assert_eq!(stored.updated_at, latest);
        let winner = if ready.status_changed_at == latest { &ready } else { &review };
        assert_eq!(stored.status(), winner.status());
    }
}
