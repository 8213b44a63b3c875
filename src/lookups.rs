//! Lookup tables: makes, models, feature categories and features.
//!
//! Slugs are derived from titles when the caller leaves them out. Makes and
//! models are protected while anything references them; deleting a feature
//! category takes its features with it, and deleting a feature removes it
//! from every car that had it.

use crate::error::{CatalogError, Result};
use crate::slug::{is_slug, slugify};
use crate::store::{Catalog, bump};
use crate::types::{
    CarModel, CarModelId, Feature, FeatureCategory, FeatureCategoryId, FeatureId, Make, MakeId,
};
use tracing::{info, instrument};

/// Use the given slug if it is well-formed, otherwise derive one from `title`.
pub(crate) fn resolve_slug(title: &str, slug: Option<&str>) -> Result<String> {
    if title.trim().is_empty() {
        return Err(CatalogError::validation("title", "must not be empty"));
    }
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(given) if is_slug(given) => Ok(given.to_string()),
        Some(given) => Err(CatalogError::validation(
            "slug",
            format!("'{given}' is not a valid slug (try '{}')", slugify(given)),
        )),
        None => {
            let derived = slugify(title);
            if derived.is_empty() {
                return Err(CatalogError::validation(
                    "slug",
                    format!("cannot derive a slug from '{title}'"),
                ));
            }
            Ok(derived)
        }
    }
}

impl Catalog {
    // =========================================================================
    // Makes
    // =========================================================================

    #[instrument(skip(self))]
    pub fn create_make(&self, title: &str, slug: Option<&str>) -> Result<Make> {
        let title = title.trim();
        let slug = resolve_slug(title, slug)?;
        let mut state = self.lock();
        if state.makes.values().any(|m| m.title == title) {
            return Err(CatalogError::constraint(format!(
                "make title '{title}' already exists"
            )));
        }
        if state.makes.values().any(|m| m.slug == slug) {
            return Err(CatalogError::constraint(format!(
                "make slug '{slug}' already exists"
            )));
        }
        let make = Make {
            id: MakeId(bump(&mut state.sequences.make)),
            title: title.to_string(),
            slug,
        };
        state.makes.insert(make.id, make.clone());
        info!(make = %make.id, slug = %make.slug, "created make");
        Ok(make)
    }

    /// Rename a make. The slug stays as it is; it may already be part of
    /// car slugs and external URLs.
    #[instrument(skip(self))]
    pub fn rename_make(&self, id: MakeId, title: &str) -> Result<Make> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CatalogError::validation("title", "must not be empty"));
        }
        let mut state = self.lock();
        state.make(id)?;
        if state.makes.values().any(|m| m.id != id && m.title == title) {
            return Err(CatalogError::constraint(format!(
                "make title '{title}' already exists"
            )));
        }
        let make = state
            .makes
            .get_mut(&id)
            .ok_or_else(|| CatalogError::not_found("make", id))?;
        make.title = title.to_string();
        Ok(make.clone())
    }

    #[instrument(skip(self))]
    pub fn delete_make(&self, id: MakeId) -> Result<()> {
        let mut state = self.lock();
        state.make(id)?;
        let models = state.car_models.values().filter(|m| m.make == id).count();
        if models > 0 {
            return Err(CatalogError::constraint(format!(
                "make {id} is referenced by {models} car model(s)"
            )));
        }
        let cars = state
            .cars
            .values()
            .filter(|c| c.attributes.make == id)
            .count();
        if cars > 0 {
            return Err(CatalogError::constraint(format!(
                "make {id} is referenced by {cars} car(s)"
            )));
        }
        state.makes.remove(&id);
        info!(make = %id, "deleted make");
        Ok(())
    }

    pub fn get_make(&self, id: MakeId) -> Result<Make> {
        self.lock().make(id).cloned()
    }

    /// All makes ordered by title.
    pub fn makes(&self) -> Vec<Make> {
        let mut makes: Vec<Make> = self.lock().makes.values().cloned().collect();
        makes.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        makes
    }

    // =========================================================================
    // Car models
    // =========================================================================

    #[instrument(skip(self))]
    pub fn create_car_model(
        &self,
        make: MakeId,
        title: &str,
        slug: Option<&str>,
    ) -> Result<CarModel> {
        let title = title.trim();
        let slug = resolve_slug(title, slug)?;
        let mut state = self.lock();
        state.make(make)?;
        let siblings = || state.car_models.values().filter(|m| m.make == make);
        if siblings().any(|m| m.title == title) {
            return Err(CatalogError::constraint(format!(
                "model '{title}' already exists for make {make}"
            )));
        }
        if siblings().any(|m| m.slug == slug) {
            return Err(CatalogError::constraint(format!(
                "model slug '{slug}' already exists for make {make}"
            )));
        }
        let model = CarModel {
            id: CarModelId(bump(&mut state.sequences.car_model)),
            make,
            title: title.to_string(),
            slug,
        };
        state.car_models.insert(model.id, model.clone());
        info!(model = %model.id, make = %make, slug = %model.slug, "created car model");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub fn delete_car_model(&self, id: CarModelId) -> Result<()> {
        let mut state = self.lock();
        state.car_model(id)?;
        let cars = state
            .cars
            .values()
            .filter(|c| c.attributes.model == id)
            .count();
        if cars > 0 {
            return Err(CatalogError::constraint(format!(
                "car model {id} is referenced by {cars} car(s)"
            )));
        }
        state.car_models.remove(&id);
        info!(model = %id, "deleted car model");
        Ok(())
    }

    pub fn get_car_model(&self, id: CarModelId) -> Result<CarModel> {
        self.lock().car_model(id).cloned()
    }

    /// All models ordered by make title, then model title.
    pub fn car_models(&self, make: Option<MakeId>) -> Vec<CarModel> {
        let state = self.lock();
        let make_title = |id: MakeId| state.makes.get(&id).map(|m| m.title.clone());
        let mut models: Vec<CarModel> = state
            .car_models
            .values()
            .filter(|m| make.is_none_or(|wanted| m.make == wanted))
            .cloned()
            .collect();
        models.sort_by(|a, b| {
            make_title(a.make)
                .cmp(&make_title(b.make))
                .then_with(|| a.title.cmp(&b.title))
                .then(a.id.cmp(&b.id))
        });
        models
    }

    // =========================================================================
    // Features
    // =========================================================================

    #[instrument(skip(self))]
    pub fn create_feature_category(
        &self,
        title: &str,
        slug: Option<&str>,
    ) -> Result<FeatureCategory> {
        let title = title.trim();
        let slug = resolve_slug(title, slug)?;
        let mut state = self.lock();
        if state.feature_categories.values().any(|c| c.slug == slug) {
            return Err(CatalogError::constraint(format!(
                "feature category slug '{slug}' already exists"
            )));
        }
        let category = FeatureCategory {
            id: FeatureCategoryId(bump(&mut state.sequences.feature_category)),
            title: title.to_string(),
            slug,
        };
        state
            .feature_categories
            .insert(category.id, category.clone());
        Ok(category)
    }

    /// Delete a category together with its features.
    #[instrument(skip(self))]
    pub fn delete_feature_category(&self, id: FeatureCategoryId) -> Result<()> {
        let mut state = self.lock();
        if state.feature_categories.remove(&id).is_none() {
            return Err(CatalogError::not_found("feature category", id));
        }
        let doomed: Vec<FeatureId> = state
            .features
            .values()
            .filter(|f| f.category == id)
            .map(|f| f.id)
            .collect();
        for feature in &doomed {
            state.features.remove(feature);
        }
        for car in state.cars.values_mut() {
            car.attributes.features.retain(|f| !doomed.contains(f));
        }
        info!(category = %id, features = doomed.len(), "deleted feature category");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn create_feature(
        &self,
        category: FeatureCategoryId,
        title: &str,
        slug: Option<&str>,
    ) -> Result<Feature> {
        let title = title.trim();
        let slug = resolve_slug(title, slug)?;
        let mut state = self.lock();
        if !state.feature_categories.contains_key(&category) {
            return Err(CatalogError::not_found("feature category", category));
        }
        if state.features.values().any(|f| f.slug == slug) {
            return Err(CatalogError::constraint(format!(
                "feature slug '{slug}' already exists"
            )));
        }
        let feature = Feature {
            id: FeatureId(bump(&mut state.sequences.feature)),
            category,
            title: title.to_string(),
            slug,
        };
        state.features.insert(feature.id, feature.clone());
        Ok(feature)
    }

    /// Delete a feature and drop it from every car's feature set.
    #[instrument(skip(self))]
    pub fn delete_feature(&self, id: FeatureId) -> Result<()> {
        let mut state = self.lock();
        if state.features.remove(&id).is_none() {
            return Err(CatalogError::not_found("feature", id));
        }
        for car in state.cars.values_mut() {
            car.attributes.features.remove(&id);
        }
        Ok(())
    }

    pub fn feature_categories(&self) -> Vec<FeatureCategory> {
        let mut categories: Vec<FeatureCategory> =
            self.lock().feature_categories.values().cloned().collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        categories
    }

    /// All features ordered by category title, then feature title.
    pub fn features(&self) -> Vec<Feature> {
        let state = self.lock();
        let category_title =
            |id: FeatureCategoryId| state.feature_categories.get(&id).map(|c| c.title.clone());
        let mut features: Vec<Feature> = state.features.values().cloned().collect();
        features.sort_by(|a, b| {
            category_title(a.category)
                .cmp(&category_title(b.category))
                .then_with(|| a.title.cmp(&b.title))
                .then(a.id.cmp(&b.id))
        });
        features
    }
}
