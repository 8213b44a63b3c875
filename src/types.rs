//! Catalog entities and their identifiers.
//!
//! These are the snapshots the catalog hands back to callers and the rows it
//! persists to the JSON data file, so every type here is serde-serializable.
//! Relations are held as ids; the catalog resolves them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Make`].
    MakeId
);
entity_id!(
    /// Identifier of a [`CarModel`].
    CarModelId
);
entity_id!(FeatureCategoryId);
entity_id!(FeatureId);
entity_id!(
    /// Identifier of a [`Car`].
    CarId
);
entity_id!(CarImageId);
entity_id!(ChannelId);
entity_id!(PublicationLogId);

/// A manufacturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Make {
    pub id: MakeId,
    pub title: String,
    pub slug: String,
}

/// A model produced by a [`Make`]. Titles and slugs are unique per make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarModel {
    pub id: CarModelId,
    pub make: MakeId,
    pub title: String,
    pub slug: String,
}

/// Groups features in listings ("Comfort", "Safety", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCategory {
    pub id: FeatureCategoryId,
    pub title: String,
    pub slug: String,
}

/// A single equipment item such as heated seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub category: FeatureCategoryId,
    pub title: String,
    pub slug: String,
}

/// Lifecycle stage of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    #[default]
    Draft,
    Review,
    Ready,
    Published,
    Archived,
}

impl CarStatus {
    pub const ALL: [CarStatus; 5] = [
        CarStatus::Draft,
        CarStatus::Review,
        CarStatus::Ready,
        CarStatus::Published,
        CarStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CarStatus::Draft => "draft",
            CarStatus::Review => "review",
            CarStatus::Ready => "ready",
            CarStatus::Published => "published",
            CarStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for CarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CarStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CarStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown car status '{s}'"))
    }
}

/// Descriptive attributes of a car that the catalog stores as given.
///
/// Split out of [`Car`] so drafts and persisted records share one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarAttributes {
    pub title: String,
    #[serde(default)]
    pub vin: String,
    pub make: MakeId,
    pub model: CarModelId,
    #[serde(default)]
    pub generation: String,
    pub manufacture_year: u16,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub mileage_km: u32,
    #[serde(default)]
    pub body_type: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub transmission: String,
    #[serde(default)]
    pub drive_type: String,
    #[serde(default)]
    pub fuel_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_capacity_l: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_power_hp: Option<u32>,
    #[serde(default = "default_owners_count")]
    pub owners_count: u16,
    #[serde(default = "default_true")]
    pub customs_cleared: bool,
    #[serde(default)]
    pub description: String,
    pub contact_name: String,
    pub contact_phone: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub status: CarStatus,
    #[serde(default)]
    pub features: BTreeSet<FeatureId>,
}

pub fn default_currency() -> String {
    "BYN".to_string()
}

fn default_owners_count() -> u16 {
    1
}

fn default_true() -> bool {
    true
}

impl CarAttributes {
    /// Minimal attribute set; everything else takes its default.
    pub fn new(
        title: impl Into<String>,
        make: MakeId,
        model: CarModelId,
        manufacture_year: u16,
        price: Decimal,
    ) -> Self {
        Self {
            title: title.into(),
            vin: String::new(),
            make,
            model,
            generation: String::new(),
            manufacture_year,
            price,
            currency: default_currency(),
            mileage_km: 0,
            body_type: String::new(),
            color: String::new(),
            transmission: String::new(),
            drive_type: String::new(),
            fuel_type: String::new(),
            engine_capacity_l: None,
            engine_power_hp: None,
            owners_count: default_owners_count(),
            customs_cleared: true,
            description: String::new(),
            contact_name: String::new(),
            contact_phone: String::new(),
            contact_email: String::new(),
            status: CarStatus::Draft,
            features: BTreeSet::new(),
        }
    }
}

/// A persisted car listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    /// Unique, assigned once on creation and never recomputed.
    pub slug: String,
    #[serde(flatten)]
    pub attributes: CarAttributes,
    pub status_changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Car {
    pub fn status(&self) -> CarStatus {
        self.attributes.status
    }
}

/// Where a stored photo payload lives inside the media store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadRef(pub String);

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A photo attached to a car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarImage {
    pub id: CarImageId,
    pub car: CarId,
    pub payload: PayloadRef,
    #[serde(default)]
    pub caption: String,
    /// At most one image per car has this set.
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub ordering: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An external marketplace a listing can be submitted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationChannel {
    pub id: ChannelId,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub active: bool,
    /// API links, data requirements, moderator contacts.
    #[serde(default)]
    pub integration_notes: String,
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationResult {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PublicationResult {
    pub fn as_str(self) -> &'static str {
        match self {
            PublicationResult::Pending => "pending",
            PublicationResult::Success => "success",
            PublicationResult::Failed => "failed",
        }
    }
}

impl fmt::Display for PublicationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PublicationResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PublicationResult::Pending),
            "success" => Ok(PublicationResult::Success),
            "failed" => Ok(PublicationResult::Failed),
            other => Err(format!("unknown publication result '{other}'")),
        }
    }
}

/// Append-only record of a submission of `car` to `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationLog {
    pub id: PublicationLogId,
    pub car: CarId,
    pub channel: ChannelId,
    #[serde(default)]
    pub external_id: String,
    pub status: PublicationResult,
    #[serde(default)]
    pub error_message: String,
    /// When the marketplace reports the listing went live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
