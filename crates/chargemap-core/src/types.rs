use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{ChargemapError, Result};
use crate::geo;

// =============================================================================
// Charge points
// =============================================================================

/// A physical charging location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChargePoint {
    pub id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub location: String,
}

/// Payload for creating a charge point. Every field is required.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NewChargePoint {
    #[serde(deserialize_with = "coordinate")]
    pub lat: f64,
    #[serde(deserialize_with = "coordinate")]
    pub lng: f64,
    pub location: String,
}

impl NewChargePoint {
    pub fn validate(&self) -> Result<()> {
        geo::validate_coordinates(self.lat, self.lng)?;
        validate_location(&self.location)
    }
}

/// Partial update. Absent (or `null`) fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ChargePointPatch {
    #[serde(default, deserialize_with = "optional_coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "optional_coordinate")]
    pub lng: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ChargePointPatch {
    pub fn is_empty(&self) -> bool {
        self.lat.is_none() && self.lng.is_none() && self.location.is_none()
    }

    /// Apply the patch to a copy of `current`. The id is never changed.
    pub fn apply(&self, current: &ChargePoint) -> ChargePoint {
        ChargePoint {
            id: current.id,
            lat: self.lat.unwrap_or(current.lat),
            lng: self.lng.unwrap_or(current.lng),
            location: self
                .location
                .clone()
                .unwrap_or_else(|| current.location.clone()),
        }
    }

    /// Validate the fields that are present.
    pub fn validate(&self) -> Result<()> {
        if let Some(lat) = self.lat {
            geo::validate_latitude(lat)?;
        }
        if let Some(lng) = self.lng {
            geo::validate_longitude(lng)?;
        }
        if let Some(location) = &self.location {
            validate_location(location)?;
        }
        Ok(())
    }
}

fn validate_location(location: &str) -> Result<()> {
    if location.trim().is_empty() {
        return Err(ChargemapError::Validation(
            "location must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Coordinates arrive either as JSON numbers or numeric strings
/// (`"40.7453297"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> std::result::Result<f64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid coordinate '{}'", s))),
        }
    }
}

fn coordinate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.into_f64()
}

fn optional_coordinate<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_f64)
        .transpose()
}

// =============================================================================
// Users and tokens
// =============================================================================

/// A registered account, including the stored password hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a [`User`]; never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRead {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
}

impl From<&User> for UserRead {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            is_verified: user.is_verified,
        }
    }
}

/// What a stored token grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Bearer token returned by login.
    Access,
    /// One-shot token for the reset-password flow.
    ResetPassword,
    /// One-shot token for email verification.
    Verify,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::ResetPassword => "reset_password",
            TokenPurpose::Verify => "verify",
        }
    }
}

impl std::str::FromStr for TokenPurpose {
    type Err = ChargemapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "access" => Ok(TokenPurpose::Access),
            "reset_password" => Ok(TokenPurpose::ResetPassword),
            "verify" => Ok(TokenPurpose::Verify),
            other => Err(ChargemapError::Storage(format!(
                "Unknown token purpose '{}'",
                other
            ))),
        }
    }
}
