//! Declared dependencies and their routing tags.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::coordinates::{Coordinates, CoordinatesError};
use crate::hash::{DigestError, Sha256Digest};

/// Routing tag that pairs a declared entity with the loader phase that
/// understands it.
///
/// # Example
///
/// ```
/// use hdl_schema::EntityKind;
///
/// assert_eq!(EntityKind::MAVEN, EntityKind::new("maven"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    /// Artifacts fetched from a repository using the standard layout.
    pub const MAVEN: Self = Self(Cow::Borrowed("maven"));

    /// Create a kind from any string.
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self(kind.into())
    }

    /// Return the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityKind {
    fn default() -> Self {
        Self::MAVEN
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while building a [`ProviderEntity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// The coordinates could not be parsed.
    #[error(transparent)]
    Coordinates(#[from] CoordinatesError),

    /// The declared checksum is malformed.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// The target module name is empty.
    #[error("Entity {0} has an empty target")]
    EmptyTarget(String),
}

/// One declared external dependency.
///
/// Immutable once built: coordinates identify the artifact, `target` names
/// the in-process module it satisfies, and the optional digest pins the
/// exact bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderEntity {
    /// Routing tag.
    #[serde(default)]
    pub kind: EntityKind,
    /// Artifact identity.
    pub coordinates: Coordinates,
    /// Module name this artifact provides once activated.
    pub target: String,
    /// Expected digest of the artifact bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256Digest>,
}

impl ProviderEntity {
    /// Create an entity of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::EmptyTarget`] if `target` is empty.
    pub fn new(
        kind: EntityKind,
        coordinates: Coordinates,
        target: impl Into<String>,
    ) -> Result<Self, EntityError> {
        let entity = Self {
            kind,
            coordinates,
            target: target.into(),
            sha256: None,
        };
        entity.validate()?;
        Ok(entity)
    }

    /// Shorthand for a [`EntityKind::MAVEN`] entity parsed from a coordinate
    /// string.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if the coordinates do not parse or the target
    /// is empty.
    pub fn maven(coordinates: &str, target: impl Into<String>) -> Result<Self, EntityError> {
        Self::new(EntityKind::MAVEN, coordinates.parse()?, target)
    }

    /// Pin the expected digest of the artifact.
    pub fn with_sha256(mut self, digest: Sha256Digest) -> Self {
        self.sha256 = Some(digest);
        self
    }

    /// Check the invariants that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::EmptyTarget`] if `target` is blank.
    pub fn validate(&self) -> Result<(), EntityError> {
        if self.target.trim().is_empty() {
            return Err(EntityError::EmptyTarget(self.coordinates.to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Display for ProviderEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.coordinates, self.target)
    }
}

/// Compile-time form of a [`ProviderEntity`], suitable for `const` slices
/// attached to a type.
///
/// # Example
///
/// ```
/// use hdl_schema::Declaration;
///
/// const GSON: Declaration = Declaration::maven("com.google.code.gson:gson:2.10.1", "gson");
/// let entity = GSON.to_entity().unwrap();
/// assert_eq!(entity.target, "gson");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    /// Routing tag.
    pub kind: &'static str,
    /// Coordinates in `group:artifact:version[:classifier]` form.
    pub coordinates: &'static str,
    /// Module name the artifact provides.
    pub target: &'static str,
    /// Optional pinned digest.
    pub sha256: Option<&'static str>,
}

impl Declaration {
    /// Declare a [`EntityKind::MAVEN`] dependency.
    pub const fn maven(coordinates: &'static str, target: &'static str) -> Self {
        Self {
            kind: "maven",
            coordinates,
            target,
            sha256: None,
        }
    }

    /// Pin the expected digest.
    pub const fn sha256(mut self, digest: &'static str) -> Self {
        self.sha256 = Some(digest);
        self
    }

    /// Declare a dependency with an arbitrary routing tag.
    pub const fn of_kind(kind: &'static str, coordinates: &'static str, target: &'static str) -> Self {
        Self {
            kind,
            coordinates,
            target,
            sha256: None,
        }
    }

    /// Parse and validate into a runtime entity.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if the coordinates or digest are malformed or
    /// the target is empty.
    pub fn to_entity(&self) -> Result<ProviderEntity, EntityError> {
        let mut entity = ProviderEntity::new(
            EntityKind::new(self.kind),
            self.coordinates.parse()?,
            self.target,
        )?;
        if let Some(digest) = self.sha256 {
            entity = entity.with_sha256(Sha256Digest::new(digest)?);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_carries_kind_and_digest() {
        const NATIVE: Declaration = Declaration::of_kind("native", "org.lwjgl:lwjgl:3.3.3", "lwjgl")
            .sha256("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");

        let entity = NATIVE.to_entity().unwrap();
        assert_eq!(entity.kind, EntityKind::new("native"));
        assert!(entity.sha256.is_some());
    }

    #[test]
    fn test_empty_target_is_rejected() {
        let err = ProviderEntity::maven("org.example:lib:1.0", "  ").unwrap_err();
        assert!(matches!(err, EntityError::EmptyTarget(_)));
    }

    #[test]
    fn test_entity_from_toml_defaults_to_maven() {
        let entity: ProviderEntity = toml::from_str(
            r#"
            coordinates = "org.slf4j:slf4j-api:2.0.9"
            target = "org.slf4j"
            "#,
        )
        .unwrap();
        assert_eq!(entity.kind, EntityKind::MAVEN);
        assert_eq!(entity.coordinates.artifact(), "slf4j-api");
    }
}
