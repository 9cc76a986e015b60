//! Where loader phases find their entities.
//!
//! Dependencies are declared in one of two styles, both accepted through the
//! same [`Source`]:
//!
//! - statically, as a `const` slice on a type implementing
//!   [`DeclaresDependencies`];
//! - at runtime, by a [`DependencyProvider`] that yields entities of a single
//!   [`EntityKind`].

use std::collections::HashSet;
use std::sync::Arc;

use hdl_schema::{Declaration, EntityKind, ProviderEntity};

use crate::error::ConfigError;

/// Dependencies attached to a type at compile time.
///
/// # Example
///
/// ```
/// use hdl_core::source::{DeclaresDependencies, Source};
/// use hdl_schema::{Declaration, EntityKind};
///
/// struct MyPlugin;
///
/// impl DeclaresDependencies for MyPlugin {
///     const DEPENDENCIES: &'static [Declaration] = &[
///         Declaration::maven("com.google.code.gson:gson:2.10.1", "com.google.gson"),
///     ];
/// }
///
/// let source = Source::of::<MyPlugin>();
/// assert_eq!(source.entities_for(&EntityKind::MAVEN).unwrap().len(), 1);
/// ```
pub trait DeclaresDependencies {
    /// The declared dependencies.
    const DEPENDENCIES: &'static [Declaration];
}

/// Runtime-built set of entities of one kind.
pub trait DependencyProvider: Send + Sync {
    /// Kind every yielded entity must carry.
    fn kind(&self) -> EntityKind;

    /// The declared entities.
    fn entities(&self) -> Vec<ProviderEntity>;
}

/// A plain list of entities tagged with one kind.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    kind: EntityKind,
    entities: Vec<ProviderEntity>,
}

impl StaticProvider {
    /// Create a provider of `kind` yielding `entities`.
    pub fn new(kind: EntityKind, entities: impl IntoIterator<Item = ProviderEntity>) -> Self {
        Self {
            kind,
            entities: entities.into_iter().collect(),
        }
    }
}

impl DependencyProvider for StaticProvider {
    fn kind(&self) -> EntityKind {
        self.kind.clone()
    }

    fn entities(&self) -> Vec<ProviderEntity> {
        self.entities.clone()
    }
}

#[derive(Clone)]
enum Origin {
    Declared {
        owner: &'static str,
        declarations: &'static [Declaration],
    },
    Provider(Arc<dyn DependencyProvider>),
}

/// The object a `load_all` run pulls entities from.
///
/// Cheap to clone; providers are shared.
#[derive(Clone, Default)]
pub struct Source {
    origins: Vec<Origin>,
}

impl Source {
    /// Source backed by the declarations attached to `T`.
    pub fn of<T: DeclaresDependencies>() -> Self {
        Self {
            origins: vec![Origin::Declared {
                owner: std::any::type_name::<T>(),
                declarations: T::DEPENDENCIES,
            }],
        }
    }

    /// Source backed by a single provider.
    pub fn provider(provider: impl DependencyProvider + 'static) -> Self {
        Self::default().with_provider(provider)
    }

    /// Add another provider to this source.
    pub fn with_provider(mut self, provider: impl DependencyProvider + 'static) -> Self {
        self.origins.push(Origin::Provider(Arc::new(provider)));
        self
    }

    /// Add the declarations attached to `T` to this source.
    pub fn with_declarations<T: DeclaresDependencies>(mut self) -> Self {
        self.origins.extend(Self::of::<T>().origins);
        self
    }

    /// Every kind present in the source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KindMismatch`] if a provider yields an entity
    /// whose kind differs from the provider's, or [`ConfigError::Entity`] if
    /// a declaration does not parse.
    pub fn kinds(&self) -> Result<Vec<EntityKind>, ConfigError> {
        let mut kinds = Vec::new();
        for origin in &self.origins {
            match origin {
                Origin::Declared { declarations, .. } => {
                    for declaration in *declarations {
                        push_unique(&mut kinds, declaration.to_entity()?.kind);
                    }
                }
                Origin::Provider(provider) => {
                    check_provider(provider.as_ref())?;
                    push_unique(&mut kinds, provider.kind());
                }
            }
        }
        Ok(kinds)
    }

    /// Collect the entities of `kind`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateCoordinates`] if two entities of this
    /// kind share coordinates, [`ConfigError::KindMismatch`] for a mistagged
    /// provider entity, or [`ConfigError::Entity`] for a malformed
    /// declaration.
    pub fn entities_for(&self, kind: &EntityKind) -> Result<Vec<ProviderEntity>, ConfigError> {
        let mut out = Vec::new();
        for origin in &self.origins {
            match origin {
                Origin::Declared { owner, declarations } => {
                    for declaration in *declarations {
                        let entity = declaration.to_entity()?;
                        if &entity.kind == kind {
                            tracing::trace!(owner, entity = %entity, "declared dependency");
                            out.push(entity);
                        }
                    }
                }
                Origin::Provider(provider) => {
                    if &provider.kind() == kind {
                        out.extend(check_provider(provider.as_ref())?);
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for entity in &out {
            entity.validate()?;
            if !seen.insert(&entity.coordinates) {
                return Err(ConfigError::DuplicateCoordinates(entity.coordinates.clone()));
            }
        }
        Ok(out)
    }

    /// Check that every kind in the source is accepted by one of `accepted`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unrouted`] for the first kind no phase accepts,
    /// or any error from [`Self::kinds`].
    pub fn route(&self, accepted: &[EntityKind]) -> Result<(), ConfigError> {
        for kind in self.kinds()? {
            if !accepted.contains(&kind) {
                return Err(ConfigError::Unrouted(kind));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for origin in &self.origins {
            match origin {
                Origin::Declared { owner, declarations } => {
                    list.entry(&format_args!("{owner} ({} declared)", declarations.len()));
                }
                Origin::Provider(provider) => {
                    list.entry(&format_args!("provider<{}>", provider.kind()));
                }
            }
        }
        list.finish()
    }
}

fn check_provider(provider: &dyn DependencyProvider) -> Result<Vec<ProviderEntity>, ConfigError> {
    let kind = provider.kind();
    let entities = provider.entities();
    if let Some(bad) = entities.iter().find(|e| e.kind != kind) {
        return Err(ConfigError::KindMismatch {
            provider: kind,
            coordinates: bad.coordinates.clone(),
            found: bad.kind.clone(),
        });
    }
    Ok(entities)
}

fn push_unique(kinds: &mut Vec<EntityKind>, kind: EntityKind) {
    if !kinds.contains(&kind) {
        kinds.push(kind);
    }
}
