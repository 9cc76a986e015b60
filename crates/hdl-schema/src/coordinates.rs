//! Artifact coordinates in `group:artifact:version[:classifier]` form.

use serde::{Deserialize, Serialize};

/// File extension used when a coordinate does not name one.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Errors that can occur when parsing [`Coordinates`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatesError {
    /// The string does not have three or four `:`-separated segments.
    #[error("Invalid coordinates '{0}': expected group:artifact:version[:classifier]")]
    Shape(String),

    /// One of the segments is empty.
    #[error("Invalid coordinates '{input}': empty {segment}")]
    EmptySegment {
        /// The rejected input.
        input: String,
        /// Name of the empty segment.
        segment: &'static str,
    },

    /// A segment contains a path separator and would escape the store layout.
    #[error("Invalid coordinates '{0}': segments must not contain path separators")]
    PathSeparator(String),
}

/// Identity of one downloadable artifact.
///
/// Two coordinates are equal when every segment (including classifier and
/// extension) is equal; this is the uniqueness key within one collection.
///
/// # Example
///
/// ```
/// use hdl_schema::Coordinates;
///
/// let c: Coordinates = "com.google.code.gson:gson:2.10.1".parse().unwrap();
/// assert_eq!(c.artifact(), "gson");
/// assert_eq!(
///     c.repository_path(),
///     "com/google/code/gson/gson/2.10.1/gson-2.10.1.jar"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinates {
    group: String,
    artifact: String,
    version: String,
    classifier: Option<String>,
    extension: String,
}

impl Coordinates {
    /// Build coordinates from their parts, validating each segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatesError`] if a segment is empty or contains a path
    /// separator.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, CoordinatesError> {
        let coords = Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
            extension: DEFAULT_EXTENSION.to_string(),
        };
        coords.validate()?;
        Ok(coords)
    }

    /// Attach a classifier (e.g. `sources`, `linux-x86_64`).
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatesError`] if the classifier is empty or contains a
    /// path separator.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Result<Self, CoordinatesError> {
        self.classifier = Some(classifier.into());
        self.validate()?;
        Ok(self)
    }

    /// Override the file extension (default [`DEFAULT_EXTENSION`]).
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatesError`] if the extension is empty or contains a
    /// path separator.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Result<Self, CoordinatesError> {
        self.extension = extension.into();
        self.validate()?;
        Ok(self)
    }

    /// Group identifier (e.g. `org.slf4j`).
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Artifact identifier (e.g. `slf4j-api`).
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Version string, kept verbatim.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Optional classifier.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// File extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name of the artifact: `artifact-version[-classifier].ext`.
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{c}.{}", self.artifact, self.version, self.extension),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// Relative path of the artifact in the standard repository layout.
    ///
    /// Always uses `/` so it can be appended to a repository URL; callers
    /// mapping it onto the filesystem should split on `/`.
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }

    fn validate(&self) -> Result<(), CoordinatesError> {
        let segments = [
            ("group", Some(self.group.as_str())),
            ("artifact", Some(self.artifact.as_str())),
            ("version", Some(self.version.as_str())),
            ("classifier", self.classifier.as_deref()),
            ("extension", Some(self.extension.as_str())),
        ];

        for (segment, value) in segments {
            let Some(value) = value else { continue };
            if value.is_empty() {
                return Err(CoordinatesError::EmptySegment {
                    input: self.to_string(),
                    segment,
                });
            }
            if value.contains(['/', '\\']) || value == ".." {
                return Err(CoordinatesError::PathSeparator(self.to_string()));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Coordinates {
    type Err = CoordinatesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let coords = match parts.as_slice() {
            [group, artifact, version] => Self::new(*group, *artifact, *version),
            [group, artifact, version, classifier] => {
                Self::new(*group, *artifact, *version)?.with_classifier(*classifier)
            }
            _ => return Err(CoordinatesError::Shape(s.to_string())),
        };

        // Re-label segment errors with the caller's original input.
        coords.map_err(|e| match e {
            CoordinatesError::EmptySegment { segment, .. } => CoordinatesError::EmptySegment {
                input: s.to_string(),
                segment,
            },
            CoordinatesError::PathSeparator(_) => CoordinatesError::PathSeparator(s.to_string()),
            other => other,
        })
    }
}

impl TryFrom<String> for Coordinates {
    type Error = CoordinatesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Coordinates> for String {
    fn from(c: Coordinates) -> Self {
        c.to_string()
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_classifier() {
        let c: Coordinates = "io.netty:netty-transport-native-epoll:4.1.100.Final:linux-x86_64"
            .parse()
            .unwrap();
        assert_eq!(c.group(), "io.netty");
        assert_eq!(c.classifier(), Some("linux-x86_64"));
        assert_eq!(
            c.file_name(),
            "netty-transport-native-epoll-4.1.100.Final-linux-x86_64.jar"
        );
        assert_eq!(
            c.to_string(),
            "io.netty:netty-transport-native-epoll:4.1.100.Final:linux-x86_64"
        );
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(matches!(
            "only:two".parse::<Coordinates>(),
            Err(CoordinatesError::Shape(_))
        ));
        assert!(matches!(
            "a:b:c:d:e".parse::<Coordinates>(),
            Err(CoordinatesError::Shape(_))
        ));
        assert!(matches!(
            "org.example::1.0".parse::<Coordinates>(),
            Err(CoordinatesError::EmptySegment {
                segment: "artifact",
                ..
            })
        ));
        assert!(matches!(
            "org.example:../../etc:1.0".parse::<Coordinates>(),
            Err(CoordinatesError::PathSeparator(_))
        ));
    }

    #[test]
    fn test_extension_override() {
        let c = Coordinates::new("org.example", "natives", "1.2")
            .unwrap()
            .with_extension("zip")
            .unwrap();
        assert_eq!(c.repository_path(), "org/example/natives/1.2/natives-1.2.zip");
    }
}
