//! Validated string types that enforce invariants at construction time

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for string types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("repository name cannot be empty or whitespace")]
    EmptyRepositoryName,

    #[error("invalid repository name '{0}': only letters, digits, '.', '-' and '_' are allowed")]
    InvalidRepositoryName(String),

    #[error("request path cannot be empty")]
    EmptyRequestPath,

    #[error("invalid request path '{0}': must start with '/' and must not contain '..' segments")]
    InvalidRequestPath(String),
}

/// Generates a validated string newtype.
///
/// Each type gets:
/// - A `new()` constructor that validates
/// - `as_str()` getter
/// - `AsRef<str>`, `Deref`, `Display`, `TryFrom<String>`, `FromStr` impls
/// - Serde `Serialize` and `Deserialize` with validation
macro_rules! validated_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident(String) {
            validation: |$s_param:ident| $validation:expr,
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        $vis struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", stringify!($name), " after validation")]
            pub fn new($s_param: String) -> Result<Self, ValidationError> {
                let validate = || $validation;
                validate()?;
                Ok(Self($s_param))
            }

            #[doc = concat!("Get the ", stringify!($name), " as a string slice")]
            #[must_use]
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from($s_param: String) -> Result<Self, Self::Error> {
                Self::new($s_param)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_owned())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_string! {
    /// Identifier of a proxy repository
    ///
    /// # Examples
    /// ```
    /// use repo_proxy_cache::types::RepositoryName;
    ///
    /// let name = RepositoryName::new("maven-central".to_string()).unwrap();
    /// assert_eq!(name.as_str(), "maven-central");
    ///
    /// assert!(RepositoryName::new("".to_string()).is_err());
    /// assert!(RepositoryName::new("has space".to_string()).is_err());
    /// ```
    pub struct RepositoryName(String) {
        validation: |s| {
            if s.trim().is_empty() {
                Err(ValidationError::EmptyRepositoryName)
            } else if !s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            {
                Err(ValidationError::InvalidRepositoryName(s.clone()))
            } else {
                Ok(())
            }
        },
    }
}

validated_string! {
    /// Logical path of a resource inside a repository, always absolute
    #[doc(alias = "path")]
    pub struct RequestPath(String) {
        validation: |s| {
            if s.is_empty() {
                Err(ValidationError::EmptyRequestPath)
            } else if !s.starts_with('/') || s.split('/').any(|segment| segment == "..") {
                Err(ValidationError::InvalidRequestPath(s.clone()))
            } else {
                Ok(())
            }
        },
    }
}

impl RequestPath {
    /// Last path segment, empty for directory paths
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}
