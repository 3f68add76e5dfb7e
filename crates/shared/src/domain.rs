use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a wire enum whose serde name, `Display` and `FromStr` all agree.
macro_rules! wire_enum {
    ($name:ident, $kind:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum!(ContentKind, "content kind" {
    Article => "article",
    Bundle => "bundle",
    Course => "course",
    CourseGroup => "courseGroup",
    InPersonEvent => "inPersonEvent",
    InPersonEventCourse => "inPersonEventCourse",
    LearningPath => "learningPath",
    Microlearning => "microlearning",
    Podcast => "podcast",
    Product => "product",
    ShareableContentObject => "shareableContentObject",
    Video => "video",
    Webinar => "webinar",
    WebinarCourse => "webinarCourse",
    XApiObject => "xApiObject",
});

wire_enum!(SortField, "sort field" {
    CreatedAt => "createdAt",
    UpdatedAt => "updatedAt",
    Title => "title",
    PublishDate => "publishDate",
    CourseStartDate => "courseStartDate",
    Relevance => "relevance",
});

wire_enum!(SortDirection, "sort direction" {
    Asc => "asc",
    Desc => "desc",
});

wire_enum!(DisplayType, "display type" {
    List => "list",
    Grid => "grid",
    Calendar => "calendar",
});

impl Default for DisplayType {
    fn default() -> Self {
        DisplayType::List
    }
}

/// Sort order; GraphQL carries it as an object, URLs as `field:direction` (e.g. `createdAt:desc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.direction)
    }
}

impl FromStr for Sort {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((field, direction)) = value.split_once(':') else {
            return Err(UnknownVariant {
                kind: "sort",
                value: value.to_string(),
            });
        };
        Ok(Self {
            field: field.parse()?,
            direction: direction.parse()?,
        })
    }
}

/// Facet filter picked from a search aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationFilter {
    pub label: String,
    pub value: String,
}

impl AggregationFilter {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}
