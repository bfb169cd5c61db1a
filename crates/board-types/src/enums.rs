//! Closed status / priority / role enumerations
//!
//! Each enum carries one mapping table used for display, parsing, and the
//! wire format. The serde renames are generated from the same table.

use serde::{Deserialize, Serialize};

/// A string that matched no variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Health of a project as shown on the board.
    ProjectStatus ("project status") {
        OnTrack => "On track",
        AtRisk => "At risk",
        OffTrack => "Off track",
        Completed => "Completed",
    }
}

string_enum! {
    /// Shared by projects and tasks.
    Priority ("priority") {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Urgent => "Urgent",
    }
}

string_enum! {
    TaskStatus ("task status") {
        Todo => "To do",
        InProgress => "In progress",
        InReview => "In review",
        Done => "Done",
    }
}

string_enum! {
    MemberRole ("member role") {
        Owner => "owner",
        Editor => "editor",
        Viewer => "viewer",
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::OnTrack
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl Default for MemberRole {
    fn default() -> Self {
        MemberRole::Editor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_mapping_table_round_trips_every_variant() {
        for status in ProjectStatus::ALL {
            assert_eq!(ProjectStatus::from_str(status.as_str()), Ok(*status));
        }
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_str(status.as_str()), Ok(*status));
        }
    }

    #[test]
    fn test_wire_format_uses_display_strings() {
        let json = serde_json::to_string(&ProjectStatus::OnTrack).unwrap();
        assert_eq!(json, "\"On track\"");
        let parsed: TaskStatus = serde_json::from_str("\"In review\"").unwrap();
        assert_eq!(parsed, TaskStatus::InReview);
    }

    #[test]
    fn test_unknown_variant_is_an_error() {
        let err = Priority::from_str("Critical").unwrap_err();
        assert_eq!(err.kind, "priority");
        assert_eq!(err.to_string(), "unknown priority 'Critical'");
    }
}
