//! Closed dimensions a scenario is declared over.
//!
//! Each dimension renders as a fixed token in the canonical scenario string.
//! Reports compare those strings verbatim, so tokens must never change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;

macro_rules! dimension {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $token:literal, $serde:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $serde)] $variant, )+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Token used by the canonical scenario string.
            pub fn token(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            /// Name used in suite and config files.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $serde,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.token())
            }
        }

        impl FromStr for $name {
            type Err = ScenarioError;

            /// Accepts either the token or the file name, ignoring ASCII case.
            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let wanted = value.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| {
                        candidate.token().eq_ignore_ascii_case(wanted)
                            || candidate.name().eq_ignore_ascii_case(wanted)
                    })
                    .ok_or_else(|| ScenarioError::UnknownValue {
                        dimension: $label,
                        value: value.to_string(),
                    })
            }
        }
    };
}

dimension! {
    /// Which behaviour variant of the record-management system is under test.
    Mode, "mode" {
        /// Legacy behaviour: the history marker is still an accepted attribute.
        Old => "OLD_MODE", "old",
        /// New behaviour after the marker was phased out.
        New => "NEW_MODE", "new",
    }
}

dimension! {
    /// State of the target record before or after the operation.
    RecordState, "record state" {
        ExistsWithoutMarker => "OBJ_EXISTS_NO_CHANGED__", "exists_without_marker",
        ExistsWithMarker => "OBJ_EXISTS_WITH_CHANGED", "exists_with_marker",
        Absent => "OBJ_DOES_NOT_EXIST_____", "absent",
    }
}

dimension! {
    /// Access method used to reach the record-management system.
    Transport, "transport" {
        WebApi => "REST___", "web_api",
        InteractiveSession => "TELNET_", "interactive_session",
        SyncBatch => "SYNCUPD", "sync_batch",
        AsyncSubmission => "MAILUPD", "async_submission",
        ReplicationStream => "NRTM___", "replication_stream",
    }
}

dimension! {
    /// Operation performed against the target record.
    Operation, "operation" {
        Create => "CREATE", "create",
        Modify => "MODIFY", "modify",
        Delete => "DELETE", "delete",
        Search => "SEARCH", "search",
        Fetch => "GET___", "fetch",
        MetadataFetch => "META__", "metadata_fetch",
        EventNotify => "EVENT_", "event_notify",
    }
}

dimension! {
    /// Shape of the submitted payload with respect to the history marker.
    #[derive(Default)]
    RequestVariant, "request variant" {
        WithMarker => "WITH_CHANGED", "with_marker",
        WithoutMarker => "NO_CHANGED__", "without_marker",
        #[default]
        NotApplicable => "NOT_APPLIC__", "not_applicable",
    }
}

dimension! {
    /// Declared result of the operation.
    Outcome, "outcome" {
        Success => "SUCCESS", "success",
        Failure => "FAILED", "failure",
    }
}

impl RecordState {
    pub fn exists(self) -> bool {
        !matches!(self, RecordState::Absent)
    }

    pub fn has_marker(self) -> bool {
        matches!(self, RecordState::ExistsWithMarker)
    }
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_stable() {
        let tokens: Vec<&str> = RecordState::ALL.iter().map(|s| s.token()).collect();
        assert_eq!(
            tokens,
            vec![
                "OBJ_EXISTS_NO_CHANGED__",
                "OBJ_EXISTS_WITH_CHANGED",
                "OBJ_DOES_NOT_EXIST_____"
            ]
        );
        assert_eq!(Transport::WebApi.to_string(), "REST___");
        assert_eq!(Operation::Fetch.to_string(), "GET___");
        assert_eq!(RequestVariant::NotApplicable.to_string(), "NOT_APPLIC__");
        assert_eq!(Outcome::Failure.to_string(), "FAILED");
    }

    #[test]
    fn closed_sets_have_expected_sizes() {
        assert_eq!(Mode::ALL.len(), 2);
        assert_eq!(RecordState::ALL.len(), 3);
        assert_eq!(Transport::ALL.len(), 5);
        assert_eq!(Operation::ALL.len(), 7);
        assert_eq!(RequestVariant::ALL.len(), 3);
        assert_eq!(Outcome::ALL.len(), 2);
    }

    #[test]
    fn parses_tokens_and_names() {
        assert_eq!("NRTM___".parse::<Transport>(), Ok(Transport::ReplicationStream));
        assert_eq!("web_api".parse::<Transport>(), Ok(Transport::WebApi));
        assert_eq!("Metadata_Fetch".parse::<Operation>(), Ok(Operation::MetadataFetch));
        assert_eq!(" new ".parse::<Mode>(), Ok(Mode::New));
    }

    #[test]
    fn rejects_undeclared_transport() {
        let err = "carrier_pigeon".parse::<Transport>().expect_err("unknown");
        assert_eq!(
            err,
            ScenarioError::UnknownValue {
                dimension: "transport",
                value: "carrier_pigeon".to_string(),
            }
        );
    }

    #[test]
    fn deserializes_file_names() {
        #[derive(Deserialize)]
        struct Row {
            transport: Transport,
            request: RequestVariant,
        }
        let row: Row = toml::from_str("transport = \"sync_batch\"\nrequest = \"with_marker\"\n")
            .expect("row parses");
        assert_eq!(row.transport, Transport::SyncBatch);
        assert_eq!(row.request, RequestVariant::WithMarker);
        assert!(toml::from_str::<Row>("transport = \"ftp\"\nrequest = \"with_marker\"\n").is_err());
    }

    #[test]
    fn state_helpers() {
        assert!(RecordState::ExistsWithMarker.has_marker());
        assert!(!RecordState::ExistsWithoutMarker.has_marker());
        assert!(!RecordState::Absent.exists());
        assert_eq!(RequestVariant::default(), RequestVariant::NotApplicable);
    }
}
