//! Suite file parsing and validation.
//!
//! A suite is a TOML file naming itself and listing scenario rows. Values
//! are dimension names (`web_api`, `exists_with_marker`) or canonical tokens
//! (`REST___`, `OBJ_EXISTS_WITH_CHANGED`), case-insensitive.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use engine::{RequestVariant, Scenario, ScenarioError, ScenarioParts};
use serde::Deserialize;

/// A parsed suite file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SuiteFile {
    pub suite: SuiteMeta,
    #[serde(default)]
    pub scenarios: Vec<ScenarioRow>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SuiteMeta {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One `[[scenarios]]` entry, as written.
///
/// `request` defaults to not-applicable and `post_state` to `pre_state`,
/// mirroring the short builder forms.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioRow {
    pub mode: Option<String>,
    pub pre_state: Option<String>,
    pub transport: Option<String>,
    pub operation: Option<String>,
    pub request: Option<String>,
    pub outcome: Option<String>,
    pub post_state: Option<String>,
}

fn parse_field<T>(value: Option<&String>) -> Result<Option<T>, ScenarioError>
where
    T: FromStr<Err = ScenarioError>,
{
    value.map(|value| value.parse::<T>()).transpose()
}

impl ScenarioRow {
    pub fn to_scenario(&self) -> Result<Scenario, ScenarioError> {
        let pre_state = parse_field(self.pre_state.as_ref())?;
        let parts = ScenarioParts {
            mode: parse_field(self.mode.as_ref())?,
            pre_state,
            transport: parse_field(self.transport.as_ref())?,
            operation: parse_field(self.operation.as_ref())?,
            request: Some(
                parse_field(self.request.as_ref())?.unwrap_or(RequestVariant::NotApplicable),
            ),
            outcome: parse_field(self.outcome.as_ref())?,
            post_state: parse_field(self.post_state.as_ref())?.or(pre_state),
        };
        Scenario::try_from(parts)
    }
}

/// A validated suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub name: String,
    pub description: Option<String>,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Load and validate a suite file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read suite {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load suite {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let file: SuiteFile = toml::from_str(contents).context("parse suite")?;
        if file.suite.name.trim().is_empty() {
            bail!("suite.name must be non-empty");
        }
        if file.scenarios.is_empty() {
            bail!("scenarios must be a non-empty array");
        }
        let mut seen = HashSet::new();
        let mut scenarios = Vec::with_capacity(file.scenarios.len());
        for (index, row) in file.scenarios.iter().enumerate() {
            let scenario = row
                .to_scenario()
                .with_context(|| format!("scenarios[{index}] invalid"))?;
            if !seen.insert(scenario) {
                bail!("scenarios[{index}] duplicates {scenario}");
            }
            scenarios.push(scenario);
        }
        Ok(Self {
            name: file.suite.name,
            description: file.suite.description,
            scenarios,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{Mode, Operation, Outcome, RecordState, Transport};

    #[test]
    fn parses_rows_with_defaults() {
        let suite = Suite::parse_str(
            r#"
[suite]
name = "marker"

[[scenarios]]
mode = "old"
pre_state = "exists_without_marker"
transport = "web_api"
operation = "modify"
request = "with_marker"
outcome = "success"
post_state = "exists_with_marker"

[[scenarios]]
mode = "NEW_MODE"
pre_state = "OBJ_DOES_NOT_EXIST_____"
transport = "TELNET_"
operation = "GET___"
outcome = "FAILED"
"#,
        )
        .expect("parse");
        assert_eq!(suite.name, "marker");
        assert_eq!(suite.scenarios.len(), 2);
        let read = suite.scenarios[1];
        assert_eq!(read.mode(), Mode::New);
        assert_eq!(read.transport(), Transport::InteractiveSession);
        assert_eq!(read.operation(), Operation::Fetch);
        assert_eq!(read.request(), RequestVariant::NotApplicable);
        assert_eq!(read.outcome(), Outcome::Failure);
        assert_eq!(read.post_state(), RecordState::Absent);
    }

    #[test]
    fn missing_field_is_named() {
        let err = Suite::parse_str(
            r#"
[suite]
name = "broken"

[[scenarios]]
mode = "old"
pre_state = "absent"
operation = "create"
outcome = "success"
"#,
        )
        .expect_err("should fail");
        let message = format!("{err:#}");
        assert!(message.contains("scenarios[0] invalid"));
        assert!(message.contains("scenario field `transport` is required"));
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = Suite::parse_str(
            r#"
[suite]
name = "broken"

[[scenarios]]
mode = "old"
pre_state = "absent"
transport = "carrier_pigeon"
operation = "create"
outcome = "success"
"#,
        )
        .expect_err("should fail");
        assert!(format!("{err:#}").contains("unknown transport `carrier_pigeon`"));
    }

    #[test]
    fn duplicate_scenarios_are_rejected() {
        let row = r#"
[[scenarios]]
mode = "old"
pre_state = "absent"
transport = "sync_batch"
operation = "create"
outcome = "failure"
"#;
        let err = Suite::parse_str(&format!("[suite]\nname = \"dup\"\n{row}{row}"))
            .expect_err("should fail");
        assert!(format!("{err:#}").contains("scenarios[1] duplicates GIVEN( OLD_MODE"));
    }

    #[test]
    fn unknown_row_keys_are_rejected() {
        let err = Suite::parse_str(
            r#"
[suite]
name = "typo"

[[scenarios]]
mode = "old"
prestate = "absent"
"#,
        )
        .expect_err("should fail");
        assert!(format!("{err:#}").contains("prestate"));
    }

    #[test]
    fn empty_suite_is_rejected() {
        assert!(Suite::parse_str("[suite]\nname = \"empty\"\n").is_err());
    }
}
