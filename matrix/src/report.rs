use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::exit_codes;
use crate::run::{ScenarioResult, Verdict};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Tally {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
}

impl Tally {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail + self.error
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub suite: String,
    pub totals: Tally,
    /// Keyed by transport name so output order is stable.
    pub transports: BTreeMap<String, Tally>,
    pub results: Vec<ScenarioResult>,
}

pub fn summarize(suite: &str, results: Vec<ScenarioResult>) -> Summary {
    let mut totals = Tally::default();
    let mut transports: BTreeMap<String, Tally> = BTreeMap::new();
    for result in &results {
        totals.record(result.verdict);
        transports
            .entry(result.transport.name().to_string())
            .or_default()
            .record(result.verdict);
    }
    Summary {
        suite: suite.to_string(),
        totals,
        transports,
        results,
    }
}

/// Errors outrank failures: an errored run says nothing about the system.
pub fn exit_code(summary: &Summary) -> i32 {
    if summary.totals.error > 0 {
        exit_codes::ERRORED
    } else if summary.totals.fail > 0 {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    }
}

pub fn render_text(summary: &Summary) -> String {
    let mut out = String::new();
    for result in &summary.results {
        let label = match result.verdict {
            Verdict::Pass => "PASS ",
            Verdict::Fail => "FAIL ",
            Verdict::Error => "ERROR",
        };
        out.push_str(&format!(
            "{label} {} ({}ms)\n",
            result.scenario, result.duration_millis
        ));
        if let Some(message) = &result.message {
            out.push_str(&format!("      {message}\n"));
        }
    }
    out.push('\n');
    out.push_str(&format!("suite: {}\n", summary.suite));
    for (transport, tally) in &summary.transports {
        out.push_str(&format!(
            "  {transport}: {} pass, {} fail, {} error\n",
            tally.pass, tally.fail, tally.error
        ));
    }
    let totals = &summary.totals;
    out.push_str(&format!(
        "total: {} scenarios, {} pass, {} fail, {} error\n",
        totals.total(),
        totals.pass,
        totals.fail,
        totals.error
    ));
    out
}

pub fn render_json(summary: &Summary) -> Result<String> {
    let mut payload = serde_json::to_string_pretty(summary).context("serialize summary json")?;
    payload.push('\n');
    Ok(payload)
}
