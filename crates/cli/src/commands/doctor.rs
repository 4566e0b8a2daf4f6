use std::sync::Arc;

use crate::commands::{block_on, CommandResult};
use secrecy::ExposeSecret;
use serde::Serialize;
use shoplist_core::config::{AppConfig, LoadOptions};
use shoplist_db::{JsonFileSnapshotStore, SnapshotStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_bot_token(&config));
            checks.push(check_storage_access(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("bot_token_readiness"));
            checks.push(skipped("storage_access"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    // Platform bot tokens are three dot-separated segments.
    let segments = config.chat.bot_token.expose_secret().split('.').count();
    if segments == 3 {
        DoctorCheck {
            name: "bot_token_readiness",
            status: CheckStatus::Pass,
            details: "bot token has the expected shape".to_string(),
        }
    } else {
        DoctorCheck {
            name: "bot_token_readiness",
            status: CheckStatus::Fail,
            details: format!("bot token has {segments} segment(s); expected 3"),
        }
    }
}

fn check_storage_access(config: &AppConfig) -> DoctorCheck {
    let data_dir = config.storage.data_dir.clone();
    let snapshots = Arc::new(JsonFileSnapshotStore::new(&data_dir));

    let result = block_on("doctor", async {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|error| format!("cannot create `{}`: {error}", data_dir.display()))?;
        let snapshot = snapshots.load().await.map_err(|error| error.to_string())?;
        Ok::<_, String>(snapshot.lists.len())
    });

    match result {
        Ok(Ok(lists)) => DoctorCheck {
            name: "storage_access",
            status: CheckStatus::Pass,
            details: format!("`{}` readable with {lists} stored list(s)", data_dir.display()),
        },
        Ok(Err(details)) => {
            DoctorCheck { name: "storage_access", status: CheckStatus::Fail, details }
        }
        Err(failure) => DoctorCheck {
            name: "storage_access",
            status: CheckStatus::Fail,
            details: failure.output,
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
