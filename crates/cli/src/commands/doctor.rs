use gaffer_core::config::{AppConfig, LoadOptions};
use gaffer_core::domain::team::TeamRegistry;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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
    let exit_code = match report.overall_status {
        CheckStatus::Fail => 1,
        _ => 0,
    };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
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
            checks.push(check_transaction_channel(&config));
            checks.push(check_registry(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "transaction_channel",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "team_registry",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let overall_status = if failed {
        CheckStatus::Fail
    } else if warned {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    let summary = match overall_status {
        CheckStatus::Pass => "doctor: all readiness checks passed".to_string(),
        CheckStatus::Warn => "doctor: readiness checks passed with warnings".to_string(),
        _ => "doctor: one or more readiness checks failed".to_string(),
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_transaction_channel(config: &AppConfig) -> DoctorCheck {
    match &config.discord.transaction_channel_id {
        Some(channel_id) => DoctorCheck {
            name: "transaction_channel",
            status: CheckStatus::Pass,
            details: format!("transaction channel configured ({channel_id})"),
        },
        None => DoctorCheck {
            name: "transaction_channel",
            status: CheckStatus::Warn,
            details: "transaction channel is not configured; contract acceptance will fail"
                .to_string(),
        },
    }
}

fn check_registry(config: &AppConfig) -> DoctorCheck {
    match TeamRegistry::load(&config.registry.path) {
        Ok(registry) if registry.is_empty() => DoctorCheck {
            name: "team_registry",
            status: CheckStatus::Warn,
            details: format!(
                "registry `{}` loaded but contains no teams; offers will always be refused",
                config.registry.path.display()
            ),
        },
        Ok(registry) => {
            let duplicates = registry.duplicate_role_ids();
            if duplicates.is_empty() {
                DoctorCheck {
                    name: "team_registry",
                    status: CheckStatus::Pass,
                    details: format!("{} teams loaded", registry.len()),
                }
            } else {
                DoctorCheck {
                    name: "team_registry",
                    status: CheckStatus::Warn,
                    details: format!(
                        "{} teams loaded; {} role id(s) shared between teams",
                        registry.len(),
                        duplicates.len()
                    ),
                }
            }
        }
        Err(error) => DoctorCheck {
            name: "team_registry",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
