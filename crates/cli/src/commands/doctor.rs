use secrecy::ExposeSecret;
use serde::Serialize;
use threadcast_core::config::{AppConfig, LoadOptions};
use threadcast_core::files::try_get_images;

use super::{escape_json, CommandResult};

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
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
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
            checks.push(check_slack_tokens(&config));
            checks.push(check_images_directory(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_token_readiness", "images_directory"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| matches!(check.status, CheckStatus::Fail));
    let warned = checks.iter().any(|check| check.status != CheckStatus::Pass);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let app_token = config.slack.app_token.expose_secret();
    let bot_token = config.slack.bot_token.expose_secret();
    // prefixes are already enforced by config validation; a bare prefix still fails auth
    let too_short = [("app", app_token), ("bot", bot_token)]
        .into_iter()
        .filter(|(_, token)| token.len() <= "xoxb-".len())
        .map(|(label, _)| label)
        .collect::<Vec<_>>();

    if too_short.is_empty() {
        DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Pass,
            details: format!("tokens well formed; api base `{}`", config.slack.api_base_url),
        }
    } else {
        DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: format!("{} token(s) contain only a prefix", too_short.join(" and ")),
        }
    }
}

fn check_images_directory(config: &AppConfig) -> DoctorCheck {
    let dir = &config.images.dir;
    match try_get_images(dir) {
        Ok(images) if images.is_empty() => DoctorCheck {
            name: "images_directory",
            status: CheckStatus::Warn,
            details: format!("`{}` has no images; /generate will post without uploads", dir.display()),
        },
        Ok(images) => DoctorCheck {
            name: "images_directory",
            status: CheckStatus::Pass,
            details: format!("{} image(s) in `{}`", images.len(), dir.display()),
        },
        Err(error) => DoctorCheck {
            name: "images_directory",
            status: CheckStatus::Warn,
            details: format!("{error}; /generate will post without uploads"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
