use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::CONFIG;
use crate::db::Application;
use crate::error::Result;
use crate::wizard::{StepStatus, WizardStep};

/// Pass/fail verdict of an external check, ready to be recorded as a step
/// outcome. A connection failure is a failed verdict, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub status: StepStatus,
    pub message: String,
}

impl ProbeOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Ok,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            message: message.into(),
        }
    }
}

/// One external configuration check. Implementations issue a single request
/// and map reachability to a verdict; retries and timeouts beyond the
/// shared client timeout are not their concern.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, app: &Application) -> Result<ProbeOutcome>;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(CONFIG.probe_timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Map a response (or a transport failure) to a verdict.
fn verdict(
    result: std::result::Result<reqwest::Response, reqwest::Error>,
    ok_message: &str,
    failed_message: &str,
) -> ProbeOutcome {
    match result {
        Ok(resp) if resp.status().is_success() => ProbeOutcome::ok(ok_message),
        Ok(resp) => ProbeOutcome::failed(format!("{failed_message} (HTTP {})", resp.status())),
        Err(e) => ProbeOutcome::failed(format!("{failed_message}: {e}")),
    }
}

// ============================================================================
// Probe implementations
// ============================================================================

/// Checks that the configured SonarCloud project exists and has an analysis.
pub struct SonarProbe {
    client: reqwest::Client,
}

#[async_trait]
impl Probe for SonarProbe {
    async fn check(&self, app: &Application) -> Result<ProbeOutcome> {
        let Some(project_key) = app.sonar_project_key.as_deref() else {
            return Ok(ProbeOutcome::failed("No Sonar project key configured"));
        };

        let url = format!(
            "{}/api/project_badges/measure?project={}&metric=alert_status",
            CONFIG.sonar_host_url, project_key
        );
        let result = self.client.get(&url).send().await;
        Ok(verdict(
            result,
            "SonarCloud analysis found",
            "SonarCloud analysis not available",
        ))
    }
}

/// Checks that the SonarCloud project is linked to the configured Git
/// repository: both sides must be configured and the analysis reachable.
pub struct SonarGitLinkProbe {
    client: reqwest::Client,
}

#[async_trait]
impl Probe for SonarGitLinkProbe {
    async fn check(&self, app: &Application) -> Result<ProbeOutcome> {
        let Some(project_key) = app.sonar_project_key.as_deref() else {
            return Ok(ProbeOutcome::failed("No Sonar project key configured"));
        };
        if app.repository_url.is_none() {
            return Ok(ProbeOutcome::failed("No Git repository configured"));
        }

        let url = format!(
            "{}/api/project_badges/measure?project={}&metric=alert_status",
            CONFIG.sonar_host_url, project_key
        );
        let result = self.client.get(&url).send().await;
        Ok(verdict(
            result,
            "SonarCloud analysis linked to repository",
            "SonarCloud integration not verified",
        ))
    }
}

/// Checks that the configured Git repository is reachable.
pub struct GitProbe {
    client: reqwest::Client,
}

#[async_trait]
impl Probe for GitProbe {
    async fn check(&self, app: &Application) -> Result<ProbeOutcome> {
        let Some(repo_url) = app.repository_url.as_deref() else {
            return Ok(ProbeOutcome::failed("No Git repository configured"));
        };

        let result = self.client.head(repo_url).send().await;
        Ok(verdict(
            result,
            "Repository reachable",
            "Repository not reachable",
        ))
    }
}

/// Checks that the configured container image repository endpoint responds.
pub struct RegistryProbe {
    client: reqwest::Client,
}

#[async_trait]
impl Probe for RegistryProbe {
    async fn check(&self, app: &Application) -> Result<ProbeOutcome> {
        let Some(repository) = app.image_repository.as_deref() else {
            return Ok(ProbeOutcome::failed("No image repository configured"));
        };

        let url = if repository.starts_with("http") {
            repository.to_string()
        } else {
            format!("https://{repository}")
        };
        let result = self.client.head(&url).send().await;
        Ok(verdict(
            result,
            "Image repository reachable",
            "Image repository not reachable",
        ))
    }
}

/// Checks that the target host answers on the configured application port.
pub struct HostProbe {
    client: reqwest::Client,
}

#[async_trait]
impl Probe for HostProbe {
    async fn check(&self, app: &Application) -> Result<ProbeOutcome> {
        let Some(host) = app.target_host.as_deref() else {
            return Ok(ProbeOutcome::failed("No target host configured"));
        };
        let port = app.app_port.unwrap_or(80);

        let url = format!("http://{host}:{port}/");
        let result = self.client.get(&url).send().await;
        Ok(verdict(
            result,
            "Target host reachable",
            "Target host not reachable",
        ))
    }
}

// ============================================================================
// Step-to-probe mapping
// ============================================================================

/// The probes available to the wizard, one shared HTTP client behind them.
pub struct ProbeSet {
    sonar: SonarProbe,
    sonar_git: SonarGitLinkProbe,
    git: GitProbe,
    registry: RegistryProbe,
    host: HostProbe,
}

impl ProbeSet {
    pub fn new() -> Self {
        let client = http_client();
        Self {
            sonar: SonarProbe {
                client: client.clone(),
            },
            sonar_git: SonarGitLinkProbe {
                client: client.clone(),
            },
            git: GitProbe {
                client: client.clone(),
            },
            registry: RegistryProbe {
                client: client.clone(),
            },
            host: HostProbe { client },
        }
    }

    /// The probe backing a step, if the step has one. Database
    /// configuration is confirmed through a form, and the final summary is
    /// derived, so neither has a probe.
    pub fn for_step(&self, step: WizardStep) -> Option<&dyn Probe> {
        match step {
            WizardStep::CodeQualityAnalysis => Some(&self.sonar),
            WizardStep::CodeQualityGitIntegration => Some(&self.sonar_git),
            WizardStep::RepositoryCheck => Some(&self.git),
            WizardStep::ImageRegistryCheck => Some(&self.registry),
            WizardStep::TargetHostCheck => Some(&self.host),
            WizardStep::DatabaseConfig | WizardStep::FinalSummary => None,
        }
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::new()
    }
}
