//! Deployment request models

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Longest workflow name accepted
pub const MAX_WORKFLOW_NAME_LEN: usize = 255;

/// Longest GitHub user or organisation login
pub const MAX_OWNER_LEN: usize = 39;

/// Longest GitHub repository name
pub const MAX_REPOSITORY_LEN: usize = 100;

static WORKFLOW_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("workflow name pattern is valid")
});

static OWNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$").expect("owner pattern is valid")
});

static REPOSITORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("repository pattern is valid")
});

/// Deployment target selecting the field groups and the YAML template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    Ec2,
    Kubernetes,
    /// Missing or unrecognised value on the wire
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Ec2 => "ec2",
            DeploymentType::Kubernetes => "kubernetes",
            DeploymentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container image built by the workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub docker_context_path: String,
    pub dockerfile_path: String,
    #[serde(default)]
    pub dot_env_testing: String,
    #[serde(default)]
    pub dot_env_production: String,
}

/// Settings shared by every EC2 deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ec2CommonFields {
    pub credential_id: String,
    pub aws_region: String,
    pub jenkins_jobs: String,
    pub release_tag: String,
    pub codeowners_emails: String,
    pub devops_stakeholders_emails: String,
}

/// EC2 deployment of one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ec2Project {
    pub id: String,
    pub name: String,
    pub command: String,
    pub port: String,
    #[serde(default)]
    pub docker_network: String,
    #[serde(default)]
    pub mount_path: String,
    #[serde(default)]
    pub enable_gpu: bool,
    #[serde(default)]
    pub log_driver: String,
    #[serde(default)]
    pub log_driver_options: String,
}

/// Settings shared by every Kubernetes deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesCommonFields {
    pub jenkins_job_name: String,
    pub release_tag: String,
    pub helm_values_repository: String,
    pub codeowners_email_ids: String,
    pub devops_stakeholders_email_ids: String,
}

/// Kubernetes deployment of one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesProject {
    pub id: String,
    pub name: String,
}

/// What to deploy and where the generated workflow goes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub owner: String,
    pub repository: String,
    pub workflow_name: String,
    #[serde(default)]
    pub deployment_type: DeploymentType,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub ec2_common_fields: Option<Ec2CommonFields>,
    #[serde(default)]
    pub ec2_projects: Vec<Ec2Project>,
    #[serde(default)]
    pub kubernetes_common_fields: Option<KubernetesCommonFields>,
    #[serde(default)]
    pub kubernetes_projects: Vec<KubernetesProject>,
}

impl DeploymentRequest {
    /// Check the request before anything is rendered or sent
    pub fn validate(&self) -> Result<(), ValidationError> {
        // A missing field group takes precedence over every other problem
        match self.deployment_type {
            DeploymentType::Ec2 => {
                if self.ec2_common_fields.is_none() {
                    return Err(ValidationError::Ec2CommonFieldsRequired);
                }
                if self.ec2_projects.is_empty() {
                    return Err(ValidationError::Ec2ProjectsRequired);
                }
            }
            DeploymentType::Kubernetes => {
                if self.kubernetes_common_fields.is_none() {
                    return Err(ValidationError::KubernetesCommonFieldsRequired);
                }
                if self.kubernetes_projects.is_empty() {
                    return Err(ValidationError::KubernetesProjectsRequired);
                }
            }
            DeploymentType::Unknown => return Err(ValidationError::InvalidDeploymentType),
        }

        validate_workflow_name(&self.workflow_name)?;

        if self.owner.trim().is_empty() {
            return Err(ValidationError::MissingField("owner"));
        }
        if self.repository.trim().is_empty() {
            return Err(ValidationError::MissingField("repository"));
        }
        // Both end up inside image and release names in the YAML
        validate_owner(&self.owner)?;
        validate_repository_name(&self.repository)?;

        if self.projects.is_empty() {
            return Err(ValidationError::ProjectsRequired);
        }
        for project in &self.projects {
            require("projects.id", &project.id)?;
            require("projects.name", &project.name)?;
            require("projects.dockerContextPath", &project.docker_context_path)?;
            require("projects.dockerfilePath", &project.dockerfile_path)?;
        }

        match self.deployment_type {
            DeploymentType::Ec2 => self.validate_ec2_fields(),
            DeploymentType::Kubernetes => self.validate_kubernetes_fields(),
            DeploymentType::Unknown => Err(ValidationError::InvalidDeploymentType),
        }
    }

    fn validate_ec2_fields(&self) -> Result<(), ValidationError> {
        if let Some(common) = &self.ec2_common_fields {
            require("ec2CommonFields.credentialId", &common.credential_id)?;
            require("ec2CommonFields.awsRegion", &common.aws_region)?;
            require("ec2CommonFields.jenkinsJobs", &common.jenkins_jobs)?;
            require("ec2CommonFields.releaseTag", &common.release_tag)?;
            require("ec2CommonFields.codeownersEmails", &common.codeowners_emails)?;
            require(
                "ec2CommonFields.devopsStakeholdersEmails",
                &common.devops_stakeholders_emails,
            )?;
        }
        for project in &self.ec2_projects {
            require("ec2Projects.id", &project.id)?;
            require("ec2Projects.name", &project.name)?;
            require("ec2Projects.command", &project.command)?;
            require("ec2Projects.port", &project.port)?;
        }
        Ok(())
    }

    fn validate_kubernetes_fields(&self) -> Result<(), ValidationError> {
        if let Some(common) = &self.kubernetes_common_fields {
            require("kubernetesCommonFields.jenkinsJobName", &common.jenkins_job_name)?;
            require("kubernetesCommonFields.releaseTag", &common.release_tag)?;
            require(
                "kubernetesCommonFields.helmValuesRepository",
                &common.helm_values_repository,
            )?;
            require(
                "kubernetesCommonFields.codeownersEmailIds",
                &common.codeowners_email_ids,
            )?;
            require(
                "kubernetesCommonFields.devopsStakeholdersEmailIds",
                &common.devops_stakeholders_email_ids,
            )?;
        }
        for project in &self.kubernetes_projects {
            require("kubernetesProjects.id", &project.id)?;
            require("kubernetesProjects.name", &project.name)?;
        }
        Ok(())
    }

    /// Repository path of the generated workflow file
    pub fn file_path(&self) -> String {
        workflow_file_path(&self.workflow_name)
    }
}

/// Workflow names become file and branch names, so only a safe alphabet is allowed
pub fn validate_workflow_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > MAX_WORKFLOW_NAME_LEN || !WORKFLOW_NAME_RE.is_match(name) {
        return Err(ValidationError::InvalidWorkflowName);
    }
    Ok(())
}

/// GitHub login: alphanumerics and single hyphens, not at either end
pub fn validate_owner(owner: &str) -> Result<(), ValidationError> {
    if owner.len() > MAX_OWNER_LEN || !OWNER_RE.is_match(owner) {
        return Err(ValidationError::InvalidOwner(owner.to_string()));
    }
    Ok(())
}

pub fn validate_repository_name(repository: &str) -> Result<(), ValidationError> {
    if repository.len() > MAX_REPOSITORY_LEN
        || !REPOSITORY_RE.is_match(repository)
        || repository == "."
        || repository == ".."
    {
        return Err(ValidationError::InvalidRepositoryName(repository.to_string()));
    }
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// `.github/workflows/{name}.yml`
pub fn workflow_file_path(workflow_name: &str) -> String {
    format!(".github/workflows/{}.yml", workflow_name)
}
