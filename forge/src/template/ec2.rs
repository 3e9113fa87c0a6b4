//! EC2 deployment workflow

use std::borrow::Cow;
use std::fmt::{self, Write};

use crate::errors::TemplateError;
use crate::models::{DeploymentRequest, Ec2CommonFields, Ec2Project};

use super::{
    comment_text, expr, generation_failed, image_name, write_build_job, write_header,
    write_include_entry, write_matrix, yaml_scalar,
};

const TEMPLATE: &str = "ec2-workflow";

pub fn render(request: &DeploymentRequest, reusable_workflows: &str) -> Result<String, TemplateError> {
    let common = request
        .ec2_common_fields
        .as_ref()
        .ok_or_else(|| TemplateError::TemplateGenerationFailed {
            template: TEMPLATE,
            reason: "ec2CommonFields is missing".to_string(),
        })?;

    let mut out = String::with_capacity(4096);
    write_workflow(&mut out, request, common, reusable_workflows)
        .map_err(|e| generation_failed(TEMPLATE, e))?;
    Ok(out)
}

fn write_workflow(
    out: &mut String,
    request: &DeploymentRequest,
    common: &Ec2CommonFields,
    reusable_workflows: &str,
) -> fmt::Result {
    write_header(out, "Build & Publish Image (EC2)")?;
    write_build_job(out, request, reusable_workflows, &common.release_tag)?;

    let projects = &request.ec2_projects;

    writeln!(out, "  deploy-to-ec2:")?;
    writeln!(out, "    needs: build-and-push-dockerimages")?;
    write_matrix(out, projects.iter().map(|p| p.name.as_str()))?;
    if !projects.is_empty() {
        writeln!(out, "        include:")?;
        for project in projects {
            write_project(out, project)?;
        }
    }
    writeln!(out, "    permissions:")?;
    writeln!(out, "      contents: read")?;
    writeln!(out, "      packages: write")?;
    writeln!(out)?;
    writeln!(
        out,
        "    uses: {}",
        yaml_scalar(&format!(
            "{}/.github/workflows/deploy-ec2.yml@{}",
            reusable_workflows, common.release_tag
        ))
    )?;
    writeln!(out, "    with:")?;
    writeln!(out, "      repository_name: {}", expr("github.event.repository.name"))?;
    writeln!(out, "      image_name: {}", image_name(request))?;
    writeln!(out, "      image_registry: {}", expr("vars.IMAGE_REGISTRY"))?;
    writeln!(
        out,
        "      version: {}",
        expr("needs.build-and-push-dockerimages.outputs.version")
    )?;
    writeln!(
        out,
        "      cluster_environment: {}",
        expr("needs.build-and-push-dockerimages.outputs.cluster_environment")
    )?;
    writeln!(
        out,
        "      commit_id: {}",
        expr("needs.build-and-push-dockerimages.outputs.commit_id")
    )?;
    writeln!(out, "      aws_region: {}", yaml_scalar(&common.aws_region))?;
    writeln!(out, "      jenkins_jobs: {}", yaml_scalar(&common.jenkins_jobs))?;
    writeln!(out, "      workflows_release: {}", yaml_scalar(&common.release_tag))?;
    writeln!(
        out,
        "      codeowners_email_ids: {}",
        yaml_scalar(&common.codeowners_emails)
    )?;
    writeln!(
        out,
        "      devops_stakeholders_email_ids: {}",
        yaml_scalar(&common.devops_stakeholders_emails)
    )?;
    writeln!(out, "      command: {}", expr("matrix.command"))?;
    writeln!(out, "      port: {}", expr("matrix.port"))?;

    // Optional inputs are passed only when some project sets them
    for (key, used) in [
        ("docker_network", projects.iter().any(|p| !p.docker_network.is_empty())),
        ("mount_path", projects.iter().any(|p| !p.mount_path.is_empty())),
        ("log_driver", projects.iter().any(|p| !p.log_driver.is_empty())),
        (
            "log_driver_options",
            projects.iter().any(|p| !p.log_driver_options.is_empty()),
        ),
    ] {
        if used {
            writeln!(out, "      {}: {}", key, expr(&format!("matrix.{}", key)))?;
        }
    }
    if projects.iter().any(|p| p.enable_gpu) {
        writeln!(out, "      enable_gpu: {}", expr("matrix.enable_gpu || false"))?;
    }

    writeln!(out, "    secrets:")?;
    for secret in [
        "JENKINS_URL",
        "JENKINS_USER",
        "JENKINS_TOKEN",
        "SMTP_PASSWORD",
        "AWS_CREDENTIALS",
    ] {
        writeln!(out, "      {}: {}", secret, expr(&format!("secrets.{}", secret)))?;
    }
    Ok(())
}

/// Per-project settings; optional ones are only written when set
fn write_project(out: &mut String, project: &Ec2Project) -> fmt::Result {
    writeln!(
        out,
        "          # EC2 specific configuration for {}",
        comment_text(&project.name)
    )?;
    write_include_entry(out, &project.name)?;
    writeln!(out, "            command: {}", yaml_scalar(&project.command))?;
    writeln!(out, "            port: {}", port_scalar(&project.port))?;

    if !project.docker_network.is_empty() {
        writeln!(
            out,
            "            docker_network: {}",
            yaml_scalar(&project.docker_network)
        )?;
    }
    if !project.mount_path.is_empty() {
        writeln!(out, "            mount_path: {}", yaml_scalar(&project.mount_path))?;
    }
    if project.enable_gpu {
        writeln!(out, "            enable_gpu: true")?;
    }
    if !project.log_driver.is_empty() {
        writeln!(out, "            log_driver: {}", yaml_scalar(&project.log_driver))?;
    }
    if !project.log_driver_options.is_empty() {
        writeln!(
            out,
            "            log_driver_options: {}",
            yaml_scalar(&project.log_driver_options)
        )?;
    }
    Ok(())
}

/// Canonical port numbers stay YAML integers, anything else is a string
fn port_scalar(port: &str) -> Cow<'_, str> {
    match port.parse::<u16>() {
        Ok(number) if number.to_string() == port => Cow::Borrowed(port),
        _ => yaml_scalar(port),
    }
}
