//! Kubernetes (Helm) deployment workflow

use std::fmt::{self, Write};

use crate::errors::TemplateError;
use crate::models::{DeploymentRequest, KubernetesCommonFields};

use super::{
    expr, generation_failed, image_name, write_build_job, write_header, write_matrix, yaml_scalar,
};

const TEMPLATE: &str = "k8s-workflow";

pub fn render(request: &DeploymentRequest, reusable_workflows: &str) -> Result<String, TemplateError> {
    let common = request
        .kubernetes_common_fields
        .as_ref()
        .ok_or_else(|| TemplateError::TemplateGenerationFailed {
            template: TEMPLATE,
            reason: "kubernetesCommonFields is missing".to_string(),
        })?;

    let mut out = String::with_capacity(4096);
    write_workflow(&mut out, request, common, reusable_workflows)
        .map_err(|e| generation_failed(TEMPLATE, e))?;
    Ok(out)
}

fn write_workflow(
    out: &mut String,
    request: &DeploymentRequest,
    common: &KubernetesCommonFields,
    reusable_workflows: &str,
) -> fmt::Result {
    write_header(out, "Build & Publish Image (Kubernetes)")?;
    write_build_job(out, request, reusable_workflows, &common.release_tag)?;

    let names = request.kubernetes_projects.iter().map(|p| p.name.as_str());

    writeln!(out, "  deploy-to-kubernetes:")?;
    writeln!(out, "    needs: build-and-push-dockerimages")?;
    write_matrix(out, names)?;
    writeln!(out, "    permissions:")?;
    writeln!(out, "      contents: read")?;
    writeln!(out, "      packages: write")?;
    writeln!(out)?;
    writeln!(
        out,
        "    uses: {}",
        yaml_scalar(&format!(
            "{}/.github/workflows/deploy.yml@{}",
            reusable_workflows, common.release_tag
        ))
    )?;
    writeln!(out, "    with:")?;
    writeln!(out, "      repository_name: {}", expr("github.event.repository.name"))?;
    writeln!(out, "      image_name: {}", image_name(request))?;
    writeln!(
        out,
        "      release_name: {}-{}",
        request.repository,
        expr("matrix.project")
    )?;
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
    writeln!(out, "      jenkins_job_name: {}", yaml_scalar(&common.jenkins_job_name))?;
    writeln!(out, "      workflows_release: {}", yaml_scalar(&common.release_tag))?;
    writeln!(
        out,
        "      helm_values_repository: {}",
        yaml_scalar(&common.helm_values_repository)
    )?;
    writeln!(
        out,
        "      codeowners_email_ids: {}",
        yaml_scalar(&common.codeowners_email_ids)
    )?;
    writeln!(
        out,
        "      devops_stakeholders_email_ids: {}",
        yaml_scalar(&common.devops_stakeholders_email_ids)
    )?;

    writeln!(out, "    secrets:")?;
    for secret in ["JENKINS_URL", "JENKINS_USER", "JENKINS_TOKEN", "SMTP_PASSWORD"] {
        writeln!(out, "      {}: {}", secret, expr(&format!("secrets.{}", secret)))?;
    }
    Ok(())
}
