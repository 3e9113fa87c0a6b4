//! GitHub Actions workflow templates
//!
//! Each deployment type has its own template function writing YAML into a
//! `String`. Both share the header and the image build job; they differ in the
//! deploy job that follows it.

pub mod ec2;
pub mod kubernetes;

use std::borrow::Cow;
use std::fmt::{self, Write};
use std::sync::LazyLock;

use regex::Regex;
use tracing::error;

use crate::errors::TemplateError;
use crate::models::{DeploymentRequest, DeploymentType, Project};

/// Repository hosting the reusable build and deploy workflows
pub const DEFAULT_REUSABLE_WORKFLOWS: &str = "Calance-US/calance-workflows";

/// Renders deployment requests into workflow YAML
#[derive(Debug, Clone)]
pub struct WorkflowRenderer {
    reusable_workflows: String,
}

impl Default for WorkflowRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_REUSABLE_WORKFLOWS)
    }
}

impl WorkflowRenderer {
    pub fn new(reusable_workflows: impl Into<String>) -> Self {
        Self {
            reusable_workflows: reusable_workflows.into(),
        }
    }

    pub fn reusable_workflows(&self) -> &str {
        &self.reusable_workflows
    }

    /// Render the template selected by the request's deployment type.
    ///
    /// The request is expected to be validated already; a missing field group
    /// here is a caller defect and surfaces as a template error.
    pub fn render(&self, request: &DeploymentRequest) -> Result<String, TemplateError> {
        let result = match request.deployment_type {
            DeploymentType::Ec2 => ec2::render(request, &self.reusable_workflows),
            DeploymentType::Kubernetes => kubernetes::render(request, &self.reusable_workflows),
            DeploymentType::Unknown => Err(TemplateError::TemplateGenerationFailed {
                template: "workflow",
                reason: "unsupported deployment type".to_string(),
            }),
        };

        if let Err(e) = &result {
            error!(
                deployment_type = %request.deployment_type,
                workflow_name = %request.workflow_name,
                "Failed to generate workflow: {}", e
            );
        }

        result
    }
}

/// Render with the default reusable workflows repository
pub fn render(request: &DeploymentRequest) -> Result<String, TemplateError> {
    WorkflowRenderer::default().render(request)
}

/// Prefix every non-empty line with `spaces` spaces. Empty lines stay empty so
/// the output never carries whitespace-only lines.
pub fn indent(spaces: usize, text: &str) -> String {
    let prefix = " ".repeat(spaces);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                Cow::Borrowed(line)
            } else {
                Cow::Owned(format!("{}{}", prefix, line))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// GitHub Actions expression, `${{ expr }}`
pub fn expr(expression: &str) -> String {
    format!("${{{{ {} }}}}", expression)
}

/// Plain scalars a YAML 1.1 or 1.2 loader resolves to null, bool, number or
/// timestamp instead of a string
static NON_STRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:~|null|Null|NULL",
        r"|y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF",
        r"|[-+]?(?:[0-9][0-9_]*(?:\.[0-9_]*)?|\.[0-9][0-9_]*)(?:[eE][-+]?[0-9]+)?",
        r"|[-+]?0[xX][0-9a-fA-F_]+|[-+]?0[oO][0-7_]+|[-+]?0[bB][01_]+",
        r"|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+(?:\.[0-9_]*)?",
        r"|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN)",
        r"|[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}(?:[Tt ].*)?",
        r")$"
    ))
    .expect("non-string scalar pattern is valid")
});

/// Emit `value` as a plain YAML scalar when that is unambiguous and still reads
/// back as the same string, otherwise as a double-quoted one.
pub fn yaml_scalar(value: &str) -> Cow<'_, str> {
    if is_plain_safe(value) && !NON_STRING_RE.is_match(value) {
        Cow::Borrowed(value)
    } else {
        // JSON string escapes are valid YAML double-quoted escapes
        Cow::Owned(serde_json::Value::String(value.to_string()).to_string())
    }
}

fn is_plain_safe(value: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`',
    ];
    const FLOW: &[char] = &[',', '[', ']', '{', '}'];

    let Some(first) = value.chars().next() else {
        return false;
    };

    // "./run" and "-v" style values are fine as long as the indicator is not
    // followed by a space
    let leading_ok = match first {
        '-' | '?' | ':' => value.chars().nth(1).is_some_and(|c| !c.is_whitespace()),
        c => !INDICATORS.contains(&c),
    };

    leading_ok
        && value.trim() == value
        && !value.chars().any(|c| c.is_control() || FLOW.contains(&c))
        && !value.contains(": ")
        && !value.contains(" #")
        && !value.ends_with(':')
}

/// `[a, b, c]`
pub(crate) fn flow_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let items: Vec<Cow<'_, str>> = items.into_iter().map(yaml_scalar).collect();
    format!("[{}]", items.join(", "))
}

/// Single-line text for YAML comments
pub(crate) fn comment_text(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

pub(crate) fn generation_failed(template: &'static str, err: fmt::Error) -> TemplateError {
    TemplateError::TemplateGenerationFailed {
        template,
        reason: err.to_string(),
    }
}

pub(crate) fn write_header(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "name: {}", yaml_scalar(title))?;
    writeln!(out)?;
    writeln!(out, "on:")?;
    writeln!(out, "  push:")?;
    writeln!(out, "    tags:")?;
    writeln!(out, "      - v[0-9]+.[0-9]+.[0-9]+-rc[0-9]+")?;
    writeln!(out, "      - v[0-9]+.[0-9]+.[0-9]+")?;
    writeln!(out)?;
    writeln!(out, "jobs:")
}

/// Indent of the fields of a matrix `include` entry
pub(crate) const INCLUDE_INDENT: usize = 12;

/// Opens a job's `strategy` block with one matrix run per name
pub(crate) fn write_matrix<'a>(
    out: &mut String,
    names: impl IntoIterator<Item = &'a str>,
) -> fmt::Result {
    writeln!(out, "    strategy:")?;
    writeln!(out, "      fail-fast: false")?;
    writeln!(out, "      matrix:")?;
    writeln!(out, "        project: {}", flow_list(names))
}

/// Starts the `include` entry holding one project's inputs. Its fields follow
/// at [`INCLUDE_INDENT`] and are read back as `matrix.<field>`, so every input
/// key appears once per job however many projects there are.
pub(crate) fn write_include_entry(out: &mut String, name: &str) -> fmt::Result {
    writeln!(out, "          - project: {}", yaml_scalar(name))
}

/// `build-and-push-dockerimages`, shared by every deployment type
pub(crate) fn write_build_job(
    out: &mut String,
    request: &DeploymentRequest,
    reusable_workflows: &str,
    release_tag: &str,
) -> fmt::Result {
    writeln!(out, "  build-and-push-dockerimages:")?;
    write_matrix(out, request.projects.iter().map(|p| p.name.as_str()))?;
    if !request.projects.is_empty() {
        writeln!(out, "        include:")?;
        for project in &request.projects {
            write_dot_env(out, project)?;
        }
    }
    writeln!(out, "    permissions:")?;
    writeln!(out, "      contents: read")?;
    writeln!(out, "      packages: write")?;
    writeln!(out, "    secrets:")?;
    writeln!(
        out,
        "      IMAGE_REGISTRY_PASSWORD: {}",
        expr("secrets.IMAGE_REGISTRY_PASSWORD")
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "    uses: {}",
        yaml_scalar(&format!(
            "{}/.github/workflows/build.yml@{}",
            reusable_workflows, release_tag
        ))
    )?;
    writeln!(out, "    with:")?;
    writeln!(out, "      image_name: {}", image_name(request))?;
    writeln!(out, "      image_registry: {}", expr("vars.IMAGE_REGISTRY"))?;
    writeln!(
        out,
        "      image_registry_username: {}",
        expr("vars.IMAGE_REGISTRY_USERNAME")
    )?;
    writeln!(out, "      docker_context_path: {}", expr("matrix.project"))?;
    writeln!(out, "      dockerfile_path: ./{}/Dockerfile", expr("matrix.project"))?;
    writeln!(
        out,
        "      dot_env_file_testing: {}",
        expr("matrix.dot_env_file_testing")
    )?;
    writeln!(out)
}

/// Testing `.env` text as a literal block, empty lines kept. The explicit
/// indentation indicator keeps leading whitespace on the first line as content.
fn write_dot_env(out: &mut String, project: &Project) -> fmt::Result {
    write_include_entry(out, &project.name)?;
    writeln!(out, "            dot_env_file_testing: |2")?;
    writeln!(out, "{}", indent(INCLUDE_INDENT + 2, &project.dot_env_testing))
}

pub(crate) fn image_name(request: &DeploymentRequest) -> String {
    format!(
        "{}/{}-{}",
        request.owner,
        request.repository,
        expr("matrix.project")
    )
}
