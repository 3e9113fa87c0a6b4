//! Data models

pub mod request;
pub mod workflow;

pub use request::{
    DeploymentRequest, DeploymentType, Ec2CommonFields, Ec2Project, KubernetesCommonFields,
    KubernetesProject, Project,
};
pub use workflow::{PublishResult, UpdateWorkflowRequest, WorkflowContent, WorkflowFile};
