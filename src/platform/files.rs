//! Pipeline input files committed by the workflows.

use serde_json::Value;

use super::types::{AppPromoParams, AwsProviderParams, BindResourceParams, ProviderAction};
use crate::catalog::Entity;
use crate::constants::{
    ENV_DESTROY_PARAMS_FILE, PERMISSIONS_DIR, PROVIDER_PROPERTIES_DIR,
};
use crate::error::PlatformError;
use crate::scm::CommitAction;

#[must_use]
pub fn provider_properties_path(env_name: &str, provider_name: &str) -> String {
    format!("{PROVIDER_PROPERTIES_DIR}/{env_name}-{provider_name}.properties")
}

/// Deployment parameters for one provider of a promotion
#[must_use]
pub fn provider_properties(input: &AppPromoParams, provider: &AwsProviderParams) -> String {
    let registry = format!(
        "{}.dkr.ecr.{}.amazonaws.com",
        provider.aws_account, provider.aws_region
    );
    let mut content = format!(
        "ACCOUNT={}\nREGION={}\nTARGET_ENV_NAME={}\nPREFIX={}\n\
         TARGET_ENV_PROVIDER_NAME={}\nOPA_CI_ENVIRONMENT={}-{}\n\
         OPA_CI_ENVIRONMENT_MANUAL_APPROVAL={}\n\
         OPA_CI_REGISTRY_IMAGE={registry}/{}-{}-{}\nOPA_CI_REGISTRY={registry}\n",
        provider.aws_account,
        provider.aws_region,
        provider.environment_name,
        provider.prefix,
        provider.provider_name,
        provider.environment_name,
        provider.provider_name,
        input.env_requires_manual_approval,
        input.app_name,
        input.env_name,
        provider.provider_name,
    );
    for (key, value) in &provider.parameters {
        content.push_str(&format!("{key}={value}\n"));
    }
    content
}

#[must_use]
pub fn policy_path(env_name: &str, provider_name: &str, policy_file_name: &str) -> String {
    format!("{PERMISSIONS_DIR}/{env_name}/{provider_name}/{policy_file_name}.json")
}

#[must_use]
pub fn resource_binding_params(input: &BindResourceParams) -> String {
    format!(
        "RESOURCE_ENTITY_REF={}\nRESOURCE_ENTITY={}\nTARGET_ENV_NAME={}\nTARGET_ENV_PROVIDER_NAME={}",
        input.resource_entity_ref, input.resource_name, input.env_name, input.provider_name
    )
}

/// Destroy parameters file; lives under `.awsdeployment/` for app environments
#[must_use]
pub fn env_destroy_params_path(env_name: &str) -> String {
    if env_name.is_empty() {
        ENV_DESTROY_PARAMS_FILE.to_string()
    } else {
        format!(".awsdeployment/{ENV_DESTROY_PARAMS_FILE}")
    }
}

#[must_use]
pub fn env_destroy_params(env_name: &str, provider_name: &str) -> String {
    format!(
        "PROVIDER_FILE_TO_DELETE={env_name}-{provider_name}.properties\n\
         ENV_ENTITY_REF=\"awsenvironment:default/{env_name}\"\n\
         TARGET_ENV_NAME={env_name}\nTARGET_ENV_PROVIDER_NAME={provider_name}"
    )
}

/// Catalog descriptor of `environment` with `provider_ref` added to or removed from `spec.dependsOn`
///
/// Catalog-managed fields (uid, etag, relations) are dropped so the file
/// matches what a user would commit.
pub fn rewrite_depends_on(
    environment: &Entity,
    provider_ref: &str,
    action: ProviderAction,
) -> Result<String, PlatformError> {
    let mut descriptor = environment.clone();
    descriptor.relations.clear();
    descriptor.metadata.uid = None;
    descriptor.metadata.extra.remove("etag");
    descriptor.metadata.extra.remove("generation");

    let mut depends_on = environment.spec_str_list("dependsOn");
    match action {
        ProviderAction::Add => {
            if !depends_on.iter().any(|d| d == provider_ref) {
                depends_on.push(provider_ref.to_string());
            }
        }
        ProviderAction::Remove => depends_on.retain(|d| d != provider_ref),
    }

    let spec = descriptor
        .spec
        .as_object_mut()
        .ok_or_else(|| PlatformError::InvalidInput(format!(
            "{} has no spec object",
            environment.entity_ref()
        )))?;
    spec.insert(
        "dependsOn".to_string(),
        Value::from(depends_on),
    );

    serde_yaml::to_string(&descriptor).map_err(|e| PlatformError::Serialization {
        what: "catalog descriptor",
        message: e.to_string(),
    })
}

/// Commit actions for the policy files of a binding
pub fn policy_actions(input: &BindResourceParams, create: bool) -> Vec<CommitAction> {
    input
        .policies
        .iter()
        .map(|p| {
            let path = policy_path(&input.env_name, &input.provider_name, &p.policy_file_name);
            if create {
                CommitAction::create(path, p.policy_content.clone())
            } else {
                CommitAction::delete(path, p.policy_content.clone())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::ResourcePolicy;
    use std::collections::BTreeMap;

    fn promo() -> AppPromoParams {
        AppPromoParams {
            env_name: "dev".to_string(),
            env_requires_manual_approval: false,
            app_name: "orders".to_string(),
            providers: vec![AwsProviderParams {
                aws_account: "123456789012".to_string(),
                aws_region: "us-east-1".to_string(),
                environment_name: "dev".to_string(),
                prefix: "opa".to_string(),
                provider_name: "ecs".to_string(),
                parameters: BTreeMap::from([("CLUSTER".to_string(), "c1".to_string())]),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_provider_properties_content() {
        let input = promo();
        let content = provider_properties(&input, &input.providers[0]);
        assert_eq!(
            content,
            "ACCOUNT=123456789012\nREGION=us-east-1\nTARGET_ENV_NAME=dev\nPREFIX=opa\n\
             TARGET_ENV_PROVIDER_NAME=ecs\nOPA_CI_ENVIRONMENT=dev-ecs\n\
             OPA_CI_ENVIRONMENT_MANUAL_APPROVAL=false\n\
             OPA_CI_REGISTRY_IMAGE=123456789012.dkr.ecr.us-east-1.amazonaws.com/orders-dev-ecs\n\
             OPA_CI_REGISTRY=123456789012.dkr.ecr.us-east-1.amazonaws.com\nCLUSTER=c1\n"
        );
        assert_eq!(
            provider_properties_path("dev", "ecs"),
            ".awsdeployment/providers/dev-ecs.properties"
        );
    }

    #[test]
    fn test_destroy_params_location_depends_on_env() {
        assert_eq!(env_destroy_params_path(""), "env-destroy-params-temp.properties");
        assert_eq!(
            env_destroy_params_path("dev"),
            ".awsdeployment/env-destroy-params-temp.properties"
        );
        assert!(env_destroy_params("dev", "ecs")
            .starts_with("PROVIDER_FILE_TO_DELETE=dev-ecs.properties\nENV_ENTITY_REF=\"awsenvironment:default/dev\""));
    }

    #[test]
    fn test_policy_actions() {
        let input = BindResourceParams {
            env_name: "dev".to_string(),
            provider_name: "ecs".to_string(),
            resource_name: "db".to_string(),
            resource_entity_ref: "resource:default/db".to_string(),
            policies: vec![ResourcePolicy {
                policy_file_name: "db-access".to_string(),
                policy_content: "{}".to_string(),
                policy_resource: String::new(),
            }],
            app_name: "orders".to_string(),
        };
        let actions = policy_actions(&input, false);
        assert_eq!(actions[0].file_path, ".iac/permissions/dev/ecs/db-access.json");
        assert_eq!(actions[0].action, crate::scm::CommitActionKind::Delete);
        assert_eq!(
            resource_binding_params(&input),
            "RESOURCE_ENTITY_REF=resource:default/db\nRESOURCE_ENTITY=db\nTARGET_ENV_NAME=dev\nTARGET_ENV_PROVIDER_NAME=ecs"
        );
    }

    #[test]
    fn test_rewrite_depends_on_add_and_remove() {
        let env = Entity::from_yaml(
            r#"
apiVersion: aws.backstage.io/v1alpha
kind: AWSEnvironment
metadata:
  name: dev
  uid: 6f1c2a5e-0d7b
spec:
  type: environment
  lifecycle: development
  dependsOn:
    - awsenvironmentprovider:default/ecs
relations:
  - type: dependsOn
    targetRef: awsenvironmentprovider:default/ecs
"#,
        )
        .unwrap();

        let added = rewrite_depends_on(&env, "awsenvironmentprovider:default/eks", ProviderAction::Add)
            .unwrap();
        let parsed = Entity::from_yaml(&added).unwrap();
        assert_eq!(
            parsed.spec_str_list("dependsOn"),
            vec!["awsenvironmentprovider:default/ecs", "awsenvironmentprovider:default/eks"]
        );
        assert!(parsed.relations.is_empty());
        assert!(parsed.metadata.uid.is_none());

        let removed =
            rewrite_depends_on(&env, "awsenvironmentprovider:default/ecs", ProviderAction::Remove)
                .unwrap();
        assert!(Entity::from_yaml(&removed).unwrap().spec_str_list("dependsOn").is_empty());
    }
}
