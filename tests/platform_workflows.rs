//! Platform workflows against in-memory git, AWS and catalog doubles

mod common;

use std::collections::BTreeMap;

use common::{
    environment_entity, gitlab_repo, platform, MockAws, MockAwsFactory, MockCatalog, MockScm,
    GIT_TOKEN,
};
use harmonix_platform::catalog::Entity;
use harmonix_platform::error::{GitError, PlatformError};
use harmonix_platform::platform::{
    AppPromoParams, AwsProviderParams, BindResourceParams, EnvironmentProviderRecord,
    ProviderAction, ResourcePolicy, WorkflowState,
};
use harmonix_platform::scm::CommitActionKind;

const GITLAB_SECRET: &str = "opa-admin-gitlab-secrets";

fn fixtures() -> (MockScm, MockAwsFactory, MockCatalog) {
    (
        MockScm::new(),
        MockAwsFactory::new(MockAws::new()),
        MockCatalog::new(),
    )
}

fn provider_params(name: &str) -> AwsProviderParams {
    AwsProviderParams {
        aws_account: "123456789012".to_string(),
        aws_region: "us-east-1".to_string(),
        assumed_role_arn: "arn:aws:iam::123456789012:role/opa-dev-provisioning".to_string(),
        environment_name: "dev".to_string(),
        prefix: "opa".to_string(),
        provider_name: name.to_string(),
        parameters: BTreeMap::new(),
        ..Default::default()
    }
}

fn promo(providers: Vec<AwsProviderParams>) -> AppPromoParams {
    AppPromoParams {
        env_name: "dev".to_string(),
        env_requires_manual_approval: true,
        app_name: "orders".to_string(),
        providers,
    }
}

fn binding() -> BindResourceParams {
    BindResourceParams {
        env_name: "dev".to_string(),
        provider_name: "dev-ecs".to_string(),
        resource_name: "orders-db".to_string(),
        resource_entity_ref: "resource:default/orders-db".to_string(),
        policies: vec![ResourcePolicy {
            policy_file_name: "orders-db-access".to_string(),
            policy_content: r#"{"Effect":"Allow","Action":"rds-db:connect"}"#.to_string(),
            policy_resource: "arn:aws:rds:us-east-1:123456789012:db:orders".to_string(),
        }],
        app_name: "orders".to_string(),
    }
}

#[tokio::test]
async fn test_promote_commits_one_file_per_provider() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let status = service
        .promote_app_to_git(
            &promo(vec![provider_params("dev-ecs"), provider_params("dev-eks")]),
            &gitlab_repo("orders"),
            GITLAB_SECRET,
        )
        .await
        .unwrap();

    assert_eq!(status.status, WorkflowState::Success);
    assert!(status.message.contains("Check the CICD pipeline"));
    assert_eq!(scm.tokens(), vec![GIT_TOKEN.to_string()]);

    let commits = scm.commits();
    assert_eq!(commits.len(), 1);
    let commit = &commits[0];
    assert_eq!(commit.branch, "main");
    assert_eq!(commit.commit_message, "generate CICD stages");
    let paths: Vec<&str> = commit.actions.iter().map(|a| a.file_path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            ".awsdeployment/providers/dev-dev-ecs.properties",
            ".awsdeployment/providers/dev-dev-eks.properties",
        ]
    );
    assert!(commit
        .actions
        .iter()
        .all(|a| a.action == CommitActionKind::Create));
    assert!(commit.actions[0]
        .content
        .contains("OPA_CI_ENVIRONMENT_MANUAL_APPROVAL=true"));
}

#[tokio::test]
async fn test_promote_without_providers_is_rejected() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .promote_app_to_git(&promo(Vec::new()), &gitlab_repo("orders"), GITLAB_SECRET)
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::InvalidInput(_)));
    assert!(scm.calls().is_empty());
}

#[tokio::test]
async fn test_second_promotion_is_already_scheduled() {
    let (scm, aws, catalog) = fixtures();
    scm.fail_commits_with("A file with this name already exists");
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .promote_app_to_git(
            &promo(vec![provider_params("dev-ecs")]),
            &gitlab_repo("orders"),
            GITLAB_SECRET,
        )
        .await
        .unwrap_err();
    match err {
        PlatformError::AlreadyScheduled(message) => {
            assert!(message.starts_with("dev has already been scheduled for deployment."));
        }
        other => panic!("expected AlreadyScheduled, got {other}"),
    }
}

#[tokio::test]
async fn test_other_commit_failures_are_not_translated() {
    let (scm, aws, catalog) = fixtures();
    scm.fail_commits_with("You are not allowed to push into this branch");
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .bind_resource(&gitlab_repo("orders"), &binding(), GITLAB_SECRET)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PlatformError::Git(GitError::Api { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_missing_git_token_fails_before_commit() {
    let scm = MockScm::new();
    let aws = MockAwsFactory::new(MockAws::new().with_secret(GITLAB_SECRET, r#"{"user":"x"}"#));
    let catalog = MockCatalog::new();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .bind_resource(&gitlab_repo("orders"), &binding(), GITLAB_SECRET)
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::MissingGitToken(ref name) if name == GITLAB_SECRET));
    assert!(scm.commits().is_empty());
}

#[tokio::test]
async fn test_bind_and_unbind_are_inverse_file_changes() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);
    let repo = gitlab_repo("orders");

    service
        .bind_resource(&repo, &binding(), GITLAB_SECRET)
        .await
        .unwrap();
    service
        .unbind_resource(&repo, &binding(), GITLAB_SECRET)
        .await
        .unwrap();

    let commits = scm.commits();
    assert_eq!(commits.len(), 2);
    let (bind, unbind) = (&commits[0], &commits[1]);
    assert_eq!(bind.commit_message, "Bind Resource");
    assert_eq!(unbind.commit_message, "UnBind Resource");

    let policy = ".iac/permissions/dev/dev-ecs/orders-db-access.json";
    assert_eq!(bind.actions[0].file_path, policy);
    assert_eq!(bind.actions[0].action, CommitActionKind::Create);
    assert_eq!(unbind.actions[0].file_path, policy);
    assert_eq!(unbind.actions[0].action, CommitActionKind::Delete);

    let params = &bind.actions[1];
    assert_eq!(params.file_path, ".awsdeployment/resource-binding-params-temp.properties");
    assert!(params.content.contains("RESOURCE_ENTITY_REF=resource:default/orders-db"));
}

#[tokio::test]
async fn test_attach_provider_rewrites_depends_on() {
    let (scm, aws, catalog) = fixtures();
    let catalog = catalog.with_entity(environment_entity("dev", &["dev-ecs"]));
    let service = platform(&scm, &aws, &catalog);
    let provider = EnvironmentProviderRecord {
        name: "dev-eks".to_string(),
        prefix: "opa".to_string(),
        provider_type: "eks".to_string(),
        ..Default::default()
    };

    let status = service
        .change_environment_provider("awsenvironment:default/dev", &provider, ProviderAction::Add)
        .await
        .unwrap();

    assert!(status.is_success());
    assert_eq!(
        status.refresh_entities,
        vec![
            "awsenvironment:default/dev".to_string(),
            "awsenvironmentprovider:default/dev-eks".to_string(),
        ]
    );

    let commits = scm.commits();
    assert_eq!(commits.len(), 1);
    let action = &commits[0].actions[0];
    assert_eq!(action.file_path, ".backstage/catalog-info.yaml");
    assert_eq!(action.action, CommitActionKind::Update);

    let descriptor = Entity::from_yaml(&action.content).unwrap();
    assert_eq!(
        descriptor.spec_str_list("dependsOn"),
        vec![
            "awsenvironmentprovider:default/dev-ecs".to_string(),
            "awsenvironmentprovider:default/dev-eks".to_string(),
        ]
    );
    assert!(descriptor.metadata.uid.is_none());
    assert!(descriptor.relations.is_empty());
    assert_eq!(scm.calls(), vec!["commit:aws-environments/dev".to_string()]);
}

#[tokio::test]
async fn test_detach_provider_removes_dependency() {
    let (scm, aws, catalog) = fixtures();
    let catalog = catalog.with_entity(environment_entity("dev", &["dev-ecs", "dev-eks"]));
    let service = platform(&scm, &aws, &catalog);
    let provider = EnvironmentProviderRecord {
        name: "dev-ecs".to_string(),
        ..Default::default()
    };

    service
        .change_environment_provider("awsenvironment:default/dev", &provider, ProviderAction::Remove)
        .await
        .unwrap();

    let descriptor = Entity::from_yaml(&scm.commits()[0].actions[0].content).unwrap();
    assert_eq!(
        descriptor.spec_str_list("dependsOn"),
        vec!["awsenvironmentprovider:default/dev-eks".to_string()]
    );
}

#[tokio::test]
async fn test_attach_failure_is_not_reported_as_attached() {
    let (scm, aws, catalog) = fixtures();
    scm.fail_commits_with("500 Internal Server Error");
    let catalog = catalog.with_entity(environment_entity("dev", &[]));
    let service = platform(&scm, &aws, &catalog);
    let provider = EnvironmentProviderRecord {
        name: "dev-ecs".to_string(),
        ..Default::default()
    };

    let err = service
        .change_environment_provider("awsenvironment:default/dev", &provider, ProviderAction::Add)
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Git(GitError::Api { .. })));
    assert!(catalog.refreshed().is_empty());
}

#[tokio::test]
async fn test_attach_to_unknown_environment() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .change_environment_provider(
            "awsenvironment:default/missing",
            &EnvironmentProviderRecord::default(),
            ProviderAction::Add,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Catalog(_)));
    assert!(scm.calls().is_empty());
}

#[tokio::test]
async fn test_terraform_destroy_commit() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let status = service
        .delete_tf_provider("dev", "dev-ecs", &gitlab_repo("orders"), GITLAB_SECRET)
        .await
        .unwrap();
    assert!(status.is_success());

    let commit = &scm.commits()[0];
    assert_eq!(commit.commit_message, "Destroy TF Infrastructure");
    assert_eq!(
        commit.actions[0].file_path,
        ".awsdeployment/env-destroy-params-temp.properties"
    );
}

#[tokio::test]
async fn test_read_file_from_git() {
    let (scm, aws, catalog) = fixtures();
    scm.add_file(".backstage/catalog-info.yaml", "kind: AWSEnvironment\n");
    let service = platform(&scm, &aws, &catalog);

    let content = service
        .get_file_contents_from_git(
            &gitlab_repo("dev"),
            ".backstage/catalog-info.yaml",
            GITLAB_SECRET,
        )
        .await
        .unwrap();
    assert_eq!(content, "kind: AWSEnvironment\n");
}
