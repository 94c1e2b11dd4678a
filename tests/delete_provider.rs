//! Provider deletion: step order, refusal while in use, and partial failures

mod common;

use harmonix_platform::catalog::{Location, StoredRelation};
use harmonix_platform::error::PlatformError;
use harmonix_platform::platform::{DeleteStep, Requester};

use common::{
    platform, provider_entity, MockAws, MockAwsFactory, MockCatalog, MockScm, PROVIDER_LOCATION,
};

const AUDIT_PARAMETER: &str = "/opa/dev-ecs/dev-ecs-audit";

fn requester() -> Requester {
    Requester {
        user_name: "jdoe".to_string(),
        ownership_refs: vec![
            "group:default/everyone".to_string(),
            "group:default/platform".to_string(),
        ],
    }
}

fn location() -> Location {
    let (location_type, target) = PROVIDER_LOCATION.split_once(':').unwrap();
    Location {
        id: "loc-1".to_string(),
        location_type: location_type.to_string(),
        target: target.to_string(),
    }
}

fn fixtures() -> (MockScm, MockAwsFactory, MockCatalog) {
    (
        MockScm::new(),
        MockAwsFactory::new(MockAws::new().with_parameter(AUDIT_PARAMETER, "opa-dev-ecs-audit")),
        MockCatalog::new().with_location(location()),
    )
}

#[tokio::test]
async fn test_stack_provider_is_deleted_in_order() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let status = service
        .delete_provider(&provider_entity("dev-ecs", "cdk"), &requester())
        .await
        .unwrap();

    assert!(status.is_success());
    assert!(status.warnings.is_empty(), "{:?}", status.warnings);
    assert_eq!(status.message, "CloudFormation stack delete initiated for dev-ecs.");

    let sessions = aws.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        sessions[0].role_arn(),
        "arn:aws:iam::123456789012:role/opa-dev-ecs-operations-role"
    );

    let calls = aws.aws.calls();
    let position = |call: &str| calls.iter().position(|c| c == call).unwrap();
    assert!(position("delete_stack:dev-ecs-stack") < position("put_item:opa-dev-ecs-audit"));

    let items = aws.aws.put_items();
    assert_eq!(items.len(), 1);
    let (_, item) = &items[0];
    assert_eq!(item["actionType"], "Delete Stack");
    assert_eq!(item["initiatedBy"], "jdoe");
    assert_eq!(item["owner"], "platform");
    assert_eq!(item["status"], "SUCCESS");

    assert_eq!(scm.calls(), vec!["delete:aws-environment-providers/dev-ecs".to_string()]);
    assert_eq!(catalog.removed_locations(), vec!["loc-1".to_string()]);
    assert_eq!(catalog.removed_uids(), vec!["uid-dev-ecs".to_string()]);
}

#[tokio::test]
async fn test_provider_in_use_is_refused() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);
    let mut provider = provider_entity("dev-ecs", "cloudformation");
    provider.relations.push(StoredRelation {
        relation_type: "dependencyOf".to_string(),
        target_ref: "awsenvironment:default/dev".to_string(),
    });

    let err = service
        .delete_provider(&provider, &requester())
        .await
        .unwrap_err();

    match err {
        PlatformError::ProviderInUse {
            provider,
            environments,
        } => {
            assert_eq!(provider, "dev-ecs");
            assert_eq!(environments, vec!["awsenvironment:default/dev".to_string()]);
        }
        other => panic!("expected ProviderInUse, got {other}"),
    }
    assert!(aws.aws.calls().is_empty());
    assert!(scm.calls().is_empty());
    assert!(catalog.removed_uids().is_empty());
}

#[tokio::test]
async fn test_repository_failure_leaves_partial_delete() {
    let (scm, aws, catalog) = fixtures();
    scm.fail_deletes();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .delete_provider(&provider_entity("dev-ecs", "cloudformation"), &requester())
        .await
        .unwrap_err();

    match &err {
        PlatformError::PartialDelete {
            failed_step,
            completed_steps,
            ..
        } => {
            assert_eq!(*failed_step, DeleteStep::Repository);
            assert_eq!(completed_steps, &vec![DeleteStep::Infrastructure]);
        }
        other => panic!("expected PartialDelete, got {other}"),
    }
    assert!(err
        .to_string()
        .starts_with("Provider deletion stopped at 'delete repository' after completing [destroy infrastructure]"));

    // the stack delete already happened and is not undone
    assert!(aws.aws.calls().contains(&"delete_stack:dev-ecs-stack".to_string()));
    assert!(catalog.removed_locations().is_empty());
    assert!(catalog.removed_uids().is_empty());
}

#[tokio::test]
async fn test_stack_failure_stops_before_any_other_step() {
    let (scm, aws, catalog) = fixtures();
    aws.aws.fail_delete_stack();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .delete_provider(&provider_entity("dev-ecs", "cdk"), &requester())
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        PlatformError::PartialDelete {
            failed_step: DeleteStep::Infrastructure,
            completed_steps,
            ..
        } if completed_steps.is_empty()
    ));
    assert!(scm.calls().is_empty());
    assert!(aws.aws.put_items().is_empty());
}

#[tokio::test]
async fn test_catalog_failure_reports_completed_steps() {
    let (scm, aws, catalog) = fixtures();
    catalog.fail_entity_removal();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .delete_provider(&provider_entity("dev-ecs", "cdk"), &requester())
        .await
        .unwrap_err();

    match err {
        PlatformError::PartialDelete {
            failed_step,
            completed_steps,
            ..
        } => {
            assert_eq!(failed_step, DeleteStep::CatalogEntity);
            assert_eq!(
                completed_steps,
                vec![
                    DeleteStep::Infrastructure,
                    DeleteStep::Repository,
                    DeleteStep::CatalogLocation,
                ]
            );
        }
        other => panic!("expected PartialDelete, got {other}"),
    }
}

#[tokio::test]
async fn test_terraform_provider_schedules_destroy() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let status = service
        .delete_provider(&provider_entity("dev-ecs", "terraform"), &requester())
        .await
        .unwrap();

    assert!(status.is_success());
    assert!(status.message.starts_with("Terraform destroy scheduled for dev-ecs."));
    assert!(aws.sessions().is_empty());
    assert!(!aws.aws.calls().iter().any(|c| c.starts_with("delete_stack")));

    // the destroy job runs from the provider repository, which is kept
    assert_eq!(scm.calls(), vec!["commit:aws-environment-providers/dev-ecs".to_string()]);
    let commit = &scm.commits()[0];
    assert_eq!(commit.actions[0].file_path, "env-destroy-params-temp.properties");
    assert!(commit.actions[0]
        .content
        .contains("TARGET_ENV_PROVIDER_NAME=dev-ecs"));

    assert_eq!(catalog.removed_uids(), vec!["uid-dev-ecs".to_string()]);
}

#[tokio::test]
async fn test_audit_failure_becomes_warning() {
    let scm = MockScm::new();
    let aws = MockAwsFactory::new(MockAws::new());
    let catalog = MockCatalog::new().with_location(location());
    let service = platform(&scm, &aws, &catalog);

    let status = service
        .delete_provider(&provider_entity("dev-ecs", "cdk"), &requester())
        .await
        .unwrap();

    assert!(status.is_success());
    assert_eq!(status.warnings.len(), 1);
    assert!(status.warnings[0].starts_with("Audit record was not written"));
    assert_eq!(catalog.removed_uids(), vec!["uid-dev-ecs".to_string()]);
}

#[tokio::test]
async fn test_unknown_iac_type_is_rejected() {
    let (scm, aws, catalog) = fixtures();
    let service = platform(&scm, &aws, &catalog);

    let err = service
        .delete_provider(&provider_entity("dev-ecs", "pulumi"), &requester())
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::InvalidInput(_)));
    assert!(aws.aws.calls().is_empty());
}
