use deckhand_cloud::aws::{AwsClient, DeployTagError, RegistryError};
use deckhand_cloud::executor::CommandExecutor;
use deckhand_cloud::tool::{Tool, ToolError};
use mockall::mock;

mock! {
    Executor {}

    impl CommandExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, ToolError>;
        async fn exec_streaming(&self, args: &[String]) -> Result<(), ToolError>;
        async fn exec_with_stdin(
            &self,
            args: &[String],
            stdin_data: &[u8],
        ) -> Result<String, ToolError>;
    }
}

fn has(args: &[String], word: &str) -> bool {
    args.iter().any(|a| a == word)
}

fn client(mock: MockExecutor) -> AwsClient<MockExecutor> {
    AwsClient::with_executor(mock, Some("us-east-1".to_owned()), Some("ci".to_owned()))
}

// ── Command shape ──

#[tokio::test]
async fn commands_carry_region_profile_and_json_output() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| {
            args.windows(2).any(|w| w == ["--region", "us-east-1"])
                && args.windows(2).any(|w| w == ["--profile", "ci"])
                && args.windows(2).any(|w| w == ["--output", "json"])
        })
        .times(1)
        .returning(|_| Ok(r#"{"imageIds": []}"#.to_owned()));

    let tags = client(mock).list_image_tags("billing", "123").await.unwrap();
    assert!(tags.is_empty());
}

#[tokio::test]
async fn empty_region_and_profile_are_omitted() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| !has(args, "--region") && !has(args, "--profile"))
        .times(1)
        .returning(|_| Ok("secret\n".to_owned()));

    let aws = AwsClient::with_executor(mock, Some(String::new()), None);
    assert_eq!(aws.ecr_login_password().await.unwrap(), "secret");
}

#[tokio::test]
async fn login_password_has_no_output_format() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "get-login-password") && !has(args, "--output"))
        .times(1)
        .returning(|_| Ok("pw\n".to_owned()));

    assert_eq!(client(mock).ecr_login_password().await.unwrap(), "pw");
}

// ── ECR tags ──

#[tokio::test]
async fn list_image_tags_follows_pagination() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "list-images") && !has(args, "--starting-token"))
        .times(1)
        .returning(|_| {
            Ok(r#"{"imageIds": [{"imageTag": "2401010000"}, {"imageDigest": "sha256:x"}],
                   "nextToken": "page-2"}"#
                .to_owned())
        });
    mock.expect_exec()
        .withf(|args| args.windows(2).any(|w| w == ["--starting-token", "page-2"]))
        .times(1)
        .returning(|_| Ok(r#"{"imageIds": [{"imageTag": "2402010000"}]}"#.to_owned()));

    let tags = client(mock).list_image_tags("billing", "123").await.unwrap();
    assert_eq!(tags, vec!["2401010000", "2402010000"]);
}

#[tokio::test]
async fn latest_build_for_stage_uses_bare_timestamps() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_| {
        Ok(r#"{"imageIds": [
            {"imageTag": "2401010000"},
            {"imageTag": "2403010000"},
            {"imageTag": "stage-pass-2412010000"},
            {"imageTag": "ci_job-7"}
        ]}"#
        .to_owned())
    });

    let tag = client(mock)
        .find_latest_build_tag("billing", "123", "stage")
        .await
        .unwrap();
    assert_eq!(tag, "2403010000");
}

#[tokio::test]
async fn latest_build_for_prod_requires_stage_pass() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_| {
        Ok(r#"{"imageIds": [
            {"imageTag": "2412010000"},
            {"imageTag": "stage-pass-2401010000"},
            {"imageTag": "stage-pass-2402010000"},
            {"imageTag": "stage-fail-2403010000"}
        ]}"#
        .to_owned())
    });

    let tag = client(mock)
        .find_latest_build_tag("billing", "123", "prod")
        .await
        .unwrap();
    assert_eq!(tag, "stage-pass-2402010000");
}

#[tokio::test]
async fn no_matching_tag_is_an_error() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .returning(|_| Ok(r#"{"imageIds": [{"imageTag": "2401010000"}]}"#.to_owned()));

    let err = client(mock)
        .find_latest_build_tag("billing", "123", "prod")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NoMatchingTag { .. }));
}

// ── Deploy tag lookup ──

fn resources_response() -> String {
    r#"{"StackResourceSummaries": [
        {"LogicalResourceId": "service", "PhysicalResourceId": "arn:svc"},
        {"LogicalResourceId": "taskdefinition", "PhysicalResourceId": "arn:td:3"}
    ]}"#
    .to_owned()
}

#[tokio::test]
async fn deploy_tag_from_single_container() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "list-stack-resources"))
        .times(1)
        .returning(|_| Ok(resources_response()));
    mock.expect_exec()
        .withf(|args| has(args, "describe-task-definition") && has(args, "arn:td:3"))
        .times(1)
        .returning(|_| {
            Ok(r#"{"taskDefinition": {"containerDefinitions": [
                {"name": "anything", "image": "123.dkr.ecr.aws/billing:stage-deploy-2401010000"}
            ]}}"#
                .to_owned())
        });

    let tag = client(mock)
        .find_latest_deploy_tag("stage-billing")
        .await
        .unwrap();
    assert_eq!(tag, "stage-deploy-2401010000");
}

#[tokio::test]
async fn deploy_tag_picks_container_named_after_stack() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "list-stack-resources"))
        .returning(|_| Ok(resources_response()));
    mock.expect_exec()
        .withf(|args| has(args, "describe-task-definition"))
        .returning(|_| {
            Ok(r#"{"taskDefinition": {"containerDefinitions": [
                {"name": "sidecar", "image": "envoy:1.30"},
                {"name": "stage-billing", "image": "reg/billing:2402010000"}
            ]}}"#
                .to_owned())
        });

    let tag = client(mock)
        .find_latest_deploy_tag("stage-billing-blue")
        .await
        .unwrap();
    assert_eq!(tag, "2402010000");
}

#[tokio::test]
async fn deploy_tag_without_matching_container_fails() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "list-stack-resources"))
        .returning(|_| Ok(resources_response()));
    mock.expect_exec()
        .withf(|args| has(args, "describe-task-definition"))
        .returning(|_| {
            Ok(r#"{"taskDefinition": {"containerDefinitions": [
                {"name": "a", "image": "x:1"},
                {"name": "b", "image": "y:2"}
            ]}}"#
                .to_owned())
        });

    let err = client(mock)
        .find_latest_deploy_tag("stage-billing")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployTagError::ContainerNotFound { .. }));
}

#[tokio::test]
async fn deploy_tag_missing_task_definition_resource() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "list-stack-resources"))
        .returning(|_| Ok(r#"{"StackResourceSummaries": []}"#.to_owned()));

    let err = client(mock)
        .find_latest_deploy_tag("stage-billing")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployTagError::ResourceNotFound { .. }));
}

#[tokio::test]
async fn describe_failure_surfaces_tool_error() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|args| {
        Err(ToolError::CommandFailed {
            tool: Tool::Aws,
            args: args.to_vec(),
            stderr: "AccessDenied".to_owned(),
        })
    });

    let err = client(mock)
        .find_latest_deploy_tag("stage-billing")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployTagError::ListResources { .. }));
}
