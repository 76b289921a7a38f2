//! Configuration resolution tests

#[path = "../common/mod.rs"]
mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

use common::{test_checkout, test_config, test_settings};
use easy_aws::config::checkout::Checkout;
use easy_aws::config::deployment::{ConfigOverrides, DeploymentConfig};
use easy_aws::config::env_file::{merge_vars, EnvFile};
use easy_aws::config::ensure_checkout_id;
use easy_aws::config::prompt::{fill_missing, Prompter};
use easy_aws::config::settings::EnvSettings;
use easy_aws::errors::LauncherError;
use easy_aws::models::tags::{CREATOR_TAG, KEEP_ALIVE_TAG};
use tokio_test::{assert_err, assert_ok};

/// Answers prompts from a fixed list and remembers what was asked
struct CannedPrompter {
    answers: RefCell<Vec<String>>,
    asked: RefCell<Vec<String>>,
}

impl CannedPrompter {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().rev().map(|a| a.to_string()).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl Prompter for CannedPrompter {
    fn prompt(&self, label: &str) -> Result<String, LauncherError> {
        self.asked.borrow_mut().push(label.to_string());
        self.answers
            .borrow_mut()
            .pop()
            .ok_or_else(|| LauncherError::PromptError("no more answers".to_string()))
    }
}

#[test]
fn test_resolve_derived_names() {
    let config = test_config(&ConfigOverrides::default());

    assert_eq!(config.project_name, "demo_app");
    assert_eq!(config.cluster_name, "demo_app-feature-0f0e");
    assert_eq!(config.container_name, "demo_app");
    assert_eq!(config.task_family_name, "demo_app-feature-0f0e");
    assert_eq!(config.service_name, "demo_app-feature-0f0e");
    assert_eq!(config.ecr_repo, "demo_app-feature-0f0e");
    assert_eq!(
        config.image_uri,
        "123456789012.dkr.ecr.us-east-1.amazonaws.com/demo_app-feature-0f0e:latest"
    );
    assert_eq!(config.local_container, "demo_app:latest");
    assert_eq!(config.log_group, "/ecs/demo_app");
    assert_eq!(config.tags.get(CREATOR_TAG), Some("alice"));
    assert_eq!(config.tags.get(KEEP_ALIVE_TAG), None);
    assert_eq!(config.drain_timeout, Duration::from_secs(600));
}

#[test]
fn test_resolve_parent_prefix() {
    let mut settings = test_settings();
    settings.show_parent_path = Some("1".to_string());
    let config = DeploymentConfig::resolve(
        &settings,
        &test_checkout(),
        "0f0e",
        "alice",
        &ConfigOverrides::default(),
    )
    .unwrap();
    assert_eq!(config.cluster_name, "work-demo_app-feature-0f0e");

    settings.show_parent_path = Some("false".to_string());
    let config = DeploymentConfig::resolve(
        &settings,
        &test_checkout(),
        "0f0e",
        "alice",
        &ConfigOverrides::default(),
    )
    .unwrap();
    assert_eq!(config.cluster_name, "demo_app-feature-0f0e");
}

#[test]
fn test_resolve_spaces_become_underscores() {
    let checkout = Checkout {
        root: "/home/alice/My Work/demo".into(),
        branch: "fix it".to_string(),
    };
    let mut settings = test_settings();
    settings.show_parent_path = Some("yes".to_string());

    let config = DeploymentConfig::resolve(
        &settings,
        &checkout,
        "0f0e",
        "alice",
        &ConfigOverrides::default(),
    )
    .unwrap();
    assert_eq!(config.cluster_name, "My_Work-demo_app-fix_it-0f0e");
}

#[test]
fn test_resolve_project_name_from_checkout() {
    let mut settings = test_settings();
    settings.project_name = None;

    let config = DeploymentConfig::resolve(
        &settings,
        &test_checkout(),
        "0f0e",
        "alice",
        &ConfigOverrides::default(),
    )
    .unwrap();
    assert_eq!(config.project_name, "demo");
    assert_eq!(config.cluster_name, "demo-feature-0f0e");
}

#[test]
fn test_resolve_explicit_names_and_overrides() {
    let mut settings = test_settings();
    settings.container_name = Some("web".to_string());
    settings.service_name = Some("Web-Service".to_string());
    settings.project_version = Some("1.2.0".to_string());

    let overrides = ConfigOverrides {
        cluster: Some("someone-else".to_string()),
        force: true,
        keep_alive: Some(true),
    };
    let config =
        DeploymentConfig::resolve(&settings, &test_checkout(), "0f0e", "alice", &overrides)
            .unwrap();

    assert_eq!(config.cluster_name, "someone-else");
    assert_eq!(config.task_family_name, "demo_app-feature-0f0e");
    assert_eq!(config.ecr_repo, "Web-Service");
    assert_eq!(
        config.image_uri,
        "123456789012.dkr.ecr.us-east-1.amazonaws.com/web-service:latest"
    );
    assert_eq!(config.local_container, "web:1.2.0");
    assert!(config.force);
    assert!(config.tags.is_keep_alive());
}

#[test]
fn test_resolve_missing_required() {
    let mut settings = test_settings();
    settings.ecr_uri = None;

    let result = DeploymentConfig::resolve(
        &settings,
        &test_checkout(),
        "0f0e",
        "alice",
        &ConfigOverrides::default(),
    );
    match assert_err!(result) {
        LauncherError::ConfigError(message) => assert!(message.contains("ECR_URI")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_resolve_bad_drain_timeout() {
    let mut settings = test_settings();
    settings.drain_timeout_secs = Some("ten".to_string());

    let result = DeploymentConfig::resolve(
        &settings,
        &test_checkout(),
        "0f0e",
        "alice",
        &ConfigOverrides::default(),
    );
    assert!(matches!(result, Err(LauncherError::ConfigError(_))));
}

#[test]
fn test_fill_missing_prompts_in_order() {
    let mut settings = test_settings();
    settings.subnet = None;
    settings.task_role_arn = None;

    let prompter = CannedPrompter::new(&["subnet-1", "arn:role"]);
    let settings = assert_ok!(fill_missing(settings, &prompter));

    assert_eq!(
        *prompter.asked.borrow(),
        vec!["Enter VPC Subnet".to_string(), "Enter Task Role ARN".to_string()]
    );
    assert_eq!(settings.subnet.as_deref(), Some("subnet-1"));
    assert_eq!(settings.task_role_arn.as_deref(), Some("arn:role"));
}

#[test]
fn test_fill_missing_rejects_empty_answer() {
    let mut settings = test_settings();
    settings.security_group = None;

    let prompter = CannedPrompter::new(&[""]);
    assert_err!(fill_missing(settings, &prompter));
}

#[test]
fn test_fill_missing_skips_when_complete() {
    let prompter = CannedPrompter::new(&[]);
    assert_ok!(fill_missing(test_settings(), &prompter));
    assert!(prompter.asked.borrow().is_empty());
}

#[test]
fn test_settings_ignore_empty_values() {
    let vars = BTreeMap::from([
        ("ECR_URI".to_string(), "  ".to_string()),
        ("SUBNET".to_string(), "subnet-1".to_string()),
        ("UNRELATED".to_string(), "x".to_string()),
    ]);
    let settings = EnvSettings::from_vars(&vars).unwrap();

    assert_eq!(settings.ecr_uri, None);
    assert_eq!(settings.subnet.as_deref(), Some("subnet-1"));
}

#[test]
fn test_process_env_wins_over_file() {
    let file = BTreeMap::from([("PROJECT_NAME".to_string(), "file".to_string())]);
    let merged = merge_vars(file, [("PROJECT_NAME".to_string(), "env".to_string())]);
    let settings = EnvSettings::from_vars(&merged).unwrap();

    assert_eq!(settings.project_name.as_deref(), Some("env"));
}

#[tokio::test]
async fn test_env_file_read_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    tokio::fs::write(&path, "PROJECT_NAME=demo\n# comment\nSUBNET=\"subnet-1\"\n")
        .await
        .unwrap();

    let env_file = EnvFile::new(&path);
    env_file.append_var("CURRENT_UUID", "abc").await.unwrap();

    let vars = env_file.read_vars().await.unwrap();
    assert_eq!(vars["PROJECT_NAME"], "demo");
    assert_eq!(vars["SUBNET"], "subnet-1");
    assert_eq!(vars["CURRENT_UUID"], "abc");
}

#[tokio::test]
async fn test_env_file_missing_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = EnvFile::new(dir.path().join(".env"));

    assert!(!env_file.exists().await);
    assert!(env_file.read_vars().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_id_generated_once() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = EnvFile::new(dir.path().join(".env"));

    let first = ensure_checkout_id(&EnvSettings::default(), &env_file)
        .await
        .unwrap();
    assert!(!first.is_empty());

    // The next run reads it back and keeps it
    let vars = env_file.read_vars().await.unwrap();
    assert_eq!(vars["CURRENT_UUID"], first);

    let settings = EnvSettings::from_vars(&vars).unwrap();
    let second = ensure_checkout_id(&settings, &env_file).await.unwrap();
    assert_eq!(second, first);

    let contents = tokio::fs::read_to_string(env_file.path()).await.unwrap();
    assert_eq!(contents.matches("CURRENT_UUID").count(), 1);
}
