use std::path::Path;

use clap::Args;
use deckhand_cloud::{DockerClient, RunRequest};

use crate::context::Context;
use crate::exit::{Completion, ExitContext, Failure, code};

const SECRETS_FILE_VAR: &str = "SECRETS_FILE";
const APP_ENV_VAR: &str = "APP_ENV";

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Secrets file: a repo path, a local path, or a remote location
    /// [env: SECRETS_FILE]
    #[arg(long, short = 'f')]
    pub secrets_file: Option<String>,

    /// Extra volumes to mount
    #[arg(long, short = 'v', value_delimiter = ',')]
    pub volume: Vec<String>,
}

/// How the secrets file reaches the test container.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Secrets {
    /// Bind-mount `host` at `/tmp/{env}`
    Mount(String),
    /// Let the container fetch it from `SECRETS_FILE`
    Remote(String),
}

impl Secrets {
    /// Repo-relative path first, then the path as given, else a remote location.
    fn resolve(file: &str, repo_root: &Path) -> Self {
        let in_repo = repo_root.join(file);
        if in_repo.exists() {
            Secrets::Mount(in_repo.display().to_string())
        } else if Path::new(file).exists() {
            Secrets::Mount(file.to_owned())
        } else {
            Secrets::Remote(file.to_owned())
        }
    }
}

/// Run the service's test script inside `{name}:{build tag}`.
pub async fn test(ctx: &Context, args: TestArgs) -> Result<Completion, Failure> {
    let secrets_file = args
        .secrets_file
        .or_else(|| std::env::var(SECRETS_FILE_VAR).ok())
        .filter(|f| !f.is_empty());
    let secrets = secrets_file.map(|f| Secrets::resolve(&f, &ctx.repo_root));

    let request = run_request(ctx, secrets, args.volume);
    tracing::debug!(?request, "running tests");

    DockerClient::new()
        .run(&request)
        .await
        .exit_context(code::COMMAND, "an error occurred running the test container")?;
    Ok(Completion::Done)
}

fn run_request(ctx: &Context, secrets: Option<Secrets>, extra_volumes: Vec<String>) -> RunRequest {
    let mut env = vec![(APP_ENV_VAR.to_owned(), ctx.env.clone())];
    let mut volumes = Vec::new();
    match secrets {
        Some(Secrets::Mount(host)) => volumes.push(format!("{host}:/tmp/{}", ctx.env)),
        Some(Secrets::Remote(location)) => env.push((SECRETS_FILE_VAR.to_owned(), location)),
        None => {}
    }
    volumes.extend(extra_volumes);

    RunRequest {
        image: ctx.local_image(&ctx.build_tag),
        env,
        volumes,
        command: vec![ctx.config.test_script().to_owned()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::ServiceConfig;
    use tempfile::TempDir;

    fn context(root: &Path) -> Context {
        let config: ServiceConfig =
            toml::from_str("name = \"billing\"\necr_repo = \"123.dkr.ecr.aws\"\n").unwrap();
        Context {
            env: "stage".to_owned(),
            region: None,
            profile: None,
            repo_root: root.to_path_buf(),
            config,
            build_tag: "ci_job-42".to_owned(),
            debug: false,
        }
    }

    #[test]
    fn secrets_in_repo_are_mounted_from_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("secrets.env"), "A=1").unwrap();

        let secrets = Secrets::resolve("secrets.env", tmp.path());
        assert_eq!(
            secrets,
            Secrets::Mount(tmp.path().join("secrets.env").display().to_string())
        );
    }

    #[test]
    fn secrets_outside_repo_are_mounted_as_given() {
        let repo = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let file = elsewhere.path().join("secrets.env");
        std::fs::write(&file, "A=1").unwrap();
        let file = file.display().to_string();

        assert_eq!(Secrets::resolve(&file, repo.path()), Secrets::Mount(file));
    }

    #[test]
    fn unknown_secrets_are_remote() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            Secrets::resolve("s3://bucket/stage.env", tmp.path()),
            Secrets::Remote("s3://bucket/stage.env".to_owned())
        );
    }

    #[test]
    fn run_request_with_mounted_secrets() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let request = run_request(
            &ctx,
            Some(Secrets::Mount("/repo/secrets.env".to_owned())),
            vec!["/data:/data".to_owned()],
        );

        assert_eq!(
            request.to_args(),
            vec![
                "run",
                "--rm",
                "-e",
                "APP_ENV=stage",
                "-v",
                "/repo/secrets.env:/tmp/stage",
                "-v",
                "/data:/data",
                "billing:ci_job-42",
                ".deploy/tests.sh",
            ]
        );
    }

    #[test]
    fn run_request_with_remote_secrets() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let request = run_request(
            &ctx,
            Some(Secrets::Remote("s3://bucket/stage.env".to_owned())),
            vec![],
        );

        assert_eq!(
            request.to_args(),
            vec![
                "run",
                "--rm",
                "-e",
                "APP_ENV=stage",
                "-e",
                "SECRETS_FILE=s3://bucket/stage.env",
                "billing:ci_job-42",
                ".deploy/tests.sh",
            ]
        );
    }

    #[test]
    fn run_request_without_secrets() {
        let tmp = TempDir::new().unwrap();
        let request = run_request(&context(tmp.path()), None, vec![]);
        assert_eq!(request.env, vec![("APP_ENV".to_owned(), "stage".to_owned())]);
        assert!(request.volumes.is_empty());
    }

    #[test]
    fn blank_test_script_runs_default_entrypoint() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(tmp.path());
        ctx.config.test_script = String::new();

        let request = run_request(&ctx, None, vec![]);
        assert_eq!(request.command, vec![".deploy/tests.sh"]);
    }
}
