use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static PULL_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^refs/pull/(\d+)").unwrap());

/// Service fields of the full report, describing the build that produced it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceHeader {
    /// Human-readable job description, printed but not serialized
    #[serde(skip)]
    pub display_name: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_job_number: Option<String>,
    pub service_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_build_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_job_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_pull_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_attempt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

/// Environment lookup where unset and empty variables are treated alike
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> String {
        (self.lookup)(name).unwrap_or_default()
    }

    /// The variable's value, `None` when unset or empty
    fn opt(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.is_empty())
    }

    fn is_set(&self, name: &str) -> bool {
        self.opt(name).is_some()
    }
}

fn travis<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Option<ServiceHeader> {
    if !env.is_set("TRAVIS") {
        return None;
    }

    Some(ServiceHeader {
        display_name: format!("Travis CI job {}", env.get("TRAVIS_JOB_NUMBER")),
        service_name: "travis-ci".to_string(),
        service_number: env.opt("TRAVIS_BUILD_NUMBER"),
        service_branch: env.opt("TRAVIS_BRANCH"),
        service_job_id: env.opt("TRAVIS_JOB_NUMBER"),
        service_build_url: env.opt("TRAVIS_BUILD_WEB_URL"),
        service_pull_request: env
            .opt("TRAVIS_PULL_REQUEST")
            .filter(|pull_request| pull_request != "false"),
        ..Default::default()
    })
}

fn appveyor<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Option<ServiceHeader> {
    if !env.is_set("APPVEYOR") {
        return None;
    }

    let build_url = format!(
        "https://ci.appveyor.com/project/{}/build/{}",
        env.get("APPVEYOR_REPO_NAME"),
        env.get("APPVEYOR_BUILD_VERSION")
    );
    Some(ServiceHeader {
        display_name: format!("Appveyor job {}", env.get("APPVEYOR_BUILD_ID")),
        service_name: "appveyor".to_string(),
        service_number: env.opt("APPVEYOR_BUILD_VERSION"),
        service_job_number: env.opt("APPVEYOR_BUILD_NUMBER"),
        service_job_id: env.opt("APPVEYOR_BUILD_ID"),
        service_branch: env.opt("APPVEYOR_REPO_BRANCH"),
        commit_sha: env.opt("APPVEYOR_REPO_COMMIT"),
        service_build_url: Some(build_url),
        ..Default::default()
    })
}

fn github<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Option<ServiceHeader> {
    if !env.is_set("GITHUB_ACTIONS") {
        return None;
    }

    let build_url = ["GITHUB_SERVER_URL", "GITHUB_REPOSITORY", "GITHUB_RUN_ID"]
        .iter()
        .all(|name| env.is_set(name))
        .then(|| {
            format!(
                "{}/{}/actions/runs/{}",
                env.get("GITHUB_SERVER_URL"),
                env.get("GITHUB_REPOSITORY"),
                env.get("GITHUB_RUN_ID")
            )
        });

    let github_ref = env.get("GITHUB_REF");
    let pull_request = PULL_REF
        .captures(&github_ref)
        .map(|captures| captures[1].to_string());

    let branch = env
        .opt("GITHUB_HEAD_REF")
        .or_else(|| env.opt("GITHUB_REF_NAME"));

    Some(ServiceHeader {
        display_name: format!(
            "GitHub job {} #{} (PR#{})",
            env.get("GITHUB_JOB"),
            env.get("GITHUB_RUN_NUMBER"),
            pull_request.as_deref().unwrap_or("None")
        ),
        service_name: "github".to_string(),
        repo_name: env.opt("GITHUB_REPOSITORY"),
        service_number: env.opt("GITHUB_RUN_ID"),
        service_job_id: env.opt("GITHUB_JOB"),
        service_branch: branch,
        service_build_url: build_url.clone(),
        service_job_url: build_url,
        service_pull_request: pull_request,
        service_event_type: env.opt("GITHUB_EVENT_NAME"),
        service_attempt: env.opt("GITHUB_RUN_ATTEMPT"),
        commit_sha: env.opt("GITHUB_SHA"),
        ..Default::default()
    })
}

fn local() -> ServiceHeader {
    ServiceHeader {
        display_name: "Local Build".to_string(),
        service_name: "coveralls-universal".to_string(),
        service_job_id: None,
        service_event_type: Some("manual".to_string()),
        ..Default::default()
    }
}

/// Detects the CI service through `lookup`; falls back to a local manual build
pub fn detect_service<F>(lookup: F) -> ServiceHeader
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };
    travis(&env)
        .or_else(|| appveyor(&env))
        .or_else(|| github(&env))
        .unwrap_or_else(local)
}

/// Detects the CI service from the process environment
pub fn service_from_env() -> ServiceHeader {
    detect_service(|name| std::env::var(name).ok())
}

/// Reads the Coveralls token, empty when unset
pub fn repo_token<F: Fn(&str) -> Option<String>>(lookup: F) -> String {
    lookup("COVERALLS_REPO_TOKEN").unwrap_or_default()
}
