//! End-to-end scenarios for the gateway controller.
//!
//! Each test drives `Gateway::serve` with a `MockAuthority` and a
//! `RecordingLauncher`, then checks the outcome, the caller output, the
//! authority calls made and the processes launched.

use std::time::Duration;

use gitward::authority::mock::{FailOn, MockAuthority, MockOperation};
use gitward::authority::{AuthorityError, Key, Repository, User};
use gitward::core::config::{Config, LfsConfig, ServConfig, ServiceConfig};
use gitward::core::types::{AccessMode, KeyType, LfsOperation, UnitKind};
use gitward::engine::{Gateway, ServError, ServOutcome, ServRequest};
use gitward::git::{RecordingLauncher, ENV_PUSHER_ID, ENV_REPO_IS_WIKI};
use gitward::lfs::{LfsTokenIssuer, LfsTokenResponse};

// =============================================================================
// Fixtures
// =============================================================================

const SECRET_B64: &str = "dGVzdC1zaWduaW5nLXNlY3JldA";
const SECRET: &[u8] = b"test-signing-secret";

const REPO_ID: i64 = 1;
const OTHER_REPO_ID: i64 = 2;
const USER_KEY: i64 = 4;
const DEPLOY_KEY: i64 = 3;
const USER_ID: i64 = 10;

fn repo(is_private: bool, is_mirror: bool) -> Repository {
    Repository {
        id: REPO_ID,
        owner_name: "owner".to_string(),
        name: "repo".to_string(),
        is_private,
        is_mirror,
    }
}

fn other_repo() -> Repository {
    Repository {
        id: OTHER_REPO_ID,
        owner_name: "owner".to_string(),
        name: "other".to_string(),
        is_private: true,
        is_mirror: false,
    }
}

fn alice() -> User {
    User {
        id: USER_ID,
        name: "alice".to_string(),
        is_admin: false,
        is_active: true,
        prohibit_login: false,
    }
}

fn user_key() -> Key {
    Key {
        id: USER_KEY,
        key_type: KeyType::User,
        mode: AccessMode::None,
    }
}

fn deploy_key(mode: AccessMode) -> Key {
    Key {
        id: DEPLOY_KEY,
        key_type: KeyType::Deploy,
        mode,
    }
}

fn lfs_config() -> Config {
    Config::from_file(ServConfig {
        lfs: Some(LfsConfig {
            enabled: Some(true),
            jwt_secret: Some(SECRET_B64.to_string()),
            http_auth_expiry_secs: Some(600),
        }),
        app_url: Some("https://git.example.com".to_string()),
        ..Default::default()
    })
    .unwrap()
}

fn request(command: &str, key: Option<&str>) -> ServRequest {
    ServRequest {
        original_command: Some(command.to_string()),
        key_token: key.map(str::to_string),
        enable_pprof: false,
    }
}

struct Harness {
    config: Config,
    authority: MockAuthority,
    launcher: RecordingLauncher,
}

impl Harness {
    fn new(config: Config, authority: MockAuthority) -> Self {
        Self {
            config,
            authority,
            launcher: RecordingLauncher::new(0),
        }
    }

    async fn serve(&self, req: ServRequest) -> (Result<ServOutcome, ServError>, String) {
        let gateway = Gateway::new(&self.config, &self.authority, &self.launcher);
        let mut out = Vec::new();
        let result = gateway.serve(req, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    fn touches(&self) -> Vec<MockOperation> {
        self.authority
            .operations()
            .into_iter()
            .filter(|op| {
                matches!(
                    op,
                    MockOperation::TouchUserKey { .. } | MockOperation::TouchDeployKey { .. }
                )
            })
            .collect()
    }
}

// =============================================================================
// Round trips
// =============================================================================

#[tokio::test]
async fn upload_pack_round_trip() {
    let h = Harness::new(
        Config::default(),
        MockAuthority::new().with_repository(repo(false, false)),
    );

    let (result, _) = h.serve(request("git-upload-pack 'owner/repo.git'", None)).await;

    assert_eq!(result.unwrap(), ServOutcome::Dispatched);
    let launched = h.launcher.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].program, "git-upload-pack");
    assert_eq!(launched[0].args, vec!["owner/repo.git"]);
}

#[tokio::test]
async fn receive_pack_to_wiki_round_trip() {
    let authority = MockAuthority::new()
        .with_repository(repo(false, false))
        .with_key(user_key())
        .with_key_owner(USER_KEY, alice())
        .with_permission(USER_ID, REPO_ID, UnitKind::Wiki, AccessMode::Write);
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-receive-pack 'Owner/Repo.wiki.git'", Some("key-4")))
        .await;

    assert_eq!(result.unwrap(), ServOutcome::Dispatched);
    assert!(h.authority.wiki_initialized(REPO_ID));
    assert!(h.authority.operations().contains(&MockOperation::GetRepository {
        owner: "owner".to_string(),
        name: "repo".to_string(),
    }));
    assert!(h
        .authority
        .operations()
        .contains(&MockOperation::CheckUnitPermission {
            user_id: USER_ID,
            repo_id: REPO_ID,
            is_admin: false,
            unit: UnitKind::Wiki,
        }));

    let launched = h.launcher.launched();
    assert_eq!(launched[0].args, vec!["owner/repo.wiki.git"]);
    assert!(launched[0]
        .env
        .contains(&(ENV_REPO_IS_WIKI.to_string(), "true".to_string())));
    assert!(launched[0]
        .env
        .contains(&(ENV_PUSHER_ID.to_string(), USER_ID.to_string())));
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn anonymous_public_clone_makes_no_key_calls() {
    let h = Harness::new(
        Config::default(),
        MockAuthority::new().with_repository(repo(false, false)),
    );

    let (result, _) = h
        .serve(request("git-upload-archive 'owner/repo.git'", Some("key-4")))
        .await;

    assert!(result.is_ok());
    assert!(h.authority.operations().iter().all(|op| !op.is_key_lookup()));
}

#[tokio::test]
async fn signin_required_makes_credential_mandatory() {
    let config = Config::from_file(ServConfig {
        service: Some(ServiceConfig {
            require_signin_view: Some(true),
        }),
        ..Default::default()
    })
    .unwrap();
    let h = Harness::new(config, MockAuthority::new().with_repository(repo(false, false)));

    let (result, _) = h.serve(request("git-upload-pack 'owner/repo.git'", None)).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "malformed_command");
    assert!(h.launcher.launched().is_empty());
}

#[tokio::test]
async fn push_without_key_is_malformed() {
    let h = Harness::new(
        Config::default(),
        MockAuthority::new().with_repository(repo(false, false)),
    );

    let (result, _) = h.serve(request("git-receive-pack 'owner/repo.git'", None)).await;

    assert_eq!(result.unwrap_err().user_message(), "Key ID format error");
}

#[tokio::test]
async fn malformed_key_token_is_rejected() {
    let h = Harness::new(
        Config::default(),
        MockAuthority::new().with_repository(repo(true, false)),
    );

    let (result, _) = h
        .serve(request("git-upload-pack 'owner/repo.git'", Some("key4")))
        .await;

    assert_eq!(result.unwrap_err().kind(), "malformed_command");
}

#[tokio::test]
async fn authority_outage_is_internal_error() {
    let h = Harness::new(
        Config::default(),
        MockAuthority::new().fail_on(FailOn::GetRepository(AuthorityError::Transport(
            "connection refused".into(),
        ))),
    );

    let (result, _) = h.serve(request("git-upload-pack 'owner/repo.git'", None)).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "authority_unavailable");
    assert_eq!(err.user_message(), "Internal error");
}

#[tokio::test]
async fn missing_and_forbidden_repositories_look_alike() {
    let missing = Harness::new(Config::default(), MockAuthority::new());
    let (missing_result, _) = missing
        .serve(request("git-upload-pack 'owner/nope.git'", None))
        .await;

    let forbidden = Harness::new(
        Config::default(),
        MockAuthority::new()
            .with_repository(repo(true, false))
            .with_key(user_key())
            .with_key_owner(USER_KEY, alice()),
    );
    let (forbidden_result, _) = forbidden
        .serve(request("git-upload-pack 'owner/repo.git'", Some("key-4")))
        .await;

    let missing_err = missing_result.unwrap_err();
    let forbidden_err = forbidden_result.unwrap_err();
    assert_eq!(missing_err.user_message(), forbidden_err.user_message());
    assert_eq!(missing_err.kind(), "repository_not_found");
    assert_eq!(forbidden_err.kind(), "access_denied");
}

// =============================================================================
// Authorization rules
// =============================================================================

#[tokio::test]
async fn mirror_rejects_push_from_admin() {
    let authority = MockAuthority::new()
        .with_repository(repo(false, true))
        .with_key(user_key())
        .with_key_owner(
            USER_KEY,
            User {
                is_admin: true,
                ..alice()
            },
        );
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-receive-pack 'owner/repo.git'", Some("key-4")))
        .await;

    assert_eq!(result.unwrap_err().user_message(), "mirror repository is read-only");
    assert!(h.launcher.launched().is_empty());
}

#[tokio::test]
async fn deploy_key_scoped_to_other_repository_denied() {
    let authority = MockAuthority::new()
        .with_repository(other_repo())
        .with_key(deploy_key(AccessMode::Admin))
        .with_deploy_binding(DEPLOY_KEY, REPO_ID);
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-upload-pack 'owner/other.git'", Some("key-3")))
        .await;

    assert_eq!(
        result.unwrap_err(),
        ServError::DeployKeyScopeMismatch {
            key_id: DEPLOY_KEY,
            repo_id: OTHER_REPO_ID,
        }
    );
    assert!(h.touches().is_empty());
}

#[tokio::test]
async fn read_user_push_is_insufficient_not_denied() {
    let authority = MockAuthority::new()
        .with_repository(repo(false, false))
        .with_key(user_key())
        .with_key_owner(USER_KEY, alice())
        .with_permission(USER_ID, REPO_ID, UnitKind::Code, AccessMode::Read);
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-receive-pack 'owner/repo.git'", Some("key-4")))
        .await;

    assert_eq!(result.unwrap_err().kind(), "insufficient_access");
}

#[tokio::test]
async fn disabled_account_denied() {
    let authority = MockAuthority::new()
        .with_repository(repo(false, false))
        .with_key(user_key())
        .with_key_owner(
            USER_KEY,
            User {
                prohibit_login: true,
                ..alice()
            },
        )
        .with_permission(USER_ID, REPO_ID, UnitKind::Code, AccessMode::Admin);
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-receive-pack 'owner/repo.git'", Some("key-4")))
        .await;

    assert_eq!(result.unwrap_err().kind(), "account_disabled");
}

// =============================================================================
// Key bookkeeping
// =============================================================================

#[tokio::test]
async fn user_key_touched_exactly_once() {
    let authority = MockAuthority::new()
        .with_repository(repo(false, false))
        .with_key(user_key())
        .with_key_owner(USER_KEY, alice())
        .with_permission(USER_ID, REPO_ID, UnitKind::Code, AccessMode::Write);
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-receive-pack 'owner/repo.git'", Some("key-4")))
        .await;

    assert!(result.is_ok());
    assert_eq!(h.touches(), vec![MockOperation::TouchUserKey { key_id: USER_KEY }]);
}

#[tokio::test]
async fn deploy_key_touched_exactly_once() {
    let authority = MockAuthority::new()
        .with_repository(repo(true, false))
        .with_key(deploy_key(AccessMode::Write))
        .with_deploy_binding(DEPLOY_KEY, REPO_ID);
    let h = Harness::new(Config::default(), authority);

    let (result, _) = h
        .serve(request("git-receive-pack 'owner/repo.git'", Some("key-3")))
        .await;

    assert!(result.is_ok());
    assert_eq!(
        h.touches(),
        vec![MockOperation::TouchDeployKey {
            key_id: DEPLOY_KEY,
            repo_id: REPO_ID,
        }]
    );
}

// =============================================================================
// LFS
// =============================================================================

#[tokio::test]
async fn lfs_download_issues_user_token() {
    let authority = MockAuthority::new()
        .with_repository(repo(true, false))
        .with_key(user_key())
        .with_key_owner(USER_KEY, alice())
        .with_permission(USER_ID, REPO_ID, UnitKind::Code, AccessMode::Read);
    let h = Harness::new(lfs_config(), authority);

    let (result, out) = h
        .serve(request(
            "git-lfs-authenticate 'owner/repo.git' download dummy",
            Some("key-4"),
        ))
        .await;

    assert_eq!(result.unwrap(), ServOutcome::LfsToken);
    assert!(h.launcher.launched().is_empty());
    assert!(h.touches().is_empty());

    let response: LfsTokenResponse = serde_json::from_str(out.trim_end()).unwrap();
    assert_eq!(response.href, "https://git.example.com/owner/repo.git/info/lfs");

    let token = response.header["Authorization"]
        .strip_prefix("Bearer ")
        .unwrap();
    let issuer = LfsTokenIssuer::new(SECRET.to_vec(), Duration::from_secs(600), "");
    let claims = issuer.verify(token).unwrap();
    assert_eq!(claims.op, LfsOperation::Download);
    assert_eq!(claims.repo, REPO_ID);
    assert_eq!(claims.user, Some(USER_ID));
    assert_eq!(claims.exp - claims.nbf, 600);
}

#[tokio::test]
async fn lfs_upload_by_deploy_key_has_no_user_claim() {
    let authority = MockAuthority::new()
        .with_repository(repo(true, false))
        .with_key(deploy_key(AccessMode::Write))
        .with_deploy_binding(DEPLOY_KEY, REPO_ID);
    let h = Harness::new(lfs_config(), authority);

    let (result, out) = h
        .serve(request("git-lfs-authenticate 'owner/repo.git' upload", Some("key-3")))
        .await;

    assert_eq!(result.unwrap(), ServOutcome::LfsToken);
    let response: LfsTokenResponse = serde_json::from_str(out.trim_end()).unwrap();
    let token = response.header["Authorization"]
        .strip_prefix("Bearer ")
        .unwrap();
    let claims = LfsTokenIssuer::new(SECRET.to_vec(), Duration::from_secs(1), "")
        .verify(token)
        .unwrap();
    assert_eq!(claims.op, LfsOperation::Upload);
    assert_eq!(claims.user, None);
}

#[tokio::test]
async fn lfs_disabled_rejected_before_authority() {
    let authority = MockAuthority::new().with_repository(repo(false, false));
    let h = Harness::new(Config::default(), authority);

    let (result, out) = h
        .serve(request("git-lfs-authenticate 'owner/repo.git' upload", Some("key-4")))
        .await;

    let err = result.unwrap_err();
    assert_eq!(err, ServError::LfsDisabled);
    assert_eq!(err.user_message(), "Unknown git command");
    assert!(out.is_empty());
    assert!(h.authority.operations().is_empty());
}

#[tokio::test]
async fn lfs_unknown_sub_verb_rejected_before_authority() {
    let h = Harness::new(lfs_config(), MockAuthority::new());

    let (result, _) = h
        .serve(request("git-lfs-authenticate 'owner/repo.git' delete", Some("key-4")))
        .await;

    assert_eq!(result.unwrap_err(), ServError::UnknownLfsVerb("delete".to_string()));
    assert!(h.authority.operations().is_empty());
}

#[tokio::test]
async fn lfs_upload_with_read_access_is_insufficient() {
    let authority = MockAuthority::new()
        .with_repository(repo(false, false))
        .with_key(user_key())
        .with_key_owner(USER_KEY, alice())
        .with_permission(USER_ID, REPO_ID, UnitKind::Code, AccessMode::Read);
    let h = Harness::new(lfs_config(), authority);

    let (result, out) = h
        .serve(request("git-lfs-authenticate 'owner/repo.git' upload", Some("key-4")))
        .await;

    assert_eq!(result.unwrap_err().kind(), "insufficient_access");
    assert!(out.is_empty());
}
