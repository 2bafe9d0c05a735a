//! GitHub client tests against a mock server

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn client_for(server: &MockServer) -> GitHubClient {
    let config = ClientConfig::default()
        .with_api_base_url(server.uri())
        .with_raw_base_url(format!("{}/raw", server.uri()))
        .with_retries(1, Duration::from_millis(5), Duration::from_millis(10));
    GitHubClient::with_config(config).unwrap()
}

fn reference() -> RepositoryReference {
    RepositoryReference::branch(Repository::new("octo", "hello"), "main")
}

/// Test tree listing conversion
///
/// Verifies that blobs become regular files, mode 120000 blobs become
/// symlinks, trees become directories and submodule commits are dropped.
#[tokio::test]
async fn test_list_tree_maps_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/trees/main"))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc",
            "truncated": false,
            "tree": [
                {"path": "README.md", "mode": "100644", "type": "blob", "sha": "s1", "size": 120},
                {"path": "src", "mode": "040000", "type": "tree", "sha": "s2"},
                {"path": "src/main.rs", "mode": "100644", "type": "blob", "sha": "s3", "size": 30},
                {"path": "link", "mode": "120000", "type": "blob", "sha": "s4", "size": 7},
                {"path": "vendor/lib", "mode": "160000", "type": "commit", "sha": "s5"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let files = client.list_tree(&reference()).await.unwrap();

    assert_eq!(files.len(), 4);
    assert_eq!(files[0].kind, EntryKind::Regular);
    assert_eq!(files[0].size, 120);
    assert_eq!(
        files[0].download_url.as_deref(),
        Some(format!("{}/raw/octo/hello/main/README.md", server.uri()).as_str())
    );
    assert_eq!(files[1].kind, EntryKind::Directory);
    assert!(files[1].download_url.is_none());
    assert_eq!(files[2].path, "src/main.rs");
    assert_eq!(files[3].kind, EntryKind::Symlink);
}

#[tokio::test]
async fn test_list_tree_uses_sha_for_commits() {
    let server = MockServer::start().await;
    let sha = "0123456789abcdef0123456789abcdef01234567";
    Mock::given(method("GET"))
        .and(path(format!("/repos/octo/hello/git/trees/{sha}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "truncated": true,
            "tree": [{"path": "a.txt", "mode": "100644", "type": "blob", "sha": "x", "size": 1}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let commit = RepositoryReference::commit(Repository::new("octo", "hello"), sha).unwrap();
    let files = client.list_tree(&commit).await.unwrap();

    assert_eq!(files.len(), 1);
    assert!(files[0]
        .download_url
        .as_deref()
        .unwrap()
        .ends_with(&format!("/octo/hello/{sha}/a.txt")));
}

#[tokio::test]
async fn test_list_tree_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/trees/main"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/private/git/trees/main"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/busy/git/trees/main"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-limit", "60")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "4102444800"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);

    let err = client.list_tree(&reference()).await.unwrap_err();
    assert!(matches!(err, ListingError::NotFound { .. }));
    assert!(err.to_string().contains("octo/hello@main"));

    let private = RepositoryReference::branch(Repository::new("octo", "private"), "main");
    let err = client.list_tree(&private).await.unwrap_err();
    assert!(matches!(err, ListingError::Unauthorized { status: 401 }));

    let busy = RepositoryReference::branch(Repository::new("octo", "busy"), "main");
    let err = client.list_tree(&busy).await.unwrap_err();
    assert!(matches!(err, ListingError::RateLimited { reset_in_secs } if reset_in_secs > 0));
}

#[tokio::test]
async fn test_fetch_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw/octo/hello/main/src/lib.rs"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pub fn hi() {}".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/raw/octo/hello/main/gone.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let file = RemoteFile::regular(
        "src/lib.rs",
        14,
        "sha",
        Some(format!("{}/raw/octo/hello/main/src/lib.rs", server.uri())),
    );
    assert_eq!(client.fetch_content(&file).await.unwrap(), b"pub fn hi() {}");

    let gone = RemoteFile::regular(
        "gone.txt",
        1,
        "sha",
        Some(format!("{}/raw/octo/hello/main/gone.txt", server.uri())),
    );
    assert!(matches!(
        client.fetch_content(&gone).await.unwrap_err(),
        FetchError::NotFound { .. }
    ));

    let no_url = RemoteFile::regular("x", 1, "sha", None);
    assert!(matches!(
        client.fetch_content(&no_url).await.unwrap_err(),
        FetchError::InvalidUrl { .. }
    ));
}

#[tokio::test]
async fn test_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .and(header("authorization", "Bearer ghp_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {},
            "rate": {"limit": 5000, "remaining": 4321, "used": 679, "reset": 4102444800i64}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::default()
        .with_api_base_url(server.uri())
        .with_token("ghp_test");
    let client = GitHubClient::with_config(config).unwrap();

    let info = client.rate_limit_info().await.unwrap();
    assert_eq!(info.remaining, 4321);
    assert_eq!(info.used, 679);
    assert!(!info.is_exhausted());
}

/// Test reference resolution
///
/// Verifies that SHAs are recognized offline, branches are checked before
/// tags and unknown names are reported as not found.
#[tokio::test]
async fn test_resolve_reference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "trunk"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/branches/dev"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "dev"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/branches/v1.0"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/git/ref/tags/v1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ref": "refs/tags/v1.0"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let repo = Repository::new("octo", "hello");

    let default = client.resolve_reference(&repo, None).await.unwrap();
    assert_eq!(default.kind(), RefKind::Branch);
    assert_eq!(default.name(), "trunk");

    let branch = client.resolve_reference(&repo, Some("dev")).await.unwrap();
    assert_eq!(branch.kind(), RefKind::Branch);

    let tag = client.resolve_reference(&repo, Some("v1.0")).await.unwrap();
    assert_eq!(tag.kind(), RefKind::Tag);

    let sha = "89abcdef0123456789abcdef0123456789abcdef";
    let commit = client.resolve_reference(&repo, Some(sha)).await.unwrap();
    assert_eq!(commit.kind(), RefKind::Commit);
    assert_eq!(commit.sha(), Some(sha));

    let err = client
        .resolve_reference(&repo, Some("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, ListingError::NotFound { .. }));
}
