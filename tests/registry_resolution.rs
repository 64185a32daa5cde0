#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::StubClient;
use stevedore::client::ClientIdentity;
use stevedore::{RegistryError, RunOptions, RuntimeError, Settings};

#[tokio::test]
async fn resolves_default_client_without_preferred_id() {
    let services = common::services();
    let _guard = services
        .containers()
        .register(StubClient::new("docker"))
        .unwrap();

    let version = services
        .run_with_defaults(|client| client.version(), &RunOptions::new())
        .await
        .unwrap();
    assert_eq!(version, "24.0.7-stub");
}

#[tokio::test]
async fn fails_when_nothing_is_registered() {
    let services = common::services();
    let err = services
        .run_with_defaults(|client| client.version(), &RunOptions::new())
        .await
        .unwrap_err();
    match err {
        RuntimeError::Registry(RegistryError::NoClientRegistered { id }) => assert_eq!(id, None),
        other => panic!("expected NoClientRegistered, got {other:?}"),
    }
}

#[tokio::test]
async fn non_default_client_is_not_the_fallback() {
    // Only "podman" registered; the default id "docker" resolves to nothing
    let services = common::services();
    let _guard = services
        .containers()
        .register(StubClient::new("podman"))
        .unwrap();

    let err = services.containers().get_client().await.unwrap_err();
    assert_eq!(err, RegistryError::NoClientRegistered { id: None });
}

#[tokio::test]
async fn duplicate_registration_fails_and_original_stays_usable() {
    let services = common::services();
    let _guard = services
        .containers()
        .register(StubClient::new("docker"))
        .unwrap();

    let err = services
        .containers()
        .register(StubClient::new("docker"))
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicateClient {
            id: "docker".into()
        }
    );

    let version = services
        .run_with_defaults(|client| client.version(), &RunOptions::new())
        .await
        .unwrap();
    assert_eq!(version, "24.0.7-stub");
}

#[tokio::test]
async fn concurrent_waiters_resolve_the_same_late_registration() {
    let services = Arc::new(common::services_with(Settings {
        container_client: Some("podman".into()),
        ..Settings::default()
    }));

    let first = {
        let services = services.clone();
        tokio::spawn(async move { services.containers().get_client().await })
    };
    let second = {
        let services = services.clone();
        tokio::spawn(async move { services.containers().get_client().await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    let _guard = services
        .containers()
        .register(StubClient::new("podman"))
        .unwrap();

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_eq!(a.id(), "podman");
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test(start_paused = true)]
async fn preferred_id_that_never_registers_times_out() {
    let services = common::services_with(Settings {
        container_client: Some("podman".into()),
        ..Settings::default()
    });
    let _guard = services
        .containers()
        .register(StubClient::new("docker"))
        .unwrap();

    let err = services.containers().get_client().await.unwrap_err();
    assert_eq!(
        err,
        RegistryError::NoClientRegistered {
            id: Some("podman".into())
        }
    );
}

#[tokio::test(start_paused = true)]
async fn disposing_a_registration_removes_the_client() {
    let services = common::services_with(Settings {
        container_client: Some("podman".into()),
        ..Settings::default()
    });
    let guard = services
        .containers()
        .register(StubClient::new("podman"))
        .unwrap();
    assert!(services.containers().get_client().await.is_ok());

    guard.dispose();
    let err = services.containers().get_client().await.unwrap_err();
    assert_eq!(
        err,
        RegistryError::NoClientRegistered {
            id: Some("podman".into())
        }
    );
}

#[tokio::test]
async fn command_name_override_applies_to_registered_clients() {
    let services = common::services();
    let stub = StubClient::new("docker");
    let _guard = services.containers().register(stub.clone()).unwrap();
    assert_eq!(services.containers().get_command_name().await.unwrap(), "sh");

    services
        .settings()
        .update(|s| s.container_command = Some("dash".into()));
    assert_eq!(
        services.containers().get_command_name().await.unwrap(),
        "dash"
    );

    services.settings().update(|s| s.container_command = None);
    assert_eq!(services.containers().get_command_name().await.unwrap(), "sh");
}
