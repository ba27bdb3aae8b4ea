//! ComTest Tests - the component end to end
//!
//! - ComTestMethod over TCP against the in-process result
//! - Identity metadata and GUID text forms
//! - Activation and self-registration through the server

mod common;

use std::f64::consts::PI;
use std::sync::Arc;

use common::*;
use comtest::{
    BString, ClassRegistry, ComError, ComTest, ComTestServer, ComTestServerConfig, HResult,
    IComTest, RegistryStore, TypeLibRegistration, CLSID_COMTEST, IID_ICOMTEST,
    LIBID_COMTESTLIBRARY,
};
use dcerpc::Uuid;

fn test_config() -> ComTestServerConfig {
    ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())
}

#[tokio::test]
async fn test_com_test_method_over_tcp() {
    init_logging();
    let running = start_comtest_server(test_config()).await;
    let proxy = connect_proxy(running.addr).await;

    let area = proxy.com_test_method(2.0, BString::new("abc")).await.unwrap();
    assert!(approx_eq(area, 4.0 * PI));

    let local = ComTest::new();
    for radius in [0.5, 1.0, 3.25, -7.0, 1e6] {
        let remote = proxy.com_test_method(radius, BString::new("r")).await.unwrap();
        let expected = local.com_test_method(radius, BString::new("r")).await.unwrap();
        assert_eq!(remote.to_bits(), expected.to_bits());
    }
}

#[tokio::test]
async fn test_zero_radius_and_empty_comment() {
    init_logging();
    let running = start_comtest_server(test_config()).await;
    let proxy = connect_proxy(running.addr).await;

    assert_eq!(proxy.com_test_method(0.0, BString::new("")).await.unwrap(), 0.0);
    assert_eq!(proxy.com_test_method(0.0, BString::null()).await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_non_finite_radius_over_tcp() {
    init_logging();
    let running = start_comtest_server(test_config()).await;
    let proxy = connect_proxy(running.addr).await;

    let nan = proxy.com_test_method(f64::NAN, BString::new("")).await.unwrap();
    assert!(nan.is_nan());
    let inf = proxy
        .com_test_method(f64::NEG_INFINITY, BString::new(""))
        .await
        .unwrap();
    assert_eq!(inf, f64::INFINITY);
}

#[tokio::test]
async fn test_unicode_comment() {
    init_logging();
    let running = start_comtest_server(test_config()).await;
    let proxy = connect_proxy(running.addr).await;

    let area = proxy
        .com_test_method(1.0, BString::new("Größe ✓ 𝄞 abc"))
        .await
        .unwrap();
    assert_eq!(area, PI);

    let lone_surrogate = BString::from_units(vec![0xDC00, 0x61]);
    assert_eq!(proxy.com_test_method(1.0, lone_surrogate).await.unwrap(), PI);
}

#[test]
fn test_identifiers_parse() {
    let cases = [
        ("1B31B683-F0AA-4E71-8F50-F2D2E5E9E210", IID_ICOMTEST),
        ("71AD0B2F-E5D0-4272-A4FD-18F707D5E0D6", CLSID_COMTEST),
        ("47A20781-26AD-465F-BDA9-AC59CEA74B69", LIBID_COMTESTLIBRARY),
    ];
    for (text, id) in cases {
        assert_eq!(Uuid::parse(text), Some(id));
        assert_eq!(Uuid::parse(&text.to_lowercase()), Some(id));
        assert_eq!(Uuid::parse(&format!("{{{text}}}")), Some(id));
    }
}

#[test]
fn test_guid_text_roundtrip() {
    for _ in 0..256 {
        let id = Uuid::generate();
        assert_eq!(Uuid::parse(&id.to_string()), Some(id));
        assert_eq!(Uuid::parse(&id.to_registry_string()), Some(id));
    }
    for id in [Uuid::NIL, IID_ICOMTEST, CLSID_COMTEST] {
        assert_eq!(id.to_string().parse::<Uuid>().unwrap(), id);
    }
}

#[test]
fn test_activation_of_unknown_class() {
    let registry = ClassRegistry::with_defaults();
    let err = match registry.create_instance(&Uuid::generate(), &IID_ICOMTEST) {
        Err(e) => e,
        Ok(_) => panic!("activation of an unregistered class succeeded"),
    };
    assert_eq!(err.hresult(), HResult::REGDB_E_CLASSNOTREG);
    assert!(matches!(err, ComError::HResult(_)));
}

#[tokio::test]
async fn test_server_self_registration() {
    init_logging();
    let hive = Arc::new(RegistryStore::new());
    let typelib = TypeLibRegistration {
        module_path: "C:\\Program Files\\Xoc\\ComTestLibrary.dll".into(),
        ..Default::default()
    };
    let config = test_config().with_registration(typelib);
    let server = ComTestServer::with_registry(config, hive.clone()).await.unwrap();

    let key = "typelib\\{71ad0b2f-e5d0-4272-a4fd-18f707d5e0d6}\\1.0";
    assert_eq!(hive.default_value(key).as_deref(), Some("ComTest Library"));
    assert_eq!(hive.default_value(&format!("{key}\\FLAGS")).as_deref(), Some("0"));
    assert!(hive
        .default_value(&format!("{key}\\0\\win32"))
        .unwrap()
        .ends_with("ComTestLibrary.comhost.tlb"));

    server.unregister();
    server.unregister();
    assert!(!hive.key_exists(key));
}

#[tokio::test]
async fn test_graceful_shutdown() {
    init_logging();
    let running = start_comtest_server(test_config()).await;
    {
        let proxy = connect_proxy(running.addr).await;
        proxy.com_test_method(1.0, BString::new("")).await.unwrap();
    }
    let server = running.server.clone();
    running.shutdown().await;

    let stats = server.stats();
    assert_eq!(stats.connections_accepted, 1);
    assert_eq!(stats.requests_processed, 1);
}
