//! Dispatch Tests - late binding over TCP
//!
//! - Name resolution (case-insensitive, unknown names reported per slot)
//! - Invoke argument coercion and the HRESULTs for bad calls

mod common;

use std::f64::consts::PI;

use common::*;
use comtest::automation::DISPATCH_PROPERTYGET;
use comtest::{
    BString, ComError, ComTestServerConfig, DispParams, HResult, Variant, DISPATCH_METHOD,
    DISPID_COMTESTMETHOD, DISPID_UNKNOWN, IID_ICOMTEST, IID_NULL,
};

async fn server() -> RunningServer<comtest::ComTestServer> {
    init_logging();
    start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await
}

#[tokio::test]
async fn test_type_info_surface() {
    let running = server().await;
    let proxy = connect_proxy(running.addr).await;

    assert_eq!(proxy.get_type_info_count().await.unwrap(), 1);
    assert_eq!(
        proxy.get_type_info(0, 0).await.unwrap_err().hresult(),
        HResult::E_NOTIMPL
    );
    assert_eq!(
        proxy.get_type_info(1, 0).await.unwrap_err().hresult(),
        HResult::DISP_E_BADINDEX
    );
}

#[tokio::test]
async fn test_get_ids_of_names() {
    let running = server().await;
    let proxy = connect_proxy(running.addr).await;

    for name in ["ComTestMethod", "comtestmethod", "COMTESTMETHOD", "cOmTeStMeThOd"] {
        let ids = proxy.get_ids_of_names(&IID_NULL, &[name], 0).await.unwrap();
        assert_eq!(ids, vec![DISPID_COMTESTMETHOD]);
    }

    let ids = proxy
        .get_ids_of_names(&IID_NULL, &["ComTestMethod", "Comment", "radius"], 0)
        .await
        .unwrap();
    assert_eq!(ids, vec![DISPID_COMTESTMETHOD, 1, 0]);
}

#[tokio::test]
async fn test_unknown_names() {
    let running = server().await;
    let proxy = connect_proxy(running.addr).await;

    match proxy
        .get_ids_of_names(&IID_NULL, &["ComTestMethod", "radius", "height"], 0)
        .await
    {
        Err(ComError::UnknownNames(ids)) => {
            assert_eq!(ids, vec![DISPID_COMTESTMETHOD, 0, DISPID_UNKNOWN])
        }
        other => panic!("unexpected {other:?}"),
    }

    let err = proxy
        .get_ids_of_names(&IID_ICOMTEST, &["ComTestMethod"], 0)
        .await
        .unwrap_err();
    assert_eq!(err.hresult(), HResult::DISP_E_UNKNOWNINTERFACE);
}

#[tokio::test]
async fn test_invoke_coerces_numeric_arguments() {
    let running = server().await;
    let proxy = connect_proxy(running.addr).await;

    for radius in [
        Variant::R8(2.0),
        Variant::R4(2.0),
        Variant::I4(2),
        Variant::I2(2),
        Variant::UI1(2),
    ] {
        let params = DispParams::positional(vec![radius.clone(), Variant::from("abc")]);
        let outcome = proxy
            .invoke(DISPID_COMTESTMETHOD, &IID_NULL, 0, DISPATCH_METHOD, &params)
            .await
            .unwrap();
        assert_eq!(outcome.hresult, HResult::S_OK, "radius {radius:?}");
        assert_eq!(outcome.result, Variant::R8(4.0 * PI));
    }

    let params = DispParams::positional(vec![Variant::R8(1.0), Variant::Empty]);
    let outcome = proxy
        .invoke(DISPID_COMTESTMETHOD, &IID_NULL, 0, DISPATCH_METHOD, &params)
        .await
        .unwrap();
    assert_eq!(outcome.into_result().unwrap(), Variant::R8(PI));

    let params = DispParams::positional(vec![Variant::R8(1.0), Variant::Bstr(BString::null())]);
    let outcome = proxy
        .invoke(DISPID_COMTESTMETHOD, &IID_NULL, 0, DISPATCH_METHOD, &params)
        .await
        .unwrap();
    assert_eq!(outcome.hresult, HResult::S_OK);
}

#[tokio::test]
async fn test_invoke_rejections() {
    let running = server().await;
    let proxy = connect_proxy(running.addr).await;
    let good = DispParams::positional(vec![Variant::R8(1.0), Variant::from("x")]);

    let cases = [
        (
            42,
            IID_NULL,
            DISPATCH_METHOD,
            good.clone(),
            HResult::DISP_E_MEMBERNOTFOUND,
        ),
        (
            DISPID_COMTESTMETHOD,
            IID_NULL,
            DISPATCH_PROPERTYGET,
            good.clone(),
            HResult::DISP_E_MEMBERNOTFOUND,
        ),
        (
            DISPID_COMTESTMETHOD,
            IID_ICOMTEST,
            DISPATCH_METHOD,
            good.clone(),
            HResult::DISP_E_UNKNOWNINTERFACE,
        ),
        (
            DISPID_COMTESTMETHOD,
            IID_NULL,
            DISPATCH_METHOD,
            DispParams::positional(vec![]),
            HResult::DISP_E_BADPARAMCOUNT,
        ),
        (
            DISPID_COMTESTMETHOD,
            IID_NULL,
            DISPATCH_METHOD,
            DispParams::positional(vec![Variant::R8(1.0), Variant::from("x"), Variant::Null]),
            HResult::DISP_E_BADPARAMCOUNT,
        ),
    ];

    for (dispid, riid, flags, params, expected) in cases {
        let outcome = proxy.invoke(dispid, &riid, 0, flags, &params).await.unwrap();
        assert_eq!(outcome.hresult, expected, "dispid {dispid} flags {flags}");
        assert_eq!(outcome.result, Variant::Empty);
    }
}

#[tokio::test]
async fn test_invoke_type_mismatch_index() {
    let running = server().await;
    let proxy = connect_proxy(running.addr).await;

    // comment is rgvarg[0], radius is rgvarg[1]
    let params = DispParams::positional(vec![Variant::R8(1.0), Variant::Bool(true)]);
    let outcome = proxy
        .invoke(DISPID_COMTESTMETHOD, &IID_NULL, 0, DISPATCH_METHOD, &params)
        .await
        .unwrap();
    assert_eq!(outcome.hresult, HResult::DISP_E_TYPEMISMATCH);
    assert_eq!(outcome.arg_err, 0);

    let params = DispParams::positional(vec![Variant::from("2.0"), Variant::from("x")]);
    let outcome = proxy
        .invoke(DISPID_COMTESTMETHOD, &IID_NULL, 0, DISPATCH_METHOD, &params)
        .await
        .unwrap();
    assert_eq!(outcome.hresult, HResult::DISP_E_TYPEMISMATCH);
    assert_eq!(outcome.arg_err, 1);
}
