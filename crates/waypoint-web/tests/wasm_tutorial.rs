#![cfg(target_arch = "wasm32")]
#![forbid(unsafe_code)]

use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use waypoint_web::Tutorial;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
async fn empty_tutorial_resolves_inert() {
    let tour = Tutorial::new(js_sys::Array::new().into(), JsValue::UNDEFINED)
        .expect("empty steps still construct");
    let end = JsFuture::from(tour.start()).await.expect("resolves");
    assert_eq!(end.as_string().as_deref(), Some("inert"));
    assert!(!tour.is_running());
}

#[wasm_bindgen_test]
async fn invalid_options_still_construct() {
    let options = js_sys::JSON::parse(r#"{"settle_samples": 0}"#).expect("json");
    let tour = Tutorial::new(js_sys::Array::new().into(), options)
        .expect("bad options fall back to defaults");
    let end = JsFuture::from(tour.start()).await.expect("resolves");
    assert_eq!(end.as_string().as_deref(), Some("inert"));

    let cyclic = js_sys::Object::new();
    js_sys::Reflect::set(&cyclic, &"self".into(), &cyclic).expect("set cycle");
    assert!(Tutorial::new(js_sys::Array::new().into(), cyclic.into()).is_ok());
}

#[wasm_bindgen_test]
async fn missing_target_rejects() {
    let step = js_sys::JSON::parse(r##"{"target": "#definitely-not-here"}"##).expect("json");
    let steps = js_sys::Array::of1(&step);
    let tour = Tutorial::new(steps.into(), JsValue::UNDEFINED).expect("construct");
    let result = JsFuture::from(tour.start()).await;
    assert!(result.is_err());
    assert_eq!(tour.current_index(), None);
}
