/// Fetching STL bytes over HTTP
use js_sys::Uint8Array;
use stlview_core::LoadError;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, LoadError> {
    let window = web_sys::window().ok_or_else(|| LoadError::Network("no window".to_string()))?;

    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(network_error)?;
    let response: Response = response.dyn_into().map_err(network_error)?;
    if !response.ok() {
        return Err(LoadError::Http {
            status: response.status(),
            url: url.to_string(),
        });
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(network_error)?)
        .await
        .map_err(network_error)?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

fn network_error(err: JsValue) -> LoadError {
    LoadError::Network(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}
