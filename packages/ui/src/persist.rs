//! Session tokens kept in `localStorage` so a reload stays signed in.

use api::SessionTokens;

#[cfg(target_arch = "wasm32")]
const SESSION_KEY: &str = "diary.session";

#[cfg(target_arch = "wasm32")]
fn storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

#[cfg(target_arch = "wasm32")]
pub fn load_session() -> Option<SessionTokens> {
    let raw = storage()?.get_item(SESSION_KEY).ok()??;
    match serde_json::from_str(&raw) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            tracing::warn!("Discarding stored session: {}", e);
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub fn save_session(tokens: Option<SessionTokens>) {
    let Some(storage) = storage() else {
        return;
    };
    let result = match tokens.map(|t| serde_json::to_string(&t)) {
        Some(Ok(raw)) => storage.set_item(SESSION_KEY, &raw),
        Some(Err(e)) => {
            tracing::warn!("Failed to encode session: {}", e);
            return;
        }
        None => storage.remove_item(SESSION_KEY),
    };
    if result.is_err() {
        tracing::warn!("Failed to persist session");
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_session() -> Option<SessionTokens> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
pub fn save_session(_tokens: Option<SessionTokens>) {}
