use dioxus::prelude::*;

use store::DiaryConfig;
use ui::{DiaryProvider, ToastHost};
use views::{AppShell, CategoryView, EditEntry, Home, NewEntry, NewEntryIn, ProfilePage};

mod views;

#[derive(Debug, Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum Route {
    #[layout(AppShell)]
        #[route("/")]
        Home {},
        #[route("/category/:name")]
        CategoryView { name: String },
        #[route("/category/:name/new")]
        NewEntryIn { name: String },
        #[route("/new")]
        NewEntry {},
        #[route("/entries/:id/edit")]
        EditEntry { id: String },
        #[route("/profile")]
        ProfilePage {},
}

const MAIN_CSS: Asset = asset!("/assets/main.css");

fn main() {
    dioxus::logger::initialize_default();
    dioxus::launch(App);
}

/// The auth redirect fragment the page was opened with, removed from the
/// address bar so a reload does not replay it.
fn take_link_fragment() -> Option<String> {
    #[cfg(target_arch = "wasm32")]
    {
        let window = web_sys::window()?;
        let location = window.location();
        let hash = location.hash().ok()?;
        if !hash.contains("access_token=") && !hash.contains("error_description=") {
            return None;
        }
        if let (Ok(history), Ok(path)) = (window.history(), location.pathname()) {
            if let Err(e) = history.replace_state_with_url(&web_sys::wasm_bindgen::JsValue::NULL, "", Some(&path)) {
                tracing::warn!("Failed to clear auth fragment: {:?}", e);
            }
        }
        Some(hash)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        None
    }
}

/// `diary.toml` text baked in through `DIARY_CONFIG`, with the reset link
/// pointing back at this page.
fn diary_config() -> DiaryConfig {
    let config = DiaryConfig::from_toml_or_default(option_env!("DIARY_CONFIG"));
    match page_base_url() {
        Some(base) => config.resolve_reset_redirect(&base),
        None => config,
    }
}

fn page_base_url() -> Option<String> {
    #[cfg(target_arch = "wasm32")]
    {
        let location = web_sys::window()?.location();
        let origin = location.origin().ok()?;
        let path = location.pathname().ok()?;
        Some(format!("{origin}{path}"))
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        None
    }
}

#[component]
fn App() -> Element {
    let link_fragment = use_hook(take_link_fragment);
    let config = use_hook(diary_config);

    rsx! {
        document::Link { rel: "stylesheet", href: MAIN_CSS }

        ToastHost {
            DiaryProvider {
                config,
                link_fragment,
                Router::<Route> {}
            }
        }
    }
}
