//! Layout gating every page on the session state.

use dioxus::prelude::*;
use ui::{
    notify, publish, use_diary, use_snapshot, use_toasts, AuthPanel, Navbar, RecoveryForm, ToastLevel,
};

use crate::Route;

#[component]
pub fn AppShell() -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();
    let session = snapshot.read().session.clone();

    if session.loading {
        return rsx! {
            div { class: "spinner", "Loading..." }
        };
    }
    if session.password_recovery {
        return rsx! { RecoveryForm {} };
    }
    let Some(identity) = session.identity else {
        return rsx! { AuthPanel {} };
    };

    let sign_out = move |_| {
        let diary = diary.clone();
        spawn(async move {
            if let Err(e) = diary.sign_out().await {
                tracing::error!("Sign out failed: {}", e);
                notify(&mut toasts, ToastLevel::Error, e.message());
            }
            publish(&diary, &mut snapshot);
        });
    };

    rsx! {
        Navbar {
            title: "My Diary",
            Link { to: Route::Home {}, "Entries" }
            Link { to: Route::NewEntry {}, "New entry" }
            Link { to: Route::ProfilePage {}, "Profile" }
            span { class: "muted", "{identity.email}" }
            button { class: "link", onclick: sign_out, "Sign out" }
        }
        main {
            class: "page",
            Outlet::<Route> {}
        }
    }
}
