//! Diary context and hooks for the UI.
//!
//! [`DiaryProvider`] builds the [`AppDiary`] once, starts it, and keeps a
//! [`DiarySnapshot`] signal current: after every auth notification, and after
//! every mutation a component reports through [`publish`].

use api::SupabaseClient;
use dioxus::prelude::*;
use store::{Diary, DiaryConfig, DiarySnapshot};

use crate::persist;

/// The diary as wired to the hosted backend.
pub type AppDiary = Diary<SupabaseClient>;

/// Whether the backend answered the last connectivity check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Online(pub bool);

pub fn use_diary() -> AppDiary {
    use_context::<AppDiary>()
}

/// Reactive view of the diary state.
pub fn use_snapshot() -> Signal<DiarySnapshot> {
    use_context::<Signal<DiarySnapshot>>()
}

pub fn use_online() -> Signal<Online> {
    use_context::<Signal<Online>>()
}

/// Copy the diary's current state into the snapshot signal.
pub fn publish(diary: &AppDiary, snapshot: &mut Signal<DiarySnapshot>) {
    persist::save_session(diary.backend().session_tokens());
    snapshot.set(diary.snapshot());
}

pub(crate) async fn sleep_secs(secs: u64) {
    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(std::time::Duration::from_secs(secs)).await;
    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
}

/// Provider component that owns the diary.
///
/// `link_fragment` is the URL fragment the page was opened with; an auth
/// redirect (recovery or confirmation link) in it is turned into a session.
#[component]
pub fn DiaryProvider(
    #[props(default)] config: DiaryConfig,
    #[props(!optional)] link_fragment: Option<String>,
    children: Element,
) -> Element {
    let client = use_hook(SupabaseClient::from_env);

    match client {
        Ok(client) => rsx! {
            DiaryRuntime {
                client: client,
                config: config,
                link_fragment: link_fragment,
                {children}
            }
        },
        Err(e) => {
            tracing::error!("Backend is not configured: {}", e);
            rsx! {
                div {
                    class: "config-error",
                    h1 { "Diary is not configured" }
                    p { "{e}" }
                }
            }
        }
    }
}

#[component]
fn DiaryRuntime(
    client: ReadOnlySignal<SupabaseClient>,
    config: DiaryConfig,
    #[props(!optional)] link_fragment: Option<String>,
    children: Element,
) -> Element {
    let diary = use_hook(|| {
        let client = SupabaseClient::clone(&client.peek());
        if let Some(tokens) = persist::load_session() {
            client.restore_session(tokens);
        }
        Diary::new(client, config.clone())
    });
    let mut snapshot = use_signal(DiarySnapshot::default);
    let mut online = use_signal(|| Online(false));

    // Start, adopt any auth link, then follow notifications for the app's lifetime.
    let runtime = diary.clone();
    use_effect(move || {
        let diary = runtime.clone();
        let link_fragment = link_fragment.clone();
        spawn(async move {
            if let Err(e) = diary.start().await {
                tracing::error!("Failed to load entries: {}", e);
            }
            if let Some(fragment) = link_fragment {
                if let Err(e) = diary.backend().set_session_from_fragment(&fragment).await {
                    tracing::error!("Auth link rejected: {}", e);
                }
                if let Err(e) = diary.process_pending().await {
                    tracing::error!("Failed to load entries: {}", e);
                }
            }
            publish(&diary, &mut snapshot);

            loop {
                match diary.next_change().await {
                    Ok(Some(event)) => tracing::debug!(kind = ?event.kind, "auth change"),
                    Ok(None) => break,
                    Err(e) => tracing::error!("Failed to load entries: {}", e),
                }
                publish(&diary, &mut snapshot);
            }
        });
    });

    // Periodic connectivity check (every 30s)
    let pinger = diary.clone();
    use_effect(move || {
        let diary = pinger.clone();
        spawn(async move {
            loop {
                let reachable = diary.backend().ping(&diary.config().tables.entries).await;
                if online.peek().0 != reachable {
                    online.set(Online(reachable));
                }
                sleep_secs(30).await;
            }
        });
    });

    use_context_provider(|| diary.clone());
    use_context_provider(|| snapshot);
    use_context_provider(|| online);

    rsx! {
        {children}
    }
}
