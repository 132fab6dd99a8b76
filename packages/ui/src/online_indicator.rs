//! Online/offline status indicator for the navbar.

use dioxus::prelude::*;

use crate::diary::{use_online, use_snapshot};
use crate::icons::{FaCloud, FaCloudArrowUp, FaUserSlash};
use crate::Icon;

/// A small icon that shows the current connectivity and auth status.
///
/// - **Signed in + online**: cloud icon ("Online")
/// - **Signed in + offline**: cloud-up icon ("Offline")
/// - **Signed out**: slashed-user icon
#[component]
pub fn OnlineIndicator() -> Element {
    let snapshot = use_snapshot();
    let online = use_online();
    let state = snapshot.read().session.clone();

    if state.loading {
        return rsx! {};
    }

    match (&state.identity, online().0) {
        (Some(_), true) => rsx! {
            span {
                class: "online-indicator online-indicator--online",
                title: "Online",
                Icon { icon: FaCloud, width: 14, height: 14 }
            }
        },
        (Some(_), false) => rsx! {
            span {
                class: "online-indicator online-indicator--offline",
                title: "Offline: changes will fail until the connection returns",
                Icon { icon: FaCloudArrowUp, width: 14, height: 14 }
            }
        },
        (None, _) => rsx! {
            span {
                class: "online-indicator online-indicator--anonymous",
                title: "Signed out",
                Icon { icon: FaUserSlash, width: 14, height: 14 }
            }
        },
    }
}
