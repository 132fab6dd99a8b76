use dioxus::prelude::*;

use crate::OnlineIndicator;

const DIARY_CSS: Asset = asset!("/assets/diary.css");

/// Top bar. Route links are passed in as `children`.
#[component]
pub fn Navbar(title: String, children: Element) -> Element {
    rsx! {
        document::Link { rel: "stylesheet", href: DIARY_CSS }
        nav {
            class: "navbar",
            span { class: "navbar__brand", "{title}" }
            div {
                class: "navbar__links",
                {children}
            }
            OnlineIndicator {}
        }
    }
}
