use dioxus::prelude::*;
use ui::{use_diary, use_snapshot, CategoryCards, EntryFeed, SearchBar};

use crate::Route;

/// Category overview, search and the full entry list.
#[component]
pub fn Home() -> Element {
    let diary = use_diary();
    let snapshot = use_snapshot();
    let nav = use_navigator();
    let query = use_signal(String::new);

    // Subscribe to the snapshot; the filtering itself runs on the store's cache.
    let all = snapshot.read().entries.clone();
    let entries = diary.entries().search(&query());
    let empty_message = if query().trim().is_empty() {
        None
    } else {
        Some(format!("No entries match \"{}\"", query().trim()))
    };

    rsx! {
        div {
            class: "page__header",
            h1 { "Your diary" }
            Link { class: "btn btn--primary", to: Route::NewEntry {}, "New entry" }
        }
        CategoryCards {
            entries: all,
            on_select: move |category: store::Category| {
                nav.push(Route::CategoryView { name: category.as_str().to_lowercase() });
            },
        }
        SearchBar { query }
        EntryFeed {
            entries,
            empty_message,
            on_edit: move |id| {
                nav.push(Route::EditEntry { id });
            },
        }
    }
}
