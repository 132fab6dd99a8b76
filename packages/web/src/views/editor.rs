use dioxus::prelude::*;
use store::Category;
use ui::{use_diary, use_snapshot, EntryForm};

use crate::Route;

#[component]
pub fn NewEntry() -> Element {
    let nav = use_navigator();

    rsx! {
        EntryForm {
            entry: None,
            category: None,
            on_saved: move |_| {
                nav.push(Route::Home {});
            },
            on_cancel: move |_| nav.go_back(),
        }
    }
}

/// New entry with the category preselected.
#[component]
pub fn NewEntryIn(name: String) -> Element {
    let nav = use_navigator();
    let category = name.parse::<Category>().ok();
    let back = name.clone();

    rsx! {
        EntryForm {
            entry: None,
            category,
            on_saved: move |_| {
                nav.push(Route::CategoryView { name: back.clone() });
            },
            on_cancel: move |_| nav.go_back(),
        }
    }
}

#[component]
pub fn EditEntry(id: String) -> Element {
    let diary = use_diary();
    let snapshot = use_snapshot();
    let nav = use_navigator();

    let loading = snapshot.read().entries_loading;
    let Some(entry) = diary.entries().get(&id) else {
        return rsx! {
            div {
                class: "entry-list__status",
                if loading {
                    "Loading entry..."
                } else {
                    p { "Entry not found" }
                    Link { to: Route::Home {}, "Back to all entries" }
                }
            }
        };
    };

    rsx! {
        EntryForm {
            key: "{entry.id}",
            entry: Some(entry),
            category: None,
            on_saved: move |_| {
                nav.push(Route::Home {});
            },
            on_cancel: move |_| nav.go_back(),
        }
    }
}
