use dioxus::prelude::*;
use store::Category;
use ui::{use_diary, use_snapshot, EntryFeed};

use crate::Route;

#[component]
pub fn CategoryView(name: String) -> Element {
    let diary = use_diary();
    let snapshot = use_snapshot();
    let nav = use_navigator();

    let category = match name.parse::<Category>() {
        Ok(category) => category,
        Err(e) => {
            return rsx! {
                div {
                    class: "entry-list__status",
                    p { "{e}" }
                    Link { to: Route::Home {}, "Back to all entries" }
                }
            };
        }
    };

    let _ = snapshot.read();
    let entries = diary.entries().filter_by_category(category);

    rsx! {
        div {
            class: "page__header",
            div {
                h1 { "{category.icon()} {category}" }
                p { class: "muted", "{category.description()}" }
            }
            Link {
                class: "btn btn--primary",
                to: Route::NewEntryIn { name: name.clone() },
                "New {category} entry"
            }
        }
        EntryFeed {
            entries,
            empty_message: Some(format!("No {category} entries yet.")),
            on_edit: move |id| {
                nav.push(Route::EditEntry { id });
            },
        }
    }
}
