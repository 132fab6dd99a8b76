//! Entry cards and the list they make up.

use dioxus::prelude::*;
use store::DiaryEntry;

use crate::markdown::{excerpt, render_markdown};

const EXCERPT_CHARS: usize = 180;

/// One entry. Collapsed cards show an excerpt; expanded cards render the
/// full markdown.
#[component]
pub fn EntryCard(
    entry: DiaryEntry,
    #[props(default)] expanded: bool,
    on_open: EventHandler<String>,
    on_edit: EventHandler<String>,
    on_delete: EventHandler<String>,
) -> Element {
    let date = entry.created_at.format("%B %-d, %Y").to_string();
    let edited = entry.updated_at > entry.created_at;
    let preview = excerpt(&entry.content, EXCERPT_CHARS);
    let open_id = entry.id.clone();
    let edit_id = entry.id.clone();
    let delete_id = entry.id.clone();

    rsx! {
        article {
            class: "entry-card",
            if let Some(url) = entry.image_url.clone() {
                img { class: "entry-card__image", src: "{url}", alt: "{entry.title}" }
            }
            header {
                class: "entry-card__header",
                span { class: "entry-card__category", "{entry.category.icon()} {entry.category}" }
                time { class: "entry-card__date", "{date}" }
                if edited {
                    span { class: "entry-card__edited", "edited" }
                }
            }
            h3 {
                class: "entry-card__title",
                onclick: move |_| on_open.call(open_id.clone()),
                "{entry.title}"
            }
            if expanded {
                div {
                    class: "entry-card__content markdown",
                    dangerous_inner_html: render_markdown(&entry.content),
                }
            } else {
                p { class: "entry-card__excerpt", "{preview}" }
            }
            footer {
                class: "entry-card__actions",
                button {
                    class: "btn btn--ghost",
                    onclick: move |_| on_edit.call(edit_id.clone()),
                    "Edit"
                }
                button {
                    class: "btn btn--danger-ghost",
                    onclick: move |_| on_delete.call(delete_id.clone()),
                    "Delete"
                }
            }
        }
    }
}

/// Entries newest first, with a message when there are none.
#[component]
pub fn EntryList(
    entries: Vec<DiaryEntry>,
    #[props(default)] loading: bool,
    #[props(default = "No entries yet. Write your first one!".to_string())] empty_message: String,
    on_edit: EventHandler<String>,
    on_delete: EventHandler<String>,
) -> Element {
    let mut expanded = use_signal(|| Option::<String>::None);

    if loading && entries.is_empty() {
        return rsx! {
            div { class: "entry-list__status", "Loading entries..." }
        };
    }
    if entries.is_empty() {
        return rsx! {
            div { class: "entry-list__status", "{empty_message}" }
        };
    }

    rsx! {
        div {
            class: "entry-list",
            for entry in entries {
                EntryCard {
                    key: "{entry.id}",
                    expanded: expanded().as_deref() == Some(entry.id.as_str()),
                    entry: entry.clone(),
                    on_open: move |id: String| {
                        if expanded().as_deref() == Some(id.as_str()) {
                            expanded.set(None);
                        } else {
                            expanded.set(Some(id));
                        }
                    },
                    on_edit: move |id| on_edit.call(id),
                    on_delete: move |id| on_delete.call(id),
                }
            }
        }
    }
}
