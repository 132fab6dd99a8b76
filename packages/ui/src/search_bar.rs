use dioxus::prelude::*;

/// Free-text search over titles and contents.
#[component]
pub fn SearchBar(query: Signal<String>) -> Element {
    let mut query = query;

    rsx! {
        div {
            class: "search-bar",
            input {
                class: "input search-bar__input",
                r#type: "search",
                placeholder: "Search entries...",
                value: query(),
                oninput: move |evt: FormEvent| query.set(evt.value()),
            }
            if !query().is_empty() {
                button {
                    class: "btn btn--ghost",
                    onclick: move |_| query.set(String::new()),
                    "Clear"
                }
            }
        }
    }
}
