use dioxus::prelude::*;
use store::{Category, DiaryEntry};

/// One card per category with its entry count.
#[component]
pub fn CategoryCards(entries: Vec<DiaryEntry>, on_select: EventHandler<Category>) -> Element {
    let cards = Category::ALL.map(|category| {
        let count = entries.iter().filter(|e| e.category == category).count();
        (category, count_label(count))
    });

    rsx! {
        div {
            class: "category-cards",
            for (category, count) in cards {
                button {
                    key: "{category}",
                    class: "category-card",
                    onclick: move |_| on_select.call(category),
                    span { class: "category-card__icon", "{category.icon()}" }
                    span { class: "category-card__name", "{category}" }
                    span { class: "category-card__description", "{category.description()}" }
                    span {
                        class: "category-card__count",
                        "{count}"
                    }
                }
            }
        }
    }
}

fn count_label(count: usize) -> String {
    match count {
        1 => "1 entry".to_string(),
        n => format!("{n} entries"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_label() {
        assert_eq!(count_label(0), "0 entries");
        assert_eq!(count_label(1), "1 entry");
    }
}
