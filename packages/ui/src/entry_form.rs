//! Create and edit form for entries, including the optional image.

use dioxus::prelude::*;
use store::{Category, DiaryEntry, EntryDraft, EntryPatch};

use crate::diary::{publish, use_diary, use_snapshot};
use crate::toast::{notify, use_toasts, ToastLevel};

/// Fields that differ between `original` and `draft`.
pub fn patch_between(original: &DiaryEntry, draft: &EntryDraft) -> EntryPatch {
    EntryPatch {
        title: (draft.title != original.title).then(|| draft.title.clone()),
        content: (draft.content != original.content).then(|| draft.content.clone()),
        category: (draft.category != original.category).then_some(draft.category),
        image_url: (draft.image_url != original.image_url).then(|| draft.image_url.clone()),
    }
}

/// Entry editor. With `entry` it updates that entry, without it creates one.
#[component]
pub fn EntryForm(
    #[props(!optional)] entry: Option<DiaryEntry>,
    #[props(!optional)] category: Option<Category>,
    on_saved: EventHandler<()>,
    on_cancel: EventHandler<()>,
) -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();

    let original = entry.clone();
    let mut draft = use_signal(move || match &original {
        Some(entry) => EntryDraft::from(entry),
        None => EntryDraft {
            category: category.unwrap_or_default(),
            ..Default::default()
        },
    });
    let mut busy = use_signal(|| false);
    let mut uploading = use_signal(|| false);

    let upload_diary = diary.clone();
    let on_image = move |evt: FormEvent| {
        let diary = upload_diary.clone();
        spawn(async move {
            let Some(engine) = evt.files() else {
                return;
            };
            let Some(name) = engine.files().into_iter().next() else {
                return;
            };
            let Some(bytes) = engine.read_file(&name).await else {
                notify(&mut toasts, ToastLevel::Error, "Could not read the selected file");
                return;
            };
            uploading.set(true);
            match diary.entries().upload_image(&name, bytes).await {
                Ok(url) => draft.write().image_url = Some(url),
                Err(e) => {
                    tracing::error!("Image upload failed: {}", e);
                    notify(&mut toasts, ToastLevel::Error, e.message());
                }
            }
            uploading.set(false);
        });
    };

    let existing = entry.clone();
    let on_submit = move |evt: FormEvent| {
        evt.prevent_default();
        if busy() {
            return;
        }
        let diary = diary.clone();
        let existing = existing.clone();
        let current = draft();
        spawn(async move {
            busy.set(true);
            let result = match &existing {
                Some(entry) => {
                    let patch = patch_between(entry, &current);
                    if patch.is_empty() {
                        Ok(())
                    } else {
                        diary.entries().update(&entry.id, patch).await
                    }
                }
                None => diary.entries().create(current).await.map(|_| ()),
            };
            busy.set(false);
            publish(&diary, &mut snapshot);
            match result {
                Ok(()) => {
                    let message = if existing.is_some() { "Entry updated" } else { "Entry saved" };
                    notify(&mut toasts, ToastLevel::Success, message);
                    on_saved.call(());
                }
                Err(e) => {
                    tracing::error!("Failed to save entry: {}", e);
                    notify(&mut toasts, ToastLevel::Error, e.message());
                }
            }
        });
    };

    let heading = if entry.is_some() { "Edit entry" } else { "New entry" };

    rsx! {
        form {
            class: "entry-form",
            onsubmit: on_submit,
            h2 { "{heading}" }
            label {
                class: "field",
                span { "Title" }
                input {
                    class: "input",
                    r#type: "text",
                    value: draft().title,
                    oninput: move |evt: FormEvent| draft.write().title = evt.value(),
                }
            }
            label {
                class: "field",
                span { "Category" }
                select {
                    class: "input",
                    value: draft().category.as_str(),
                    onchange: move |evt: FormEvent| {
                        if let Ok(category) = evt.value().parse::<Category>() {
                            draft.write().category = category;
                        }
                    },
                    for choice in Category::ALL {
                        option {
                            key: "{choice}",
                            value: choice.as_str(),
                            selected: draft().category == choice,
                            "{choice.icon()} {choice}"
                        }
                    }
                }
            }
            label {
                class: "field",
                span { "Content" }
                textarea {
                    class: "input entry-form__content",
                    rows: "12",
                    placeholder: "Write in markdown...",
                    value: draft().content,
                    oninput: move |evt: FormEvent| draft.write().content = evt.value(),
                }
            }
            div {
                class: "field",
                span { "Image" }
                if let Some(url) = draft().image_url {
                    div {
                        class: "entry-form__image",
                        img { src: "{url}", alt: "Entry image" }
                        button {
                            class: "btn btn--ghost",
                            r#type: "button",
                            onclick: move |_| draft.write().image_url = None,
                            "Remove image"
                        }
                    }
                }
                input {
                    r#type: "file",
                    accept: "image/*",
                    disabled: uploading(),
                    onchange: on_image,
                }
                if uploading() {
                    span { class: "muted", "Uploading..." }
                }
            }
            div {
                class: "entry-form__actions",
                button {
                    class: "btn btn--ghost",
                    r#type: "button",
                    onclick: move |_| on_cancel.call(()),
                    "Cancel"
                }
                button {
                    class: "btn btn--primary",
                    r#type: "submit",
                    disabled: busy() || uploading(),
                    if busy() { "Saving..." } else { "Save" }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry() -> DiaryEntry {
        let now = Utc::now();
        DiaryEntry {
            id: "e1".into(),
            title: "Paris".into(),
            content: "trip".into(),
            category: Category::Travel,
            created_at: now,
            updated_at: now,
            image_url: Some("https://cdn/x.png".into()),
        }
    }

    #[test]
    fn test_patch_only_carries_changes() {
        let original = entry();
        let mut draft = EntryDraft::from(&original);
        assert!(patch_between(&original, &draft).is_empty());

        draft.title = "Lyon".into();
        draft.image_url = None;
        let patch = patch_between(&original, &draft);
        assert_eq!(patch.title.as_deref(), Some("Lyon"));
        assert_eq!(patch.image_url, Some(None));
        assert!(patch.content.is_none());
        assert!(patch.category.is_none());
    }
}
