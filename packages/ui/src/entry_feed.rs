use dioxus::prelude::*;
use store::DiaryEntry;

use crate::diary::{publish, use_diary, use_snapshot};
use crate::toast::{notify, use_toasts, ToastLevel};
use crate::views::ConfirmDialog;
use crate::EntryList;

/// [`EntryList`] plus the delete confirmation. Editing is left to the caller.
#[component]
pub fn EntryFeed(
    entries: Vec<DiaryEntry>,
    #[props(!optional)] empty_message: Option<String>,
    on_edit: EventHandler<String>,
) -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();
    let mut pending_delete = use_signal(|| Option::<String>::None);
    let mut deleting = use_signal(|| false);
    let loading = snapshot.read().entries_loading;

    let confirm_delete = move |_| {
        let Some(id) = pending_delete() else {
            return;
        };
        let diary = diary.clone();
        spawn(async move {
            deleting.set(true);
            let result = diary.entries().delete(&id).await;
            deleting.set(false);
            pending_delete.set(None);
            match result {
                Ok(()) => notify(&mut toasts, ToastLevel::Success, "Entry deleted"),
                Err(e) => {
                    tracing::error!("Failed to delete entry {}: {}", id, e);
                    notify(&mut toasts, ToastLevel::Error, e.message());
                }
            }
            publish(&diary, &mut snapshot);
        });
    };

    let empty_message =
        empty_message.unwrap_or_else(|| "No entries yet. Write your first one!".to_string());

    rsx! {
        EntryList {
            entries,
            loading,
            empty_message,
            on_edit: move |id| on_edit.call(id),
            on_delete: move |id| pending_delete.set(Some(id)),
        }
        if pending_delete().is_some() {
            ConfirmDialog {
                title: "Delete entry?",
                message: "This entry will be permanently deleted.",
                busy: deleting(),
                on_confirm: confirm_delete,
                on_cancel: move |_| pending_delete.set(None),
            }
        }
    }
}
