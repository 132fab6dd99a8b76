//! Password-gated account deletion dialog.

use dioxus::prelude::*;
use store::DeletionPhase;

use crate::diary::{publish, use_diary, use_snapshot};
use crate::toast::{notify, use_toasts, ToastLevel};
use crate::views::ModalOverlay;

fn phase_label(phase: DeletionPhase) -> &'static str {
    match phase {
        DeletionPhase::Verifying => "Checking your password...",
        DeletionPhase::Purging => "Deleting your data...",
        DeletionPhase::Finalizing => "Deleting your account...",
        _ => "Delete account",
    }
}

#[component]
pub fn DeleteAccountDialog(on_close: EventHandler<()>, on_deleted: EventHandler<()>) -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();
    let mut password = use_signal(String::new);
    let mut error = use_signal(|| Option::<String>::None);
    let phase = snapshot.read().deletion;
    let label = phase_label(phase);

    let cancel_diary = diary.clone();
    let cancel = use_callback(move |_: ()| {
        if cancel_diary.account().phase().is_busy() {
            return;
        }
        cancel_diary.account().cancel();
        publish(&cancel_diary, &mut snapshot);
        on_close.call(());
    });

    let handle_confirm = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = diary.clone();
        spawn(async move {
            error.set(None);
            let pw = password();
            // Show the phases while the deletion runs.
            let watcher = diary.clone();
            let ticker = spawn(async move {
                loop {
                    crate::diary::sleep_secs(1).await;
                    publish(&watcher, &mut snapshot);
                }
            });
            let result = diary.account().confirm(&pw).await;
            ticker.cancel();
            match result {
                Ok(report) => {
                    for warning in &report.warnings {
                        notify(&mut toasts, ToastLevel::Warning, &warning.to_string());
                    }
                    notify(&mut toasts, ToastLevel::Info, "Your account has been deleted.");
                    on_deleted.call(());
                }
                Err(e) => {
                    error.set(Some(e.message().to_string()));
                    // A failed attempt can be retried from a fresh prompt.
                    if diary.account().phase() == DeletionPhase::Failed {
                        if let Err(e) = diary.account().begin() {
                            tracing::error!("Failed to reopen deletion prompt: {}", e);
                        }
                    }
                }
            }
            publish(&diary, &mut snapshot);
        });
    };

    rsx! {
        ModalOverlay {
            on_close: cancel,
            form {
                class: "confirm-dialog",
                onsubmit: handle_confirm,
                h3 { "Delete your account?" }
                p { "This permanently deletes your entries, profile and avatar. Enter your password to continue." }
                if let Some(err) = error() {
                    div { class: "form-error", "{err}" }
                }
                input {
                    class: "input",
                    r#type: "password",
                    placeholder: "Password",
                    autocomplete: "current-password",
                    disabled: phase.is_busy(),
                    value: password(),
                    oninput: move |evt: FormEvent| password.set(evt.value()),
                }
                div {
                    class: "confirm-dialog__actions",
                    button {
                        class: "btn btn--ghost",
                        r#type: "button",
                        disabled: phase.is_busy(),
                        onclick: move |_| cancel.call(()),
                        "Cancel"
                    }
                    button {
                        class: "btn btn--danger",
                        r#type: "submit",
                        disabled: phase.is_busy(),
                        "{label}"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_label_follows_progress() {
        assert_eq!(phase_label(DeletionPhase::Confirming), "Delete account");
        assert_eq!(phase_label(DeletionPhase::Purging), "Deleting your data...");
    }
}
