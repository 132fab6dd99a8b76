//! Profile page body: username, avatar, password and account deletion.

use dioxus::prelude::*;

use crate::delete_account::DeleteAccountDialog;
use crate::diary::{publish, use_diary, use_snapshot};
use crate::toast::{notify, use_toasts, ToastLevel};
use crate::views::ConfirmDialog;

/// `on_account_deleted` fires once the account is gone.
#[component]
pub fn ProfileView(on_account_deleted: EventHandler<()>) -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();
    let identity = snapshot.read().session.identity.clone();
    let profile = snapshot.read().profile.clone();

    let mut username = use_signal(String::new);
    let mut saving = use_signal(|| false);
    let mut uploading = use_signal(|| false);
    let mut confirm_remove = use_signal(|| false);
    let mut deleting = use_signal(|| false);

    // Load (or create) the profile row whenever the identity changes.
    let loader = diary.clone();
    let watched = identity.clone();
    use_effect(use_reactive!(|watched| {
        let diary = loader.clone();
        spawn(async move {
            let Some(identity) = watched else {
                return;
            };
            match diary.profile().load(&identity).await {
                Ok(profile) => username.set(profile.display_name(&identity).to_string()),
                Err(e) => {
                    tracing::error!("Failed to load profile: {}", e);
                    notify(&mut toasts, ToastLevel::Error, e.message());
                }
            }
            publish(&diary, &mut snapshot);
        });
    }));

    let Some(identity) = identity else {
        return rsx! {};
    };

    let save_diary = diary.clone();
    let save_identity = identity.clone();
    let save_username = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = save_diary.clone();
        let identity = save_identity.clone();
        spawn(async move {
            saving.set(true);
            let result = diary.profile().update_username(&identity, &username()).await;
            saving.set(false);
            match result {
                Ok(_) => notify(&mut toasts, ToastLevel::Success, "Username updated"),
                Err(e) => notify(&mut toasts, ToastLevel::Error, e.message()),
            }
            publish(&diary, &mut snapshot);
        });
    };

    let upload_diary = diary.clone();
    let upload_identity = identity.clone();
    let on_avatar = move |evt: FormEvent| {
        let diary = upload_diary.clone();
        let identity = upload_identity.clone();
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
            let result = diary.profile().upload_avatar(&identity, &name, bytes).await;
            uploading.set(false);
            match result {
                Ok(_) => notify(&mut toasts, ToastLevel::Success, "Avatar updated"),
                Err(e) => {
                    tracing::error!("Avatar upload failed: {}", e);
                    notify(&mut toasts, ToastLevel::Error, e.message());
                }
            }
            publish(&diary, &mut snapshot);
        });
    };

    let remove_diary = diary.clone();
    let remove_identity = identity.clone();
    let remove_avatar = move |_| {
        let diary = remove_diary.clone();
        let identity = remove_identity.clone();
        spawn(async move {
            uploading.set(true);
            let result = diary.profile().remove_avatar(&identity).await;
            uploading.set(false);
            confirm_remove.set(false);
            match result {
                Ok(_) => notify(&mut toasts, ToastLevel::Success, "Avatar removed"),
                Err(e) => notify(&mut toasts, ToastLevel::Error, e.message()),
            }
            publish(&diary, &mut snapshot);
        });
    };

    let begin_diary = diary.clone();
    let begin_delete = move |_| {
        match begin_diary.account().begin() {
            Ok(()) => deleting.set(true),
            Err(e) => notify(&mut toasts, ToastLevel::Error, e.message()),
        }
        publish(&begin_diary, &mut snapshot);
    };

    let display_name = profile
        .as_ref()
        .map(|p| p.display_name(&identity).to_string())
        .unwrap_or_else(|| identity.email_local_part().to_string());
    let initial = display_name
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default();

    rsx! {
        div {
            class: "profile",
            section {
                class: "profile__header",
                if let Some(url) = profile.as_ref().and_then(|p| p.avatar_url.clone()) {
                    img { class: "avatar avatar--large", src: "{url}", alt: "Avatar" }
                } else {
                    div { class: "avatar avatar--large avatar--placeholder", "{initial}" }
                }
                div {
                    h2 { "{display_name}" }
                    p { class: "muted", "{identity.email}" }
                }
            }

            section {
                class: "profile__section",
                h3 { "Avatar" }
                input {
                    r#type: "file",
                    accept: "image/*",
                    disabled: uploading(),
                    onchange: on_avatar,
                }
                if profile.as_ref().is_some_and(|p| p.avatar_url.is_some()) {
                    button {
                        class: "btn btn--ghost",
                        disabled: uploading(),
                        onclick: move |_| confirm_remove.set(true),
                        "Remove avatar"
                    }
                }
            }

            section {
                class: "profile__section",
                h3 { "Username" }
                form {
                    class: "inline-form",
                    onsubmit: save_username,
                    input {
                        class: "input",
                        r#type: "text",
                        value: username(),
                        oninput: move |evt: FormEvent| username.set(evt.value()),
                    }
                    button {
                        class: "btn btn--primary",
                        r#type: "submit",
                        disabled: saving(),
                        "Save"
                    }
                }
            }

            ChangePasswordForm {}

            section {
                class: "profile__section profile__danger",
                h3 { "Danger zone" }
                p { class: "muted", "Deleting your account removes all entries and cannot be undone." }
                button {
                    class: "btn btn--danger",
                    onclick: begin_delete,
                    "Delete account"
                }
            }

            if confirm_remove() {
                ConfirmDialog {
                    title: "Remove avatar?",
                    message: "Your avatar image will be deleted.",
                    confirm_label: "Remove",
                    busy: uploading(),
                    on_confirm: remove_avatar,
                    on_cancel: move |_| confirm_remove.set(false),
                }
            }

            if deleting() {
                DeleteAccountDialog {
                    on_close: move |_| deleting.set(false),
                    on_deleted: move |_| {
                        deleting.set(false);
                        on_account_deleted.call(());
                    },
                }
            }
        }
    }
}

#[component]
fn ChangePasswordForm() -> Element {
    let diary = use_diary();
    let mut toasts = use_toasts();
    let mut password = use_signal(String::new);
    let mut confirm = use_signal(String::new);
    let mut saving = use_signal(|| false);

    let handle_change = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = diary.clone();
        spawn(async move {
            saving.set(true);
            let result = diary.session().update_password(&password(), &confirm()).await;
            saving.set(false);
            match result {
                Ok(()) => {
                    password.set(String::new());
                    confirm.set(String::new());
                    notify(&mut toasts, ToastLevel::Success, "Password updated");
                }
                Err(e) => notify(&mut toasts, ToastLevel::Error, e.message()),
            }
        });
    };

    rsx! {
        section {
            class: "profile__section",
            h3 { "Change password" }
            form {
                class: "auth-form",
                onsubmit: handle_change,
                input {
                    class: "input",
                    r#type: "password",
                    placeholder: "New password",
                    autocomplete: "new-password",
                    value: password(),
                    oninput: move |evt: FormEvent| password.set(evt.value()),
                }
                input {
                    class: "input",
                    r#type: "password",
                    placeholder: "Confirm new password",
                    autocomplete: "new-password",
                    value: confirm(),
                    oninput: move |evt: FormEvent| confirm.set(evt.value()),
                }
                button {
                    class: "btn btn--primary",
                    r#type: "submit",
                    disabled: saving(),
                    "Update password"
                }
            }
        }
    }
}
