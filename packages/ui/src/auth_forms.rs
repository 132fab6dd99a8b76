//! Sign-in, sign-up and password reset forms.

use dioxus::prelude::*;

use crate::diary::{publish, use_diary, use_snapshot};
use crate::toast::{notify, use_toasts, ToastLevel};

#[derive(Clone, Copy, Debug, PartialEq)]
enum AuthMode {
    SignIn,
    SignUp,
    Reset,
}

/// The signed-out landing: one card switching between the three forms.
#[component]
pub fn AuthPanel(#[props(default = "My Diary".to_string())] title: String) -> Element {
    let mut mode = use_signal(|| AuthMode::SignIn);

    rsx! {
        div {
            class: "auth-page",
            div {
                class: "auth-card",
                h1 { class: "auth-card__title", "{title}" }
                {match mode() {
                    AuthMode::SignIn => rsx! { SignInForm {} },
                    AuthMode::SignUp => rsx! { SignUpForm { on_done: move |_| mode.set(AuthMode::SignIn) } },
                    AuthMode::Reset => rsx! { ResetRequestForm { on_done: move |_| mode.set(AuthMode::SignIn) } },
                }}
                div {
                    class: "auth-card__links",
                    if mode() != AuthMode::SignIn {
                        button {
                            class: "link",
                            onclick: move |_| mode.set(AuthMode::SignIn),
                            "Back to sign in"
                        }
                    }
                    if mode() == AuthMode::SignIn {
                        button {
                            class: "link",
                            onclick: move |_| mode.set(AuthMode::SignUp),
                            "Create an account"
                        }
                        button {
                            class: "link",
                            onclick: move |_| mode.set(AuthMode::Reset),
                            "Forgot password?"
                        }
                    }
                }
            }
        }
    }
}

#[component]
fn FormError(error: Signal<Option<String>>) -> Element {
    rsx! {
        if let Some(err) = error() {
            div { class: "form-error", "{err}" }
        }
    }
}

#[component]
pub fn SignInForm() -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut error = use_signal(|| Option::<String>::None);
    let mut loading = use_signal(|| false);

    let handle_sign_in = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = diary.clone();
        spawn(async move {
            error.set(None);
            loading.set(true);
            let result = diary.sign_in(email().trim(), &password()).await;
            loading.set(false);
            match result {
                Ok(identity) => tracing::info!("Signed in as {}", identity.email),
                Err(e) => error.set(Some(e.message().to_string())),
            }
            publish(&diary, &mut snapshot);
        });
    };

    rsx! {
        form {
            class: "auth-form",
            onsubmit: handle_sign_in,
            FormError { error }
            input {
                class: "input",
                r#type: "email",
                placeholder: "Email",
                autocomplete: "email",
                value: email(),
                oninput: move |evt: FormEvent| email.set(evt.value()),
            }
            input {
                class: "input",
                r#type: "password",
                placeholder: "Password",
                autocomplete: "current-password",
                value: password(),
                oninput: move |evt: FormEvent| password.set(evt.value()),
            }
            button {
                class: "btn btn--primary",
                r#type: "submit",
                disabled: loading(),
                if loading() { "Signing in..." } else { "Sign in" }
            }
        }
    }
}

#[component]
pub fn SignUpForm(on_done: EventHandler<()>) -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut confirm = use_signal(String::new);
    let mut error = use_signal(|| Option::<String>::None);
    let mut loading = use_signal(|| false);

    let handle_sign_up = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = diary.clone();
        spawn(async move {
            error.set(None);
            loading.set(true);
            let result = diary.sign_up(email().trim(), &password(), &confirm()).await;
            loading.set(false);
            match result {
                Ok(outcome) if outcome.confirmation_required => {
                    notify(
                        &mut toasts,
                        ToastLevel::Info,
                        "Check your email to confirm your account.",
                    );
                    on_done.call(());
                }
                Ok(_) => notify(&mut toasts, ToastLevel::Success, "Welcome to your diary!"),
                Err(e) => error.set(Some(e.message().to_string())),
            }
            publish(&diary, &mut snapshot);
        });
    };

    rsx! {
        form {
            class: "auth-form",
            onsubmit: handle_sign_up,
            FormError { error }
            input {
                class: "input",
                r#type: "email",
                placeholder: "Email",
                autocomplete: "email",
                value: email(),
                oninput: move |evt: FormEvent| email.set(evt.value()),
            }
            input {
                class: "input",
                r#type: "password",
                placeholder: "Password",
                autocomplete: "new-password",
                value: password(),
                oninput: move |evt: FormEvent| password.set(evt.value()),
            }
            input {
                class: "input",
                r#type: "password",
                placeholder: "Confirm password",
                autocomplete: "new-password",
                value: confirm(),
                oninput: move |evt: FormEvent| confirm.set(evt.value()),
            }
            button {
                class: "btn btn--primary",
                r#type: "submit",
                disabled: loading(),
                if loading() { "Creating account..." } else { "Sign up" }
            }
        }
    }
}

#[component]
pub fn ResetRequestForm(on_done: EventHandler<()>) -> Element {
    let diary = use_diary();
    let mut toasts = use_toasts();
    let mut email = use_signal(String::new);
    let mut error = use_signal(|| Option::<String>::None);
    let mut loading = use_signal(|| false);

    let handle_reset = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = diary.clone();
        spawn(async move {
            error.set(None);
            loading.set(true);
            let result = diary
                .session()
                .request_password_reset(email().trim())
                .await;
            loading.set(false);
            match result {
                Ok(()) => {
                    notify(
                        &mut toasts,
                        ToastLevel::Info,
                        "If that address has an account, a reset link is on its way.",
                    );
                    on_done.call(());
                }
                Err(e) => error.set(Some(e.message().to_string())),
            }
        });
    };

    rsx! {
        form {
            class: "auth-form",
            onsubmit: handle_reset,
            p { class: "muted", "Enter your email and we'll send you a link to reset your password." }
            FormError { error }
            input {
                class: "input",
                r#type: "email",
                placeholder: "Email",
                value: email(),
                oninput: move |evt: FormEvent| email.set(evt.value()),
            }
            button {
                class: "btn btn--primary",
                r#type: "submit",
                disabled: loading(),
                if loading() { "Sending..." } else { "Send reset link" }
            }
        }
    }
}

/// Shown while the session is in password-recovery mode.
#[component]
pub fn RecoveryForm() -> Element {
    let diary = use_diary();
    let mut snapshot = use_snapshot();
    let mut toasts = use_toasts();
    let mut password = use_signal(String::new);
    let mut confirm = use_signal(String::new);
    let mut error = use_signal(|| Option::<String>::None);
    let mut loading = use_signal(|| false);

    let handle_recovery = move |evt: FormEvent| {
        evt.prevent_default();
        let diary = diary.clone();
        spawn(async move {
            error.set(None);
            loading.set(true);
            let result = diary
                .session()
                .complete_password_recovery(&password(), &confirm())
                .await;
            loading.set(false);
            match result {
                Ok(()) => notify(
                    &mut toasts,
                    ToastLevel::Success,
                    "Password updated. Please sign in with your new password.",
                ),
                Err(e) => error.set(Some(e.message().to_string())),
            }
            if let Err(e) = diary.process_pending().await {
                tracing::error!("Failed to load entries: {}", e);
            }
            publish(&diary, &mut snapshot);
        });
    };

    rsx! {
        div {
            class: "auth-page",
            div {
                class: "auth-card",
                h1 { class: "auth-card__title", "Set a new password" }
                form {
                    class: "auth-form",
                    onsubmit: handle_recovery,
                    FormError { error }
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
                        disabled: loading(),
                        if loading() { "Updating..." } else { "Update password" }
                    }
                }
            }
        }
    }
}
