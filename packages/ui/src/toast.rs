//! Transient notifications for the outcome of user actions.

use dioxus::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl ToastLevel {
    fn class(&self) -> &'static str {
        match self {
            ToastLevel::Info => "toast toast--info",
            ToastLevel::Success => "toast toast--success",
            ToastLevel::Warning => "toast toast--warning",
            ToastLevel::Error => "toast toast--error",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct Toasts {
    pub items: Vec<Toast>,
    next_id: u64,
}

impl Toasts {
    /// Queue a toast and return its id.
    pub fn push(&mut self, level: ToastLevel, message: &str) -> u64 {
        self.next_id += 1;
        self.items.push(Toast {
            id: self.next_id,
            level,
            message: message.to_string(),
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|t| t.id != id);
    }
}

const TOAST_SECS: u64 = 4;

pub fn use_toasts() -> Signal<Toasts> {
    use_context::<Signal<Toasts>>()
}

/// Show a toast that dismisses itself after a few seconds.
pub fn notify(toasts: &mut Signal<Toasts>, level: ToastLevel, message: &str) {
    let id = toasts.write().push(level, message);
    let mut toasts = *toasts;
    spawn(async move {
        crate::diary::sleep_secs(TOAST_SECS).await;
        toasts.write().dismiss(id);
    });
}

/// Provides the toast queue and renders it above `children`.
#[component]
pub fn ToastHost(children: Element) -> Element {
    let mut toasts = use_signal(Toasts::default);
    use_context_provider(|| toasts);

    rsx! {
        {children}
        div {
            class: "toast-stack",
            for toast in toasts.read().items.clone() {
                div {
                    key: "{toast.id}",
                    class: toast.level.class(),
                    onclick: move |_| toasts.write().dismiss(toast.id),
                    "{toast.message}"
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let mut toasts = Toasts::default();
        let first = toasts.push(ToastLevel::Success, "Entry saved");
        let second = toasts.push(ToastLevel::Error, "Failed");
        assert_ne!(first, second);

        toasts.dismiss(first);
        assert_eq!(toasts.items.len(), 1);
        assert_eq!(toasts.items[0].message, "Failed");
    }
}
