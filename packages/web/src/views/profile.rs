use dioxus::prelude::*;
use ui::ProfileView;

use crate::Route;

#[component]
pub fn ProfilePage() -> Element {
    let nav = use_navigator();

    rsx! {
        ProfileView {
            on_account_deleted: move |_| {
                nav.replace(Route::Home {});
            },
        }
    }
}
