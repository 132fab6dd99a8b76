//! This crate contains all shared UI for the workspace.

// Re-export icon library
pub use dioxus_free_icons::Icon;
pub mod icons {
    pub use dioxus_free_icons::icons::fa_solid_icons::*;
}

pub mod views;

mod persist;

mod diary;
pub use diary::{publish, use_diary, use_online, use_snapshot, AppDiary, DiaryProvider, Online};

pub mod toast;
pub use toast::{notify, use_toasts, ToastHost, ToastLevel};

pub mod markdown;
pub use markdown::{excerpt, render_markdown};

mod navbar;
pub use navbar::Navbar;

mod online_indicator;
pub use online_indicator::OnlineIndicator;

mod auth_forms;
pub use auth_forms::{AuthPanel, RecoveryForm, ResetRequestForm, SignInForm, SignUpForm};

mod entry_card;
pub use entry_card::{EntryCard, EntryList};

mod entry_feed;
pub use entry_feed::EntryFeed;

mod entry_form;
pub use entry_form::{patch_between, EntryForm};

mod search_bar;
pub use search_bar::SearchBar;

mod category_cards;
pub use category_cards::CategoryCards;

mod profile_view;
pub use profile_view::ProfileView;

mod delete_account;
pub use delete_account::DeleteAccountDialog;
