mod shell;
pub use shell::AppShell;

mod home;
pub use home::Home;

mod category;
pub use category::CategoryView;

mod editor;
pub use editor::{EditEntry, NewEntry, NewEntryIn};

mod profile;
pub use profile::ProfilePage;
