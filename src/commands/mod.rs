pub mod completions;
pub mod configure;
pub mod list;
pub mod use_account;

pub use completions::CompletionsCommand;
pub use configure::ConfigureCommand;
pub use list::ListCommand;
pub use use_account::UseCommand;
