pub mod correlate;
pub mod export;
pub mod forecast;
pub mod inspect;
pub mod setup;
pub mod show;
pub mod stage;
pub mod ui;
