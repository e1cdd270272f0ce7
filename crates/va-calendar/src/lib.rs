pub mod adapter;
pub mod error;
pub mod google;
pub mod manager;
pub mod oauth;
pub mod outlook;
pub mod types;

pub use adapter::CalendarAdapter;
pub use error::CalendarError;
pub use google::GoogleCalendarAdapter;
pub use manager::CalendarAdapterRegistry;
pub use outlook::OutlookCalendarAdapter;
pub use types::{BusyInterval, CalendarEvent, NewEvent};
