pub mod alert;
pub mod personality;
pub mod price;
pub mod user;
pub mod watchlist;

pub use alert::{Alert, AlertKind};
pub use personality::{Personality, PersonalityProfile};
pub use price::{Candle, Period, PriceRecord, PriceSnapshot, StockInfo};
pub use user::{User, UserPreferences};
pub use watchlist::WatchlistEntry;
