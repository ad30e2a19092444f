mod trader;

pub use trader::{TraderAccess, TraderNotif};
pub(crate) use trader::Trader;
